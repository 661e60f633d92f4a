//! 导纳控制核心层
//!
//! 本 crate 把末端力/力矩测量转换为有界的关节速度命令，包括：
//! - 力传感器死区滤波（[`conditioner`]）
//! - 关节状态规范化（[`joint_state`]）
//! - 质量-阻尼导纳律与前向欧拉积分（[`dynamics`]）
//! - 惯性削减（[`inertia`]）
//! - 带奇异检测的速度层逆运动学（[`ik`]）
//! - 关节速度 / 加速度限幅（[`limiter`]）
//!
//! [`AdmittanceController`] 按固定顺序串联上述步骤并持有跨周期状态。
//! 本 crate 不涉及线程、调度和传输，这些属于 `admittance-driver`。
//!
//! # 示例
//!
//! ```
//! use admittance_core::{
//!     AdmittanceController, ControllerConfig, FixedKinematics, JointState, KinematicsProvider,
//!     Wrench,
//! };
//!
//! let config = ControllerConfig::default();
//! let mut controller = AdmittanceController::new(&config);
//! let mut kinematics = FixedKinematics::scaled_identity(1.0);
//!
//! let joint = JointState::default();
//! let snapshot = kinematics.snapshot(&joint).unwrap();
//! let wrench = Wrench::new([10.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
//!
//! let cycle = controller.step(&wrench, &joint, &snapshot).unwrap();
//! assert!(cycle.command.velocities[0] > 0.0);
//! ```

pub mod conditioner;
pub mod config;
pub mod controller;
pub mod dynamics;
mod error;
pub mod ik;
pub mod inertia;
pub mod joint_state;
pub mod kinematics;
pub mod limiter;
pub mod types;

pub use conditioner::DeadZone;
pub use config::{
    AdmittanceModel, ConfigLoad, ControllerConfig, DynamicLimits, SingularityConfig,
    SingularityPolicy,
};
pub use controller::{AdmittanceController, ControlState, Cycle, CycleStatus};
pub use dynamics::{AdmittanceDynamics, VelocitySource};
pub use error::{ConfigError, ControlError};
pub use ik::{InverseKinematics, IkSolution, InverseMethod};
pub use kinematics::{FixedKinematics, KinematicsProvider, KinematicsSnapshot};
pub use limiter::{DynamicLimiter, LimitReport};
pub use types::*;
