//! 导纳控制器（单周期流水线）
//!
//! 每个周期按固定顺序执行：
//!
//! ```text
//! 死区滤波 -> 导纳动力学 -> 惯性削减 -> 逆运动学 -> 动态限幅 -> 更新持久状态
//! ```
//!
//! [`AdmittanceController`] 独占跨周期状态 [`ControlState`]，不做任何 I/O，
//! 也不关心线程和调度，这些由驱动层的控制循环负责。
//!
//! # 周期拒绝
//!
//! 以下情况本周期被拒绝（[`CycleStatus::Held`]）：重发上一周期的命令，持久状态不变。
//!
//! - 雅可比病态且策略为 `Hold`
//! - 力旋量、关节状态或计算结果中出现 NaN / Inf
//! - 原始关节状态格式错误（由调用方通过 [`AdmittanceController::hold`] 处理）
//!
//! 雅可比病态且策略为 `Fault` 时返回 `Err`，调用方应停止控制。

use crate::config::{ControllerConfig, SingularityPolicy};
use crate::conditioner::DeadZone;
use crate::dynamics::{AdmittanceDynamics, VelocitySource};
use crate::error::ControlError;
use crate::ik::{InverseKinematics, InverseMethod};
use crate::inertia::reduce_inertia;
use crate::joint_state;
use crate::kinematics::KinematicsSnapshot;
use crate::limiter::{DynamicLimiter, LimitReport};
use crate::types::{JointArray, JointState, JointVelocityCommand, RawJointState, Wrench};
use nalgebra::Vector6;
use tracing::{debug, trace};

/// 跨周期持久状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlState {
    /// 上一周期实际下发的笛卡尔速度（J · q̇_prev）
    pub x_dot_prev: Vector6<f64>,
    /// 上一周期下发的关节速度
    pub q_dot_prev: JointArray<f64>,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            x_dot_prev: Vector6::zeros(),
            q_dot_prev: JointArray::ZERO,
        }
    }
}

/// 周期结果状态
#[derive(Debug, Clone, PartialEq)]
pub enum CycleStatus {
    /// 正常计算
    Nominal,
    /// 周期被拒绝，命令为上一周期的重发
    Held(ControlError),
}

impl CycleStatus {
    pub fn is_held(&self) -> bool {
        matches!(self, CycleStatus::Held(_))
    }
}

/// 单周期输出
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    /// 本周期下发的关节速度命令
    pub command: JointVelocityCommand,
    /// 命令对应的笛卡尔速度（即新的 x_dot_prev）
    pub cartesian_velocity: Vector6<f64>,
    pub status: CycleStatus,
    pub limits: LimitReport,
    /// 雅可比条件数（周期被拒绝时可能缺失）
    pub condition: Option<f64>,
    /// 是否使用了阻尼最小二乘逆
    pub damped: bool,
}

/// 导纳控制器
#[derive(Debug, Clone)]
pub struct AdmittanceController {
    dead_zone: DeadZone,
    dynamics: AdmittanceDynamics,
    ik: InverseKinematics,
    limiter: DynamicLimiter,
    inertia_reduction: bool,
    swap_base_elbow: bool,
    state: ControlState,
    sequence: u64,
}

impl AdmittanceController {
    /// 由已校验的配置构造（持久状态为零）
    pub fn new(config: &ControllerConfig) -> Self {
        let dt = config.dt();
        Self {
            dead_zone: DeadZone::from(&config.model),
            dynamics: AdmittanceDynamics::new(
                &config.model,
                dt,
                VelocitySource::from_feedback_flag(config.use_feedback_velocity),
            ),
            ik: InverseKinematics::new(&config.singularity),
            limiter: DynamicLimiter::new(&config.limits, dt),
            inertia_reduction: config.inertia_reduction,
            swap_base_elbow: config.swap_base_elbow,
            state: ControlState::default(),
            sequence: 0,
        }
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    /// 已发出的命令数（也是下一条命令的序号）
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn dead_zone(&self) -> &DeadZone {
        &self.dead_zone
    }

    pub fn velocity_source(&self) -> VelocitySource {
        self.dynamics.source()
    }

    /// 清零持久状态（序号不变）
    pub fn reset(&mut self) {
        self.state = ControlState::default();
    }

    /// 按配置的轴交换规则规范化原始关节状态
    pub fn canonicalize(&self, raw: &RawJointState) -> Result<JointState, ControlError> {
        joint_state::canonicalize(raw, self.swap_base_elbow)
    }

    /// 拒绝本周期：重发上一周期的命令，持久状态不变
    pub fn hold(&mut self, reason: ControlError) -> Cycle {
        trace!("Cycle {} held: {}", self.sequence, reason);
        let command = self.next_command(self.state.q_dot_prev);
        Cycle {
            command,
            cartesian_velocity: self.state.x_dot_prev,
            status: CycleStatus::Held(reason),
            limits: LimitReport::default(),
            condition: None,
            damped: false,
        }
    }

    /// 执行一个控制周期
    ///
    /// # 错误
    ///
    /// 仅在雅可比病态且策略为 `Fault` 时返回 [`ControlError::SingularJacobian`]，
    /// 其余异常都以 [`CycleStatus::Held`] 的形式返回。
    pub fn step(
        &mut self,
        raw_wrench: &Wrench,
        joint: &JointState,
        kinematics: &KinematicsSnapshot,
    ) -> Result<Cycle, ControlError> {
        let wrench = self.dead_zone.apply(raw_wrench);
        if !wrench.is_finite() {
            return Ok(self.hold(ControlError::NonFinite("wrench")));
        }
        if !joint.position.is_finite() || !joint.velocity.is_finite() {
            return Ok(self.hold(ControlError::NonFinite("joint state")));
        }

        let mut x_dot = self.dynamics.step(
            kinematics,
            &joint.velocity,
            &self.state.x_dot_prev,
            &wrench,
        );
        if self.inertia_reduction {
            reduce_inertia(&mut x_dot, &wrench);
        }

        let solution = match self.ik.solve(&kinematics.jacobian, &x_dot) {
            Ok(solution) => solution,
            Err(e @ ControlError::SingularJacobian { .. })
                if self.ik.policy() == SingularityPolicy::Fault =>
            {
                return Err(e);
            },
            Err(e) => return Ok(self.hold(e)),
        };

        let mut q_dot = solution.joint_velocity;
        let limits = self.limiter.apply(&mut q_dot, &self.state.q_dot_prev);
        if limits.any() {
            debug!(
                "Cycle {}: {} joint(s) velocity-limited, {} joint(s) acceleration-limited",
                self.sequence, limits.velocity_clamped, limits.acceleration_clamped
            );
        }
        if !q_dot.is_finite() {
            return Ok(self.hold(ControlError::NonFinite("joint velocity command")));
        }

        self.state.q_dot_prev = q_dot;
        self.state.x_dot_prev = kinematics.jacobian * q_dot.to_vector();

        trace!(
            "Cycle {}: wrench {} -> q_dot {}",
            self.sequence, wrench, q_dot
        );

        let command = self.next_command(q_dot);
        Ok(Cycle {
            command,
            cartesian_velocity: self.state.x_dot_prev,
            status: CycleStatus::Nominal,
            limits,
            condition: Some(solution.condition),
            damped: solution.method == InverseMethod::DampedLeastSquares,
        })
    }

    fn next_command(&mut self, velocities: JointArray<f64>) -> JointVelocityCommand {
        let command = JointVelocityCommand {
            sequence: self.sequence,
            velocities,
        };
        self.sequence += 1;
        command
    }
}
