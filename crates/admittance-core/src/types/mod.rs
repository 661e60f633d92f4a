//! 核心数据类型
//!
//! - [`Joint`] / [`JointArray`]：关节空间
//! - [`CartesianAxis`] / [`Wrench`]：笛卡尔空间
//! - [`RawJointState`] / [`JointState`]：关节反馈
//! - [`JointVelocityCommand`]：控制输出

mod joint;
mod state;
mod wrench;

pub use joint::{JOINT_COUNT, Joint, JointArray};
pub use state::{JointState, JointVelocityCommand, RawJointState};
pub use wrench::{CartesianAxis, Wrench, WrenchSample};
