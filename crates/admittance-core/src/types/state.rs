//! 关节状态与速度命令

use super::joint::JointArray;

/// 传输层交付的原始关节状态
///
/// 字段与常见的关节状态消息一致（名称 / 位置 / 速度 / 力矩并列数组），
/// 顺序由硬件接线决定，可能与规范关节顺序不同，见
/// [`canonicalize`](crate::joint_state::canonicalize)。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawJointState {
    pub name: Vec<String>,
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    pub effort: Vec<f64>,
    /// 时间戳（微秒）
    pub timestamp_us: u64,
}

impl RawJointState {
    /// 由位置和速度构造（名称与力矩留空）
    pub fn from_motion(position: [f64; 6], velocity: [f64; 6], timestamp_us: u64) -> Self {
        Self {
            name: Vec::new(),
            position: position.to_vec(),
            velocity: velocity.to_vec(),
            effort: Vec::new(),
            timestamp_us,
        }
    }
}

/// 规范关节状态（J1..J6 顺序）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointState {
    /// 关节位置（rad）
    pub position: JointArray<f64>,
    /// 关节速度（rad/s）
    pub velocity: JointArray<f64>,
    /// 时间戳（微秒）
    pub timestamp_us: u64,
}

/// 关节速度命令（每周期输出一次）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointVelocityCommand {
    /// 周期序号（从 0 开始递增）
    pub sequence: u64,
    /// 关节速度（rad/s，规范关节顺序）
    pub velocities: JointArray<f64>,
}
