//! 驱动层错误类型定义

use admittance_core::ControlError;
use std::time::Duration;
use thiserror::Error;

/// 控制循环错误
///
/// 出现任何一种错误，控制循环都会停止并进入 Terminal 阶段。
#[derive(Error, Debug)]
pub enum LoopError {
    /// 配置非法
    #[error("Invalid loop configuration: {0}")]
    Config(String),

    /// 启动阶段等待输入流超时
    #[error("Timed out after {waited:?} waiting for input stream(s): {}", missing.join(", "))]
    StartupTimeout {
        waited: Duration,
        missing: Vec<&'static str>,
    },

    /// 运动学模型不可用
    #[error("Kinematics provider failed: {0}")]
    Kinematics(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// 控制器故障停机（奇异位形且策略为 fault）
    #[error("Control fault: {0}")]
    Control(#[from] ControlError),

    /// 下游连续发送失败超过容忍次数
    #[error("Command sink failed {count} consecutive times, last error: {last_error}")]
    ConsecutiveSendFailures {
        count: u32,
        last_error: Box<dyn std::error::Error + Send + Sync>,
    },
}
