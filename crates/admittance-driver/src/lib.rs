//! 导纳控制驱动层
//!
//! 本 crate 把 `admittance-core` 的单周期流水线放进一个固定频率的控制线程，包括：
//! - 输入流交接（ArcSwap 无锁读取，只保留最新采样）
//! - 启动屏障（等待两路输入，可配置超时）
//! - 绝对时间锚点定时（`spin_sleep`）
//! - 命令下游（有界通道 / 邮箱）与发送容错
//! - 原子指标与阶段
//!
//! 传感器采集、关节状态采集、命令执行都属于外部传输层：传输层线程调用
//! [`InputContext::publish_wrench`] / [`InputContext::publish_joint_state`] 写入，
//! 从 [`CommandSink`] 的另一端取走命令。

mod error;
pub mod loop_runner;
pub mod metrics;
pub mod phase;
pub mod sink;
pub mod state;

pub use error::LoopError;
pub use loop_runner::{ControlLoop, LoopConfig, LoopSummary, StopReason};
pub use metrics::{LoopMetrics, MetricsSnapshot};
pub use phase::{AtomicLoopPhase, LoopPhase};
pub use sink::{ChannelSink, CommandMailbox, CommandSink, MailboxSink, SinkError};
pub use state::{InputContext, InputSnapshot};
