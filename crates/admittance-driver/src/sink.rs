//! 命令下游
//!
//! 控制线程每周期调用一次 [`CommandSink::send`]，实现必须立即返回：
//! 下游处理不过来时丢弃或覆盖，而不是阻塞控制线程。

use crate::metrics::LoopMetrics;
use admittance_core::JointVelocityCommand;
use crossbeam_channel::{Sender, TrySendError};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// 命令下游
pub trait CommandSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn send(&mut self, command: &JointVelocityCommand) -> Result<(), Self::Error>;
}

impl<S: CommandSink + ?Sized> CommandSink for Box<S> {
    type Error = S::Error;

    fn send(&mut self, command: &JointVelocityCommand) -> Result<(), Self::Error> {
        (**self).send(command)
    }
}

impl<S: CommandSink + ?Sized> CommandSink for &mut S {
    type Error = S::Error;

    fn send(&mut self, command: &JointVelocityCommand) -> Result<(), Self::Error> {
        (**self).send(command)
    }
}

/// 内置下游的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// 接收端已关闭
    #[error("Command channel disconnected")]
    Disconnected,

    /// 锁被毒化（读取方线程 panic）
    #[error("Poisoned lock (thread panic)")]
    PoisonedLock,
}

/// 有界通道下游
///
/// 通道满时丢弃本条命令并计数，接收端关闭时返回错误。
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<JointVelocityCommand>,
    metrics: Option<Arc<LoopMetrics>>,
    dropped: u64,
}

impl ChannelSink {
    pub fn new(tx: Sender<JointVelocityCommand>) -> Self {
        Self {
            tx,
            metrics: None,
            dropped: 0,
        }
    }

    /// 丢弃计数同时记入 `commands_dropped`
    pub fn with_metrics(mut self, metrics: Arc<LoopMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl CommandSink for ChannelSink {
    type Error = SinkError;

    fn send(&mut self, command: &JointVelocityCommand) -> Result<(), SinkError> {
        match self.tx.try_send(*command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                if let Some(metrics) = &self.metrics {
                    metrics.commands_dropped.fetch_add(1, Ordering::Relaxed);
                }
                Ok(())
            },
            Err(TrySendError::Disconnected(_)) => Err(SinkError::Disconnected),
        }
    }
}

/// 邮箱下游（只保留最新一条命令）
///
/// 执行端通过 [`CommandMailbox::take`] 取走命令；上一条命令未被取走就被覆盖时计数。
#[derive(Debug)]
pub struct MailboxSink {
    slot: Arc<Mutex<Option<JointVelocityCommand>>>,
    metrics: Option<Arc<LoopMetrics>>,
    overwrites: u64,
}

/// 邮箱读取端
#[derive(Debug, Clone)]
pub struct CommandMailbox {
    slot: Arc<Mutex<Option<JointVelocityCommand>>>,
}

impl MailboxSink {
    /// 创建邮箱（写入端，读取端）
    pub fn new() -> (Self, CommandMailbox) {
        let slot = Arc::new(Mutex::new(None));
        (
            Self {
                slot: slot.clone(),
                metrics: None,
                overwrites: 0,
            },
            CommandMailbox { slot },
        )
    }

    /// 覆盖计数同时记入 `commands_dropped`
    pub fn with_metrics(mut self, metrics: Arc<LoopMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn overwrites(&self) -> u64 {
        self.overwrites
    }
}

impl CommandSink for MailboxSink {
    type Error = SinkError;

    fn send(&mut self, command: &JointVelocityCommand) -> Result<(), SinkError> {
        let mut slot = self.slot.lock().map_err(|_| SinkError::PoisonedLock)?;
        if slot.replace(*command).is_some() {
            self.overwrites += 1;
            if let Some(metrics) = &self.metrics {
                metrics.commands_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl CommandMailbox {
    /// 取出最新命令（插槽变为空）
    pub fn take(&self) -> Result<Option<JointVelocityCommand>, SinkError> {
        let mut slot = self.slot.lock().map_err(|_| SinkError::PoisonedLock)?;
        Ok(slot.take())
    }

    /// 查看最新命令（不取出）
    pub fn peek(&self) -> Result<Option<JointVelocityCommand>, SinkError> {
        let slot = self.slot.lock().map_err(|_| SinkError::PoisonedLock)?;
        Ok(*slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admittance_core::JointArray;

    fn command(sequence: u64) -> JointVelocityCommand {
        JointVelocityCommand {
            sequence,
            velocities: JointArray::splat(sequence as f64 * 0.01),
        }
    }

    #[test]
    fn test_channel_sink_forwards() {
        let (tx, rx) = crossbeam_channel::bounded(4);
        let mut sink = ChannelSink::new(tx);
        sink.send(&command(0)).unwrap();
        sink.send(&command(1)).unwrap();
        assert_eq!(rx.try_recv().unwrap().sequence, 0);
        assert_eq!(rx.try_recv().unwrap().sequence, 1);
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let metrics = Arc::new(LoopMetrics::new());
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut sink = ChannelSink::new(tx).with_metrics(metrics.clone());

        sink.send(&command(0)).unwrap();
        sink.send(&command(1)).unwrap();
        sink.send(&command(2)).unwrap();

        assert_eq!(sink.dropped(), 2);
        assert_eq!(metrics.snapshot().commands_dropped, 2);
        // 最早的一条留在通道中
        assert_eq!(rx.try_recv().unwrap().sequence, 0);
    }

    #[test]
    fn test_channel_sink_disconnected() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        drop(rx);
        let mut sink = ChannelSink::new(tx);
        assert_eq!(sink.send(&command(0)), Err(SinkError::Disconnected));
    }

    #[test]
    fn test_mailbox_keeps_latest() {
        let (mut sink, mailbox) = MailboxSink::new();
        assert_eq!(mailbox.take().unwrap(), None);

        sink.send(&command(0)).unwrap();
        sink.send(&command(1)).unwrap();
        assert_eq!(sink.overwrites(), 1);
        assert_eq!(mailbox.peek().unwrap().map(|c| c.sequence), Some(1));
        assert_eq!(mailbox.take().unwrap().map(|c| c.sequence), Some(1));
        assert_eq!(mailbox.take().unwrap(), None);

        // 已被取走，不算覆盖
        sink.send(&command(2)).unwrap();
        assert_eq!(sink.overwrites(), 1);
    }

    #[test]
    fn test_boxed_sink() {
        let (sink, mailbox) = MailboxSink::new();
        let mut boxed: Box<MailboxSink> = Box::new(sink);
        boxed.send(&command(5)).unwrap();
        assert_eq!(mailbox.take().unwrap().map(|c| c.sequence), Some(5));
    }
}
