//! 输入流的最新值交接
//!
//! 传输层线程（传感器回调、关节状态回调）写入，控制线程每周期读取一次。
//! 每路输入只保留最新一个采样，旧采样直接被替换，不排队、无背压。
//!
//! 同步机制：每路一个 `ArcSwapOption`，写入是整个采样的原子替换，
//! 读取总能拿到完整的一份采样，不会读到写了一半的数据。

use crate::metrics::LoopMetrics;
use admittance_core::{RawJointState, WrenchSample};
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// 输入流名称（用于日志和错误信息）
pub const WRENCH_STREAM: &str = "wrench";
pub const JOINT_STATE_STREAM: &str = "joint state";

/// 一个周期读取到的输入快照
#[derive(Debug, Clone)]
pub struct InputSnapshot {
    pub wrench: Arc<WrenchSample>,
    pub joint_state: Arc<RawJointState>,
}

/// 输入上下文（线程间共享）
#[derive(Debug)]
pub struct InputContext {
    wrench: ArcSwapOption<WrenchSample>,
    joint_state: ArcSwapOption<RawJointState>,
    metrics: Arc<LoopMetrics>,
}

impl InputContext {
    /// 创建空的输入上下文
    pub fn new(metrics: Arc<LoopMetrics>) -> Self {
        Self {
            wrench: ArcSwapOption::empty(),
            joint_state: ArcSwapOption::empty(),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<LoopMetrics> {
        &self.metrics
    }

    /// 发布一个力旋量采样（替换旧值）
    pub fn publish_wrench(&self, sample: WrenchSample) {
        self.wrench.store(Some(Arc::new(sample)));
        self.metrics.wrench_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// 发布一个原始关节状态（替换旧值）
    pub fn publish_joint_state(&self, state: RawJointState) {
        self.joint_state.store(Some(Arc::new(state)));
        self.metrics.joint_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn latest_wrench(&self) -> Option<Arc<WrenchSample>> {
        self.wrench.load_full()
    }

    pub fn latest_joint_state(&self) -> Option<Arc<RawJointState>> {
        self.joint_state.load_full()
    }

    /// 同时读取两路最新值
    ///
    /// 任一路尚无采样时返回该输入流的名称。
    pub fn snapshot(&self) -> Result<InputSnapshot, &'static str> {
        let wrench = self.latest_wrench().ok_or(WRENCH_STREAM)?;
        let joint_state = self.latest_joint_state().ok_or(JOINT_STATE_STREAM)?;
        Ok(InputSnapshot {
            wrench,
            joint_state,
        })
    }

    /// 尚无采样的输入流
    pub fn missing_streams(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.wrench.load().is_none() {
            missing.push(WRENCH_STREAM);
        }
        if self.joint_state.load().is_none() {
            missing.push(JOINT_STATE_STREAM);
        }
        missing
    }

    /// 两路输入都已到达
    pub fn is_ready(&self) -> bool {
        self.missing_streams().is_empty()
    }
}

impl Default for InputContext {
    fn default() -> Self {
        Self::new(Arc::new(LoopMetrics::default()))
    }
}
