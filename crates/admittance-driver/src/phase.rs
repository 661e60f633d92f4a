//! 控制循环阶段
//!
//! 控制线程写入，其他线程（CLI、监控）只读。

use std::sync::atomic::{AtomicU8, Ordering};

/// 控制循环阶段
///
/// ```text
/// Initializing --(两路输入都已到达)--> Running --(停止信号 / 致命错误)--> Terminal
/// Initializing --(停止信号 / 启动超时)--> Terminal
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LoopPhase {
    /// 等待首个力旋量采样和首个关节状态采样
    #[default]
    Initializing = 0,
    /// 按固定周期运行
    Running = 1,
    /// 已停止（不可恢复）
    Terminal = 2,
}

impl LoopPhase {
    /// 从 u8 转换
    ///
    /// 无效值视为 Terminal。
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Initializing,
            1 => Self::Running,
            _ => Self::Terminal,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_running(self) -> bool {
        self == Self::Running
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Terminal
    }
}

/// 控制循环阶段（原子版本，用于线程间共享）
///
/// # 示例
///
/// ```rust
/// use admittance_driver::phase::{AtomicLoopPhase, LoopPhase};
/// use std::sync::atomic::Ordering;
///
/// let phase = AtomicLoopPhase::new(LoopPhase::Initializing);
/// phase.set(LoopPhase::Running, Ordering::Release);
/// assert!(phase.get(Ordering::Acquire).is_running());
/// ```
#[derive(Debug)]
pub struct AtomicLoopPhase {
    inner: AtomicU8,
}

impl AtomicLoopPhase {
    pub fn new(phase: LoopPhase) -> Self {
        Self {
            inner: AtomicU8::new(phase.as_u8()),
        }
    }

    pub fn get(&self, ordering: Ordering) -> LoopPhase {
        LoopPhase::from_u8(self.inner.load(ordering))
    }

    pub fn set(&self, phase: LoopPhase, ordering: Ordering) {
        self.inner.store(phase.as_u8(), ordering);
    }

    /// 比较并交换
    ///
    /// 当前值等于 `current` 时设置为 `new` 并返回 true，否则返回 false。
    pub fn compare_exchange(
        &self,
        current: LoopPhase,
        new: LoopPhase,
        success: Ordering,
        failure: Ordering,
    ) -> bool {
        self.inner
            .compare_exchange(current.as_u8(), new.as_u8(), success, failure)
            .is_ok()
    }
}

impl Default for AtomicLoopPhase {
    fn default() -> Self {
        Self::new(LoopPhase::default())
    }
}
