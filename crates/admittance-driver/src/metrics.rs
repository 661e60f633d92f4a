//! 控制循环指标
//!
//! 原子计数器，任何线程都可以无锁读取。

use std::sync::atomic::{AtomicU64, Ordering};

/// 控制循环实时指标
///
/// # 使用示例
///
/// ```rust
/// use admittance_driver::LoopMetrics;
/// use std::sync::Arc;
/// use std::sync::atomic::Ordering;
///
/// let metrics = Arc::new(LoopMetrics::default());
/// metrics.cycles.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.cycles, 1);
/// ```
#[derive(Debug, Default)]
pub struct LoopMetrics {
    /// 收到的力旋量采样数
    pub wrench_samples: AtomicU64,
    /// 收到的关节状态采样数
    pub joint_samples: AtomicU64,
    /// 已执行的控制周期数
    pub cycles: AtomicU64,
    /// 成功交给下游的命令数
    pub commands_sent: AtomicU64,
    /// 下游队列满或邮箱未读被覆盖而丢弃的命令数
    pub commands_dropped: AtomicU64,
    /// 被拒绝（重发上一周期命令）的周期数
    pub held_cycles: AtomicU64,
    /// 速度限幅触发次数（按关节计）
    pub velocity_clamps: AtomicU64,
    /// 加速度限幅触发次数（按关节计）
    pub acceleration_clamps: AtomicU64,
    /// 周期超时次数
    ///
    /// 如果这个值持续增长，说明单周期计算或下游发送跟不上控制频率。
    pub overruns: AtomicU64,
    /// 下游发送失败次数
    pub send_failures: AtomicU64,
}

impl LoopMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取所有计数器
    ///
    /// 各计数器分别以 `Relaxed` 读取，彼此之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            wrench_samples: self.wrench_samples.load(Ordering::Relaxed),
            joint_samples: self.joint_samples.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            commands_dropped: self.commands_dropped.load(Ordering::Relaxed),
            held_cycles: self.held_cycles.load(Ordering::Relaxed),
            velocity_clamps: self.velocity_clamps.load(Ordering::Relaxed),
            acceleration_clamps: self.acceleration_clamps.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.wrench_samples.store(0, Ordering::Relaxed);
        self.joint_samples.store(0, Ordering::Relaxed);
        self.cycles.store(0, Ordering::Relaxed);
        self.commands_sent.store(0, Ordering::Relaxed);
        self.commands_dropped.store(0, Ordering::Relaxed);
        self.held_cycles.store(0, Ordering::Relaxed);
        self.velocity_clamps.store(0, Ordering::Relaxed);
        self.acceleration_clamps.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
        self.send_failures.store(0, Ordering::Relaxed);
    }
}

/// 指标快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub wrench_samples: u64,
    pub joint_samples: u64,
    pub cycles: u64,
    pub commands_sent: u64,
    pub commands_dropped: u64,
    pub held_cycles: u64,
    pub velocity_clamps: u64,
    pub acceleration_clamps: u64,
    pub overruns: u64,
    pub send_failures: u64,
}

impl MetricsSnapshot {
    /// 被拒绝周期占比（百分比），`cycles` 为 0 时返回 0.0
    pub fn held_rate(&self) -> f64 {
        percent(self.held_cycles, self.cycles)
    }

    /// 超时周期占比（百分比）
    pub fn overrun_rate(&self) -> f64 {
        percent(self.overruns, self.cycles)
    }

    /// 丢弃命令占比（百分比）
    pub fn drop_rate(&self) -> f64 {
        percent(self.commands_dropped, self.commands_sent)
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_default() {
        let snapshot = LoopMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = LoopMetrics::new();
        metrics.cycles.fetch_add(100, Ordering::Relaxed);
        metrics.held_cycles.fetch_add(3, Ordering::Relaxed);
        assert_eq!(metrics.snapshot().cycles, 100);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_concurrent_updates() {
        let metrics = Arc::new(LoopMetrics::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let m = metrics.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    m.wrench_samples.fetch_add(1, Ordering::Relaxed);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.snapshot().wrench_samples, 1000);
    }

    #[test]
    fn test_snapshot_rates() {
        let snapshot = MetricsSnapshot {
            cycles: 200,
            held_cycles: 10,
            overruns: 2,
            commands_sent: 190,
            commands_dropped: 19,
            ..MetricsSnapshot::default()
        };
        assert_eq!(snapshot.held_rate(), 5.0);
        assert_eq!(snapshot.overrun_rate(), 1.0);
        assert_eq!(snapshot.drop_rate(), 10.0);
        assert_eq!(MetricsSnapshot::default().held_rate(), 0.0);
    }
}
