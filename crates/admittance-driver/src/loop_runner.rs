//! Loop Runner - 固定频率导纳控制循环
//!
//! # 核心功能
//!
//! - **启动屏障**: 两路输入都到达之前不运行控制，支持超时
//! - **精确定时**: 绝对时间锚点 + `spin_sleep`，消除累积漂移
//! - **周期拒绝**: 病态雅可比 / 非法输入时重发上一周期命令
//! - **发送容错**: 允许下游连续失败若干次，超过后停止
//!
//! # 使用场景
//!
//! ```rust,no_run
//! use admittance_core::{ControllerConfig, FixedKinematics};
//! use admittance_driver::{ControlLoop, InputContext, MailboxSink};
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//!
//! # fn example() -> Result<(), admittance_driver::LoopError> {
//! let config = ControllerConfig::default();
//! let inputs = Arc::new(InputContext::default());
//! let running = Arc::new(AtomicBool::new(true));
//! let (sink, _mailbox) = MailboxSink::new();
//!
//! // 传输层线程调用 inputs.publish_wrench() / inputs.publish_joint_state()
//!
//! let mut control = ControlLoop::new(
//!     &config,
//!     FixedKinematics::scaled_identity(1.0),
//!     sink,
//!     inputs,
//!     running,
//! )?;
//! let summary = control.run()?;
//! println!("{} cycles", summary.cycles);
//! # Ok(())
//! # }
//! ```

use crate::error::LoopError;
use crate::metrics::LoopMetrics;
use crate::phase::{AtomicLoopPhase, LoopPhase};
use crate::sink::CommandSink;
use crate::state::InputContext;
use admittance_core::{
    AdmittanceController, ControlError, ControllerConfig, Cycle, CycleStatus, KinematicsProvider,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// 允许下游连续发送失败的次数
pub const DEFAULT_MAX_SEND_FAILURES: u32 = 5;

/// 启动等待期间的告警间隔
pub const DEFAULT_STARTUP_WARN_INTERVAL: Duration = Duration::from_secs(3);

/// 控制循环配置
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// 控制周期
    pub period: Duration,

    /// 等待输入流的超时（None 表示一直等待）
    pub startup_timeout: Option<Duration>,

    /// 启动等待期间的告警间隔
    pub startup_warn_interval: Duration,

    /// 启动等待期间检查输入流的间隔
    pub startup_poll_interval: Duration,

    /// 最大周期数（None 表示运行到停止信号）
    ///
    /// 用于测试或定时运行。
    pub max_iterations: Option<u64>,

    /// 允许下游连续发送失败的次数，再失败一次即停止
    pub max_send_failures: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            period: Duration::from_millis(2), // 500Hz
            startup_timeout: Some(Duration::from_secs(10)),
            startup_warn_interval: DEFAULT_STARTUP_WARN_INTERVAL,
            startup_poll_interval: Duration::from_millis(1),
            max_iterations: None,
            max_send_failures: DEFAULT_MAX_SEND_FAILURES,
        }
    }
}

impl LoopConfig {
    /// 由控制器配置得到周期和启动超时，其余取默认值
    pub fn from_controller_config(config: &ControllerConfig) -> Self {
        LoopConfig {
            period: config.period(),
            startup_timeout: config.startup_timeout(),
            ..LoopConfig::default()
        }
    }

    pub fn validate(&self) -> Result<(), LoopError> {
        if self.period.is_zero() {
            return Err(LoopError::Config("period must be > 0".to_string()));
        }
        if self.startup_warn_interval.is_zero() {
            return Err(LoopError::Config(
                "startup_warn_interval must be > 0".to_string(),
            ));
        }
        if self.startup_poll_interval.is_zero() {
            return Err(LoopError::Config(
                "startup_poll_interval must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// 正常结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 启动阶段收到停止信号（一个周期都没有运行）
    ShutdownDuringStartup,
    /// 运行阶段收到停止信号
    Shutdown,
    /// 达到 `max_iterations`
    MaxIterations,
}

/// 控制循环运行摘要
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub reason: StopReason,
    /// 本次运行执行的周期数
    pub cycles: u64,
    /// 其中被拒绝的周期数
    pub held_cycles: u64,
}

/// 导纳控制循环
///
/// 单个控制线程独占 [`AdmittanceController`]、运动学模型和命令下游；
/// 与其他线程共享的只有输入上下文、运行标志、阶段和指标。
pub struct ControlLoop<K, S> {
    controller: AdmittanceController,
    kinematics: K,
    sink: S,
    inputs: Arc<InputContext>,
    running: Arc<AtomicBool>,
    phase: Arc<AtomicLoopPhase>,
    metrics: Arc<LoopMetrics>,
    config: LoopConfig,
    /// 上一周期是否被拒绝（用于只在状态切换时告警）
    holding: bool,
}

impl<K, S> ControlLoop<K, S>
where
    K: KinematicsProvider,
    S: CommandSink,
{
    /// 创建控制循环
    ///
    /// 校验配置并在日志中打印一次完整配置。
    pub fn new(
        config: &ControllerConfig,
        kinematics: K,
        sink: S,
        inputs: Arc<InputContext>,
        running: Arc<AtomicBool>,
    ) -> Result<Self, LoopError> {
        config
            .validate()
            .map_err(|e| LoopError::Config(e.to_string()))?;
        config.log_summary();

        let metrics = inputs.metrics().clone();
        Ok(Self {
            controller: AdmittanceController::new(config),
            kinematics,
            sink,
            inputs,
            running,
            phase: Arc::new(AtomicLoopPhase::new(LoopPhase::Initializing)),
            metrics,
            config: LoopConfig::from_controller_config(config),
            holding: false,
        })
    }

    /// 替换循环配置（周期、超时、迭代次数等）
    pub fn with_loop_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn loop_config(&self) -> &LoopConfig {
        &self.config
    }

    /// 阶段句柄（可交给其他线程观察）
    pub fn phase(&self) -> Arc<AtomicLoopPhase> {
        self.phase.clone()
    }

    pub fn metrics(&self) -> Arc<LoopMetrics> {
        self.metrics.clone()
    }

    pub fn controller(&self) -> &AdmittanceController {
        &self.controller
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// 运行控制循环（阻塞）
    ///
    /// 持续运行直到：
    /// - 运行标志被置为 false
    /// - 达到 `max_iterations`（如果设置）
    /// - 发生致命错误
    ///
    /// 无论以何种方式返回，阶段都会被置为 Terminal。
    pub fn run(&mut self) -> Result<LoopSummary, LoopError> {
        self.config.validate()?;

        #[cfg(feature = "realtime")]
        raise_thread_priority();

        self.phase.set(LoopPhase::Initializing, Ordering::Release);
        let result = self.run_phases();
        self.phase.set(LoopPhase::Terminal, Ordering::Release);

        match &result {
            Ok(summary) => info!(
                "Admittance control loop stopped ({:?}) after {} cycles ({} held)",
                summary.reason, summary.cycles, summary.held_cycles
            ),
            Err(e) => error!("Admittance control loop aborted: {}", e),
        }
        result
    }

    fn run_phases(&mut self) -> Result<LoopSummary, LoopError> {
        if !self.wait_for_inputs()? {
            return Ok(LoopSummary {
                reason: StopReason::ShutdownDuringStartup,
                cycles: 0,
                held_cycles: 0,
            });
        }

        self.phase.set(LoopPhase::Running, Ordering::Release);
        info!(
            "Input streams live, running at {:.1} Hz",
            1.0 / self.config.period.as_secs_f64()
        );

        let period = self.config.period;
        let mut cycles = 0u64;
        let mut held_cycles = 0u64;
        let mut send_failures = 0u32;

        // 使用绝对时间锚点机制消除累积漂移
        let mut next_tick = Instant::now();

        let reason = loop {
            // Acquire: 看到 false 时必须同时看到停止方之前的所有写入
            if !self.running.load(Ordering::Acquire) {
                break StopReason::Shutdown;
            }
            if let Some(max_iter) = self.config.max_iterations
                && cycles >= max_iter
            {
                break StopReason::MaxIterations;
            }

            // 1. 设定下一个锚点（绝对时间）
            next_tick += period;

            // 2. 计算本周期命令（周期一旦开始就完整执行）
            let cycle = self.tick()?;
            cycles += 1;
            if cycle.status.is_held() {
                held_cycles += 1;
            }

            // 3. 交给下游
            match self.sink.send(&cycle.command) {
                Ok(()) => {
                    send_failures = 0;
                    self.metrics.commands_sent.fetch_add(1, Ordering::Relaxed);
                },
                Err(e) => {
                    send_failures += 1;
                    self.metrics.send_failures.fetch_add(1, Ordering::Relaxed);
                    if send_failures > self.config.max_send_failures {
                        error!(
                            "Consecutive command sink failures ({}): {}. Stopping control loop.",
                            send_failures, e
                        );
                        return Err(LoopError::ConsecutiveSendFailures {
                            count: send_failures,
                            last_error: Box::new(e),
                        });
                    }
                    warn!(
                        "Transient command sink error ({}): {}, command {} skipped. \
                         This is acceptable as long as errors don't occur consecutively.",
                        send_failures, e, cycle.command.sequence
                    );
                },
            }

            // 4. 睡眠到下一个锚点（自动扣除本周期的耗时）
            let now = Instant::now();
            if next_tick > now {
                spin_sleep::sleep(next_tick - now);
            } else {
                self.metrics.overruns.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Control loop overrun: cycle {} took {:?} (period {:?}). Skipping sleep to catch up.",
                    cycle.command.sequence,
                    now.duration_since(next_tick - period),
                    period
                );
                // 重置锚点到当前时间，避免后续累积延迟
                next_tick = now;
            }
        };

        Ok(LoopSummary {
            reason,
            cycles,
            held_cycles,
        })
    }

    /// 等待两路输入都到达
    ///
    /// 返回 `Ok(false)` 表示等待期间收到停止信号。
    fn wait_for_inputs(&self) -> Result<bool, LoopError> {
        let start = Instant::now();
        let mut last_warn: Option<Instant> = None;

        loop {
            if !self.running.load(Ordering::Acquire) {
                info!("Shutdown requested before input streams were live");
                return Ok(false);
            }

            let missing = self.inputs.missing_streams();
            if missing.is_empty() {
                debug!("Input streams live after {:?}", start.elapsed());
                return Ok(true);
            }

            let waited = start.elapsed();
            if let Some(timeout) = self.config.startup_timeout
                && waited >= timeout
            {
                return Err(LoopError::StartupTimeout { waited, missing });
            }

            let warn_due = last_warn
                .is_none_or(|at| at.elapsed() >= self.config.startup_warn_interval);
            if warn_due {
                warn!(
                    "Waiting for input stream(s): {} ({:.1}s elapsed)",
                    missing.join(", "),
                    waited.as_secs_f64()
                );
                last_warn = Some(Instant::now());
            }

            std::thread::sleep(self.config.startup_poll_interval);
        }
    }

    /// 执行一个控制周期
    fn tick(&mut self) -> Result<Cycle, LoopError> {
        let cycle = match self.compute()? {
            Ok(cycle) => cycle,
            Err(reason) => self.controller.hold(reason),
        };
        self.record(&cycle);
        Ok(cycle)
    }

    /// 外层错误致命，内层错误拒绝本周期
    fn compute(&mut self) -> Result<Result<Cycle, ControlError>, LoopError> {
        let inputs = match self.inputs.snapshot() {
            Ok(inputs) => inputs,
            Err(stream) => return Ok(Err(ControlError::MissingInput(stream))),
        };

        let joint = match self.controller.canonicalize(&inputs.joint_state) {
            Ok(joint) => joint,
            Err(e) => return Ok(Err(e)),
        };

        let snapshot = self
            .kinematics
            .snapshot(&joint)
            .map_err(|e| LoopError::Kinematics(Box::new(e)))?;

        let cycle = self.controller.step(&inputs.wrench.wrench, &joint, &snapshot)?;
        Ok(Ok(cycle))
    }

    fn record(&mut self, cycle: &Cycle) {
        let m = &self.metrics;
        m.cycles.fetch_add(1, Ordering::Relaxed);
        m.velocity_clamps
            .fetch_add(cycle.limits.velocity_clamped as u64, Ordering::Relaxed);
        m.acceleration_clamps
            .fetch_add(cycle.limits.acceleration_clamped as u64, Ordering::Relaxed);

        match &cycle.status {
            CycleStatus::Held(reason) => {
                m.held_cycles.fetch_add(1, Ordering::Relaxed);
                if !self.holding {
                    warn!(
                        "Cycle {} rejected: {}. Holding previous command.",
                        cycle.command.sequence, reason
                    );
                } else {
                    trace!("Cycle {} still held: {}", cycle.command.sequence, reason);
                }
                self.holding = true;
            },
            CycleStatus::Nominal => {
                if self.holding {
                    info!("Cycle {} recovered, resuming control", cycle.command.sequence);
                }
                self.holding = false;
            },
        }
    }
}

#[cfg(feature = "realtime")]
fn raise_thread_priority() {
    use thread_priority::*;

    match set_current_thread_priority(ThreadPriority::Max) {
        Ok(_) => {
            info!("Control thread priority set to MAX (realtime)");
        },
        Err(e) => {
            warn!(
                "Failed to set control thread priority: {}. \
                On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                e
            );
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_config_default() {
        let config = LoopConfig::default();
        assert_eq!(config.period, Duration::from_millis(2));
        assert_eq!(config.startup_warn_interval, Duration::from_secs(3));
        assert_eq!(config.max_send_failures, 5);
        assert_eq!(config.max_iterations, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_loop_config_from_controller_config() {
        let mut controller = ControllerConfig::default();
        controller.rate_hz = 100.0;
        controller.startup_timeout_s = 0.0;

        let config = LoopConfig::from_controller_config(&controller);
        assert!((config.period.as_secs_f64() - 0.01).abs() < 1e-9);
        assert_eq!(config.startup_timeout, None);
    }

    #[test]
    fn test_loop_config_rejects_zero_period() {
        let config = LoopConfig {
            period: Duration::ZERO,
            ..LoopConfig::default()
        };
        assert!(matches!(config.validate(), Err(LoopError::Config(_))));
    }
}
