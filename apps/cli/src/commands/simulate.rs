//! 闭环仿真命令
//!
//! 三个线程：
//! - 传感器线程：按固定频率发布带噪声的力旋量，在推力窗口内对指定轴施加恒定推力
//! - 机器人线程：积分收到的关节速度命令得到关节位置，发布关节状态
//! - 控制线程（主线程）：运行导纳控制循环，运动学为常量雅可比
//!
//! 配置中打开 `swap_base_elbow` 时，机器人线程按实机的接线顺序发布（关节 0 和 2 互换）。

use super::config::{load_config, resolve_path};
use admittance_core::{
    CartesianAxis, ControllerConfig, FixedKinematics, JOINT_COUNT, Joint, JointArray,
    JointVelocityCommand, RawJointState, Wrench, WrenchSample, joint_state,
};
use admittance_driver::{ChannelSink, ControlLoop, InputContext, LoopConfig, LoopMetrics};
use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// 推力施加的轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AxisArg {
    Fx,
    Fy,
    Fz,
    Tx,
    Ty,
    Tz,
}

impl From<AxisArg> for CartesianAxis {
    fn from(axis: AxisArg) -> Self {
        match axis {
            AxisArg::Fx => CartesianAxis::Fx,
            AxisArg::Fy => CartesianAxis::Fy,
            AxisArg::Fz => CartesianAxis::Fz,
            AxisArg::Tx => CartesianAxis::Tx,
            AxisArg::Ty => CartesianAxis::Ty,
            AxisArg::Tz => CartesianAxis::Tz,
        }
    }
}

/// 仿真参数
#[derive(Args, Debug, Clone)]
pub struct SimulateCommand {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 仿真时长（秒）
    #[arg(short, long, default_value_t = 5.0)]
    pub duration: f64,

    /// 推力轴
    #[arg(long, value_enum, default_value_t = AxisArg::Fx)]
    pub axis: AxisArg,

    /// 推力大小（N 或 N·m）
    #[arg(long, default_value_t = 15.0)]
    pub force: f64,

    /// 推力开始时刻（秒）
    #[arg(long, default_value_t = 1.0)]
    pub push_start: f64,

    /// 推力结束时刻（秒）
    #[arg(long, default_value_t = 3.0)]
    pub push_end: f64,

    /// 传感器噪声幅值（均匀分布，各分量独立）
    #[arg(long, default_value_t = 0.5)]
    pub noise: f64,

    /// 雅可比缩放（J = scale · I）
    #[arg(long, default_value_t = 1.0)]
    pub jacobian_scale: f64,

    /// 随机种子
    #[arg(long)]
    pub seed: Option<u64>,

    /// 传感器发布频率（Hz）
    #[arg(long, default_value_t = 1000.0)]
    pub sensor_rate: f64,
}

/// 推力曲线
#[derive(Debug, Clone, Copy)]
struct PushProfile {
    axis: CartesianAxis,
    magnitude: f64,
    start: f64,
    end: f64,
    noise: f64,
}

impl PushProfile {
    /// t 时刻的力旋量
    fn sample<R: Rng>(&self, t: f64, rng: &mut R) -> Wrench {
        let mut components = [0.0; 6];
        if self.noise > 0.0 {
            for c in components.iter_mut() {
                *c = rng.gen_range(-self.noise..=self.noise);
            }
        }
        if t >= self.start && t < self.end {
            components[self.axis.index()] += self.magnitude;
        }
        Wrench::new(components)
    }
}

/// 机器人线程的运行结果
#[derive(Debug, Clone, Copy)]
struct RobotReport {
    position: JointArray<f64>,
    peak_velocity: f64,
    commands: u64,
}

impl SimulateCommand {
    pub fn execute(self) -> Result<()> {
        self.validate()?;

        let path = resolve_path(self.config.clone())?;
        let config = load_config(&path)?;

        let running = Arc::new(AtomicBool::new(true));
        {
            let running = running.clone();
            ctrlc::set_handler(move || {
                eprintln!("\nReceived interrupt signal. Stopping simulation...");
                running.store(false, Ordering::Release);
            })
            .context("设置 Ctrl+C 处理失败")?;
        }

        let metrics = Arc::new(LoopMetrics::new());
        let inputs = Arc::new(InputContext::new(metrics.clone()));
        let (tx, rx) = crossbeam_channel::bounded::<JointVelocityCommand>(16);

        let profile = PushProfile {
            axis: self.axis.into(),
            magnitude: self.force,
            start: self.push_start,
            end: self.push_end,
            noise: self.noise,
        };
        let seed = self.seed.unwrap_or_else(rand::random);
        info!(
            "Simulating {:.1}s: {:.1} on {} between {:.1}s and {:.1}s (noise ±{:.2}, seed {})",
            self.duration, self.force, profile.axis, self.push_start, self.push_end, self.noise, seed
        );

        let sensor = spawn_sensor(
            inputs.clone(),
            running.clone(),
            profile,
            Duration::from_secs_f64(1.0 / self.sensor_rate),
            seed,
        )?;
        let robot = spawn_robot(inputs.clone(), running.clone(), rx, &config)?;

        let control = ControlLoop::new(
            &config,
            FixedKinematics::scaled_identity(self.jacobian_scale),
            ChannelSink::new(tx).with_metrics(metrics.clone()),
            inputs,
            running.clone(),
        )?;
        let loop_config = LoopConfig {
            max_iterations: Some((self.duration * config.rate_hz).ceil() as u64),
            ..control.loop_config().clone()
        };
        let mut control = control.with_loop_config(loop_config);

        let result = control.run();

        // 停止传感器和机器人线程；丢弃 control 以关闭命令通道
        running.store(false, Ordering::Release);
        drop(control);
        sensor
            .join()
            .map_err(|_| anyhow::anyhow!("传感器线程 panic"))?;
        let report = robot
            .join()
            .map_err(|_| anyhow::anyhow!("机器人线程 panic"))?;

        let summary = result.context("控制循环异常退出")?;
        let snapshot = metrics.snapshot();

        println!("仿真结束 ({:?})", summary.reason);
        println!(
            "  周期: {} (拒绝 {}, {:.2}%), 超时: {}",
            snapshot.cycles,
            snapshot.held_cycles,
            snapshot.held_rate(),
            snapshot.overruns
        );
        println!(
            "  命令: 发送 {}, 丢弃 {}, 机器人执行 {}",
            snapshot.commands_sent, snapshot.commands_dropped, report.commands
        );
        println!(
            "  限幅: 速度 {} 次, 加速度 {} 次",
            snapshot.velocity_clamps, snapshot.acceleration_clamps
        );
        println!(
            "  采样: 力旋量 {}, 关节状态 {}",
            snapshot.wrench_samples, snapshot.joint_samples
        );
        println!("  峰值关节速度: {:.4} rad/s", report.peak_velocity);
        println!("  最终关节位置: {}", report.position);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(self.duration.is_finite() && self.duration > 0.0) {
            bail!("--duration 必须大于 0（当前 {}）", self.duration);
        }
        if !(self.push_start >= 0.0 && self.push_start <= self.push_end) {
            bail!(
                "推力窗口无效: --push-start {} --push-end {}",
                self.push_start,
                self.push_end
            );
        }
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            bail!("--noise 必须 >= 0（当前 {}）", self.noise);
        }
        if !(self.jacobian_scale.is_finite() && self.jacobian_scale > 0.0) {
            bail!("--jacobian-scale 必须大于 0（当前 {}）", self.jacobian_scale);
        }
        if !(self.sensor_rate.is_finite() && self.sensor_rate > 0.0) {
            bail!("--sensor-rate 必须大于 0（当前 {}）", self.sensor_rate);
        }
        if Duration::try_from_secs_f64(1.0 / self.sensor_rate).is_err() {
            bail!("--sensor-rate 过小（当前 {}）", self.sensor_rate);
        }
        if !self.force.is_finite() {
            bail!("--force 必须是有限值");
        }
        Ok(())
    }
}

fn spawn_sensor(
    inputs: Arc<InputContext>,
    running: Arc<AtomicBool>,
    profile: PushProfile,
    period: Duration,
    seed: u64,
) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("sim-sensor".to_string())
        .spawn(move || {
            let mut rng = StdRng::seed_from_u64(seed);
            let start = Instant::now();
            while running.load(Ordering::Acquire) {
                let t = start.elapsed();
                let wrench = profile.sample(t.as_secs_f64(), &mut rng);
                inputs.publish_wrench(WrenchSample::new(wrench, t.as_micros() as u64));
                thread::sleep(period);
            }
            debug!("Sensor thread exiting");
        })
        .context("启动传感器线程失败")
}

fn spawn_robot(
    inputs: Arc<InputContext>,
    running: Arc<AtomicBool>,
    commands: Receiver<JointVelocityCommand>,
    config: &ControllerConfig,
) -> Result<thread::JoinHandle<RobotReport>> {
    let period = config.period();
    let dt = config.dt();
    let swap = config.swap_base_elbow;

    thread::Builder::new()
        .name("sim-robot".to_string())
        .spawn(move || {
            let start = Instant::now();
            let mut report = RobotReport {
                position: JointArray::ZERO,
                peak_velocity: 0.0,
                commands: 0,
            };
            let mut velocity = JointArray::ZERO;

            loop {
                let t = start.elapsed();
                inputs.publish_joint_state(hardware_joint_state(
                    report.position,
                    velocity,
                    t.as_micros() as u64,
                    swap,
                ));

                if !running.load(Ordering::Acquire) {
                    break;
                }

                match commands.recv_timeout(period) {
                    Ok(command) => {
                        velocity = command.velocities;
                        report.commands += 1;
                        report.peak_velocity = report.peak_velocity.max(velocity.max_abs());
                    },
                    Err(RecvTimeoutError::Timeout) => {},
                    Err(RecvTimeoutError::Disconnected) => break,
                }

                report.position = report.position.map_with(velocity, |q, v| q + v * dt);
            }

            debug!("Robot thread exiting");
            report
        })
        .context("启动机器人线程失败")
}

/// 按实机接线顺序构造关节状态
fn hardware_joint_state(
    position: JointArray<f64>,
    velocity: JointArray<f64>,
    timestamp_us: u64,
    swap_base_elbow: bool,
) -> RawJointState {
    let mut raw = RawJointState::from_motion(position.into_array(), velocity.into_array(), timestamp_us);
    raw.name = Joint::ALL.iter().map(|j| j.name().to_string()).collect();
    raw.effort = vec![0.0; JOINT_COUNT];
    if swap_base_elbow {
        // 交换是对合的：规范顺序 -> 实机顺序与反向相同
        joint_state::canonicalize_in_place(&mut raw);
    }
    raw
}
