//! 控制循环集成测试
//!
//! 使用进程内的假传输层（直接写 InputContext）和假下游，验证启动屏障、
//! 周期拒绝、故障停机和发送容错。

use admittance_core::{
    ControllerConfig, FixedKinematics, JointState, JointVelocityCommand, KinematicsProvider,
    KinematicsSnapshot, RawJointState, SingularityPolicy, Wrench, WrenchSample,
};
use admittance_driver::{
    ChannelSink, CommandSink, ControlLoop, InputContext, LoopConfig, LoopError, LoopPhase,
    MailboxSink, StopReason,
};
use nalgebra::Matrix6;
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

fn fast_loop(max_iterations: Option<u64>) -> LoopConfig {
    LoopConfig {
        period: Duration::from_micros(200),
        startup_timeout: Some(Duration::from_secs(2)),
        startup_poll_interval: Duration::from_micros(100),
        max_iterations,
        ..LoopConfig::default()
    }
}

fn live_inputs(wrench: [f64; 6]) -> Arc<InputContext> {
    let inputs = Arc::new(InputContext::default());
    inputs.publish_wrench(WrenchSample::new(Wrench::new(wrench), 0));
    inputs.publish_joint_state(RawJointState::from_motion([0.0; 6], [0.0; 6], 0));
    inputs
}

fn running() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(true))
}

/// 记录所有命令的下游
#[derive(Default)]
struct RecordingSink {
    commands: Vec<JointVelocityCommand>,
}

impl CommandSink for RecordingSink {
    type Error = std::io::Error;

    fn send(&mut self, command: &JointVelocityCommand) -> Result<(), Self::Error> {
        self.commands.push(*command);
        Ok(())
    }
}

/// 前 `failures` 次发送失败，之后成功
struct FlakySink {
    failures: u32,
    attempts: u32,
}

impl CommandSink for FlakySink {
    type Error = std::io::Error;

    fn send(&mut self, _command: &JointVelocityCommand) -> Result<(), Self::Error> {
        self.attempts += 1;
        if self.attempts <= self.failures {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "actuator offline"))
        } else {
            Ok(())
        }
    }
}

/// 模型不可用
struct BrokenKinematics;

impl KinematicsProvider for BrokenKinematics {
    type Error = std::io::Error;

    fn snapshot(&mut self, _state: &JointState) -> Result<KinematicsSnapshot, Self::Error> {
        Err(std::io::Error::other("URDF model unavailable"))
    }
}

fn singular_kinematics() -> FixedKinematics {
    let mut j = Matrix6::identity();
    j[(1, 1)] = 0.0;
    FixedKinematics::new(KinematicsSnapshot::identity_rotation(j))
}

#[test]
fn test_runs_until_max_iterations() {
    let inputs = live_inputs([10.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    let mut control = ControlLoop::new(
        &ControllerConfig::default(),
        FixedKinematics::scaled_identity(1.0),
        RecordingSink::default(),
        inputs,
        running(),
    )
    .unwrap()
    .with_loop_config(fast_loop(Some(50)));

    let phase = control.phase();
    let summary = control.run().unwrap();

    assert_eq!(summary.reason, StopReason::MaxIterations);
    assert_eq!(summary.cycles, 50);
    assert_eq!(summary.held_cycles, 0);
    assert_eq!(phase.get(Ordering::Acquire), LoopPhase::Terminal);

    let commands = &control.sink().commands;
    assert_eq!(commands.len(), 50);
    for (i, command) in commands.iter().enumerate() {
        assert_eq!(command.sequence, i as u64);
    }
    // 持续沿 x 推，关节 1 速度单调增加
    assert!(commands[49].velocities[0] > commands[0].velocities[0]);
    assert!(commands[0].velocities[0] > 0.0);

    let metrics = control.metrics().snapshot();
    assert_eq!(metrics.cycles, 50);
    assert_eq!(metrics.commands_sent, 50);
    assert_eq!(metrics.wrench_samples, 1);
    assert_eq!(metrics.joint_samples, 1);
}

#[test]
fn test_startup_timeout_names_missing_streams() {
    let inputs = Arc::new(InputContext::default());
    inputs.publish_joint_state(RawJointState::from_motion([0.0; 6], [0.0; 6], 0));

    let mut control = ControlLoop::new(
        &ControllerConfig::default(),
        FixedKinematics::scaled_identity(1.0),
        RecordingSink::default(),
        inputs,
        running(),
    )
    .unwrap()
    .with_loop_config(LoopConfig {
        startup_timeout: Some(Duration::from_millis(50)),
        ..fast_loop(None)
    });

    let phase = control.phase();
    match control.run() {
        Err(LoopError::StartupTimeout { waited, missing }) => {
            assert!(waited >= Duration::from_millis(50));
            assert_eq!(missing, vec!["wrench"]);
        },
        other => panic!("expected StartupTimeout, got {:?}", other),
    }
    assert_eq!(phase.get(Ordering::Acquire), LoopPhase::Terminal);
    assert!(control.sink().commands.is_empty());
}

#[test]
fn test_shutdown_during_startup_is_clean() {
    let flag = Arc::new(AtomicBool::new(false));
    let mut control = ControlLoop::new(
        &ControllerConfig::default(),
        FixedKinematics::scaled_identity(1.0),
        RecordingSink::default(),
        Arc::new(InputContext::default()),
        flag,
    )
    .unwrap()
    .with_loop_config(fast_loop(None));

    let summary = control.run().unwrap();
    assert_eq!(summary.reason, StopReason::ShutdownDuringStartup);
    assert_eq!(summary.cycles, 0);
}

#[test]
fn test_late_inputs_unblock_startup() {
    let inputs = Arc::new(InputContext::default());
    let publisher = {
        let inputs = inputs.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            inputs.publish_wrench(WrenchSample::default());
            thread::sleep(Duration::from_millis(30));
            inputs.publish_joint_state(RawJointState::from_motion([0.0; 6], [0.0; 6], 1));
        })
    };

    let (tx, rx) = crossbeam_channel::bounded(64);
    let mut control = ControlLoop::new(
        &ControllerConfig::default(),
        FixedKinematics::scaled_identity(1.0),
        ChannelSink::new(tx),
        inputs,
        running(),
    )
    .unwrap()
    .with_loop_config(fast_loop(Some(10)));

    let summary = control.run().unwrap();
    publisher.join().unwrap();

    assert_eq!(summary.cycles, 10);
    // 零力旋量：命令恒为零
    let received: Vec<_> = rx.try_iter().collect();
    assert_eq!(received.len(), 10);
    assert!(received.iter().all(|c| c.velocities.max_abs() == 0.0));
}

#[test]
fn test_shutdown_signal_stops_running_loop() {
    let flag = running();
    let (sink, mailbox) = MailboxSink::new();
    let mut control = ControlLoop::new(
        &ControllerConfig::default(),
        FixedKinematics::scaled_identity(1.0),
        sink,
        live_inputs([0.0, 0.0, 20.0, 0.0, 0.0, 0.0]),
        flag.clone(),
    )
    .unwrap()
    .with_loop_config(fast_loop(None));

    let phase = control.phase();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        flag.store(false, Ordering::Release);
    });

    let summary = control.run().unwrap();
    stopper.join().unwrap();

    assert_eq!(summary.reason, StopReason::Shutdown);
    assert!(summary.cycles > 0);
    assert_eq!(phase.get(Ordering::Acquire), LoopPhase::Terminal);

    let last = mailbox.take().unwrap().expect("at least one command");
    assert_eq!(last.sequence, summary.cycles - 1);
    assert!(last.velocities[2] > 0.0);
}

#[test]
fn test_singular_jacobian_holds_previous_command() {
    let mut control = ControlLoop::new(
        &ControllerConfig::default(),
        singular_kinematics(),
        RecordingSink::default(),
        live_inputs([10.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        running(),
    )
    .unwrap()
    .with_loop_config(fast_loop(Some(20)));

    let summary = control.run().unwrap();
    assert_eq!(summary.held_cycles, 20);
    assert!(
        control
            .sink()
            .commands
            .iter()
            .all(|c| c.velocities.max_abs() == 0.0)
    );
    assert_eq!(control.metrics().snapshot().held_cycles, 20);
    assert_eq!(control.controller().state().q_dot_prev.max_abs(), 0.0);
}

#[test]
fn test_fault_policy_stops_loop() {
    let mut config = ControllerConfig::default();
    config.singularity.policy = SingularityPolicy::Fault;

    let mut control = ControlLoop::new(
        &config,
        singular_kinematics(),
        RecordingSink::default(),
        live_inputs([10.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        running(),
    )
    .unwrap()
    .with_loop_config(fast_loop(Some(20)));

    let phase = control.phase();
    let err = control.run().unwrap_err();
    assert!(matches!(err, LoopError::Control(_)), "got {:?}", err);
    assert!(control.sink().commands.is_empty());
    assert_eq!(phase.get(Ordering::Acquire), LoopPhase::Terminal);
}

#[test]
fn test_damped_policy_keeps_commanding() {
    let mut config = ControllerConfig::default();
    config.singularity.policy = SingularityPolicy::Damped;

    let mut control = ControlLoop::new(
        &config,
        singular_kinematics(),
        RecordingSink::default(),
        live_inputs([10.0, 10.0, 0.0, 0.0, 0.0, 0.0]),
        running(),
    )
    .unwrap()
    .with_loop_config(fast_loop(Some(20)));

    let summary = control.run().unwrap();
    assert_eq!(summary.held_cycles, 0);
    let last = control.sink().commands.last().unwrap();
    assert!(last.velocities.is_finite());
    assert!(last.velocities[0] > 0.0);
    // 奇异方向被阻尼压住
    assert!(last.velocities[1].abs() < 1e-6);
}

#[test]
fn test_kinematics_failure_is_fatal() {
    let mut control = ControlLoop::new(
        &ControllerConfig::default(),
        BrokenKinematics,
        RecordingSink::default(),
        live_inputs([0.0; 6]),
        running(),
    )
    .unwrap()
    .with_loop_config(fast_loop(Some(5)));

    let err = control.run().unwrap_err();
    assert!(matches!(err, LoopError::Kinematics(_)));
    assert!(format!("{}", err).contains("URDF model unavailable"));
}

#[test]
fn test_malformed_joint_state_is_held() {
    let inputs = Arc::new(InputContext::default());
    inputs.publish_wrench(WrenchSample::new(Wrench::new([10.0, 0.0, 0.0, 0.0, 0.0, 0.0]), 0));
    let mut raw = RawJointState::from_motion([0.0; 6], [0.0; 6], 0);
    raw.velocity.truncate(5);
    inputs.publish_joint_state(raw);

    let mut control = ControlLoop::new(
        &ControllerConfig::default(),
        FixedKinematics::scaled_identity(1.0),
        RecordingSink::default(),
        inputs,
        running(),
    )
    .unwrap()
    .with_loop_config(fast_loop(Some(10)));

    let summary = control.run().unwrap();
    assert_eq!(summary.held_cycles, 10);
}

#[test]
fn test_transient_send_failures_are_tolerated() {
    let mut control = ControlLoop::new(
        &ControllerConfig::default(),
        FixedKinematics::scaled_identity(1.0),
        FlakySink {
            failures: 5,
            attempts: 0,
        },
        live_inputs([0.0; 6]),
        running(),
    )
    .unwrap()
    .with_loop_config(fast_loop(Some(20)));

    let summary = control.run().unwrap();
    assert_eq!(summary.cycles, 20);
    let metrics = control.metrics().snapshot();
    assert_eq!(metrics.send_failures, 5);
    assert_eq!(metrics.commands_sent, 15);
}

#[test]
fn test_consecutive_send_failures_stop_loop() {
    let mut control = ControlLoop::new(
        &ControllerConfig::default(),
        FixedKinematics::scaled_identity(1.0),
        FlakySink {
            failures: u32::MAX,
            attempts: 0,
        },
        live_inputs([0.0; 6]),
        running(),
    )
    .unwrap()
    .with_loop_config(fast_loop(Some(100)));

    match control.run() {
        Err(LoopError::ConsecutiveSendFailures { count, last_error }) => {
            assert_eq!(count, 6);
            assert!(last_error.to_string().contains("actuator offline"));
        },
        other => panic!("expected ConsecutiveSendFailures, got {:?}", other),
    }
    assert_eq!(control.sink().attempts, 6);
}

#[test]
fn test_invalid_config_rejected_at_construction() {
    let mut config = ControllerConfig::default();
    config.model.mass[0] = 0.0;
    let result = ControlLoop::new(
        &config,
        FixedKinematics::scaled_identity(1.0),
        RecordingSink::default(),
        Arc::new(InputContext::default()),
        running(),
    );
    assert!(matches!(result, Err(LoopError::Config(_))));
}

#[test]
fn test_unrepresentable_durations_rejected_at_construction() {
    let mut slow = ControllerConfig::default();
    slow.rate_hz = 1.0e-20;
    let mut patient = ControllerConfig::default();
    patient.startup_timeout_s = 1.0e30;

    for config in [slow, patient] {
        let result = ControlLoop::new(
            &config,
            FixedKinematics::scaled_identity(1.0),
            RecordingSink::default(),
            Arc::new(InputContext::default()),
            running(),
        );
        assert!(matches!(result, Err(LoopError::Config(_))));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// 闭环运行时每条命令都满足速度和加速度限幅
    #[test]
    fn loop_commands_respect_limits(
        wrench in prop::array::uniform6(-80.0..80.0f64),
        max_velocity in 0.1..1.0f64,
        max_acceleration in 0.5..5.0f64,
    ) {
        let mut config = ControllerConfig::default();
        config.limits.max_velocity = [max_velocity; 6];
        config.limits.max_acceleration = [max_acceleration; 6];
        let dt = config.dt();

        let mut control = ControlLoop::new(
            &config,
            FixedKinematics::scaled_identity(0.8),
            RecordingSink::default(),
            live_inputs(wrench),
            running(),
        )
        .unwrap()
        .with_loop_config(fast_loop(Some(40)));
        control.run().unwrap();

        let mut previous = [0.0; 6];
        for command in &control.sink().commands {
            for i in 0..6 {
                let v = command.velocities[i];
                prop_assert!(v.abs() <= max_velocity + 1e-12);
                prop_assert!((v - previous[i]).abs() <= max_acceleration * dt + 1e-12);
                previous[i] = v;
            }
        }
    }
}
