//! 关节动态限幅
//!
//! 两级逐关节饱和，顺序固定：
//!
//! 1. 速度限幅：|q̇[i]| > v_max[i] 时取 sign(q̇[i]) · v_max[i]
//! 2. 加速度限幅：Δ = q̇[i] − q̇_prev[i]，|Δ| > a_max[i]·Δt 时取 q̇_prev[i] + sign(Δ) · a_max[i] · Δt
//!
//! 加速度限幅基于已经过速度限幅的值计算。sign(0) 取 +1。

use crate::config::DynamicLimits;
use crate::types::{JOINT_COUNT, JointArray};

/// sign(x)，x = 0 时为 +1
#[inline]
pub fn sign(x: f64) -> f64 {
    if x >= 0.0 { 1.0 } else { -1.0 }
}

/// 单周期限幅统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LimitReport {
    /// 触发速度限幅的关节数
    pub velocity_clamped: usize,
    /// 触发加速度限幅的关节数
    pub acceleration_clamped: usize,
}

impl LimitReport {
    pub fn any(&self) -> bool {
        self.velocity_clamped > 0 || self.acceleration_clamped > 0
    }
}

/// 关节动态限幅器
#[derive(Debug, Clone)]
pub struct DynamicLimiter {
    max_velocity: JointArray<f64>,
    /// a_max · Δt（每周期允许的最大速度变化）
    max_step: JointArray<f64>,
}

impl DynamicLimiter {
    pub fn new(limits: &DynamicLimits, dt: f64) -> Self {
        Self {
            max_velocity: limits.velocity(),
            max_step: limits.acceleration().map(|a| a * dt),
        }
    }

    pub fn max_velocity(&self) -> &JointArray<f64> {
        &self.max_velocity
    }

    pub fn max_step(&self) -> &JointArray<f64> {
        &self.max_step
    }

    /// 对 `command` 原地限幅，`previous` 为上一周期的最终命令
    pub fn apply(
        &self,
        command: &mut JointArray<f64>,
        previous: &JointArray<f64>,
    ) -> LimitReport {
        let mut report = LimitReport::default();

        for i in 0..JOINT_COUNT {
            let v_max = self.max_velocity[i];
            if command[i].abs() > v_max {
                command[i] = sign(command[i]) * v_max;
                report.velocity_clamped += 1;
            }
        }

        for i in 0..JOINT_COUNT {
            let step = self.max_step[i];
            let delta = command[i] - previous[i];
            if delta.abs() > step {
                command[i] = previous[i] + sign(delta) * step;
                report.acceleration_clamped += 1;
            }
        }

        report
    }
}
