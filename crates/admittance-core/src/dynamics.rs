//! 导纳动力学
//!
//! # 算法
//!
//! ```text
//! a         = M⁻¹ · ( −D · ẋ + k · (R · w) )
//! ẋ_new     = ẋ + a · Δt
//! ```
//!
//! 其中：
//! - `M` / `D`：对角质量 / 阻尼矩阵
//! - `k`：力旋量权重
//! - `R`：末端块对角旋转，`w`：死区滤波后的力旋量
//! - `ẋ`：积分起点，取决于 [`VelocitySource`]
//!
//! 采用显式（前向欧拉）积分。稳定性要求 Δt 相对 M⁻¹D 的特征值足够小，
//! 这是调用方选择控制频率时的约束，这里不做检查。

use crate::config::AdmittanceModel;
use crate::kinematics::KinematicsSnapshot;
use crate::types::{JointArray, Wrench};
use nalgebra::{Matrix6, Vector6};

/// 积分起点来源（启动时选定，运行期间不变）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocitySource {
    /// ẋ = J · q̇_measured
    Feedback,
    /// ẋ = 上一周期实际下发的笛卡尔速度
    LastCommand,
}

impl VelocitySource {
    pub fn from_feedback_flag(use_feedback_velocity: bool) -> Self {
        if use_feedback_velocity {
            VelocitySource::Feedback
        } else {
            VelocitySource::LastCommand
        }
    }
}

/// 导纳动力学求解器
#[derive(Debug, Clone)]
pub struct AdmittanceDynamics {
    mass_inv: Matrix6<f64>,
    damping: Matrix6<f64>,
    weight: f64,
    dt: f64,
    source: VelocitySource,
}

impl AdmittanceDynamics {
    /// 创建求解器
    ///
    /// 质量矩阵为对角阵且各元素为正（由配置校验保证），逆矩阵即对角元素取倒数，
    /// 只在构造时计算一次。
    pub fn new(model: &AdmittanceModel, dt: f64, source: VelocitySource) -> Self {
        let mass_inv = Matrix6::from_diagonal(&Vector6::from_fn(|i, _| 1.0 / model.mass[i]));
        Self {
            mass_inv,
            damping: model.damping_matrix(),
            weight: model.admittance_weight,
            dt,
            source,
        }
    }

    pub fn source(&self) -> VelocitySource {
        self.source
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// 本周期的积分起点 ẋ
    pub fn start_velocity(
        &self,
        jacobian: &Matrix6<f64>,
        measured_joint_velocity: &JointArray<f64>,
        last_cartesian_velocity: &Vector6<f64>,
    ) -> Vector6<f64> {
        match self.source {
            VelocitySource::Feedback => jacobian * measured_joint_velocity.to_vector(),
            VelocitySource::LastCommand => *last_cartesian_velocity,
        }
    }

    /// 笛卡尔加速度 a = M⁻¹(−D·ẋ + k·R·w)
    pub fn acceleration(
        &self,
        velocity: &Vector6<f64>,
        rotation: &Matrix6<f64>,
        wrench: &Wrench,
    ) -> Vector6<f64> {
        let external = rotation * wrench.to_vector() * self.weight;
        self.mass_inv * (external - self.damping * velocity)
    }

    /// 前向欧拉积分一步，返回期望笛卡尔速度 ẋ_new
    pub fn integrate(
        &self,
        velocity: &Vector6<f64>,
        rotation: &Matrix6<f64>,
        wrench: &Wrench,
    ) -> Vector6<f64> {
        velocity + self.acceleration(velocity, rotation, wrench) * self.dt
    }

    /// 选择积分起点并积分一步
    pub fn step(
        &self,
        kinematics: &KinematicsSnapshot,
        measured_joint_velocity: &JointArray<f64>,
        last_cartesian_velocity: &Vector6<f64>,
        wrench: &Wrench,
    ) -> Vector6<f64> {
        let start = self.start_velocity(
            &kinematics.jacobian,
            measured_joint_velocity,
            last_cartesian_velocity,
        );
        self.integrate(&start, &kinematics.rotation, wrench)
    }
}
