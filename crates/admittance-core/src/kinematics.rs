//! 运动学接口
//!
//! 控制器不直接处理连杆几何，只通过 [`KinematicsProvider`] 获取当前关节状态下的
//! 雅可比矩阵和末端姿态。具体实现（URDF 解析、正运动学库等）属于外部协作方。
//!
//! 构造具体 Provider 的过程就是初始化步骤，失败应直接中止启动；
//! 周期内 [`KinematicsProvider::snapshot`] 返回错误同样表示模型不可用，控制循环会停止。

use crate::types::JointState;
use nalgebra::{Matrix3, Matrix6};
use std::convert::Infallible;

/// 单周期运动学快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicsSnapshot {
    /// 雅可比矩阵 J（关节速度 -> 末端笛卡尔速度）
    pub jacobian: Matrix6<f64>,
    /// 块对角旋转矩阵 R = diag(R_ee, R_ee)
    pub rotation: Matrix6<f64>,
}

impl KinematicsSnapshot {
    /// 由雅可比和 3×3 末端旋转构造
    pub fn from_rotation(jacobian: Matrix6<f64>, rotation: Matrix3<f64>) -> Self {
        Self {
            jacobian,
            rotation: block_rotation(&rotation),
        }
    }

    /// 末端姿态为单位阵的快照
    pub fn identity_rotation(jacobian: Matrix6<f64>) -> Self {
        Self {
            jacobian,
            rotation: Matrix6::identity(),
        }
    }
}

/// 将 3×3 旋转扩展为作用于力旋量的 6×6 块对角矩阵
pub fn block_rotation(rotation: &Matrix3<f64>) -> Matrix6<f64> {
    let mut block = Matrix6::zeros();
    block.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    block.fixed_view_mut::<3, 3>(3, 3).copy_from(rotation);
    block
}

/// 运动学模型提供方
pub trait KinematicsProvider {
    /// Provider 错误类型
    type Error: std::error::Error + Send + Sync + 'static;

    /// 计算给定关节状态下的雅可比和末端姿态
    fn snapshot(&mut self, state: &JointState) -> Result<KinematicsSnapshot, Self::Error>;
}

impl<K: KinematicsProvider + ?Sized> KinematicsProvider for Box<K> {
    type Error = K::Error;

    fn snapshot(&mut self, state: &JointState) -> Result<KinematicsSnapshot, Self::Error> {
        (**self).snapshot(state)
    }
}

/// 常量运动学（与关节状态无关）
///
/// 用于测试和仿真：雅可比与末端姿态在整个运行过程中保持不变。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedKinematics {
    snapshot: KinematicsSnapshot,
}

impl FixedKinematics {
    pub fn new(snapshot: KinematicsSnapshot) -> Self {
        Self { snapshot }
    }

    /// J = scale · I，R = I
    pub fn scaled_identity(scale: f64) -> Self {
        Self::new(KinematicsSnapshot::identity_rotation(
            Matrix6::identity() * scale,
        ))
    }
}

impl KinematicsProvider for FixedKinematics {
    type Error = Infallible;

    fn snapshot(&mut self, _state: &JointState) -> Result<KinematicsSnapshot, Self::Error> {
        Ok(self.snapshot)
    }
}
