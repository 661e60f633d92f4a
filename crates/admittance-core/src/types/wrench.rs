//! 末端力旋量（Wrench）
//!
//! 6 个分量依次为力 Fx、Fy、Fz（N）和力矩 Tx、Ty、Tz（N·m），
//! 与笛卡尔速度向量的 6 个轴一一对应。

use nalgebra::Vector6;
use std::fmt;
use std::ops::{Index, IndexMut};

/// 笛卡尔轴（力旋量 / 笛卡尔速度分量）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartesianAxis {
    Fx = 0,
    Fy = 1,
    Fz = 2,
    Tx = 3,
    Ty = 4,
    Tz = 5,
}

impl CartesianAxis {
    pub const ALL: [CartesianAxis; 6] = [
        CartesianAxis::Fx,
        CartesianAxis::Fy,
        CartesianAxis::Fz,
        CartesianAxis::Tx,
        CartesianAxis::Ty,
        CartesianAxis::Tz,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 是否为力分量（前 3 轴）
    #[inline]
    pub const fn is_force(self) -> bool {
        (self as usize) < 3
    }

    pub const fn name(self) -> &'static str {
        match self {
            CartesianAxis::Fx => "fx",
            CartesianAxis::Fy => "fy",
            CartesianAxis::Fz => "fz",
            CartesianAxis::Tx => "tx",
            CartesianAxis::Ty => "ty",
            CartesianAxis::Tz => "tz",
        }
    }
}

impl fmt::Display for CartesianAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 力旋量
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Wrench([f64; 6]);

impl Wrench {
    pub const ZERO: Wrench = Wrench([0.0; 6]);

    #[inline]
    pub const fn new(components: [f64; 6]) -> Self {
        Wrench(components)
    }

    /// 由力和力矩分别构造
    pub const fn from_parts(force: [f64; 3], torque: [f64; 3]) -> Self {
        Wrench([force[0], force[1], force[2], torque[0], torque[1], torque[2]])
    }

    #[inline]
    pub fn components(&self) -> &[f64; 6] {
        &self.0
    }

    /// 力分量 [Fx, Fy, Fz]
    pub fn force(&self) -> [f64; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    /// 力矩分量 [Tx, Ty, Tz]
    pub fn torque(&self) -> [f64; 3] {
        [self.0[3], self.0[4], self.0[5]]
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|c| *c == 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|c| c.is_finite())
    }

    #[inline]
    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::from_column_slice(&self.0)
    }
}

impl Index<CartesianAxis> for Wrench {
    type Output = f64;

    #[inline]
    fn index(&self, axis: CartesianAxis) -> &f64 {
        &self.0[axis.index()]
    }
}

impl IndexMut<CartesianAxis> for Wrench {
    #[inline]
    fn index_mut(&mut self, axis: CartesianAxis) -> &mut f64 {
        &mut self.0[axis.index()]
    }
}

impl Index<usize> for Wrench {
    type Output = f64;

    #[inline]
    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl From<[f64; 6]> for Wrench {
    fn from(components: [f64; 6]) -> Self {
        Wrench(components)
    }
}

impl fmt::Display for Wrench {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [fx, fy, fz, tx, ty, tz] = self.0;
        write!(
            f,
            "force [{fx:.2}, {fy:.2}, {fz:.2}] torque [{tx:.3}, {ty:.3}, {tz:.3}]"
        )
    }
}

/// 带时间戳的力传感器采样
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WrenchSample {
    /// 传感器安装坐标系下的力旋量
    pub wrench: Wrench,
    /// 时间戳（微秒，来源由传输层决定）
    pub timestamp_us: u64,
}

impl WrenchSample {
    pub fn new(wrench: Wrench, timestamp_us: u64) -> Self {
        Self {
            wrench,
            timestamp_us,
        }
    }
}
