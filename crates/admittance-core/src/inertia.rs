//! 惯性削减
//!
//! 某个轴上的（死区滤波后）力旋量分量为零时，直接将该轴的期望笛卡尔速度清零，
//! 使操作者松手后机器人立即停止，而不是依靠阻尼慢慢减速。

use crate::types::{CartesianAxis, Wrench};
use nalgebra::Vector6;

/// 将力旋量为零的轴上的速度清零
///
/// 返回被清零的轴数（原本就为零的速度也计入）。
pub fn reduce_inertia(velocity: &mut Vector6<f64>, wrench: &Wrench) -> usize {
    let mut zeroed = 0;
    for axis in CartesianAxis::ALL {
        if wrench[axis] == 0.0 {
            velocity[axis.index()] = 0.0;
            zeroed += 1;
        }
    }
    zeroed
}
