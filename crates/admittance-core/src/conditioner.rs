//! 力传感器死区滤波
//!
//! 绝对值低于阈值的分量被视为噪声并置零，等于或高于阈值的分量原样保留。
//! 前 3 个分量（力）使用力死区，后 3 个分量（力矩）使用力矩死区。

use crate::config::AdmittanceModel;
use crate::types::{CartesianAxis, Wrench};

/// 死区阈值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeadZone {
    /// 力死区（N）
    pub force: f64,
    /// 力矩死区（N·m）
    pub torque: f64,
}

impl DeadZone {
    pub fn new(force: f64, torque: f64) -> Self {
        Self { force, torque }
    }

    /// 对一个力旋量做死区滤波
    ///
    /// 阈值按绝对值比较，负的阈值与其绝对值等效。
    pub fn apply(&self, raw: &Wrench) -> Wrench {
        let mut conditioned = *raw;
        for axis in CartesianAxis::ALL {
            let threshold = if axis.is_force() {
                self.force.abs()
            } else {
                self.torque.abs()
            };
            if conditioned[axis].abs() < threshold {
                conditioned[axis] = 0.0;
            }
        }
        conditioned
    }
}

impl From<&AdmittanceModel> for DeadZone {
    fn from(model: &AdmittanceModel) -> Self {
        DeadZone::new(model.force_dead_zone, model.torque_dead_zone)
    }
}
