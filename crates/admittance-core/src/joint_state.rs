//! 关节状态规范化
//!
//! 部分实机（如 UR10e）上报的关节顺序中，基座关节和肘部关节的位置互换。
//! 打开 `swap_base_elbow` 后，名称、力矩、位置和速度数组的索引 0 和 2 会在
//! 复制到规范数组之前交换。

use crate::error::ControlError;
use crate::types::{JOINT_COUNT, JointArray, JointState, RawJointState};

/// 被交换的两个关节索引
pub const SWAPPED_JOINTS: (usize, usize) = (0, 2);

/// 原地交换索引 0 和 2（数组长度不足时跳过该数组）
pub fn canonicalize_in_place(raw: &mut RawJointState) {
    let (a, b) = SWAPPED_JOINTS;
    swap_if_present(&mut raw.name, a, b);
    swap_if_present(&mut raw.effort, a, b);
    swap_if_present(&mut raw.position, a, b);
    swap_if_present(&mut raw.velocity, a, b);
}

fn swap_if_present<T>(values: &mut [T], a: usize, b: usize) {
    if values.len() > a.max(b) {
        values.swap(a, b);
    }
}

/// 将原始关节状态转换为规范关节状态
///
/// # 错误
///
/// 位置或速度数组长度不是 6 时返回 [`ControlError::InvalidJointState`]。
pub fn canonicalize(raw: &RawJointState, swap_base_elbow: bool) -> Result<JointState, ControlError> {
    let mut position = to_array("position", &raw.position)?;
    let mut velocity = to_array("velocity", &raw.velocity)?;

    if swap_base_elbow {
        let (a, b) = SWAPPED_JOINTS;
        position.swap(a, b);
        velocity.swap(a, b);
    }

    Ok(JointState {
        position: JointArray::new(position),
        velocity: JointArray::new(velocity),
        timestamp_us: raw.timestamp_us,
    })
}

fn to_array(field: &str, values: &[f64]) -> Result<[f64; JOINT_COUNT], ControlError> {
    values.try_into().map_err(|_| {
        ControlError::InvalidJointState(format!(
            "{} has {} values, expected {}",
            field,
            values.len(),
            JOINT_COUNT
        ))
    })
}
