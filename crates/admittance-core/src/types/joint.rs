//! 关节索引和关节数组
//!
//! 控制器只处理非冗余的 6 轴机械臂，关节数量在编译期固定为 6。
//! 所有关节空间的量（位置、速度、限幅）都用 [`JointArray`] 承载，
//! 并可以与 `nalgebra::Vector6` 互相转换，供雅可比运算使用。
//!
//! # 示例
//!
//! ```rust
//! use admittance_core::types::{Joint, JointArray};
//!
//! let limits = JointArray::new([1.0, 1.0, 1.5, 2.0, 2.0, 2.0]);
//! assert_eq!(limits[Joint::J3], 1.5);
//!
//! let halved = limits.map(|v| v * 0.5);
//! assert_eq!(halved[Joint::J1], 0.5);
//! ```

use nalgebra::Vector6;
use std::fmt;
use std::ops::{Index, IndexMut};

/// 关节数量
pub const JOINT_COUNT: usize = 6;

/// 关节枚举（规范顺序 J1..J6）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Joint {
    /// 关节 1（基座）
    J1 = 0,
    /// 关节 2（肩部）
    J2 = 1,
    /// 关节 3（肘部）
    J3 = 2,
    /// 关节 4（腕部 1）
    J4 = 3,
    /// 关节 5（腕部 2）
    J5 = 4,
    /// 关节 6（腕部 3）
    J6 = 5,
}

impl Joint {
    /// 所有关节（规范顺序）
    pub const ALL: [Joint; JOINT_COUNT] = [
        Joint::J1,
        Joint::J2,
        Joint::J3,
        Joint::J4,
        Joint::J5,
        Joint::J6,
    ];

    /// 关节索引（0-5）
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 从索引创建关节（越界返回 `None`）
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// 关节名称
    pub const fn name(self) -> &'static str {
        match self {
            Joint::J1 => "J1",
            Joint::J2 => "J2",
            Joint::J3 => "J3",
            Joint::J4 => "J4",
            Joint::J5 => "J5",
            Joint::J6 => "J6",
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 6 关节数组
///
/// 支持按 [`Joint`] 或 `usize` 索引、逐元素映射，以及与 `Vector6<f64>` 的转换。
#[derive(Debug, Clone, PartialEq)]
pub struct JointArray<T> {
    data: [T; JOINT_COUNT],
}

impl<T: Copy> Copy for JointArray<T> {}

impl<T> JointArray<T> {
    /// 创建关节数组
    #[inline]
    pub const fn new(data: [T; JOINT_COUNT]) -> Self {
        JointArray { data }
    }

    /// 内部数组引用
    #[inline]
    pub fn as_array(&self) -> &[T; JOINT_COUNT] {
        &self.data
    }

    /// 消耗 self，返回内部数组
    #[inline]
    pub fn into_array(self) -> [T; JOINT_COUNT] {
        self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.data.iter_mut()
    }

    /// 逐元素映射
    pub fn map<U, F>(self, f: F) -> JointArray<U>
    where
        F: FnMut(T) -> U,
    {
        JointArray::new(self.data.map(f))
    }

    /// 带关节标识的逐元素映射
    pub fn map_with_joint<U, F>(self, mut f: F) -> JointArray<U>
    where
        F: FnMut(Joint, T) -> U,
    {
        let mut index = 0;
        JointArray::new(self.data.map(|value| {
            let joint = Joint::ALL[index];
            index += 1;
            f(joint, value)
        }))
    }

    /// 与另一个数组逐元素组合
    pub fn map_with<U, V, F>(self, other: JointArray<U>, mut f: F) -> JointArray<V>
    where
        F: FnMut(T, U) -> V,
    {
        let [a1, b1, c1, d1, e1, f1] = self.data;
        let [a2, b2, c2, d2, e2, f2] = other.data;
        JointArray::new([
            f(a1, a2),
            f(b1, b2),
            f(c1, c2),
            f(d1, d2),
            f(e1, e2),
            f(f1, f2),
        ])
    }
}

impl<T: Copy> JointArray<T> {
    /// 所有元素相同的数组
    #[inline]
    pub const fn splat(value: T) -> Self {
        JointArray::new([value; JOINT_COUNT])
    }
}

impl JointArray<f64> {
    /// 全零数组
    pub const ZERO: JointArray<f64> = JointArray::splat(0.0);

    /// 转换为列向量（用于雅可比运算）
    #[inline]
    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::from_column_slice(&self.data)
    }

    /// 从列向量构造
    #[inline]
    pub fn from_vector(vector: &Vector6<f64>) -> Self {
        let mut data = [0.0; JOINT_COUNT];
        data.copy_from_slice(vector.as_slice());
        JointArray::new(data)
    }

    /// 所有元素都是有限值
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// 最大绝对值
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }
}

impl<T: Default> Default for JointArray<T> {
    fn default() -> Self {
        JointArray::new(std::array::from_fn(|_| T::default()))
    }
}

impl<T> Index<Joint> for JointArray<T> {
    type Output = T;

    #[inline]
    fn index(&self, joint: Joint) -> &T {
        &self.data[joint.index()]
    }
}

impl<T> IndexMut<Joint> for JointArray<T> {
    #[inline]
    fn index_mut(&mut self, joint: Joint) -> &mut T {
        &mut self.data[joint.index()]
    }
}

impl<T> Index<usize> for JointArray<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        &self.data[index]
    }
}

impl<T> IndexMut<usize> for JointArray<T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.data[index]
    }
}

impl<T> From<[T; JOINT_COUNT]> for JointArray<T> {
    #[inline]
    fn from(data: [T; JOINT_COUNT]) -> Self {
        JointArray::new(data)
    }
}

impl<T> From<JointArray<T>> for [T; JOINT_COUNT] {
    #[inline]
    fn from(arr: JointArray<T>) -> Self {
        arr.data
    }
}

impl<T> IntoIterator for JointArray<T> {
    type Item = T;
    type IntoIter = std::array::IntoIter<T, JOINT_COUNT>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a JointArray<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

impl fmt::Display for JointArray<f64> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.data;
        write!(f, "[{a:.4}, {b:.4}, {c:.4}, {d:.4}, {e:.4}, {g:.4}]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_index_roundtrip() {
        for joint in Joint::ALL {
            assert_eq!(Joint::from_index(joint.index()), Some(joint));
        }
        assert_eq!(Joint::from_index(6), None);
    }

    #[test]
    fn test_joint_display() {
        assert_eq!(format!("{}", Joint::J3), "J3");
    }

    #[test]
    fn test_map_with_joint_sees_canonical_order() {
        let arr = JointArray::splat(1.0);
        let scaled = arr.map_with_joint(|joint, v| v * (joint.index() + 1) as f64);
        assert_eq!(scaled.into_array(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_map_with() {
        let a = JointArray::new([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = JointArray::splat(0.5);
        let c = a.map_with(b, |x, y| x * y);
        assert_eq!(c[Joint::J2], 1.0);
        assert_eq!(c[5], 3.0);
    }

    #[test]
    fn test_vector_conversion_preserves_order() {
        let arr = JointArray::new([0.1, -0.2, 0.3, -0.4, 0.5, -0.6]);
        let v = arr.to_vector();
        assert_eq!(v[1], -0.2);
        assert_eq!(v[5], -0.6);
        assert_eq!(JointArray::from_vector(&v), arr);
    }

    #[test]
    fn test_max_abs_and_finite() {
        let arr = JointArray::new([0.1, -2.5, 0.3, 0.0, 1.0, -1.0]);
        assert_eq!(arr.max_abs(), 2.5);
        assert!(arr.is_finite());

        let mut bad = arr;
        bad[Joint::J4] = f64::NAN;
        assert!(!bad.is_finite());
    }

    #[test]
    fn test_default_is_zero() {
        let arr: JointArray<f64> = JointArray::default();
        assert_eq!(arr, JointArray::ZERO);
    }
}
