//! 逆运动学（速度层）
//!
//! q̇ = J⁻¹ · ẋ
//!
//! 求逆前先用奇异值计算条件数 σmax / σmin。条件数超过阈值时按
//! [`SingularityPolicy`] 处理：
//!
//! - `Hold` / `Fault`：返回 [`ControlError::SingularJacobian`]，由控制器决定重发上一周期命令还是停机
//! - `Damped`：改用阻尼最小二乘逆 Jᵀ(JJᵀ + λ²I)⁻¹

use crate::config::{SingularityConfig, SingularityPolicy};
use crate::error::ControlError;
use crate::types::JointArray;
use nalgebra::{Matrix6, Vector6};

/// 实际使用的求逆方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InverseMethod {
    Exact,
    DampedLeastSquares,
}

/// 逆运动学结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkSolution {
    pub joint_velocity: JointArray<f64>,
    /// 本周期雅可比的条件数
    pub condition: f64,
    pub method: InverseMethod,
}

/// 速度层逆运动学
#[derive(Debug, Clone)]
pub struct InverseKinematics {
    policy: SingularityPolicy,
    max_condition: f64,
    damping: f64,
}

impl InverseKinematics {
    pub fn new(config: &SingularityConfig) -> Self {
        Self {
            policy: config.policy,
            max_condition: config.max_condition,
            damping: config.damping,
        }
    }

    pub fn policy(&self) -> SingularityPolicy {
        self.policy
    }

    /// 求解关节速度
    ///
    /// # 错误
    ///
    /// - 雅可比病态且策略不是 `Damped`：[`ControlError::SingularJacobian`]
    /// - 雅可比或 ẋ 含 NaN / Inf：[`ControlError::NonFinite`]
    pub fn solve(
        &self,
        jacobian: &Matrix6<f64>,
        cartesian_velocity: &Vector6<f64>,
    ) -> Result<IkSolution, ControlError> {
        if jacobian.iter().any(|v| !v.is_finite()) {
            return Err(ControlError::NonFinite("jacobian"));
        }
        if cartesian_velocity.iter().any(|v| !v.is_finite()) {
            return Err(ControlError::NonFinite("cartesian velocity"));
        }

        let condition = condition_number(jacobian);
        let singular = ControlError::SingularJacobian {
            condition,
            limit: self.max_condition,
        };

        let (q_dot, method) = if condition <= self.max_condition {
            match jacobian.try_inverse() {
                Some(inverse) => (inverse * cartesian_velocity, InverseMethod::Exact),
                None => return Err(singular),
            }
        } else if self.policy == SingularityPolicy::Damped {
            match damped_least_squares(jacobian, cartesian_velocity, self.damping) {
                Some(q_dot) => (q_dot, InverseMethod::DampedLeastSquares),
                None => return Err(singular),
            }
        } else {
            return Err(singular);
        };

        Ok(IkSolution {
            joint_velocity: JointArray::from_vector(&q_dot),
            condition,
            method,
        })
    }
}

/// 条件数 σmax / σmin（σmin 为 0 时返回 +∞）
pub fn condition_number(matrix: &Matrix6<f64>) -> f64 {
    let sigma = matrix.singular_values();
    let max = sigma.max();
    let min = sigma.min();
    if min <= 0.0 {
        f64::INFINITY
    } else {
        max / min
    }
}

/// 阻尼最小二乘：q̇ = Jᵀ(JJᵀ + λ²I)⁻¹ · ẋ
pub fn damped_least_squares(
    jacobian: &Matrix6<f64>,
    cartesian_velocity: &Vector6<f64>,
    damping: f64,
) -> Option<Vector6<f64>> {
    let jjt = jacobian * jacobian.transpose();
    let damped = jjt + Matrix6::identity() * (damping * damping);
    let damped_inv = damped.try_inverse()?;
    Some(jacobian.transpose() * damped_inv * cartesian_velocity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solver(policy: SingularityPolicy) -> InverseKinematics {
        InverseKinematics::new(&SingularityConfig {
            policy,
            max_condition: 1.0e4,
            damping: 0.05,
        })
    }

    fn near_singular() -> Matrix6<f64> {
        let mut j = Matrix6::identity();
        j[(5, 5)] = 1.0e-8;
        j
    }

    #[test]
    fn test_identity_jacobian_passes_through() {
        let x_dot = Vector6::new(0.1, -0.2, 0.3, 0.0, 0.0, 0.05);
        let solution = solver(SingularityPolicy::Hold)
            .solve(&Matrix6::identity(), &x_dot)
            .unwrap();
        assert_eq!(solution.method, InverseMethod::Exact);
        assert!((solution.condition - 1.0).abs() < 1e-9);
        for i in 0..6 {
            assert!((solution.joint_velocity[i] - x_dot[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_scaled_jacobian_inverts() {
        let j = Matrix6::identity() * 2.0;
        let x_dot = Vector6::repeat(1.0);
        let solution = solver(SingularityPolicy::Hold).solve(&j, &x_dot).unwrap();
        for q in solution.joint_velocity.iter() {
            assert!((q - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn test_singular_jacobian_rejected_under_hold_and_fault() {
        let x_dot = Vector6::repeat(0.1);
        for policy in [SingularityPolicy::Hold, SingularityPolicy::Fault] {
            let err = solver(policy).solve(&near_singular(), &x_dot).unwrap_err();
            assert!(
                matches!(err, ControlError::SingularJacobian { condition, limit } if condition > limit),
                "policy {:?}: {:?}",
                policy,
                err
            );
        }
    }

    #[test]
    fn test_rank_deficient_jacobian_rejected() {
        let mut j = Matrix6::identity();
        j[(3, 3)] = 0.0;
        let err = solver(SingularityPolicy::Hold)
            .solve(&j, &Vector6::zeros())
            .unwrap_err();
        assert!(matches!(err, ControlError::SingularJacobian { .. }));
    }

    #[test]
    fn test_damped_policy_stays_bounded() {
        let x_dot = Vector6::repeat(0.1);
        let solution = solver(SingularityPolicy::Damped)
            .solve(&near_singular(), &x_dot)
            .unwrap();
        assert_eq!(solution.method, InverseMethod::DampedLeastSquares);
        assert!(solution.joint_velocity.is_finite());
        // 病态方向的分量被阻尼压到接近 0，而不是 1e7 量级
        assert!(solution.joint_velocity[5].abs() < 1e-3);
        // 良态方向接近精确解 x/(1+λ²)
        assert!((solution.joint_velocity[0] - 0.1 / (1.0 + 0.0025)).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_inputs_rejected() {
        let mut j = Matrix6::identity();
        j[(0, 0)] = f64::NAN;
        assert_eq!(
            solver(SingularityPolicy::Damped).solve(&j, &Vector6::zeros()),
            Err(ControlError::NonFinite("jacobian"))
        );

        let x_dot = Vector6::new(f64::INFINITY, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(
            solver(SingularityPolicy::Hold).solve(&Matrix6::identity(), &x_dot),
            Err(ControlError::NonFinite("cartesian velocity"))
        );
    }

    #[test]
    fn test_condition_number() {
        let mut j = Matrix6::identity();
        j[(0, 0)] = 100.0;
        assert!((condition_number(&j) - 100.0).abs() < 1e-6);
        assert_eq!(condition_number(&Matrix6::zeros()), f64::INFINITY);
    }
}
