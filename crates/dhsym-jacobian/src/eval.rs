//! Numeric evaluation of a settled Jacobian at simulation rate.
//!
//! The artifact's `final_jacobian` carries only position symbols (rates are
//! stripped during extraction), so evaluation binds one number per actuated
//! joint into a fresh [`Scope`] and folds every entry. This is a single
//! compiled-expression pass per tick; it deliberately does not involve the
//! worker pipeline.

use nalgebra::{DMatrix, DVector, Vector6};

use dhsym_core::{RobotDescription, SpecError};
use dhsym_expr::{Scope, SymMatrix, Var};

use crate::artifact::FinalJacobianData;
use crate::error::DeriveError;
use crate::propagator::position_symbols;

/// Evaluates a base-frame Jacobian at live joint configurations.
#[derive(Debug, Clone)]
pub struct JacobianEvaluator {
    matrix: SymMatrix,
    positions: Vec<Var>,
}

impl JacobianEvaluator {
    /// Bind the artifact's base-frame Jacobian to `desc`'s joint symbols.
    pub fn new(data: &FinalJacobianData, desc: &RobotDescription) -> Self {
        Self {
            matrix: data.final_jacobian.clone(),
            positions: position_symbols(desc),
        }
    }

    pub fn dof(&self) -> usize {
        self.positions.len()
    }

    /// Scope binding each actuated joint's position symbol to `q`.
    fn scope(&self, q: &[f64]) -> Result<Scope, SpecError> {
        if q.len() != self.positions.len() {
            return Err(SpecError::JointCountMismatch {
                expected: self.positions.len(),
                got: q.len(),
            });
        }
        let mut scope = Scope::new();
        for (&var, &value) in self.positions.iter().zip(q) {
            scope.set(var, value);
        }
        Ok(scope)
    }

    /// Numeric 6xN Jacobian at joint configuration `q`.
    pub fn evaluate(&self, q: &[f64]) -> Result<DMatrix<f64>, DeriveError> {
        let scope = self.scope(q)?;
        let values = self.matrix.evaluate(&scope)?;
        Ok(DMatrix::from_row_slice(
            self.matrix.nrows(),
            self.matrix.ncols(),
            &values,
        ))
    }

    /// Cartesian end-effector velocity `[vx, vy, vz, wx, wy, wz]` for the
    /// configuration `q` moving at joint rates `qdot`.
    pub fn cartesian_velocity(
        &self,
        q: &[f64],
        qdot: &[f64],
    ) -> Result<Vector6<f64>, DeriveError> {
        if qdot.len() != self.positions.len() {
            return Err(DeriveError::Spec(SpecError::JointCountMismatch {
                expected: self.positions.len(),
                got: qdot.len(),
            }));
        }
        let jacobian = self.evaluate(q)?;
        let velocity = jacobian * DVector::from_column_slice(qdot);
        Ok(Vector6::from_iterator(velocity.iter().copied()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::derive_jacobian;
    use approx::assert_relative_eq;
    use dhsym_core::{DhRow, JointKind, JointSpec};
    use nalgebra::Matrix3;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::f64::consts::FRAC_PI_2;

    fn planar_3r() -> RobotDescription {
        let row = DhRow::new(2.0, 0.0, 0.0, 0.0);
        RobotDescription {
            name: "planar-3r".into(),
            joints: vec![
                JointSpec::new(JointKind::Revolute, row),
                JointSpec::new(JointKind::Revolute, row),
                JointSpec::new(JointKind::Revolute, row),
                JointSpec::end_effector(),
            ],
        }
    }

    fn spatial_rpr() -> RobotDescription {
        RobotDescription {
            name: "spatial-rpr".into(),
            joints: vec![
                JointSpec::new(JointKind::Revolute, DhRow::new(0.0, 0.0, 0.3, 0.0)),
                JointSpec::new(JointKind::Prismatic, DhRow::new(0.5, FRAC_PI_2, 0.2, 0.4)),
                JointSpec::new(JointKind::Revolute, DhRow::new(0.2, -FRAC_PI_2, 0.1, 0.0)),
                JointSpec::end_effector(),
            ],
        }
    }

    /// Central finite-difference Jacobian of the numeric forward
    /// kinematics: linear rows from the position, angular rows from the
    /// rotation derivative `W = dR/dq * R^T`.
    fn finite_difference_jacobian(desc: &RobotDescription, q: &[f64]) -> DMatrix<f64> {
        let h = 1e-6;
        let n = desc.dof();
        let (_, rot) = desc.fk_pose(q).unwrap();
        let mut jacobian = DMatrix::zeros(6, n);

        for k in 0..n {
            let mut q_plus = q.to_vec();
            let mut q_minus = q.to_vec();
            q_plus[k] += h;
            q_minus[k] -= h;

            let (p_plus, r_plus) = desc.fk_pose(&q_plus).unwrap();
            let (p_minus, r_minus) = desc.fk_pose(&q_minus).unwrap();

            let dp = (p_plus - p_minus) / (2.0 * h);
            let dr: Matrix3<f64> = (r_plus - r_minus) / (2.0 * h);
            let skew = dr * rot.transpose();

            jacobian[(0, k)] = dp.x;
            jacobian[(1, k)] = dp.y;
            jacobian[(2, k)] = dp.z;
            jacobian[(3, k)] = skew[(2, 1)];
            jacobian[(4, k)] = skew[(0, 2)];
            jacobian[(5, k)] = skew[(1, 0)];
        }
        jacobian
    }

    fn assert_matches_finite_difference(desc: &RobotDescription, seed: u64) {
        let data = derive_jacobian(desc).unwrap();
        let evaluator = JacobianEvaluator::new(&data, desc);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        for _ in 0..8 {
            let q: Vec<f64> = (0..desc.dof()).map(|_| rng.gen_range(-1.5..1.5)).collect();
            let symbolic = evaluator.evaluate(&q).unwrap();
            let numeric = finite_difference_jacobian(desc, &q);
            for r in 0..6 {
                for c in 0..desc.dof() {
                    assert_relative_eq!(
                        symbolic[(r, c)],
                        numeric[(r, c)],
                        epsilon = 1e-6,
                        max_relative = 1e-6
                    );
                }
            }
        }
    }

    #[test]
    fn cross_oracle_planar_3r() {
        assert_matches_finite_difference(&planar_3r(), 42);
    }

    #[test]
    fn cross_oracle_spatial_rpr() {
        assert_matches_finite_difference(&spatial_rpr(), 7);
    }

    #[test]
    fn cartesian_velocity_planar_spin() {
        // Spinning only the base joint at 1 rad/s sweeps the stretched arm:
        // |v| = reach of the wrist from joint 1, w_z = 1.
        let desc = planar_3r();
        let data = derive_jacobian(&desc).unwrap();
        let evaluator = JacobianEvaluator::new(&data, &desc);
        let velocity = evaluator
            .cartesian_velocity(&[0.0, 0.0, 0.0], &[1.0, 0.0, 0.0])
            .unwrap();
        assert_relative_eq!(velocity[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(velocity[1], 4.0, epsilon = 1e-12);
        assert_relative_eq!(velocity[5], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn evaluate_rejects_wrong_arity() {
        let desc = planar_3r();
        let data = derive_jacobian(&desc).unwrap();
        let evaluator = JacobianEvaluator::new(&data, &desc);
        assert!(matches!(
            evaluator.evaluate(&[0.0]),
            Err(DeriveError::Spec(SpecError::JointCountMismatch { .. }))
        ));
    }
}
