//! Robot description types: joints, DH rows, and topology versions.
//!
//! A robot is an ordered list of [`JointSpec`]s following the modified
//! Denavit-Hartenberg convention (Craig): row `i` carries `a_{i-1}`,
//! `alpha_{i-1}`, `d_i` and `theta_i`. The final row is always a
//! zero-length end-effector marker.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::SpecError;

// ---------------------------------------------------------------------------
// Joints
// ---------------------------------------------------------------------------

/// Kind of a single joint in the serial chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JointKind {
    /// Rotating joint: `theta` is the actuated variable.
    Revolute,
    /// Sliding joint: `d` is the actuated variable.
    Prismatic,
    /// Terminal frame marker; contributes no joint rate.
    EndEffector,
}

impl JointKind {
    /// Whether this joint contributes a column to the Jacobian.
    pub const fn is_actuated(self) -> bool {
        matches!(self, Self::Revolute | Self::Prismatic)
    }
}

impl std::fmt::Display for JointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Revolute => write!(f, "revolute"),
            Self::Prismatic => write!(f, "prismatic"),
            Self::EndEffector => write!(f, "end-effector"),
        }
    }
}

/// One row of the DH table.
///
/// For a revolute joint `theta` is the zero-offset of the actuated angle;
/// for a prismatic joint `d` is the zero-offset of the actuated extension.
/// The other two values are fixed link constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DhRow {
    /// Link length `a_{i-1}` (meters).
    #[serde(default)]
    pub a: f64,
    /// Link twist `alpha_{i-1}` (radians).
    #[serde(default)]
    pub alpha: f64,
    /// Link offset `d_i` (meters).
    #[serde(default)]
    pub d: f64,
    /// Joint angle `theta_i` (radians).
    #[serde(default)]
    pub theta: f64,
}

impl DhRow {
    pub const fn new(a: f64, alpha: f64, d: f64, theta: f64) -> Self {
        Self { a, alpha, d, theta }
    }

    /// Zero-length row, used for the terminal end-effector frame.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

/// A joint kind together with its DH row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointSpec {
    pub kind: JointKind,
    #[serde(flatten)]
    pub row: DhRow,
}

impl JointSpec {
    pub const fn new(kind: JointKind, row: DhRow) -> Self {
        Self { kind, row }
    }

    pub const fn revolute(a: f64, alpha: f64, d: f64) -> Self {
        Self::new(JointKind::Revolute, DhRow::new(a, alpha, d, 0.0))
    }

    pub const fn prismatic(a: f64, alpha: f64, theta: f64) -> Self {
        Self::new(JointKind::Prismatic, DhRow::new(a, alpha, 0.0, theta))
    }

    pub const fn end_effector() -> Self {
        Self::new(JointKind::EndEffector, DhRow::zero())
    }
}

// ---------------------------------------------------------------------------
// RobotDescription
// ---------------------------------------------------------------------------

/// An ordered serial-manipulator description.
///
/// Invariants (checked by [`validate`](Self::validate)): at least one
/// actuated joint, exactly one end-effector row, and it is last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotDescription {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(rename = "joint")]
    pub joints: Vec<JointSpec>,
}

fn default_name() -> String {
    "robot".into()
}

impl RobotDescription {
    /// Build a description from separate kind and DH-row sequences.
    ///
    /// # Errors
    ///
    /// [`SpecError::LengthMismatch`] if the sequences disagree in length,
    /// plus everything [`validate`](Self::validate) rejects.
    pub fn from_parts(
        name: impl Into<String>,
        kinds: &[JointKind],
        rows: &[DhRow],
    ) -> Result<Self, SpecError> {
        if kinds.len() != rows.len() {
            return Err(SpecError::LengthMismatch {
                kinds: kinds.len(),
                rows: rows.len(),
            });
        }
        let desc = Self {
            name: name.into(),
            joints: kinds
                .iter()
                .zip(rows)
                .map(|(&kind, &row)| JointSpec::new(kind, row))
                .collect(),
        };
        desc.validate()?;
        Ok(desc)
    }

    /// Number of actuated degrees of freedom (Jacobian columns).
    pub fn dof(&self) -> usize {
        self.joints.iter().filter(|j| j.kind.is_actuated()).count()
    }

    /// Check the structural invariants.
    pub fn validate(&self) -> Result<(), SpecError> {
        let Some(last) = self.joints.last() else {
            return Err(SpecError::TooFewJoints);
        };
        if last.kind != JointKind::EndEffector {
            return Err(SpecError::MissingEndEffector(last.kind.to_string()));
        }
        if self.dof() == 0 {
            return Err(SpecError::TooFewJoints);
        }
        for (index, joint) in self.joints.iter().enumerate() {
            if joint.kind == JointKind::EndEffector && index + 1 != self.joints.len() {
                return Err(SpecError::EarlyEndEffector { index });
            }
            for (field, value) in [
                ("a", joint.row.a),
                ("alpha", joint.row.alpha),
                ("d", joint.row.d),
                ("theta", joint.row.theta),
            ] {
                if !value.is_finite() {
                    return Err(SpecError::NonFiniteParameter { index, field, value });
                }
            }
        }
        Ok(())
    }

    /// Numeric forward kinematics at joint configuration `q`.
    ///
    /// `q` holds one value per actuated joint in chain order (angle for
    /// revolute, extension for prismatic), added to the row's zero-offset.
    /// Returns the end-effector position and rotation in the base frame.
    ///
    /// # Errors
    ///
    /// [`SpecError::JointCountMismatch`] if `q.len() != self.dof()`.
    pub fn fk_pose(&self, q: &[f64]) -> Result<(Vector3<f64>, Matrix3<f64>), SpecError> {
        if q.len() != self.dof() {
            return Err(SpecError::JointCountMismatch {
                expected: self.dof(),
                got: q.len(),
            });
        }

        let mut rotation = Matrix3::identity();
        let mut position = Vector3::zeros();
        let mut actuated = 0;

        for joint in &self.joints {
            let (theta, d) = match joint.kind {
                JointKind::Revolute => {
                    let theta = joint.row.theta + q[actuated];
                    actuated += 1;
                    (theta, joint.row.d)
                }
                JointKind::Prismatic => {
                    let d = joint.row.d + q[actuated];
                    actuated += 1;
                    (joint.row.theta, d)
                }
                JointKind::EndEffector => (joint.row.theta, joint.row.d),
            };

            let (sa, ca) = joint.row.alpha.sin_cos();
            let (st, ct) = theta.sin_cos();

            // Translation of frame i expressed in frame i-1.
            let p = Vector3::new(joint.row.a, -sa * d, ca * d);
            position += rotation * p;

            // Rotation from frame i to frame i-1 (modified DH).
            let step = Matrix3::new(
                ct, -st, 0.0, //
                st * ca, ct * ca, -sa, //
                st * sa, ct * sa, ca,
            );
            rotation *= step;
        }

        Ok((position, rotation))
    }
}

// ---------------------------------------------------------------------------
// TopologyVersion
// ---------------------------------------------------------------------------

/// Monotonically increasing id for one robot topology.
///
/// Every derivation run is tagged with the version it was requested for;
/// results carrying a version older than the latest request are stale and
/// must be discarded, never surfaced.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct TopologyVersion(pub u64);

impl std::fmt::Display for TopologyVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn planar_3r() -> RobotDescription {
        RobotDescription {
            name: "planar-3r".into(),
            joints: vec![
                JointSpec::revolute(0.0, 0.0, 0.0),
                JointSpec::revolute(2.0, 0.0, 0.0),
                JointSpec::revolute(2.0, 0.0, 0.0),
                JointSpec::end_effector(),
            ],
        }
    }

    #[test]
    fn validate_accepts_planar_3r() {
        assert!(planar_3r().validate().is_ok());
        assert_eq!(planar_3r().dof(), 3);
    }

    #[test]
    fn validate_rejects_missing_end_effector() {
        let mut desc = planar_3r();
        desc.joints.pop();
        assert!(matches!(
            desc.validate(),
            Err(SpecError::MissingEndEffector(_))
        ));
    }

    #[test]
    fn validate_rejects_early_end_effector() {
        let mut desc = planar_3r();
        desc.joints.insert(1, JointSpec::end_effector());
        assert!(matches!(
            desc.validate(),
            Err(SpecError::EarlyEndEffector { index: 1 })
        ));
    }

    #[test]
    fn validate_rejects_non_finite() {
        let mut desc = planar_3r();
        desc.joints[1].row.a = f64::NAN;
        assert!(matches!(
            desc.validate(),
            Err(SpecError::NonFiniteParameter { index: 1, .. })
        ));
    }

    #[test]
    fn from_parts_rejects_length_mismatch() {
        let kinds = [JointKind::Revolute, JointKind::EndEffector];
        let rows = [DhRow::zero()];
        assert!(matches!(
            RobotDescription::from_parts("r", &kinds, &rows),
            Err(SpecError::LengthMismatch { kinds: 2, rows: 1 })
        ));
    }

    #[test]
    fn fk_planar_stretched_out() {
        // All angles zero: links lie along +x. Note a_{i-1} convention:
        // the first link length sits in the second row.
        let desc = planar_3r();
        let (pos, rot) = desc.fk_pose(&[0.0, 0.0, 0.0]).unwrap();
        assert_relative_eq!(pos.x, 4.0, epsilon = 1e-12);
        assert_relative_eq!(pos.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(rot[(0, 0)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn fk_planar_elbow_up() {
        let desc = planar_3r();
        let (pos, _) = desc.fk_pose(&[FRAC_PI_2, 0.0, 0.0]).unwrap();
        assert_relative_eq!(pos.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(pos.y, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn fk_rejects_wrong_joint_count() {
        assert!(matches!(
            planar_3r().fk_pose(&[0.0]),
            Err(SpecError::JointCountMismatch { expected: 3, got: 1 })
        ));
    }
}
