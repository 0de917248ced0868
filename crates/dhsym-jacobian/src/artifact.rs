//! The terminal derivation artifact.
//!
//! [`FinalJacobianData`] is the single serializable output handed to the
//! consumer: the end-effector-frame Jacobian with numeric DH constants
//! baked in, the per-joint doubled rotations, the aggregate base rotation,
//! and the base-frame Jacobian — the only piece evaluated repeatedly at
//! simulation rate.

use serde::{Deserialize, Serialize};

use dhsym_core::{RobotDescription, SpecError, TopologyVersion};
use dhsym_expr::SymMatrix;

use crate::extractor::{VelocityComponent, extract_row};
use crate::frame::convert_to_base;
use crate::propagator::{propagate, rate_symbols};
use crate::simplify::simplify;

/// Everything the evaluator/UI consumes for one settled topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalJacobianData {
    /// 6xN Jacobian in the end-effector frame, row order
    /// `[vx, vy, vz, wx, wy, wz]`, column order = joint index.
    pub complete_jacobian: SymMatrix,
    /// Per-joint doubled rotations `[[R_i, 0], [0, R_i]]`, chain order.
    pub doubled_rotation_matrices: Vec<SymMatrix>,
    /// Aggregate doubled rotation from the end-effector frame to the base.
    pub down_to_zero_rot_mat: SymMatrix,
    /// 6xN Jacobian re-expressed in the base frame.
    pub final_jacobian: SymMatrix,
    /// The topology version this artifact was derived for.
    pub version: TopologyVersion,
}

/// Derive the full artifact for `desc`, synchronously on this thread.
///
/// The staged pipeline in `dhsym-pipeline` runs the same three stages with
/// the six extractions fanned out; results are identical.
///
/// # Errors
///
/// [`SpecError`] if the description fails validation.
pub fn derive_jacobian(desc: &RobotDescription) -> Result<FinalJacobianData, SpecError> {
    derive_jacobian_versioned(desc, TopologyVersion::default())
}

/// [`derive_jacobian`], tagging the artifact with `version`.
pub fn derive_jacobian_versioned(
    desc: &RobotDescription,
    version: TopologyVersion,
) -> Result<FinalJacobianData, SpecError> {
    let propagation = propagate(desc)?;
    let rates = rate_symbols(desc);

    let rows: Vec<Vec<_>> = VelocityComponent::ALL
        .iter()
        .map(|component| {
            let scalar = component.select(&propagation.velocity);
            extract_row(scalar, &rates).entries
        })
        .collect();

    let complete_jacobian = SymMatrix::from_rows(rows).map(|e| simplify(e));
    let (conversion, final_jacobian) =
        convert_to_base(&complete_jacobian, &propagation.link_rotations);

    Ok(FinalJacobianData {
        complete_jacobian,
        doubled_rotation_matrices: conversion.doubled_rotations,
        down_to_zero_rot_mat: conversion.down_to_zero,
        final_jacobian,
        version,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use dhsym_core::{DhRow, JointKind, JointSpec};
    use dhsym_expr::Expr;

    /// End-to-end scenario: three identical revolute rows plus
    /// the terminal marker.
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

    #[test]
    fn planar_3r_shape_and_angular_z_row() {
        let data = derive_jacobian(&planar_3r()).unwrap();
        assert_eq!(data.complete_jacobian.nrows(), 6);
        assert_eq!(data.complete_jacobian.ncols(), 3);
        assert_eq!(data.final_jacobian.nrows(), 6);
        assert_eq!(data.final_jacobian.ncols(), 3);

        // Each revolute joint contributes a unit rate about its own Z.
        for col in 0..3 {
            assert!(data.complete_jacobian.get(5, col).is_one());
            assert!(data.final_jacobian.get(5, col).is_one());
        }
    }

    #[test]
    fn planar_3r_no_out_of_plane_linear_velocity() {
        let data = derive_jacobian(&planar_3r()).unwrap();
        for col in 0..3 {
            assert!(data.final_jacobian.get(2, col).is_zero());
            assert!(data.final_jacobian.get(3, col).is_zero());
            assert!(data.final_jacobian.get(4, col).is_zero());
        }
    }

    #[test]
    fn rotation_stack_sized_by_rows() {
        let data = derive_jacobian(&planar_3r()).unwrap();
        assert_eq!(data.doubled_rotation_matrices.len(), 4);
        assert_eq!(data.down_to_zero_rot_mat.nrows(), 6);
    }

    #[test]
    fn jacobian_entries_contain_no_rate_symbols() {
        let data = derive_jacobian(&planar_3r()).unwrap();
        let rates = rate_symbols(&planar_3r());
        for r in 0..6 {
            for c in 0..3 {
                for rate in &rates {
                    assert!(!data.final_jacobian.get(r, c).contains(*rate));
                }
            }
        }
    }

    #[test]
    fn artifact_serde_round_trip() {
        let data = derive_jacobian(&planar_3r()).unwrap();
        let json = serde_json_like_roundtrip(&data);
        assert_eq!(
            json.final_jacobian.to_string(),
            data.final_jacobian.to_string()
        );
        assert_eq!(json.version, data.version);
    }

    // toml is the serde format available in the workspace; the artifact
    // nests matrices as wire strings, which TOML carries fine.
    fn serde_json_like_roundtrip(data: &FinalJacobianData) -> FinalJacobianData {
        let text = toml::to_string(data).unwrap();
        toml::from_str(&text).unwrap()
    }

    #[test]
    fn wire_format_shape() {
        let data = derive_jacobian(&planar_3r()).unwrap();
        let text = data.final_jacobian.to_string();
        assert!(text.starts_with("matrix(["));
        assert!(text.ends_with("])"));
        let parsed = dhsym_expr::SymMatrix::parse(&text).unwrap();
        assert_eq!(parsed.to_string(), text);
    }

    #[test]
    fn invalid_description_is_rejected_before_derivation() {
        let desc = RobotDescription {
            name: "bad".into(),
            joints: vec![JointSpec::revolute(0.0, 0.0, 0.0)],
        };
        assert!(matches!(
            derive_jacobian(&desc),
            Err(SpecError::MissingEndEffector(_))
        ));
    }

    #[test]
    fn expr_check_planar_2r_vy_column() {
        // For a 2R arm with link length in the second row, the base-frame
        // vy row's first column is the classic a*cos(t1) lever term after
        // simplification (plus the second link's compound-angle term).
        let desc = RobotDescription {
            name: "2r".into(),
            joints: vec![
                JointSpec::revolute(0.0, 0.0, 0.0),
                JointSpec::revolute(2.0, 0.0, 0.0),
                JointSpec::end_effector(),
            ],
        };
        let data = derive_jacobian(&desc).unwrap();
        let entry = data.final_jacobian.get(1, 0);
        assert_eq!(entry.to_string(), "2*cos(t1)");
        assert_eq!(Expr::parse(&entry.to_string()).unwrap(), entry.clone());
    }
}
