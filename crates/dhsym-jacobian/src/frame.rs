//! Base-frame conversion of the stacked Jacobian.
//!
//! The propagated velocities (and therefore the stacked Jacobian) are
//! expressed in the end-effector frame. Re-expression in the base frame
//! left-multiplies by the aggregate rotation `R(0,N)` applied to both the
//! linear and angular halves, i.e. the 6x6 block-diagonal "doubled" form
//! `[[R, 0], [0, R]]`. Composition simplifies after every multiplication —
//! deferring simplification lets intermediate entries grow multiplicatively
//! with N.

use dhsym_expr::{SymMatrix, SymMatrix3};

use crate::simplify::simplify;

/// The rotation stack produced while converting to the base frame.
#[derive(Debug, Clone)]
pub struct FrameConversion {
    /// Per-joint doubled rotation `[[R_i, 0], [0, R_i]]`, chain order.
    pub doubled_rotations: Vec<SymMatrix>,
    /// Aggregate doubled rotation from the end-effector frame down to the
    /// base frame.
    pub down_to_zero: SymMatrix,
}

/// Compose the per-row link rotations and re-express `jacobian` (6xN,
/// end-effector frame) in the base frame.
///
/// Returns the conversion stack and the base-frame Jacobian.
pub fn convert_to_base(
    jacobian: &SymMatrix,
    link_rotations: &[SymMatrix3],
) -> (FrameConversion, SymMatrix) {
    let doubled_rotations: Vec<SymMatrix> =
        link_rotations.iter().map(SymMatrix::doubled).collect();

    let mut down_to_zero = SymMatrix::doubled(&SymMatrix3::identity());
    for rotation in &doubled_rotations {
        // Simplify immediately: each multiply reintroduces product pairs
        // that the identity rewriter can collapse.
        down_to_zero = down_to_zero.mul(rotation).map(|e| simplify(e));
    }

    let final_jacobian = down_to_zero.mul(jacobian).map(|e| simplify(e));
    (
        FrameConversion {
            doubled_rotations,
            down_to_zero,
        },
        final_jacobian,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
