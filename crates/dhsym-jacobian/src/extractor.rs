//! Per-joint rate-coefficient extraction.
//!
//! Every additive term of a correctly propagated velocity expression is
//! linear in exactly one joint rate. Extraction splits the expanded
//! expression into terms, assigns each to the joint whose rate symbol it
//! carries, and strips the symbol to leave the Jacobian row entry. Terms
//! carrying no rate symbol indicate a derivation inconsistency; they are
//! counted, logged, and dropped (non-fatal).

use tracing::warn;

use dhsym_expr::{Expr, Var};

use crate::propagator::PropagatedVelocity;

/// One of the six Cartesian velocity components, in fixed row order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityComponent {
    Vx,
    Vy,
    Vz,
    Wx,
    Wy,
    Wz,
}

impl VelocityComponent {
    pub const ALL: [Self; 6] = [Self::Vx, Self::Vy, Self::Vz, Self::Wx, Self::Wy, Self::Wz];

    /// Row index in the Jacobian (`[vx, vy, vz, wx, wy, wz]`).
    pub const fn index(self) -> usize {
        match self {
            Self::Vx => 0,
            Self::Vy => 1,
            Self::Vz => 2,
            Self::Wx => 3,
            Self::Wy => 4,
            Self::Wz => 5,
        }
    }

    /// Select this component's scalar expression from the propagated pair.
    pub fn select(self, velocity: &PropagatedVelocity) -> &Expr {
        match self {
            Self::Vx => velocity.v.x(),
            Self::Vy => velocity.v.y(),
            Self::Vz => velocity.v.z(),
            Self::Wx => velocity.omega.x(),
            Self::Wy => velocity.omega.y(),
            Self::Wz => velocity.omega.z(),
        }
    }
}

/// One Jacobian row: a rate coefficient per joint, plus the count of
/// dropped rate-free residual terms.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianRow {
    pub entries: Vec<Expr>,
    pub residual_terms: usize,
}

/// Extract the per-joint rate coefficients of one velocity component.
///
/// `rates` holds each actuated joint's rate symbol in column order
/// (`td{k}` for revolute, `dd{k}` for prismatic).
pub fn extract_row(expr: &Expr, rates: &[Var]) -> JacobianRow {
    let mut buckets: Vec<Vec<Expr>> = vec![Vec::new(); rates.len()];
    let mut residual_terms = 0usize;

    for term in expr.expand().into_terms() {
        if term.is_zero() {
            continue;
        }
        match strip_rate_symbol(term, rates) {
            Some((column, coefficient)) => buckets[column].push(coefficient),
            None => residual_terms += 1,
        }
    }

    if residual_terms > 0 {
        warn!(
            residual_terms,
            "dropped rate-free terms during extraction; derivation may be inconsistent"
        );
    }

    JacobianRow {
        entries: buckets.into_iter().map(Expr::sum).collect(),
        residual_terms,
    }
}

/// Find the joint rate symbol a term is linear in, and strip one
/// occurrence of it (replacing the factor with the implicit identity).
fn strip_rate_symbol(term: Expr, rates: &[Var]) -> Option<(usize, Expr)> {
    let mut factors = match term {
        Expr::Product(factors) => factors,
        other => vec![other],
    };

    let hit = factors.iter().enumerate().find_map(|(i, factor)| {
        let Expr::Sym(var) = factor else { return None };
        rates.iter().position(|r| r == var).map(|col| (i, col))
    });

    let (factor_index, column) = hit?;
    factors.remove(factor_index);
    Some((column, Expr::product(factors)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
