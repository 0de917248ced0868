use thiserror::Error;

use dhsym_core::SpecError;
use dhsym_expr::EvalError;

/// Top-level error for Jacobian derivation and evaluation.
#[derive(Debug, Error)]
pub enum DeriveError {
    #[error("specification error: {0}")]
    Spec(#[from] SpecError),

    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),
}
