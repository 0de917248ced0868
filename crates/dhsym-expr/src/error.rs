use thiserror::Error;

use crate::expr::Var;

/// Expression text parsing errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected character '{ch}' at byte {at}")]
    UnexpectedChar { ch: char, at: usize },

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unexpected token at byte {at}: expected {expected}")]
    UnexpectedToken { at: usize, expected: &'static str },

    #[error("unknown identifier '{0}'")]
    UnknownIdent(String),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("malformed matrix literal: {0}")]
    MalformedMatrix(String),
}

/// Numeric evaluation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("symbol {0} is not bound in the evaluation scope")]
    Unbound(Var),
}
