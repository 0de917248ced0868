// dhsym-expr: symbolic expression AST, expansion, evaluation, parsing, and
// symbolic matrices. This crate is the explicit replacement for the external
// computer-algebra oracle: construction-from-string, substitution, expand,
// evaluate, element access, and 3-vector cross product.

pub mod error;
pub mod expr;
pub mod matrix;
pub mod parse;

pub use error::{EvalError, ParseError};
pub use expr::{Expr, Scope, Trig, Var};
pub use matrix::{SymMatrix, SymMatrix3, SymVector3};
