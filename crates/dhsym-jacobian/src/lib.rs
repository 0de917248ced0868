//! Symbolic manipulator Jacobian derivation.
//!
//! Three pure stages turn a validated [`RobotDescription`] into a
//! [`FinalJacobianData`] artifact:
//!
//! ```text
//! RobotDescription ──► propagate ──► extract_row x6 ──► convert_to_base
//!                      (velocity)    (Jacobian rows)    (+ simplify)
//! ```
//!
//! [`derive_jacobian`] composes the stages synchronously; `dhsym-pipeline`
//! runs the same functions staged across worker threads with cancellation.
//! The numeric [`JacobianEvaluator`] substitutes live joint values into the
//! settled base-frame Jacobian at simulation rate.
//!
//! [`RobotDescription`]: dhsym_core::RobotDescription

pub mod artifact;
pub mod error;
pub mod eval;
pub mod extractor;
pub mod frame;
pub mod propagator;
pub mod simplify;

pub use artifact::{FinalJacobianData, derive_jacobian, derive_jacobian_versioned};
pub use error::DeriveError;
pub use eval::JacobianEvaluator;
pub use extractor::{JacobianRow, VelocityComponent, extract_row};
pub use frame::{FrameConversion, convert_to_base};
pub use propagator::{PropagatedVelocity, Propagation, propagate, position_symbols, rate_symbols};
pub use simplify::simplify;
