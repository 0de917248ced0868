use thiserror::Error;

/// Robot specification errors.
///
/// All of these are rejected before any symbolic derivation starts; a
/// description that validates is guaranteed to produce a well-formed
/// Jacobian derivation (though not necessarily a fast one).
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("joint kind sequence has {kinds} entries but DH table has {rows} rows")]
    LengthMismatch { kinds: usize, rows: usize },

    #[error("robot needs at least one actuated joint before the end-effector")]
    TooFewJoints,

    #[error("final row must be the end-effector, found {0}")]
    MissingEndEffector(String),

    #[error("row {index}: end-effector may only appear as the final row")]
    EarlyEndEffector { index: usize },

    #[error("row {index}: non-finite DH constant {field} = {value}")]
    NonFiniteParameter {
        index: usize,
        field: &'static str,
        value: f64,
    },

    #[error("expected {expected} joint values, got {got}")]
    JointCountMismatch { expected: usize, got: usize },
}

/// Configuration (robot description file) errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid robot description: {0}")]
    Spec(#[from] SpecError),
}
