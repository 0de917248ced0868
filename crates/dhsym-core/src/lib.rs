// dhsym-core: robot description, DH types, errors, and numeric forward
// kinematics for the dhsym symbolic Jacobian workspace.

pub mod config;
pub mod error;
pub mod types;

pub use error::{ConfigError, SpecError};
pub use types::{DhRow, JointKind, JointSpec, RobotDescription, TopologyVersion};

pub mod prelude {
    pub use crate::error::{ConfigError, SpecError};
    pub use crate::types::{DhRow, JointKind, JointSpec, RobotDescription, TopologyVersion};
}
