//! Robot description loading from TOML.
//!
//! ```toml
//! name = "planar-3r"
//!
//! [[joint]]
//! kind = "revolute"
//! a = 0.0
//! alpha = 0.0
//!
//! [[joint]]
//! kind = "revolute"
//! a = 2.0
//!
//! [[joint]]
//! kind = "end-effector"
//! ```

use std::path::Path;

use crate::error::ConfigError;
use crate::types::RobotDescription;

impl RobotDescription {
    /// Parse and validate a robot description from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let desc: Self = toml::from_str(text)?;
        desc.validate()?;
        Ok(desc)
    }

    /// Load and validate a robot description from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::error::{ConfigError, SpecError};
    use crate::types::{JointKind, RobotDescription};

    const PLANAR_2R: &str = r#"
        name = "planar-2r"

        [[joint]]
        kind = "revolute"

        [[joint]]
        kind = "revolute"
        a = 2.0

        [[joint]]
        kind = "end-effector"
    "#;

    #[test]
    fn parses_planar_2r() {
        let desc = RobotDescription::from_toml_str(PLANAR_2R).unwrap();
        assert_eq!(desc.name, "planar-2r");
        assert_eq!(desc.dof(), 2);
        assert_eq!(desc.joints[0].kind, JointKind::Revolute);
        assert_eq!(desc.joints[1].row.a, 2.0);
        assert_eq!(desc.joints[2].kind, JointKind::EndEffector);
    }

    #[test]
    fn omitted_dh_fields_default_to_zero() {
        let desc = RobotDescription::from_toml_str(PLANAR_2R).unwrap();
        assert_eq!(desc.joints[0].row.a, 0.0);
        assert_eq!(desc.joints[0].row.alpha, 0.0);
        assert_eq!(desc.joints[0].row.d, 0.0);
        assert_eq!(desc.joints[0].row.theta, 0.0);
    }

    #[test]
    fn rejects_description_without_terminal_row() {
        let text = r#"
            [[joint]]
            kind = "revolute"
        "#;
        let err = RobotDescription::from_toml_str(text).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Spec(SpecError::MissingEndEffector(_))
        ));
    }

    #[test]
    fn rejects_unknown_joint_kind() {
        let text = r#"
            [[joint]]
            kind = "spherical"
        "#;
        assert!(matches!(
            RobotDescription::from_toml_str(text),
            Err(ConfigError::Toml(_))
        ));
    }
}
