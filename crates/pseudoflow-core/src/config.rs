//! Generator configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default prefix of traversal-created label names (`l0`, `l1`, ...).
pub const DEFAULT_LABEL_PREFIX: &str = "l";

/// Settings for one construction session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Prefix of the debug names given to labels created through the builder.
    pub label_prefix: String,

    /// Abort when a subroutine is finalized with labels that were never bound.
    pub verify_labels: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
            verify_labels: true,
        }
    }
}

impl GeneratorConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;

    #[test]
    fn test_default_config() {
        let config = GeneratorConfig::default();
        assert_eq!(config.label_prefix, "l");
        assert!(config.verify_labels);
    }

    #[test]
    fn test_yaml_partial_uses_defaults() {
        let config = GeneratorConfig::from_yaml_str("label_prefix: L\n").unwrap();
        assert_eq!(config.label_prefix, "L");
        assert!(config.verify_labels);
    }

    #[test]
    fn test_json_config() {
        let config =
            GeneratorConfig::from_json_str(r#"{"label_prefix": "x", "verify_labels": false}"#)
                .unwrap();
        assert_eq!(
            config,
            GeneratorConfig {
                label_prefix: "x".to_string(),
                verify_labels: false,
            }
        );
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let err = GeneratorConfig::from_json_str(r#"{"verify_labels": "maybe"}"#).unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
    }
}
