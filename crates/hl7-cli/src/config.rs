//! CLI configuration file

use anyhow::{Context, Result};
use hl7_terser::{NavigationConfig, SegmentCopyPolicy};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings read from the `--config` YAML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Directories searched when `--structure` names a structure rather than a file
    pub structure_paths: Vec<PathBuf>,

    /// `tracing` filter used when neither `RUST_LOG` nor `-v` is given
    pub log_filter: Option<String>,

    pub navigation: NavigationConfig,

    /// Policy for `copy` when source and target segments differ
    pub copy_policy: SegmentCopyPolicy,
}

impl CliConfig {
    /// Read the configuration file, or the defaults when there is none
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl7_terser::RequiredBoundary;

    #[test]
    fn test_full_config() {
        let config = CliConfig::from_yaml(
            r#"
structure_paths: [defs, /etc/hl7]
log_filter: hl7_terser=debug
navigation:
  required_boundary: exclusive
copy_policy: overlapping_fields
"#,
        )
        .unwrap();

        assert_eq!(config.structure_paths, [PathBuf::from("defs"), PathBuf::from("/etc/hl7")]);
        assert_eq!(config.log_filter.as_deref(), Some("hl7_terser=debug"));
        assert_eq!(config.navigation.required_boundary, RequiredBoundary::Exclusive);
        assert_eq!(config.copy_policy, SegmentCopyPolicy::OverlappingFields);
    }

    #[test]
    fn test_defaults() {
        let config = CliConfig::from_yaml("  \n").unwrap();
        assert!(config.structure_paths.is_empty());
        assert_eq!(config.copy_policy, SegmentCopyPolicy::RequireMatchingSchema);

        let config = CliConfig::from_yaml("copy_policy: strict").unwrap();
        assert_eq!(config.navigation, NavigationConfig::default());
        assert!(CliConfig::load(None).unwrap().log_filter.is_none());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(CliConfig::from_yaml("color: neon").is_err());
        assert!(CliConfig::from_yaml("copy_policy: sometimes").is_err());
    }
}
