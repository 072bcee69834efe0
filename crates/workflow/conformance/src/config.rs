//! Checker configuration
//!
//! Loaded from TOML; every field has a default so a partial file (or no
//! file at all) is valid.

use crate::errors::ConfigError;
use capability_ontology::DEFAULT_MAX_REF_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::Path;
use workflow_dsl::DEFAULT_MAX_LOOPS_CAP;
use workflow_types::INPUT_NAMESPACE;

/// What to do when a workflow targets another ontology major version
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionPolicy {
    /// Report an L1 error and stop checking the workflow
    #[default]
    Refuse,
    /// Report a warning and keep checking
    Warn,
}

/// Conformance checker configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConformanceConfig {
    /// Depth bound for `$ref` chains
    pub max_ref_depth: usize,
    /// Largest accepted `max_loops` on a recovery loop
    pub max_loops_cap: u32,
    /// Report mutations without a checkpoint as errors instead of warnings
    pub strict_checkpoints: bool,
    pub version_policy: VersionPolicy,
    /// Capabilities that count as a checkpoint before a mutation
    pub checkpoint_capabilities: Vec<String>,
    /// Capabilities that send data outside the workflow
    pub send_capabilities: Vec<String>,
    /// Capabilities that safeguard a later send
    pub safeguard_capabilities: Vec<String>,
    /// Producer name addressing the workflow's own inputs
    pub input_namespace: String,
}

impl Default for ConformanceConfig {
    fn default() -> Self {
        Self {
            max_ref_depth: DEFAULT_MAX_REF_DEPTH,
            max_loops_cap: DEFAULT_MAX_LOOPS_CAP,
            strict_checkpoints: false,
            version_policy: VersionPolicy::Refuse,
            checkpoint_capabilities: vec!["checkpoint".into()],
            send_capabilities: vec!["send".into()],
            safeguard_capabilities: vec!["constrain".into(), "checkpoint".into()],
            input_namespace: INPUT_NAMESPACE.into(),
        }
    }
}

impl ConformanceConfig {
    /// Load configuration from a TOML file
    pub fn load_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn with_strict_checkpoints(mut self, strict: bool) -> Self {
        self.strict_checkpoints = strict;
        self
    }

    pub fn with_version_policy(mut self, policy: VersionPolicy) -> Self {
        self.version_policy = policy;
        self
    }

    pub fn is_checkpoint(&self, capability: &str) -> bool {
        self.checkpoint_capabilities.iter().any(|c| c == capability)
    }

    pub fn is_send(&self, capability: &str) -> bool {
        self.send_capabilities.iter().any(|c| c == capability)
    }

    pub fn is_safeguard(&self, capability: &str) -> bool {
        self.safeguard_capabilities.iter().any(|c| c == capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ConformanceConfig::default();
        assert_eq!(config.max_ref_depth, 32);
        assert_eq!(config.version_policy, VersionPolicy::Refuse);
        assert!(config.is_checkpoint("checkpoint"));
        assert!(config.is_safeguard("constrain"));
        assert!(config.is_send("send"));
        assert_eq!(config.input_namespace, "input");
    }

    #[test]
    fn test_partial_toml() {
        let config = ConformanceConfig::from_toml_str(
            "strict_checkpoints = true\nversion_policy = \"warn\"\nsend_capabilities = [\"send\", \"notify\"]\n",
        )
        .unwrap();
        assert!(config.strict_checkpoints);
        assert_eq!(config.version_policy, VersionPolicy::Warn);
        assert!(config.is_send("notify"));
        assert_eq!(config.max_loops_cap, 10);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            ConformanceConfig::from_toml_str("max_ref_depth = \"deep\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"max_loops_cap = 4\n").unwrap();
        let config = ConformanceConfig::load_path(file.path()).unwrap();
        assert_eq!(config.max_loops_cap, 4);

        assert!(matches!(
            ConformanceConfig::load_path("/nonexistent/capcheck.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
