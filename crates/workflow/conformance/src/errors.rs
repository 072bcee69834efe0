//! Error types for the conformance engine

use std::path::PathBuf;

/// Errors raised while loading checker configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors raised while applying or rendering patches and reports
#[derive(Debug, thiserror::Error)]
pub enum ConformanceError {
    #[error("Patch target step not found: {0}")]
    StepNotFound(String),

    #[error("Patch target binding not found: {step}.{field}")]
    BindingNotFound { step: String, field: String },

    #[error("Failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for conformance operations
pub type ConformanceResult<T> = Result<T, ConformanceError>;
