//! DSL error types

use capability_types::TypeParseError;
use std::path::PathBuf;

/// Errors raised while parsing binding expressions or reading catalogs
#[derive(Debug, thiserror::Error)]
pub enum DslError {
    #[error("Parse error at column {col}: {message}")]
    ParseError { col: usize, message: String },

    #[error("Unexpected token: expected {expected}, found '{found}'")]
    UnexpectedToken { expected: String, found: String },

    #[error("Unexpected end of reference: expected {0}")]
    UnexpectedEof(String),

    #[error("Unterminated reference starting at column {0}")]
    UnterminatedReference(usize),

    #[error("Empty reference '${{}}'")]
    EmptyReference,

    #[error("Invalid type annotation '{annotation}': {source}")]
    InvalidAnnotation {
        annotation: String,
        source: TypeParseError,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Catalog is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Catalog must be a mapping of workflow names to workflows")]
    NotACatalog,
}

/// Result type alias for DSL operations
pub type DslResult<T> = Result<T, DslError>;
