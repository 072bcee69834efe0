//! Error types for ontology loading and schema resolution
//!
//! Every error here is a precondition failure: a malformed ontology,
//! schema or coercion registry makes the whole run meaningless, so these
//! are never reported as per-workflow findings.

use capability_types::{EdgeKind, TypeParseError};
use std::path::PathBuf;

/// Errors raised while resolving a raw schema into a SchemaNode
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("Unresolved schema pointer: '{reference}'")]
    UnresolvedPointer { reference: String },

    #[error("Unknown schema document '{document}' in reference '{reference}'")]
    UnknownDocument { document: String, reference: String },

    #[error("Schema reference cycle: {chain}")]
    Cycle { chain: String },

    #[error("Schema reference depth exceeded {limit} while resolving '{reference}'")]
    DepthExceeded { reference: String, limit: usize },

    #[error("Invalid type '{value}': {reason}")]
    InvalidType { value: String, reason: String },

    #[error("allOf arms cannot be merged: {0}")]
    IncompatibleAllOf(String),

    #[error("Malformed schema: {0}")]
    Malformed(String),
}

/// Which side of a capability a schema belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaSide {
    Input,
    Output,
}

impl std::fmt::Display for SchemaSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Errors that make an ontology unusable
#[derive(Debug, thiserror::Error)]
pub enum OntologyError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse ontology document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Ontology document does not match the expected shape: {0}")]
    Document(#[from] serde_json::Error),

    #[error("Invalid ontology version '{version}': {source}")]
    InvalidVersion {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("Duplicate capability id: {0}")]
    DuplicateCapability(String),

    #[error("Malformed capability id: '{0}'")]
    MalformedCapabilityId(String),

    #[error("Edge {from} -[{kind}]-> {to} references unknown capability '{missing}'")]
    UnknownEdgeEndpoint {
        from: String,
        to: String,
        kind: EdgeKind,
        missing: String,
    },

    #[error("Symmetric edge {from} -[{kind}]-> {to} has no reverse edge")]
    AsymmetricEdge {
        from: String,
        to: String,
        kind: EdgeKind,
    },

    #[error("Cycle in requires edges: {0}")]
    RequiresCycle(String),

    #[error("Cannot resolve {side} schema of capability '{capability}': {source}")]
    Schema {
        capability: String,
        side: SchemaSide,
        #[source]
        source: SchemaError,
    },
}

/// Result type alias for ontology operations
pub type OntologyResult<T> = Result<T, OntologyError>;

/// Errors raised while loading a coercion registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse coercion registry: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid type in coercion {from} -> {to}: {source}")]
    InvalidType {
        from: String,
        to: String,
        #[source]
        source: TypeParseError,
    },

    #[error("Duplicate coercion {from} -> {to}")]
    Duplicate { from: String, to: String },

    #[error("Coercion {from} -> {to} names unknown capability '{capability}'")]
    UnknownCapability {
        from: String,
        to: String,
        capability: String,
    },

    #[error("Coercion {from} -> {to} does not fit field '{field}' of capability '{capability}' ({declared})")]
    IncompatibleField {
        from: String,
        to: String,
        capability: String,
        field: String,
        declared: String,
    },
}

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
