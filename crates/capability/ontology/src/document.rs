//! Ontology document model as authored in YAML or JSON

use capability_types::{Edge, Layer, Risk};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_version() -> String {
    "1.0.0".into()
}

fn empty_schema() -> Value {
    Value::Object(Default::default())
}

/// Top-level ontology document
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OntologyDocument {
    /// Semantic version of the ontology
    #[serde(default = "default_version")]
    pub version: String,
    /// Capability declarations
    #[serde(alias = "capabilities")]
    pub nodes: Vec<CapabilityDocument>,
    /// Typed edges between capabilities
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// A capability declaration as authored
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CapabilityDocument {
    pub id: String,
    pub layer: Layer,
    #[serde(default)]
    pub risk: Risk,
    #[serde(default)]
    pub mutation: bool,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_schema", alias = "input_schema_ref")]
    pub input_schema: Value,
    #[serde(default = "empty_schema", alias = "output_schema_ref")]
    pub output_schema: Value,
}
