//! Workflow documents as authored
//!
//! These types mirror the YAML workflow format field for field. Fields
//! the engine does not interpret (`goal`, `purpose`, `mapping_ref`, ...)
//! are kept in `extra` so a patched document renders back faithfully.

use capability_types::Risk;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A workflow as authored
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Ontology version the workflow was authored against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ontology_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    /// Declared overall risk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<Risk>,
    /// Schema of the `input` namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Value>,
    /// Parallel groups and their join strategies
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parallel_groups: IndexMap<String, ParallelGroupDocument>,
    #[serde(default)]
    pub steps: Vec<StepDocument>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// A step as authored
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_as: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub input_bindings: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_group: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gates: Vec<GateDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure_modes: Vec<FailureModeDocument>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl StepDocument {
    pub fn new(capability: impl Into<String>, store_as: impl Into<String>) -> Self {
        Self {
            capability: Some(capability.into()),
            store_as: Some(store_as.into()),
            ..Self::default()
        }
    }

    pub fn with_binding(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.input_bindings.insert(field.into(), value.into());
        self
    }
}

/// A halt condition evaluated before a step runs
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GateDocument {
    #[serde(default, alias = "condition")]
    pub when: String,
    #[serde(default = "default_gate_action")]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

fn default_gate_action() -> String {
    "stop".into()
}

/// A recovery edge taken when a step fails
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureModeDocument {
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goto_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_loops: Option<u32>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// A parallel group declaration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParallelGroupDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}
