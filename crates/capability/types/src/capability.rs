//! Capabilities: typed, atomic agent operations
//!
//! A capability carries both its raw schema declarations (as authored in
//! the ontology document, possibly containing `$ref`) and the resolved
//! SchemaNodes the checker reasons over.

use crate::SchemaNode;
use serde::{Deserialize, Serialize};

// ── Identifiers ──────────────────────────────────────────────────────

/// Unique identifier for a capability
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityId(pub String);

impl CapabilityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether an id is syntactically well-formed: a lowercase letter
    /// followed by lowercase letters, digits, `_` or `-`.
    pub fn is_well_formed(id: &str) -> bool {
        let mut chars = id.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    }
}

impl std::fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::borrow::Borrow<str> for CapabilityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CapabilityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ── Layer ────────────────────────────────────────────────────────────

/// The cognitive layer a capability belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    #[serde(alias = "PERCEIVE")]
    Perceive,
    #[serde(alias = "UNDERSTAND")]
    Understand,
    #[serde(alias = "REASON")]
    Reason,
    #[serde(alias = "MODEL")]
    Model,
    #[serde(alias = "SYNTHESIZE")]
    Synthesize,
    #[serde(alias = "EXECUTE")]
    Execute,
    #[serde(alias = "VERIFY")]
    Verify,
    #[serde(alias = "REMEMBER")]
    Remember,
    #[serde(alias = "COORDINATE")]
    Coordinate,
}

impl Layer {
    /// All layers in their canonical order
    pub const ALL: [Layer; 9] = [
        Layer::Perceive,
        Layer::Understand,
        Layer::Reason,
        Layer::Model,
        Layer::Synthesize,
        Layer::Execute,
        Layer::Verify,
        Layer::Remember,
        Layer::Coordinate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Perceive => "perceive",
            Self::Understand => "understand",
            Self::Reason => "reason",
            Self::Model => "model",
            Self::Synthesize => "synthesize",
            Self::Execute => "execute",
            Self::Verify => "verify",
            Self::Remember => "remember",
            Self::Coordinate => "coordinate",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Risk ─────────────────────────────────────────────────────────────

/// Ordinal risk level of a capability or workflow
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    #[default]
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Risk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

// ── Capability ───────────────────────────────────────────────────────

/// A capability registered in the ontology
#[derive(Clone, Debug, PartialEq)]
pub struct Capability {
    /// Unique identifier
    pub id: CapabilityId,
    /// Cognitive layer
    pub layer: Layer,
    /// Risk level
    pub risk: Risk,
    /// Whether invoking the capability mutates external state
    pub mutation: bool,
    /// Whether invoking the capability requires human approval
    pub requires_approval: bool,
    /// Human-readable description
    pub description: String,
    /// Input schema as authored (may contain `$ref`)
    pub input_schema_ref: serde_json::Value,
    /// Output schema as authored (may contain `$ref`)
    pub output_schema_ref: serde_json::Value,
    /// Resolved input schema
    pub input: SchemaNode,
    /// Resolved output schema
    pub output: SchemaNode,
}

impl Capability {
    /// Create a low-risk, non-mutating capability with untyped schemas
    pub fn new(id: impl Into<String>, layer: Layer) -> Self {
        Self {
            id: CapabilityId::new(id),
            layer,
            risk: Risk::Low,
            mutation: false,
            requires_approval: false,
            description: String::new(),
            input_schema_ref: serde_json::Value::Object(Default::default()),
            output_schema_ref: serde_json::Value::Object(Default::default()),
            input: SchemaNode::Any,
            output: SchemaNode::Any,
        }
    }

    pub fn with_risk(mut self, risk: Risk) -> Self {
        self.risk = risk;
        self
    }

    pub fn with_mutation(mut self, mutation: bool) -> Self {
        self.mutation = mutation;
        self
    }

    pub fn with_approval(mut self, requires_approval: bool) -> Self {
        self.requires_approval = requires_approval;
        self
    }

    pub fn with_input(mut self, input: SchemaNode) -> Self {
        self.input = input;
        self
    }

    pub fn with_output(mut self, output: SchemaNode) -> Self {
        self.output = output;
        self
    }

    /// Declared type of an input field, if the input schema declares it
    pub fn input_field(&self, name: &str) -> Option<&SchemaNode> {
        self.input.field(name)
    }

    /// Whether the input schema accepts fields it does not declare
    pub fn accepts_undeclared_inputs(&self) -> bool {
        match &self.input {
            SchemaNode::Object(object) => object.open,
            _ => true,
        }
    }

    /// Names of the input fields the capability requires
    pub fn required_inputs(&self) -> Vec<&str> {
        match &self.input {
            SchemaNode::Object(object) => object.required.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }
}
