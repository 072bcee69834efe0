//! Coercion registry: declared safe type conversions
//!
//! Each entry maps a `(source type, target type)` pair, keyed by the
//! canonical type-expression rendering, to the capability that performs
//! the conversion. The patch synthesizer consults it for type mismatches.

use crate::{Ontology, RegistryError, RegistryResult};
use capability_types::{parse_type, CapabilityId, PathSegment, SchemaNode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

fn default_input_field() -> String {
    "source".into()
}

fn default_output_field() -> String {
    "result".into()
}

/// A coercion entry as authored
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoercionDocument {
    pub from: String,
    pub to: String,
    /// Capability inserted to perform the conversion
    #[serde(alias = "transform")]
    pub capability: String,
    /// Input field of the coercion capability receiving the value
    #[serde(default = "default_input_field")]
    pub input_field: String,
    /// Output field of the coercion capability carrying the result
    #[serde(default = "default_output_field")]
    pub output_field: String,
    /// Static bindings added to the inserted step
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    coercions: Vec<CoercionDocument>,
}

/// A registered coercion
#[derive(Clone, Debug, PartialEq)]
pub struct CoercionRule {
    pub from: SchemaNode,
    pub to: SchemaNode,
    pub capability: CapabilityId,
    pub input_field: String,
    pub output_field: String,
    pub params: BTreeMap<String, Value>,
    pub description: String,
}

/// All registered coercions, keyed by canonical `(from, to)` type names
#[derive(Clone, Debug, Default)]
pub struct CoercionRegistry {
    rules: BTreeMap<(String, String), CoercionRule>,
}

impl CoercionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry from a YAML or JSON file
    pub fn load_path(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Load a registry from YAML or JSON text
    pub fn from_yaml_str(text: &str) -> RegistryResult<Self> {
        let document: RegistryDocument = serde_yaml::from_str(text)?;
        let mut registry = Self::new();
        for entry in document.coercions {
            registry.register(entry)?;
        }
        tracing::debug!(coercions = registry.len(), "Coercion registry loaded");
        Ok(registry)
    }

    /// Register a coercion; the `(from, to)` pair must be new
    pub fn register(&mut self, entry: CoercionDocument) -> RegistryResult<()> {
        let invalid = |source| RegistryError::InvalidType {
            from: entry.from.clone(),
            to: entry.to.clone(),
            source,
        };
        let from = parse_type(&entry.from).map_err(invalid)?;
        let to = parse_type(&entry.to).map_err(invalid)?;

        let key = (from.to_string(), to.to_string());
        if self.rules.contains_key(&key) {
            return Err(RegistryError::Duplicate {
                from: key.0,
                to: key.1,
            });
        }

        self.rules.insert(
            key,
            CoercionRule {
                from,
                to,
                capability: CapabilityId::new(entry.capability),
                input_field: entry.input_field,
                output_field: entry.output_field,
                params: entry.params,
                description: entry.description,
            },
        );
        Ok(())
    }

    /// Check every coercion against the ontology: the capability must
    /// exist, its input field must take the source type and its output
    /// field must be able to carry the target type
    pub fn validate_against(&self, ontology: &Ontology) -> RegistryResult<()> {
        for ((from, to), rule) in &self.rules {
            let Some(capability) = ontology.get(rule.capability.as_str()) else {
                return Err(RegistryError::UnknownCapability {
                    from: from.clone(),
                    to: to.clone(),
                    capability: rule.capability.0.clone(),
                });
            };

            let incompatible = |field: &str, declared: String| RegistryError::IncompatibleField {
                from: from.clone(),
                to: to.clone(),
                capability: rule.capability.0.clone(),
                field: field.to_string(),
                declared,
            };

            // An undeclared field on an open object walks to `unknown`
            let input = capability
                .input
                .walk(&[PathSegment::Field(rule.input_field.clone())])
                .map_err(|e| incompatible(&rule.input_field, e.to_string()))?;
            if !input.accepts(&rule.from) {
                return Err(incompatible(&rule.input_field, input.to_string()));
            }

            let output = capability
                .output
                .walk(&[PathSegment::Field(rule.output_field.clone())])
                .map_err(|e| incompatible(&rule.output_field, e.to_string()))?;
            if !output.admits(&rule.to) {
                return Err(incompatible(&rule.output_field, output.to_string()));
            }
        }
        Ok(())
    }

    /// Find the coercion converting `found` into `expected`
    pub fn lookup(&self, found: &SchemaNode, expected: &SchemaNode) -> Option<&CoercionRule> {
        self.rules.get(&(found.to_string(), expected.to_string()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in key order
    pub fn rules(&self) -> impl Iterator<Item = &CoercionRule> {
        self.rules.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OntologyLoader;
    use capability_types::ObjectSchema;

    const REGISTRY: &str = r#"
coercions:
  - from: "array<string>"
    to: "array<object>"
    capability: transform
    params:
      mapping_ref: "mappings/path_to_record.yaml"
  - from: integer
    to: string
    capability: transform
    input_field: value
    output_field: text
"#;

    #[test]
    fn test_load_and_lookup() {
        let registry = CoercionRegistry::from_yaml_str(REGISTRY).unwrap();
        assert_eq!(registry.len(), 2);

        let found = SchemaNode::array_of(SchemaNode::string());
        let expected = SchemaNode::array_of(SchemaNode::Object(
            ObjectSchema::closed().with_field("path", SchemaNode::string(), true),
        ));
        let rule = registry.lookup(&found, &expected).unwrap();
        assert_eq!(rule.capability.as_str(), "transform");
        assert_eq!(rule.input_field, "source");
        assert_eq!(rule.output_field, "result");
        assert!(rule.params.contains_key("mapping_ref"));

        let rule = registry
            .lookup(&SchemaNode::integer(), &SchemaNode::string())
            .unwrap();
        assert_eq!(rule.output_field, "text");

        assert!(registry
            .lookup(&SchemaNode::string(), &SchemaNode::integer())
            .is_none());
    }

    #[test]
    fn test_whitespace_normalized() {
        let registry = CoercionRegistry::from_yaml_str(
            "coercions:\n  - {from: \"array< string >\", to: \"array<object>\", capability: transform}\n",
        )
        .unwrap();
        assert!(registry
            .lookup(
                &SchemaNode::array_of(SchemaNode::string()),
                &SchemaNode::array_of(SchemaNode::Object(ObjectSchema::open()))
            )
            .is_some());
    }

    #[test]
    fn test_duplicate_rejected() {
        let text = format!(
            "{}  - {{from: \"integer\", to: \"string\", capability: other}}\n",
            REGISTRY
        );
        assert!(matches!(
            CoercionRegistry::from_yaml_str(&text),
            Err(RegistryError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_invalid_type_rejected() {
        let text = "coercions:\n  - {from: strng, to: string, capability: transform}\n";
        assert!(matches!(
            CoercionRegistry::from_yaml_str(text),
            Err(RegistryError::InvalidType { .. })
        ));
    }

    #[test]
    fn test_validate_against_ontology() {
        let registry = CoercionRegistry::from_yaml_str(REGISTRY).unwrap();
        let with_transform = OntologyLoader::new()
            .load_str("nodes:\n  - {id: transform, layer: synthesize}\n")
            .unwrap();
        assert!(registry.validate_against(&with_transform).is_ok());

        let without = OntologyLoader::new()
            .load_str("nodes:\n  - {id: search, layer: perceive}\n")
            .unwrap();
        assert!(matches!(
            registry.validate_against(&without),
            Err(RegistryError::UnknownCapability { .. })
        ));
    }

    #[test]
    fn test_validate_field_types() {
        let ontology = OntologyLoader::new()
            .load_str(
                r#"
nodes:
  - id: transform
    layer: synthesize
    input_schema:
      type: object
      properties:
        source: {type: array, items: {type: string}}
    output_schema:
      type: object
      properties:
        result: {type: object}
"#,
            )
            .unwrap();

        let wrong_output = CoercionRegistry::from_yaml_str(
            "coercions:\n  - {from: \"array<string>\", to: string, capability: transform}\n",
        )
        .unwrap();
        match wrong_output.validate_against(&ontology) {
            Err(RegistryError::IncompatibleField { field, declared, .. }) => {
                assert_eq!(field, "result");
                assert_eq!(declared, "object");
            }
            other => panic!("expected IncompatibleField, got {:?}", other),
        }

        let wrong_input = CoercionRegistry::from_yaml_str(
            "coercions:\n  - {from: integer, to: object, capability: transform}\n",
        )
        .unwrap();
        assert!(matches!(
            wrong_input.validate_against(&ontology),
            Err(RegistryError::IncompatibleField { field, .. }) if field == "source"
        ));

        let undeclared = CoercionRegistry::from_yaml_str(
            "coercions:\n  - {from: \"array<string>\", to: object, capability: transform, output_field: payload}\n",
        )
        .unwrap();
        assert!(matches!(
            undeclared.validate_against(&ontology),
            Err(RegistryError::IncompatibleField { field, .. }) if field == "payload"
        ));

        let fitting = CoercionRegistry::from_yaml_str(
            "coercions:\n  - {from: \"array<string>\", to: object, capability: transform}\n",
        )
        .unwrap();
        assert!(fitting.validate_against(&ontology).is_ok());
    }

    #[test]
    fn test_empty_registry() {
        let registry = CoercionRegistry::from_yaml_str("coercions: []\n").unwrap();
        assert!(registry.is_empty());
    }
}
