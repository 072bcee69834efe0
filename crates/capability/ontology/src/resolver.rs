//! Schema resolver: raw schema values to `$ref`-free SchemaNodes
//!
//! Raw schemas are JSON-Schema-like values. `$ref` pointers are followed
//! with an explicit reference stack: a pointer already on the stack is a
//! cycle, and a stack deeper than the configured bound is an error. Both
//! are reported, never truncated.
//!
//! Resolved references are cached per `(document, pointer)` for the
//! lifetime of the resolver.

use crate::SchemaError;
use capability_types::{parse_type, ObjectSchema, PrimitiveType, SchemaNode};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Default bound on nested `$ref` following
pub const DEFAULT_MAX_REF_DEPTH: usize = 32;

/// Identifier of the document a schema was authored in
pub const ROOT_DOCUMENT: &str = "";

/// Resolves raw schema values against a set of schema documents
#[derive(Clone, Debug)]
pub struct SchemaResolver {
    documents: HashMap<String, Value>,
    cache: HashMap<String, SchemaNode>,
    max_depth: usize,
}

impl SchemaResolver {
    /// Create a resolver whose root document is `root`
    pub fn new(root: Value) -> Self {
        let mut documents = HashMap::new();
        documents.insert(ROOT_DOCUMENT.to_string(), root);
        Self {
            documents,
            cache: HashMap::new(),
            max_depth: DEFAULT_MAX_REF_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Register an additional document addressable as `name#/pointer`
    pub fn add_document(&mut self, name: impl Into<String>, document: Value) {
        self.documents.insert(name.into(), document);
    }

    /// Number of cached reference resolutions
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Resolve a raw schema authored in the root document
    pub fn resolve(&mut self, raw: &Value) -> Result<SchemaNode, SchemaError> {
        let mut stack = Vec::new();
        self.resolve_value(ROOT_DOCUMENT, raw, &mut stack)
    }

    /// Resolve a single `$ref` string such as `#/definitions/FileList`
    pub fn resolve_ref(&mut self, reference: &str) -> Result<SchemaNode, SchemaError> {
        let mut stack = Vec::new();
        self.follow_ref(ROOT_DOCUMENT, reference, &mut stack)
    }

    fn resolve_value(
        &mut self,
        document: &str,
        raw: &Value,
        stack: &mut Vec<String>,
    ) -> Result<SchemaNode, SchemaError> {
        match raw {
            Value::Bool(true) | Value::Null => Ok(SchemaNode::Any),
            Value::Bool(false) => Ok(SchemaNode::Unknown),
            Value::String(shorthand) => parse_type(shorthand).map_err(|e| SchemaError::InvalidType {
                value: shorthand.clone(),
                reason: e.to_string(),
            }),
            Value::Object(map) => self.resolve_object(document, map, stack),
            other => Err(SchemaError::Malformed(format!(
                "expected a schema object, found {}",
                other
            ))),
        }
    }

    fn resolve_object(
        &mut self,
        document: &str,
        map: &Map<String, Value>,
        stack: &mut Vec<String>,
    ) -> Result<SchemaNode, SchemaError> {
        let node = if let Some(reference) = map.get("$ref") {
            let reference = reference
                .as_str()
                .ok_or_else(|| SchemaError::Malformed("$ref must be a string".into()))?;
            self.follow_ref(document, reference, stack)?
        } else if let Some(arms) = map.get("oneOf").or_else(|| map.get("anyOf")) {
            SchemaNode::Union(self.resolve_arms(document, arms, stack)?)
        } else if let Some(arms) = map.get("allOf") {
            let arms = self.resolve_arms(document, arms, stack)?;
            merge_all_of(arms)?
        } else if let Some(value) = map.get("const") {
            SchemaNode::of_value(value)
        } else if let Some(values) = map.get("enum") {
            resolve_enum(values)?
        } else {
            match map.get("type") {
                Some(Value::String(name)) => self.resolve_typed(document, name, map, stack)?,
                Some(Value::Array(names)) => {
                    let mut arms = Vec::with_capacity(names.len());
                    for name in names {
                        let name = name.as_str().ok_or_else(|| {
                            SchemaError::Malformed("type array must contain strings".into())
                        })?;
                        arms.push(self.resolve_typed(document, name, map, stack)?);
                    }
                    SchemaNode::Union(arms)
                }
                Some(other) => {
                    return Err(SchemaError::Malformed(format!(
                        "type must be a string or array, found {}",
                        other
                    )))
                }
                None if map.contains_key("properties") => {
                    self.resolve_typed(document, "object", map, stack)?
                }
                None if map.contains_key("items") => {
                    self.resolve_typed(document, "array", map, stack)?
                }
                None => SchemaNode::Any,
            }
        };

        if map.get("nullable").and_then(Value::as_bool) == Some(true) {
            return Ok(SchemaNode::Union(vec![
                node,
                SchemaNode::Primitive(PrimitiveType::Null),
            ]));
        }
        Ok(node)
    }

    fn resolve_typed(
        &mut self,
        document: &str,
        name: &str,
        map: &Map<String, Value>,
        stack: &mut Vec<String>,
    ) -> Result<SchemaNode, SchemaError> {
        match name {
            "object" => self.resolve_properties(document, map, stack),
            "array" => match map.get("items") {
                Some(items) => Ok(SchemaNode::array_of(
                    self.resolve_value(document, items, stack)?,
                )),
                None => Ok(SchemaNode::array_of(SchemaNode::Unknown)),
            },
            "unknown" => Ok(SchemaNode::Unknown),
            "any" => Ok(SchemaNode::Any),
            other => PrimitiveType::from_name(other)
                .map(SchemaNode::Primitive)
                .ok_or_else(|| SchemaError::InvalidType {
                    value: other.to_string(),
                    reason: "not a schema type".into(),
                }),
        }
    }

    fn resolve_properties(
        &mut self,
        document: &str,
        map: &Map<String, Value>,
        stack: &mut Vec<String>,
    ) -> Result<SchemaNode, SchemaError> {
        let properties = match map.get("properties") {
            Some(Value::Object(properties)) => Some(properties),
            Some(_) => return Err(SchemaError::Malformed("properties must be a mapping".into())),
            None => None,
        };

        // Objects that declare properties are closed unless they opt in
        // to additional properties; bare objects are open.
        let open = match map.get("additionalProperties") {
            Some(Value::Bool(false)) => false,
            Some(_) => true,
            None => properties.map_or(true, |p| p.is_empty()),
        };

        let mut object = if open {
            ObjectSchema::open()
        } else {
            ObjectSchema::closed()
        };

        if let Some(required) = map.get("required") {
            let required = required
                .as_array()
                .ok_or_else(|| SchemaError::Malformed("required must be a list".into()))?;
            for name in required {
                let name = name
                    .as_str()
                    .ok_or_else(|| SchemaError::Malformed("required entries must be strings".into()))?;
                object.required.insert(name.to_string());
            }
        }

        if let Some(properties) = properties {
            for (name, raw) in properties {
                let node = self.resolve_value(document, raw, stack)?;
                object.fields.insert(name.clone(), node);
            }
        }

        Ok(SchemaNode::Object(object))
    }

    fn resolve_arms(
        &mut self,
        document: &str,
        arms: &Value,
        stack: &mut Vec<String>,
    ) -> Result<Vec<SchemaNode>, SchemaError> {
        let arms = arms
            .as_array()
            .ok_or_else(|| SchemaError::Malformed("composition must be a list".into()))?;
        arms.iter()
            .map(|arm| self.resolve_value(document, arm, stack))
            .collect()
    }

    fn follow_ref(
        &mut self,
        document: &str,
        reference: &str,
        stack: &mut Vec<String>,
    ) -> Result<SchemaNode, SchemaError> {
        let (target_document, pointer) = match reference.split_once('#') {
            Some(("", pointer)) => (document.to_string(), pointer.to_string()),
            Some((name, pointer)) => (name.to_string(), pointer.to_string()),
            None => (reference.to_string(), String::new()),
        };
        let key = format!("{}#{}", target_document, pointer);

        if let Some(node) = self.cache.get(&key) {
            return Ok(node.clone());
        }
        if let Some(start) = stack.iter().position(|k| k == &key) {
            let mut chain: Vec<&str> = stack[start..].iter().map(String::as_str).collect();
            chain.push(&key);
            return Err(SchemaError::Cycle {
                chain: chain.join(" -> "),
            });
        }
        if stack.len() >= self.max_depth {
            return Err(SchemaError::DepthExceeded {
                reference: reference.to_string(),
                limit: self.max_depth,
            });
        }

        let root = self
            .documents
            .get(&target_document)
            .ok_or_else(|| SchemaError::UnknownDocument {
                document: target_document.clone(),
                reference: reference.to_string(),
            })?;
        let target = root
            .pointer(&pointer)
            .cloned()
            .ok_or_else(|| SchemaError::UnresolvedPointer {
                reference: reference.to_string(),
            })?;

        stack.push(key.clone());
        let resolved = self.resolve_value(&target_document, &target, stack);
        stack.pop();

        let node = resolved?;
        self.cache.insert(key, node.clone());
        Ok(node)
    }
}

fn resolve_enum(values: &Value) -> Result<SchemaNode, SchemaError> {
    let values = values
        .as_array()
        .ok_or_else(|| SchemaError::Malformed("enum must be a list".into()))?;
    let mut arms: Vec<SchemaNode> = Vec::new();
    for value in values {
        let node = SchemaNode::of_value(value);
        if !arms.contains(&node) {
            arms.push(node);
        }
    }
    match arms.len() {
        0 => Err(SchemaError::Malformed("enum must not be empty".into())),
        1 => Ok(arms.remove(0)),
        _ => Ok(SchemaNode::Union(arms)),
    }
}

fn merge_all_of(arms: Vec<SchemaNode>) -> Result<SchemaNode, SchemaError> {
    let mut arms: Vec<SchemaNode> = arms
        .into_iter()
        .filter(|arm| *arm != SchemaNode::Any)
        .collect();

    match arms.len() {
        0 => return Ok(SchemaNode::Any),
        1 => return Ok(arms.remove(0)),
        _ => {}
    }

    if arms.iter().all(|arm| matches!(arm, SchemaNode::Object(_))) {
        let mut merged = ObjectSchema::open();
        let mut all_open = true;
        for arm in arms {
            if let SchemaNode::Object(object) = arm {
                all_open &= object.open;
                merged.required.extend(object.required);
                for (name, node) in object.fields {
                    merged.fields.entry(name).or_insert(node);
                }
            }
        }
        merged.open = all_open;
        return Ok(SchemaNode::Object(merged));
    }

    let first = arms[0].clone();
    if arms.iter().all(|arm| *arm == first) {
        return Ok(first);
    }
    Err(SchemaError::IncompatibleAllOf(
        arms.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use capability_types::PathSegment;
    use serde_json::json;

    fn definitions() -> Value {
        json!({
            "definitions": {
                "FileList": {"type": "array", "items": {"type": "string"}},
                "Match": {
                    "type": "object",
                    "properties": {
                        "path": {"type": "string"},
                        "line": {"type": "integer"}
                    },
                    "required": ["path"]
                },
                "Alias": {"$ref": "#/definitions/FileList"},
                "Loop": {"$ref": "#/definitions/Loop2"},
                "Loop2": {"$ref": "#/definitions/Loop"},
                "Tree": {
                    "type": "object",
                    "properties": {
                        "children": {"type": "array", "items": {"$ref": "#/definitions/Tree"}}
                    }
                }
            }
        })
    }

    #[test]
    fn test_resolve_ref() {
        let mut resolver = SchemaResolver::new(definitions());
        let node = resolver
            .resolve(&json!({"$ref": "#/definitions/FileList"}))
            .unwrap();
        assert_eq!(node, SchemaNode::array_of(SchemaNode::string()));

        let alias = resolver.resolve_ref("#/definitions/Alias").unwrap();
        assert_eq!(alias, node);
        assert_eq!(resolver.cached(), 2);
    }

    #[test]
    fn test_resolve_object_is_closed_and_ordered() {
        let mut resolver = SchemaResolver::new(definitions());
        let node = resolver.resolve_ref("#/definitions/Match").unwrap();
        let SchemaNode::Object(object) = &node else {
            panic!("expected object");
        };
        assert!(!object.open);
        assert_eq!(object.fields.keys().collect::<Vec<_>>(), vec!["path", "line"]);
        assert!(object.required.contains("path"));
        assert_eq!(
            node.walk(&[PathSegment::Field("line".into())]).unwrap(),
            SchemaNode::integer()
        );
    }

    #[test]
    fn test_unresolved_pointer() {
        let mut resolver = SchemaResolver::new(definitions());
        let err = resolver.resolve_ref("#/definitions/Missing").unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnresolvedPointer {
                reference: "#/definitions/Missing".into()
            }
        );
    }

    #[test]
    fn test_cycle_detected() {
        let mut resolver = SchemaResolver::new(definitions());
        let err = resolver.resolve_ref("#/definitions/Loop").unwrap_err();
        assert!(matches!(err, SchemaError::Cycle { .. }));

        let err = resolver.resolve_ref("#/definitions/Tree").unwrap_err();
        assert!(matches!(err, SchemaError::Cycle { ref chain } if chain.contains("Tree")));
    }

    #[test]
    fn test_depth_bound() {
        let mut chain = Map::new();
        for i in 0..10 {
            chain.insert(format!("D{}", i), json!({"$ref": format!("#/D{}", i + 1)}));
        }
        chain.insert("D10".into(), json!({"type": "string"}));

        let mut resolver = SchemaResolver::new(Value::Object(chain.clone())).with_max_depth(4);
        assert!(matches!(
            resolver.resolve_ref("#/D0"),
            Err(SchemaError::DepthExceeded { limit: 4, .. })
        ));

        let mut resolver = SchemaResolver::new(Value::Object(chain));
        assert_eq!(resolver.resolve_ref("#/D0").unwrap(), SchemaNode::string());
    }

    #[test]
    fn test_unions_preserved() {
        let mut resolver = SchemaResolver::new(json!({}));
        let node = resolver
            .resolve(&json!({"oneOf": [{"type": "string"}, {"type": "string"}]}))
            .unwrap();
        assert_eq!(
            node,
            SchemaNode::Union(vec![SchemaNode::string(), SchemaNode::string()])
        );

        let node = resolver.resolve(&json!({"type": ["string", "null"]})).unwrap();
        assert_eq!(node.to_string(), "string|null");

        let node = resolver
            .resolve(&json!({"type": "string", "nullable": true}))
            .unwrap();
        assert_eq!(node.to_string(), "string|null");
    }

    #[test]
    fn test_all_of_merges_objects() {
        let mut resolver = SchemaResolver::new(definitions());
        let node = resolver
            .resolve(&json!({"allOf": [
                {"$ref": "#/definitions/Match"},
                {"type": "object", "properties": {"score": {"type": "number"}}, "required": ["score"]}
            ]}))
            .unwrap();
        let SchemaNode::Object(object) = node else {
            panic!("expected object");
        };
        assert_eq!(object.fields.len(), 3);
        assert!(object.required.contains("path"));
        assert!(object.required.contains("score"));

        let err = resolver
            .resolve(&json!({"allOf": [{"type": "string"}, {"type": "integer"}]}))
            .unwrap_err();
        assert!(matches!(err, SchemaError::IncompatibleAllOf(_)));
    }

    #[test]
    fn test_array_without_items_is_unresolved() {
        let mut resolver = SchemaResolver::new(json!({}));
        let node = resolver.resolve(&json!({"type": "array"})).unwrap();
        assert!(node.is_ambiguous());
        let shorthand = resolver.resolve(&json!("array")).unwrap();
        assert_eq!(shorthand, node);
    }

    #[test]
    fn test_shorthand_and_enum() {
        let mut resolver = SchemaResolver::new(json!({}));
        assert_eq!(
            resolver.resolve(&json!("array<string>")).unwrap(),
            SchemaNode::array_of(SchemaNode::string())
        );
        assert_eq!(
            resolver.resolve(&json!({"enum": ["low", "high"]})).unwrap(),
            SchemaNode::string()
        );
        assert!(matches!(
            resolver.resolve(&json!("strng")),
            Err(SchemaError::InvalidType { .. })
        ));
        assert_eq!(resolver.resolve(&json!({})).unwrap(), SchemaNode::Any);
    }

    #[test]
    fn test_external_document() {
        let mut resolver = SchemaResolver::new(json!({}));
        resolver.add_document(
            "common.json",
            json!({"Id": {"type": "string"}, "Ids": {"type": "array", "items": {"$ref": "#/Id"}}}),
        );
        assert_eq!(
            resolver.resolve_ref("common.json#/Ids").unwrap(),
            SchemaNode::array_of(SchemaNode::string())
        );
        assert!(matches!(
            resolver.resolve_ref("other.json#/Id"),
            Err(SchemaError::UnknownDocument { .. })
        ));
    }
}
