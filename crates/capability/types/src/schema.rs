//! Resolved schema nodes and structural type compatibility
//!
//! A SchemaNode is what remains of a JSON-Schema-like declaration once
//! every `$ref` has been followed. Unions are kept as authored so that
//! inference can tell when it cannot pick a unique type.

use crate::PathError;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::fmt;

/// Primitive scalar types
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrimitiveType {
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl PrimitiveType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }

    /// Integers are numbers; every other primitive only accepts itself
    pub fn accepts(&self, found: PrimitiveType) -> bool {
        *self == found || (*self == Self::Number && found == Self::Integer)
    }
}

/// Object type: ordered fields plus the set of required field names
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectSchema {
    /// Declared fields in declaration order
    pub fields: IndexMap<String, SchemaNode>,
    /// Names of required fields
    pub required: BTreeSet<String>,
    /// Whether fields beyond the declared ones may appear
    pub open: bool,
}

impl ObjectSchema {
    /// A generic object with no declared fields
    pub fn open() -> Self {
        Self {
            fields: IndexMap::new(),
            required: BTreeSet::new(),
            open: true,
        }
    }

    /// An object accepting only its declared fields
    pub fn closed() -> Self {
        Self {
            fields: IndexMap::new(),
            required: BTreeSet::new(),
            open: false,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, node: SchemaNode, required: bool) -> Self {
        let name = name.into();
        if required {
            self.required.insert(name.clone());
        }
        self.fields.insert(name, node);
        self
    }

    /// Whether this object declares no shape at all
    pub fn is_generic(&self) -> bool {
        self.open && self.fields.is_empty()
    }
}

/// A `$ref`-free type description
#[derive(Clone, Debug, PartialEq)]
pub enum SchemaNode {
    /// No constraint at all (the empty schema)
    Any,
    /// Explicitly declared as unknown; inference cannot type it
    Unknown,
    Primitive(PrimitiveType),
    Object(ObjectSchema),
    Array(Box<SchemaNode>),
    /// Candidate types in declaration order
    Union(Vec<SchemaNode>),
}

/// One segment of a field path
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A named object field
    Field(String),
    /// An array element (`[0]` or `[]`)
    Element,
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Element => f.write_str("[]"),
        }
    }
}

/// Render a path as `a.b[].c`
pub fn display_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Field(name) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(name);
            }
            PathSegment::Element => out.push_str("[]"),
        }
    }
    out
}

impl SchemaNode {
    pub fn string() -> Self {
        Self::Primitive(PrimitiveType::String)
    }

    pub fn number() -> Self {
        Self::Primitive(PrimitiveType::Number)
    }

    pub fn integer() -> Self {
        Self::Primitive(PrimitiveType::Integer)
    }

    pub fn boolean() -> Self {
        Self::Primitive(PrimitiveType::Boolean)
    }

    pub fn array_of(element: SchemaNode) -> Self {
        Self::Array(Box::new(element))
    }

    /// Infer the type of a literal value
    pub fn of_value(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Primitive(PrimitiveType::Null),
            serde_json::Value::Bool(_) => Self::boolean(),
            serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => Self::integer(),
            serde_json::Value::Number(_) => Self::number(),
            serde_json::Value::String(_) => Self::string(),
            serde_json::Value::Array(_) => Self::array_of(Self::Any),
            serde_json::Value::Object(_) => Self::Object(ObjectSchema::open()),
        }
    }

    /// Look up a declared field on an object node
    pub fn field(&self, name: &str) -> Option<&SchemaNode> {
        match self {
            Self::Object(object) => object.fields.get(name),
            _ => None,
        }
    }

    /// Whether inference cannot determine a unique type for this node
    pub fn is_ambiguous(&self) -> bool {
        match self {
            Self::Union(_) | Self::Unknown => true,
            Self::Array(element) => element.is_ambiguous(),
            _ => false,
        }
    }

    /// Walk a field path into this node.
    ///
    /// Walking through a union keeps every arm that declares the path;
    /// the result is a union again when more than one distinct type
    /// survives.
    pub fn walk(&self, path: &[PathSegment]) -> Result<SchemaNode, PathError> {
        let Some((segment, rest)) = path.split_first() else {
            return Ok(self.clone());
        };

        match (self, segment) {
            (Self::Any, _) => Ok(Self::Any),
            (Self::Unknown, _) => Ok(Self::Unknown),
            (Self::Union(arms), _) => {
                let mut found: Vec<SchemaNode> = Vec::new();
                let mut first_error = None;
                for arm in arms {
                    match arm.walk(path) {
                        Ok(node) => {
                            if !found.contains(&node) {
                                found.push(node);
                            }
                        }
                        Err(e) => {
                            first_error.get_or_insert(e);
                        }
                    }
                }
                match found.len() {
                    0 => Err(first_error.unwrap_or(PathError::UnknownField {
                        field: segment.to_string(),
                        on: self.to_string(),
                    })),
                    1 => Ok(found.remove(0)),
                    _ => Ok(Self::Union(found)),
                }
            }
            (Self::Object(object), PathSegment::Field(name)) => match object.fields.get(name) {
                Some(node) => node.walk(rest),
                None if object.open => Ok(Self::Unknown),
                None => Err(PathError::UnknownField {
                    field: name.clone(),
                    on: self.to_string(),
                }),
            },
            (Self::Array(element), PathSegment::Element) => element.walk(rest),
            (_, PathSegment::Element) => Err(PathError::NotAnArray {
                on: self.to_string(),
            }),
            (_, PathSegment::Field(name)) => Err(PathError::NotAnObject {
                field: name.clone(),
                on: self.to_string(),
            }),
        }
    }

    /// Whether a value of type `found` may flow into a slot of this type
    pub fn accepts(&self, found: &SchemaNode) -> bool {
        match (self, found) {
            (Self::Any, _) | (_, Self::Any) | (Self::Unknown, _) => true,
            (_, Self::Unknown) => false,
            (_, Self::Union(arms)) => arms.iter().all(|arm| self.accepts(arm)),
            (Self::Union(arms), _) => arms.iter().any(|arm| arm.accepts(found)),
            (Self::Primitive(expected), Self::Primitive(actual)) => expected.accepts(*actual),
            (Self::Array(expected), Self::Array(actual)) => expected.accepts(actual),
            (Self::Object(expected), Self::Object(actual)) => {
                object_accepts(expected, actual)
            }
            _ => false,
        }
    }

    /// Whether an explicit annotation agrees with this inferred node.
    ///
    /// For unions the annotation must agree with at least one arm.
    pub fn admits(&self, annotated: &SchemaNode) -> bool {
        match self {
            Self::Any | Self::Unknown => true,
            Self::Union(arms) => arms.iter().any(|arm| arm.admits(annotated)),
            Self::Array(element) => match annotated {
                Self::Array(annotated_element) => element.admits(annotated_element),
                Self::Any => true,
                _ => false,
            },
            _ => annotated.accepts(self) || self.accepts(annotated),
        }
    }
}

fn object_accepts(expected: &ObjectSchema, actual: &ObjectSchema) -> bool {
    if expected.is_generic() || actual.is_generic() {
        return true;
    }
    for (name, expected_field) in &expected.fields {
        match actual.fields.get(name) {
            Some(actual_field) => {
                if !expected_field.accepts(actual_field) {
                    return false;
                }
            }
            None if expected.required.contains(name) => return false,
            None => {}
        }
    }
    if !expected.open {
        return actual.fields.keys().all(|k| expected.fields.contains_key(k));
    }
    true
}

impl fmt::Display for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Unknown => f.write_str("unknown"),
            Self::Primitive(p) => f.write_str(p.as_str()),
            Self::Object(_) => f.write_str("object"),
            Self::Array(element) => write!(f, "array<{}>", element),
            Self::Union(arms) => {
                for (i, arm) in arms.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{}", arm)?;
                }
                Ok(())
            }
        }
    }
}
