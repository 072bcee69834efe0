//! Parsed binding expressions
//!
//! A binding wires a value into one input field of a step. It is either a
//! single `${producer.path[:type]}` reference, a string template embedding
//! references, a structured value with references nested in its strings,
//! or a plain literal.

use capability_types::{display_path, PathSegment, SchemaNode};
use serde_json::Value;
use std::fmt;

/// Namespace of the workflow's own inputs (`${input.query}`)
pub const INPUT_NAMESPACE: &str = "input";

/// A `${producer.path[:type]}` reference
#[derive(Clone, Debug, PartialEq)]
pub struct Reference {
    /// `store_as` alias of the producing step, or the input namespace
    pub producer: String,
    /// Path into the producer's output
    pub path: Vec<PathSegment>,
    /// Explicit type annotation
    pub annotation: Option<SchemaNode>,
    /// The expression as written, including `${` and `}`
    pub raw: String,
}

impl Reference {
    pub fn new(producer: impl Into<String>, path: Vec<PathSegment>) -> Self {
        let producer = producer.into();
        let mut reference = Self {
            producer,
            path,
            annotation: None,
            raw: String::new(),
        };
        reference.raw = reference.render();
        reference
    }

    pub fn with_annotation(mut self, annotation: SchemaNode) -> Self {
        self.annotation = Some(annotation);
        self.raw = self.render();
        self
    }

    /// `producer.path` without the annotation
    pub fn target(&self) -> String {
        if self.path.is_empty() {
            return self.producer.clone();
        }
        let path = display_path(&self.path);
        if path.starts_with('[') {
            format!("{}{}", self.producer, path)
        } else {
            format!("{}.{}", self.producer, path)
        }
    }

    /// Canonical `${...}` form
    pub fn render(&self) -> String {
        match &self.annotation {
            Some(annotation) => format!("${{{}:{}}}", self.target(), annotation),
            None => format!("${{{}}}", self.target()),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A parsed input binding
#[derive(Clone, Debug, PartialEq)]
pub enum Binding {
    /// The whole value is one reference
    Reference(Reference),
    /// A string with embedded references
    Template {
        text: String,
        references: Vec<Reference>,
    },
    /// An array or object with references nested in its strings
    Composite {
        value: Value,
        references: Vec<Reference>,
    },
    /// Any other value
    Literal(Value),
}

impl Binding {
    /// Every reference this binding reads
    pub fn references(&self) -> &[Reference] {
        match self {
            Self::Reference(reference) => std::slice::from_ref(reference),
            Self::Template { references, .. } | Self::Composite { references, .. } => references,
            Self::Literal(_) => &[],
        }
    }
}

/// A condition or gate expression with the references it reads
#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    pub text: String,
    pub references: Vec<Reference>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_reference() {
        let reference = Reference::new(
            "search_out",
            vec![
                PathSegment::Field("matches".into()),
                PathSegment::Element,
                PathSegment::Field("path".into()),
            ],
        );
        assert_eq!(reference.target(), "search_out.matches[].path");
        assert_eq!(reference.to_string(), "${search_out.matches[].path}");

        let annotated = reference.with_annotation(SchemaNode::string());
        assert_eq!(annotated.to_string(), "${search_out.matches[].path:string}");
    }

    #[test]
    fn test_render_whole_output() {
        let reference = Reference::new("search_out", Vec::new());
        assert_eq!(reference.render(), "${search_out}");
        let element = Reference::new("items", vec![PathSegment::Element]);
        assert_eq!(element.render(), "${items[]}");
    }

    #[test]
    fn test_binding_references() {
        let reference = Reference::new("a", vec![PathSegment::Field("b".into())]);
        assert_eq!(Binding::Reference(reference.clone()).references().len(), 1);
        let template = Binding::Template {
            text: "x ${a.b} ${a.b}".into(),
            references: vec![reference.clone(), reference],
        };
        assert_eq!(template.references().len(), 2);
        assert!(Binding::Literal(Value::Bool(true)).references().is_empty());
    }
}
