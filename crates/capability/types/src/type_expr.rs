//! Type expressions: the textual form of schema nodes
//!
//! ```text
//! type   := single ('|' single)*
//! single := 'array' ('<' type '>')? | name      (bare 'array' is array<unknown>)
//! name   := string | number | integer | boolean | null | object | any | unknown
//! ```
//!
//! Parsing and `Display` on SchemaNode round-trip, so the rendered form
//! of a node is a canonical key (`array<string>`, `string|null`).

use crate::{ObjectSchema, PrimitiveType, SchemaNode, TypeParseError};

/// Parse a type expression into a schema node
pub fn parse_type(input: &str) -> Result<SchemaNode, TypeParseError> {
    let mut parser = TypeParser {
        input,
        chars: input.chars().filter(|c| !c.is_whitespace()).collect(),
        pos: 0,
    };
    if parser.chars.is_empty() {
        return Err(TypeParseError::Empty);
    }
    let node = parser.parse_union()?;
    if let Some(&c) = parser.chars.get(parser.pos) {
        return Err(TypeParseError::UnexpectedChar {
            input: input.to_string(),
            offset: parser.pos,
            found: c,
        });
    }
    Ok(node)
}

struct TypeParser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl TypeParser<'_> {
    fn parse_union(&mut self) -> Result<SchemaNode, TypeParseError> {
        let mut arms = vec![self.parse_single()?];
        while self.peek() == Some('|') {
            self.pos += 1;
            arms.push(self.parse_single()?);
        }
        if arms.len() == 1 {
            Ok(arms.remove(0))
        } else {
            Ok(SchemaNode::Union(arms))
        }
    }

    fn parse_single(&mut self) -> Result<SchemaNode, TypeParseError> {
        let name = self.read_name();
        if name.is_empty() {
            return match self.peek() {
                Some(c) => Err(TypeParseError::UnexpectedChar {
                    input: self.input.to_string(),
                    offset: self.pos,
                    found: c,
                }),
                None => Err(TypeParseError::Unterminated(self.input.to_string())),
            };
        }

        match name.as_str() {
            "array" => {
                // A bare `array` says nothing about its elements
                if self.peek() != Some('<') {
                    return Ok(SchemaNode::array_of(SchemaNode::Unknown));
                }
                self.pos += 1;
                let element = self.parse_union()?;
                match self.peek() {
                    Some('>') => {
                        self.pos += 1;
                        Ok(SchemaNode::array_of(element))
                    }
                    _ => Err(TypeParseError::Unterminated(self.input.to_string())),
                }
            }
            "object" => Ok(SchemaNode::Object(ObjectSchema::open())),
            "any" => Ok(SchemaNode::Any),
            "unknown" => Ok(SchemaNode::Unknown),
            other => PrimitiveType::from_name(other)
                .map(SchemaNode::Primitive)
                .ok_or_else(|| TypeParseError::UnknownType(other.to_string())),
        }
    }

    fn read_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        name
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }
}
