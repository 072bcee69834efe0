//! Parser: recursive descent parser for binding expressions
//!
//! Grammar of a reference body:
//!
//! ```text
//! reference  := identifier segment* (":" type)?
//! segment    := "." identifier | "." number | "[" number? "]"
//! ```
//!
//! Numeric segments address array elements; the index itself is not
//! tracked because every element shares the element schema.

use crate::errors::{DslError, DslResult};
use crate::lexer::{scan_references, Lexer, Token, TokenKind};
use capability_types::{parse_type, PathSegment};
use serde_json::Value;
use workflow_types::{Binding, Expression, Reference};

/// Parser for one reference body
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Parse the body of a `${...}` reference
    pub fn parse_reference(body: &str) -> DslResult<Reference> {
        if body.trim().is_empty() {
            return Err(DslError::EmptyReference);
        }
        let (tokens, annotation) = Lexer::new(body).tokenize()?;
        let mut parser = Self { tokens, pos: 0 };

        let producer = parser.expect_identifier()?;
        let path = parser.parse_segments()?;
        if annotation.is_some() {
            parser.expect(TokenKind::Colon)?;
        }
        parser.expect(TokenKind::Eof)?;

        let mut reference = Reference::new(producer, path);
        if let Some(annotation) = annotation {
            let node = parse_type(&annotation).map_err(|source| DslError::InvalidAnnotation {
                annotation: annotation.trim().to_string(),
                source,
            })?;
            reference = reference.with_annotation(node);
        }
        reference.raw = format!("${{{}}}", body);
        Ok(reference)
    }

    fn parse_segments(&mut self) -> DslResult<Vec<PathSegment>> {
        let mut path = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    if self.check(TokenKind::NumberLiteral) {
                        self.advance();
                        path.push(PathSegment::Element);
                    } else {
                        path.push(PathSegment::Field(self.expect_identifier()?));
                    }
                }
                TokenKind::OpenBracket => {
                    self.advance();
                    if self.check(TokenKind::NumberLiteral) {
                        self.advance();
                    }
                    self.expect(TokenKind::CloseBracket)?;
                    path.push(PathSegment::Element);
                }
                _ => return Ok(path),
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind.clone()
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> DslResult<&Token> {
        if self.check(kind.clone()) {
            Ok(self.advance())
        } else if self.check(TokenKind::Eof) {
            Err(DslError::UnexpectedEof(format!("{}", kind)))
        } else {
            let tok = self.peek();
            Err(DslError::UnexpectedToken {
                expected: format!("{}", kind),
                found: tok.text.clone(),
            })
        }
    }

    fn expect_identifier(&mut self) -> DslResult<String> {
        let tok = self.expect(TokenKind::Identifier)?;
        Ok(tok.text.clone())
    }
}

/// Every reference embedded in a string
pub fn parse_references(text: &str) -> DslResult<Vec<Reference>> {
    scan_references(text)?
        .iter()
        .map(|span| Parser::parse_reference(&span.body))
        .collect()
}

/// Parse a condition or gate expression
pub fn parse_expression(text: &str) -> DslResult<Expression> {
    Ok(Expression {
        text: text.to_string(),
        references: parse_references(text)?,
    })
}

/// Parse an input binding value
pub fn parse_binding(value: &Value) -> DslResult<Binding> {
    match value {
        Value::String(text) => {
            let spans = scan_references(text)?;
            let trimmed = text.trim();
            if spans.len() == 1 && spans[0].end - spans[0].start == trimmed.len() {
                return Ok(Binding::Reference(Parser::parse_reference(&spans[0].body)?));
            }
            if spans.is_empty() {
                return Ok(Binding::Literal(value.clone()));
            }
            let references = spans
                .iter()
                .map(|span| Parser::parse_reference(&span.body))
                .collect::<DslResult<Vec<_>>>()?;
            Ok(Binding::Template {
                text: text.clone(),
                references,
            })
        }
        Value::Array(_) | Value::Object(_) => {
            let mut references = Vec::new();
            collect_nested(value, &mut references)?;
            if references.is_empty() {
                Ok(Binding::Literal(value.clone()))
            } else {
                Ok(Binding::Composite {
                    value: value.clone(),
                    references,
                })
            }
        }
        _ => Ok(Binding::Literal(value.clone())),
    }
}

fn collect_nested(value: &Value, references: &mut Vec<Reference>) -> DslResult<()> {
    match value {
        Value::String(text) => references.extend(parse_references(text)?),
        Value::Array(items) => {
            for item in items {
                collect_nested(item, references)?;
            }
        }
        Value::Object(fields) => {
            for field in fields.values() {
                collect_nested(field, references)?;
            }
        }
        _ => {}
    }
    Ok(())
}
