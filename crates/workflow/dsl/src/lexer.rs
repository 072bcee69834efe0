//! Lexer: tokenizes binding expressions
//!
//! Two layers: `scan_references` finds the `${...}` spans embedded in a
//! string, and `Lexer` turns the body of one span into tokens for the
//! parser. Columns are 1-based character offsets.

use crate::errors::{DslError, DslResult};

/// A token produced by the lexer
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The raw text of the token
    pub text: String,
    /// Column number (1-based)
    pub col: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, col: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            col,
        }
    }
}

/// Token types
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    NumberLiteral,

    // Structural
    Dot,
    OpenBracket,
    CloseBracket,
    Colon,

    // End of input
    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identifier => write!(f, "identifier"),
            Self::NumberLiteral => write!(f, "number"),
            Self::Dot => write!(f, "."),
            Self::OpenBracket => write!(f, "["),
            Self::CloseBracket => write!(f, "]"),
            Self::Colon => write!(f, ":"),
            Self::Eof => write!(f, "end of reference"),
        }
    }
}

/// Lexer for one reference body (`producer.field[0]:type`)
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
}

impl Lexer {
    /// Create a new lexer from a reference body
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    /// Tokenize up to and including the first `:`.
    ///
    /// Everything after the colon is a type expression and is returned
    /// untouched so the type parser can report its own errors.
    pub fn tokenize(&mut self) -> DslResult<(Vec<Token>, Option<String>)> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();

            if self.pos >= self.input.len() {
                tokens.push(Token::new(TokenKind::Eof, "", self.pos + 1));
                return Ok((tokens, None));
            }

            let token = self.next_token()?;
            if token.kind == TokenKind::Colon {
                let annotation: String = self.input[self.pos..].iter().collect();
                tokens.push(token);
                tokens.push(Token::new(TokenKind::Eof, "", self.input.len() + 1));
                return Ok((tokens, Some(annotation)));
            }
            tokens.push(token);
        }
    }

    fn next_token(&mut self) -> DslResult<Token> {
        let ch = self.input[self.pos];
        let col = self.pos + 1;

        match ch {
            '.' => {
                self.pos += 1;
                Ok(Token::new(TokenKind::Dot, ".", col))
            }
            '[' => {
                self.pos += 1;
                Ok(Token::new(TokenKind::OpenBracket, "[", col))
            }
            ']' => {
                self.pos += 1;
                Ok(Token::new(TokenKind::CloseBracket, "]", col))
            }
            ':' => {
                self.pos += 1;
                Ok(Token::new(TokenKind::Colon, ":", col))
            }
            c if c.is_ascii_digit() => Ok(self.read_while(TokenKind::NumberLiteral, |c| {
                c.is_ascii_digit()
            })),
            c if c.is_ascii_alphabetic() || c == '_' => {
                Ok(self.read_while(TokenKind::Identifier, |c| {
                    c.is_ascii_alphanumeric() || c == '_' || c == '-'
                }))
            }
            _ => Err(DslError::ParseError {
                col,
                message: format!("Unexpected character: '{}'", ch),
            }),
        }
    }

    fn read_while(&mut self, kind: TokenKind, accept: impl Fn(char) -> bool) -> Token {
        let col = self.pos + 1;
        let mut text = String::new();
        while self.pos < self.input.len() && accept(self.input[self.pos]) {
            text.push(self.input[self.pos]);
            self.pos += 1;
        }
        Token::new(kind, text, col)
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }
}

/// A `${...}` span found in a string
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceSpan {
    /// Byte offset of `$`
    pub start: usize,
    /// Byte offset just past `}`
    pub end: usize,
    /// Text between the braces
    pub body: String,
}

/// Find every `${...}` span in a string
pub fn scan_references(text: &str) -> DslResult<Vec<ReferenceSpan>> {
    let mut spans = Vec::new();
    let mut rest = text;
    let mut offset = 0;

    while let Some(start) = rest.find("${") {
        let body_start = start + 2;
        let Some(close) = rest[body_start..].find('}') else {
            let col = text[..offset + start].chars().count() + 1;
            return Err(DslError::UnterminatedReference(col));
        };
        let body = &rest[body_start..body_start + close];
        let end = body_start + close + 1;
        spans.push(ReferenceSpan {
            start: offset + start,
            end: offset + end,
            body: body.to_string(),
        });
        offset += end;
        rest = &rest[end..];
    }

    Ok(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind.clone()).collect()
    }

    #[test]
    fn test_basic_tokens() {
        let (tokens, annotation) = Lexer::new("search_out.files").tokenize().unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
        assert_eq!(tokens[0].text, "search_out");
        assert_eq!(tokens[2].text, "files");
        assert!(annotation.is_none());
    }

    #[test]
    fn test_index_tokens() {
        let (tokens, _) = Lexer::new("out.matches[0].path").tokenize().unwrap();
        assert_eq!(tokens[3].kind, TokenKind::OpenBracket);
        assert_eq!(tokens[4].kind, TokenKind::NumberLiteral);
        assert_eq!(tokens[4].text, "0");
        assert_eq!(tokens[5].kind, TokenKind::CloseBracket);
    }

    #[test]
    fn test_annotation_split() {
        let (tokens, annotation) = Lexer::new("out.items:array<string|number>")
            .tokenize()
            .unwrap();
        assert_eq!(tokens[3].kind, TokenKind::Colon);
        assert_eq!(tokens[4].kind, TokenKind::Eof);
        assert_eq!(annotation.as_deref(), Some("array<string|number>"));
    }

    #[test]
    fn test_hyphenated_identifier() {
        let (tokens, _) = Lexer::new("detect-out.score").tokenize().unwrap();
        assert_eq!(tokens[0].text, "detect-out");
    }

    #[test]
    fn test_columns() {
        let (tokens, _) = Lexer::new("a.bc").tokenize().unwrap();
        assert_eq!(tokens[0].col, 1);
        assert_eq!(tokens[1].col, 2);
        assert_eq!(tokens[2].col, 3);
    }

    #[test]
    fn test_unexpected_character() {
        let result = Lexer::new("a.b + c").tokenize();
        assert!(matches!(result, Err(DslError::ParseError { col: 5, .. })));
    }

    #[test]
    fn test_empty_input() {
        let (tokens, _) = Lexer::new("").tokenize().unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn test_scan_references() {
        let spans = scan_references("Found ${a.count} in ${b.files:array<string>}").unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].body, "a.count");
        assert_eq!(spans[0].start, 6);
        assert_eq!(spans[1].body, "b.files:array<string>");
        assert!(scan_references("no references here").unwrap().is_empty());
    }

    #[test]
    fn test_scan_unterminated() {
        assert!(matches!(
            scan_references("value ${a.b"),
            Err(DslError::UnterminatedReference(7))
        ));
    }
}
