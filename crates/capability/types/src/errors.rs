//! Error types for capability types

/// Errors raised while parsing a type expression such as `array<string>`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeParseError {
    #[error("Empty type expression")]
    Empty,

    #[error("Unknown type name '{0}'")]
    UnknownType(String),

    #[error("Unexpected character '{found}' at offset {offset} in '{input}'")]
    UnexpectedChar {
        input: String,
        offset: usize,
        found: char,
    },

    #[error("Unterminated type parameter in '{0}'")]
    Unterminated(String),
}

/// Errors raised while walking a field path into a schema node
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("Field '{field}' is not declared on {on}")]
    UnknownField { field: String, on: String },

    #[error("Cannot index into non-array type {on}")]
    NotAnArray { on: String },

    #[error("Cannot access field '{field}' of non-object type {on}")]
    NotAnObject { field: String, on: String },
}
