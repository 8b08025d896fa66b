use serde::Serialize;
use std::fmt;

/// 1-based source position of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Location { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A lexing or parsing failure. Parsing stops at the first one.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseError {
    #[error("{location}: expected {expected}, found '{found}'")]
    Unexpected {
        expected: String,
        found: String,
        location: Location,
    },

    #[error("{location}: invalid character '{text}'")]
    InvalidCharacter { text: String, location: Location },

    #[error("{location}: unterminated string literal {text}")]
    UnterminatedString { text: String, location: Location },

    /// A gated keyword was used before its capability was declared.
    #[error(
        "{location}: keyword '{keyword}' requires capability '{capability}' (add `declare {capability}` at the top of the file)"
    )]
    MissingCapability {
        keyword: String,
        capability: String,
        location: Location,
    },

    /// A capability keyword that no registered capability provides.
    #[error("{location}: keyword '{keyword}' is not provided by any registered capability")]
    UnavailableKeyword { keyword: String, location: Location },

    #[error("{location}: unknown capability '{name}' in declare")]
    UnknownCapability { name: String, location: Location },

    #[error("{location}: `declare {name}` must appear before any other statement")]
    MisplacedDeclaration { name: String, location: Location },

    #[error("{location}: capability '{name}' is already declared")]
    DuplicateDeclaration { name: String, location: Location },
}

impl ParseError {
    pub fn location(&self) -> Location {
        match self {
            ParseError::Unexpected { location, .. }
            | ParseError::InvalidCharacter { location, .. }
            | ParseError::UnterminatedString { location, .. }
            | ParseError::MissingCapability { location, .. }
            | ParseError::UnavailableKeyword { location, .. }
            | ParseError::UnknownCapability { location, .. }
            | ParseError::MisplacedDeclaration { location, .. }
            | ParseError::DuplicateDeclaration { location, .. } => *location,
        }
    }
}
