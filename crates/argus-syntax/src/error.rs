//! Parse and lex failures.

use thiserror::Error;

use crate::pos::Pos;

/// Error produced while lexing or parsing a source file.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyntaxError {
    #[error("{file}:{pos}: unrecognized token {text:?}")]
    Lex { file: String, pos: Pos, text: String },

    #[error("{file}:{pos}: expected {expected}, found {found}")]
    Unexpected {
        file: String,
        pos: Pos,
        expected: String,
        found: String,
    },

    #[error("{file}:{pos}: {message}")]
    Invalid { file: String, pos: Pos, message: String },

    #[error("{file}: unexpected end of file while parsing {context}")]
    UnexpectedEof { file: String, context: String },
}

impl SyntaxError {
    /// The position the error points at, when one exists.
    #[must_use]
    pub fn pos(&self) -> Option<Pos> {
        match self {
            Self::Lex { pos, .. } | Self::Unexpected { pos, .. } | Self::Invalid { pos, .. } => Some(*pos),
            Self::UnexpectedEof { .. } => None,
        }
    }
}
