//! Source positions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 1-based line/column position within a single source file.
///
/// The owning file name is carried separately (on [`crate::ast::File`] and on
/// the interpreter's call frames) so positions stay `Copy` and cheap to
/// thread through every syntax node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    /// Position used for synthesized nodes that have no source location.
    pub const NONE: Self = Self { line: 0, col: 0 };

    #[must_use]
    pub fn is_none(self) -> bool {
        self.line == 0
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
