//! Identifier parse errors.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("id is empty")]
    Empty,

    /// A generated id with another kind's prefix, e.g. `node_...` for a task.
    #[error("expected a '{expected}_' id, got prefix '{actual}'")]
    InvalidPrefix {
        expected: &'static str,
        actual: String,
    },

    #[error("id has no '_' between prefix and ULID")]
    MissingSeparator,

    #[error("malformed ULID: {0}")]
    InvalidUlid(String),

    #[error("node id is {len} characters, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("node id contains '{0}'; allowed are ASCII letters, digits, '-', '_' and '.'")]
    InvalidChar(char),
}

impl IdError {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}
