use text_size::{TextRange, TextSize};
use weft_errors::Diagnostic;

/// Why a parse failed, or what was recovered from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("{message}")]
    NoMatch { range: TextRange, message: String },
    #[error("{message}")]
    PrematureEof { offset: TextSize, message: String },
    #[error("no alternative of {rule} is valid in this context")]
    AmbiguousContext { range: TextRange, rule: String },
    #[error("parse gave up after {limit} steps")]
    ResourceExceeded { limit: u64, offset: TextSize },
}

impl ParseError {
    pub fn range(&self) -> TextRange {
        match self {
            ParseError::NoMatch { range, .. } | ParseError::AmbiguousContext { range, .. } => {
                *range
            }
            ParseError::PrematureEof { offset, .. }
            | ParseError::ResourceExceeded { offset, .. } => TextRange::empty(*offset),
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.to_string(), self.range())
    }
}

/// The semantic tree does not fit the grammar used to render it.
///
/// This is a bug in whoever built the tree, not a property of some input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    #[error("cannot render with `{parselet}`: {reason}")]
    ShapeMismatch { parselet: String, reason: String },
    #[error("node has no parselet to render with")]
    Unbound,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("index {index} is out of bounds for a list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("node is not a list")]
    NotAList,
    #[error("node is not an object")]
    NotAnObject,
    #[error("node is already attached to a parent")]
    AlreadyAttached,
}
