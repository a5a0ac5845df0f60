//! Parsing, generation and incremental update of documents described by a
//! [`weft_grammar::Grammar`].
//!
//! [`parse`] reads text into a [`Document`]: a semantic tree whose nodes are
//! each bound to the parse node they were read from. Edits through the
//! document's list and field operations keep those bindings up to date where
//! they can, and [`Document::to_text`] regenerates whatever they could not.

mod document;
mod edit;
mod error;
mod generate;
mod parser;
mod registry;
#[cfg(test)]
mod tests;

pub use document::{
    CopyOptions, Document, IdentityMap, NodeData, NodeId, SemanticNode, Stage, Value,
};
pub use error::{EditError, GenerateError, ParseError};
pub use generate::generate;
pub use parser::{ParseOptions, Parsed, parse};
pub use registry::{Language, Registry, Session};
