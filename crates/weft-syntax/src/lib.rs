//! Lossless, immutable parse tree.
//!
//! Nodes store lengths rather than absolute offsets, so a subtree can be
//! shared between an old and a patched tree without being rewritten. Identity
//! of shared subtrees is observable through [`ParseNode::ptr_eq`].

mod char_set;
mod debug;
mod syntax_kind;
mod tree;

/// Character classes used by terminals and resynchronization sets.
pub use char_set::CharSet;
/// Indented tree dump used by tests and the command-line driver.
pub use debug::DebugTree;
/// Identifies the grammar node that produced a parse node.
pub use syntax_kind::SyntaxKind;
/// Parse tree types.
pub use tree::{GreenNode, GreenToken, NodeOrToken, ParseNode};
pub use text_size::{TextLen, TextRange, TextSize};
