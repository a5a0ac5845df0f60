//! Grammar node model.
//!
//! A grammar is an arena of [`Parselet`]s built once through a
//! [`GrammarBuilder`] and then shared, read-only, by every parse and
//! generation that uses it. Recursive rules go through forward references
//! that [`GrammarBuilder::start`] resolves.

mod builder;
mod context;
mod error;
mod grammar;
mod parselet;

pub use builder::{GrammarBuilder, ParseletMut, field};
pub use context::{Accept, AcceptFn, AcceptInput, SemanticContext};
pub use error::GrammarError;
pub use grammar::{Grammar, Hook};
pub use parselet::{Build, Facts, Flags, Parselet, ParseletId, ParseletKind, Recovery, Slot};
pub use weft_syntax::CharSet;
