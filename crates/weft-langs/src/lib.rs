//! Sample languages built on the grammar engine.
//!
//! [`calc`] is integer arithmetic, [`tags`] an HTML-like markup whose close
//! tags are checked against a stack of open ones, and [`template`] layers
//! calculator expressions over the markup.

pub mod calc;
pub mod tags;
pub mod template;

use std::sync::Arc;

use weft_engine::{ParseError, ParseOptions, Parsed, Registry, parse};
use weft_grammar::{Grammar, GrammarError, ParseletId, SemanticContext};

/// A started grammar together with the parselet documents start at.
pub struct Sample<C> {
    pub grammar: Arc<Grammar<C>>,
    pub start: ParseletId,
}

impl<C> Clone for Sample<C> {
    fn clone(&self) -> Self {
        Self { grammar: Arc::clone(&self.grammar), start: self.start }
    }
}

impl<C: SemanticContext> Sample<C> {
    /// Parses `text` with a fresh context.
    pub fn parse(&self, text: &str, options: &ParseOptions) -> Result<Parsed<C>, ParseError> {
        let mut cx = C::default();
        parse(&self.grammar, self.start, text, &mut cx, options)
    }
}

/// Every sample language, registered under its name.
pub fn registry() -> Result<Registry, GrammarError> {
    let mut registry = Registry::new();

    let calc = calc::language()?;
    registry.register("calc", &["calc"], calc.grammar, calc.start);
    let tags = tags::language()?;
    registry.register("tags", &["tags", "html"], tags.grammar, tags.start);
    let template = template::language()?;
    registry.register("template", &["tmpl"], template.grammar, template.start);

    Ok(registry)
}
