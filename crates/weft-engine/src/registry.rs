//! Languages known by name and file extension.

use std::sync::Arc;

use indexmap::IndexMap;
use weft_grammar::{Grammar, ParseletId, SemanticContext};

use crate::{Document, GenerateError, ParseError, ParseOptions, Parsed, Value, parse};

/// A grammar with its start parselet, usable without knowing its context type.
pub trait Language: Send + Sync {
    fn name(&self) -> &str;

    fn extensions(&self) -> &[String];

    /// Parses `text` with a fresh context.
    fn parse(&self, text: &str, options: &ParseOptions) -> Result<Box<dyn Session>, ParseError>;
}

/// A parsed document behind a [`Language`].
pub trait Session {
    fn errors(&self) -> &[ParseError];

    fn debug_tree(&self) -> String;

    /// Indented dump of the semantic tree.
    fn dump(&self) -> String;

    /// Source text of the document.
    fn text(&mut self) -> Result<String, GenerateError>;

    /// Throws away every parse node and renders the document from its
    /// semantic tree alone.
    fn format(&mut self) -> Result<String, GenerateError>;
}

struct GrammarLanguage<C> {
    name: String,
    extensions: Vec<String>,
    grammar: Arc<Grammar<C>>,
    start: ParseletId,
}

impl<C: SemanticContext + 'static> Language for GrammarLanguage<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn parse(&self, text: &str, options: &ParseOptions) -> Result<Box<dyn Session>, ParseError> {
        let mut cx = C::default();
        let parsed = parse(&self.grammar, self.start, text, &mut cx, options)?;
        Ok(Box::new(parsed))
    }
}

impl<C: SemanticContext> Session for Parsed<C> {
    fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    fn debug_tree(&self) -> String {
        self.document.debug_tree()
    }

    fn dump(&self) -> String {
        self.document.dump(self.document.root())
    }

    fn text(&mut self) -> Result<String, GenerateError> {
        self.document.text()
    }

    fn format(&mut self) -> Result<String, GenerateError> {
        let document = &self.document;
        let root = document.root().clone();
        let mut fresh = match root {
            Value::Node(id) => document.extract(id, Default::default()),
            root => {
                let mut fresh = Document::new(Arc::clone(document.grammar()), document.start());
                fresh.set_root(root);
                fresh
            }
        };
        fresh.text()
    }
}

/// Languages by name. Registering a name again replaces the earlier
/// language; a file extension belongs to the language registered last.
#[derive(Default)]
pub struct Registry {
    languages: IndexMap<String, Arc<dyn Language>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: SemanticContext + 'static>(
        &mut self,
        name: &str,
        extensions: &[&str],
        grammar: Arc<Grammar<C>>,
        start: ParseletId,
    ) {
        let language = GrammarLanguage {
            name: name.to_string(),
            extensions: extensions.iter().map(|extension| extension.to_string()).collect(),
            grammar,
            start,
        };
        self.languages.shift_remove(name);
        self.languages.insert(name.to_string(), Arc::new(language));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Language>> {
        self.languages.get(name).cloned()
    }

    pub fn for_extension(&self, extension: &str) -> Option<Arc<dyn Language>> {
        self.languages
            .values()
            .rev()
            .find(|language| language.extensions().iter().any(|known| known == extension))
            .cloned()
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.languages.keys().map(String::as_str)
    }
}
