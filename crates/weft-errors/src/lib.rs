use std::fmt::{self, Display};

pub use annotate_snippets::Renderer;
use annotate_snippets::{Level, Snippet};
pub use line_index::{LineCol, LineIndex};
pub use text_size::{TextRange, TextSize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    message: String,
    range: TextRange,
}

impl Diagnostic {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn range(&self) -> TextRange {
        self.range
    }

    pub fn error(message: impl Into<String>, range: TextRange) -> Self {
        Self { message: message.into(), range }
    }

    /// One-based line and column of the start of the range.
    pub fn line_col(&self, index: &LineIndex) -> LineCol {
        let LineCol { line, col } = index.line_col(self.range.start());
        LineCol { line: line + 1, col: col + 1 }
    }

    pub fn location<'a>(&'a self, index: &'a LineIndex) -> impl Display + 'a {
        Location { diagnostic: self, index }
    }

    pub fn render<'a>(
        &'a self,
        renderer: &'a Renderer,
        path: &'a str,
        text: &'a str,
    ) -> impl Display + 'a {
        let level = Level::Error;
        let message = level.title(&self.message).snippet(
            Snippet::source(text)
                .origin(path)
                .annotation(level.span(self.range.into()).label("here"))
                .fold(true),
        );
        renderer.render(message)
    }
}

struct Location<'a> {
    diagnostic: &'a Diagnostic,
    index: &'a LineIndex,
}

impl Display for Location<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let LineCol { line, col } = self.diagnostic.line_col(self.index);
        write!(f, "{line}:{col}: {}", self.diagnostic.message)
    }
}
