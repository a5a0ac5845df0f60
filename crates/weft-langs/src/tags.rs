//! HTML-like markup.
//!
//! ```text
//! element   = '<' name attribute* '/>'
//!           | '<' name attribute* '>' (element | text)* '</' name '>'
//! attribute = name '=' string
//! ```
//!
//! Open tag names are pushed on a stack in [`TagContext`] and every close
//! tag has to match the innermost one.

use std::hash::{Hash as _, Hasher as _};
use std::sync::Arc;

use log::trace;
use rustc_hash::FxHasher;
use weft_grammar::{
    Accept, AcceptInput, Build, CharSet, GrammarBuilder, GrammarError, SemanticContext, field,
};

use crate::Sample;

/// Names of the elements opened on the current parse path.
#[derive(Debug, Clone, Default)]
pub struct TagContext {
    open: Vec<String>,
}

impl TagContext {
    pub fn open_tags(&self) -> &[String] {
        &self.open
    }
}

impl SemanticContext for TagContext {
    type Snapshot = Vec<String>;

    fn snapshot(&self) -> Vec<String> {
        self.open.clone()
    }

    fn restore(&mut self, snapshot: Vec<String>) {
        self.open = snapshot;
    }

    fn fingerprint(&self) -> Option<u64> {
        let mut hasher = FxHasher::default();
        self.open.hash(&mut hasher);
        Some(hasher.finish())
    }
}

struct OpenTag;

impl Accept<TagContext> for OpenTag {
    fn accept(&self, cx: &mut TagContext, input: AcceptInput<'_>) -> Result<(), String> {
        trace!("open `{}`", input.text);
        cx.open.push(input.text.to_string());
        Ok(())
    }
}

struct CloseTag;

impl Accept<TagContext> for CloseTag {
    fn accept(&self, cx: &mut TagContext, input: AcceptInput<'_>) -> Result<(), String> {
        let name = input.value.unwrap_or(input.text);
        match cx.open.last() {
            Some(open) if open == name => {
                cx.open.pop();
                Ok(())
            }
            Some(open) => Err(format!("expected `</{open}>`, found `</{name}>`")),
            None => Err(format!("unexpected `</{name}>`")),
        }
    }

    fn on_missing(&self, cx: &mut TagContext) -> Option<String> {
        cx.open.pop().map(|name| format!("unclosed tag `{name}`"))
    }
}

/// The markup grammar. Documents are a single element, optionally
/// surrounded by whitespace.
pub fn language() -> Result<Sample<TagContext>, GrammarError> {
    let mut b = GrammarBuilder::new();
    let ws = b
        .class(CharSet::whitespace())
        .repeat()
        .optional()
        .skip()
        .no_error()
        .named("ws")
        .id();
    let space =
        b.class(CharSet::whitespace()).repeat().skip().generate_default(" ").named("space").id();

    let letter = b.class(CharSet::ascii_alpha()).describe("name").id();
    let tail = b
        .class(CharSet::ascii_alphanumeric().union(&CharSet::chars("-")))
        .repeat()
        .optional()
        .id();
    let name = b.seq([letter.into(), tail.into()]).named("name").id();

    let quote = b.literal("\"").id();
    let quoted = b.class(CharSet::chars("\"").negate()).repeat().optional().id();
    let string = b.seq([quote.into(), quoted.into(), quote.into()]).named("string").id();
    let eq = b.literal("=").id();
    let attribute = b
        .seq([field("name", name), ws.into(), eq.into(), ws.into(), field("value", string)])
        .object("Attribute")
        .named("attribute")
        .id();
    let attributes =
        b.seq([space.into(), attribute.into()]).repeat().optional().named("attributes").id();

    let lt = b.literal("<").id();
    let gt = b.literal(">").id();
    let end_empty = b.literal("/>").id();
    let end_open = b.literal("</").id();
    let open_name = b.reference(name).accept(OpenTag).named("open_name").describe("name").id();
    let close_tag = b
        .seq([end_open.into(), name.into(), ws.into(), gt.into()])
        .build(Build::Pass(1))
        .accept(CloseTag)
        .named("close_tag")
        .id();

    let element = b.forward().named("element").id();
    let text = b.class(CharSet::chars("<").negate()).repeat().named("text").id();
    let children = b.choice([element, text]).repeat().optional().named("children").id();
    let empty_element = b
        .seq([
            lt.into(),
            field("name", name),
            field("attributes", attributes),
            ws.into(),
            end_empty.into(),
        ])
        .object("Element")
        .named("empty_element")
        .id();
    let full_element = b
        .seq([
            lt.into(),
            field("name", open_name),
            field("attributes", attributes),
            ws.into(),
            gt.into(),
            field("children", children),
            field("name", close_tag),
        ])
        .object("Element")
        .named("full_element")
        .id();
    let either = b.choice([empty_element, full_element]).cache().id();
    b.define(element, either);

    let start = b.seq([ws.into(), element.into(), ws.into()]).named("document").id();
    Ok(Sample { grammar: Arc::new(b.start()?), start })
}
