//! Markup with embedded expressions: `<p>{6 * 7}</p>`.
//!
//! The markup grammar is extended in place. Its `text` rule is replaced by
//! a choice between an `{expression}` and text that stops at `{`.

use std::sync::Arc;

use weft_grammar::{CharSet, GrammarError, field};

use crate::Sample;
use crate::calc::{self, CalcRules};
use crate::tags::{self, TagContext};

pub fn language() -> Result<Sample<TagContext>, GrammarError> {
    let tags = tags::language()?;
    let mut b = tags.grammar.extend();
    let CalcRules { expr, ws, .. } = calc::rules(&mut b);

    let open = b.literal("{").id();
    let close = b.literal("}").id();
    let embed = b
        .seq([open.into(), ws.into(), field("expr", expr), ws.into(), close.into()])
        .object("Embed")
        .named("embed")
        .id();
    let plain = b.class(CharSet::chars("<{").negate()).repeat().named("plain").id();
    let text = b.choice([embed, plain]).id();
    b.replace("text", text)?;

    Ok(Sample { grammar: Arc::new(b.start()?), start: tags.start })
}
