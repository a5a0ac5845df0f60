use std::fmt;

use indexmap::IndexMap;
use la_arena::Idx;
use weft_syntax::CharSet;

/// Handle of a parselet inside its grammar.
pub type ParseletId = Idx<Parselet>;

/// A grammar node.
#[derive(Debug, Clone)]
pub struct Parselet {
    pub(crate) name: Option<Box<str>>,
    pub(crate) description: Option<Box<str>>,
    pub(crate) kind: ParseletKind,
    pub(crate) flags: Flags,
    pub(crate) declared: Build,
    pub(crate) build: Build,
    pub(crate) recovery: Recovery,
    pub(crate) default_text: Option<Box<str>>,
    pub(crate) facts: Facts,
}

impl Parselet {
    pub(crate) fn new(kind: ParseletKind) -> Self {
        Self {
            name: None,
            description: None,
            kind,
            flags: Flags::default(),
            declared: Build::Default,
            build: Build::Default,
            recovery: Recovery::None,
            default_text: None,
            facts: Facts::default(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> &ParseletKind {
        &self.kind
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// The value-construction rule, with [`Build::Default`] resolved.
    pub fn build(&self) -> &Build {
        &self.build
    }

    pub fn recovery(&self) -> Recovery {
        self.recovery
    }

    /// Text emitted by the generator when this parselet has no value.
    pub fn default_text(&self) -> Option<&str> {
        self.default_text.as_deref()
    }

    pub fn facts(&self) -> Facts {
        self.facts
    }

    /// Lexical parselets collapse into a single token.
    pub fn is_lexical(&self) -> bool {
        self.facts.lexical
    }

    pub fn is_context_sensitive(&self) -> bool {
        self.facts.context_sensitive
    }

    /// Parselets that match without consuming input.
    pub fn is_zero_width(&self) -> bool {
        self.flags.lookahead || self.flags.negate
    }
}

#[derive(Debug, Clone)]
pub enum ParseletKind {
    Literal(Box<str>),
    /// Exactly one character of the set.
    Class(CharSet),
    Sequence(Vec<Slot>),
    /// Ordered choice: the first alternative that matches wins.
    Choice(Vec<ParseletId>),
    /// Choice selected by the next input character.
    Indexed { dispatch: IndexMap<char, ParseletId>, default: Option<ParseletId> },
    /// Stands for its target. Undefined until [`GrammarBuilder::define`].
    ///
    /// [`GrammarBuilder::define`]: crate::GrammarBuilder::define
    Forward(Option<ParseletId>),
}

impl ParseletKind {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            ParseletKind::Literal(_) => "literal",
            ParseletKind::Class(_) => "class",
            ParseletKind::Sequence(_) => "seq",
            ParseletKind::Choice(_) => "choice",
            ParseletKind::Indexed { .. } => "indexed",
            ParseletKind::Forward(_) => "forward",
        }
    }

    /// Parselets this one refers to, in declaration order.
    pub fn children(&self) -> Vec<ParseletId> {
        match self {
            ParseletKind::Literal(_) | ParseletKind::Class(_) => Vec::new(),
            ParseletKind::Sequence(slots) => slots.iter().map(|slot| slot.parselet).collect(),
            ParseletKind::Choice(alternatives) => alternatives.clone(),
            ParseletKind::Indexed { dispatch, default } => {
                dispatch.values().copied().chain(*default).collect()
            }
            ParseletKind::Forward(target) => target.iter().copied().collect(),
        }
    }
}

/// A position of a sequence, optionally mapped to a field of the object the
/// sequence builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub parselet: ParseletId,
    pub field: Option<Box<str>>,
}

impl From<ParseletId> for Slot {
    fn from(parselet: ParseletId) -> Self {
        Self { parselet, field: None }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub optional: bool,
    pub repeat: bool,
    /// Matched and kept in the tree, but never part of a value.
    pub skip: bool,
    pub lookahead: bool,
    pub negate: bool,
    pub cache: bool,
    /// Failures inside are not diagnostic candidates.
    pub no_error: bool,
}

/// How the semantic value of a match is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Build {
    /// Resolved when the grammar is started.
    Default,
    /// An object of the given kind whose fields come from named slots.
    Object(Box<str>),
    /// A list of the values of the value-carrying slots.
    List,
    Text,
    /// The value of one slot. On choices and forwards, `Pass(0)` is the value
    /// of whatever matched.
    Pass(usize),
    Discard,
}

impl fmt::Display for Build {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Build::Default => f.write_str("a default value"),
            Build::Object(kind) => write!(f, "an object `{kind}`"),
            Build::List => f.write_str("a list"),
            Build::Text => f.write_str("text"),
            Build::Pass(index) => write!(f, "the value of slot {index}"),
            Build::Discard => f.write_str("nothing"),
        }
    }
}

/// What a repetition does with an element that fails to match when the
/// parse runs with error recovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Recovery {
    #[default]
    None,
    /// Consume whatever this parselet matches as an error region.
    SkipWith(ParseletId),
    /// Skip up to the next character of the parse options' resync set.
    Resync,
}

/// Properties computed by [`GrammarBuilder::start`].
///
/// [`GrammarBuilder::start`]: crate::GrammarBuilder::start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Facts {
    /// Built only from terminals, so the match is a single token.
    pub lexical: bool,
    /// Contributes a value to the sequence around it.
    pub produces: bool,
    /// Contains an accept hook.
    pub context_sensitive: bool,
}
