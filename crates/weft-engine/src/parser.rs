use std::sync::Arc;

use drop_bomb::DropBomb;
use log::{debug, trace};
use rustc_hash::FxHashMap;
use text_size::{TextRange, TextSize};
use weft_grammar::{
    AcceptInput, Build, Grammar, ParseletId, ParseletKind, Recovery, SemanticContext, Slot,
};
use weft_syntax::{CharSet, GreenNode, GreenToken, ParseNode};

use crate::{Document, ParseError, Value};

#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Complete sequences cut short by end of input with missing children.
    pub partial_values: bool,
    /// Let repetitions skip over elements that fail to match.
    pub error_recovery: bool,
    /// Characters at which [`Recovery::Resync`] stops skipping.
    pub resync: CharSet,
    /// Upper bound on parselet attempts.
    pub max_steps: Option<u64>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            partial_values: false,
            error_recovery: false,
            resync: CharSet::chars("\n"),
            max_steps: None,
        }
    }
}

impl ParseOptions {
    fn tolerant(&self) -> bool {
        self.partial_values || self.error_recovery
    }
}

/// A successful, possibly recovered, parse.
pub struct Parsed<C> {
    pub document: Document<C>,
    /// Errors that were recovered from, in text order.
    pub errors: Vec<ParseError>,
    /// Input left over after the start parselet matched.
    pub trailing: Option<TextRange>,
}

impl<C: SemanticContext> Parsed<C> {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn tree(&self) -> Option<&ParseNode> {
        self.document.tree()
    }

    pub fn value(&self) -> &Value {
        self.document.root()
    }
}

/// Parses `text` starting at `start`.
///
/// Without partial values or error recovery, any error fails the parse.
/// Otherwise errors are collected in [`Parsed::errors`] and the tree carries
/// error tokens where input was skipped or missing.
///
/// Missing input is only completed when the text does not parse cleanly as
/// it is, so partial values never change the result of a valid input.
pub fn parse<C: SemanticContext>(
    grammar: &Arc<Grammar<C>>,
    start: ParseletId,
    text: &str,
    cx: &mut C,
    options: &ParseOptions,
) -> Result<Parsed<C>, ParseError> {
    if options.partial_values {
        let strict = ParseOptions { partial_values: false, ..options.clone() };
        let snapshot = cx.snapshot();
        match parse_once(grammar, start, text, cx, &strict) {
            Ok(parsed) if parsed.is_clean() => return Ok(parsed),
            Err(error @ ParseError::ResourceExceeded { .. }) => return Err(error),
            _ => {
                trace!("completing missing input");
                cx.restore(snapshot);
            }
        }
    }
    parse_once(grammar, start, text, cx, options)
}

fn parse_once<C: SemanticContext>(
    grammar: &Arc<Grammar<C>>,
    start: ParseletId,
    text: &str,
    cx: &mut C,
    options: &ParseOptions,
) -> Result<Parsed<C>, ParseError> {
    let mut parser = Parser::new(grammar, text, cx, options, true);
    let result = parser.parselet(start);
    if let Some(offset) = parser.exceeded {
        let limit = options.max_steps.unwrap_or_default();
        debug!("parse exceeded {limit} steps at {offset:?}");
        return Err(ParseError::ResourceExceeded { limit, offset });
    }

    let (node, value, failed) = match result {
        Some(matched) => (matched.node, matched.value, false),
        None if options.tolerant() => {
            let error = parser.failure_error();
            parser.errors.push(error);
            (None, Built::None, true)
        }
        None => return Err(parser.failure_error()),
    };

    let len = parser.len();
    let mut trailing = None;
    if parser.pos < len {
        let range = TextRange::new(parser.pos, len);
        if !failed {
            let error = parser.trailing_error(range);
            if !options.tolerant() {
                return Err(error);
            }
            parser.errors.push(error);
        }
        trailing = Some(range);
    }

    let tree = match trailing {
        None => node,
        Some(range) => {
            let rest = GreenToken::error(grammar.kind(start), &text[range]);
            let children = node.into_iter().chain([rest.into()]).collect();
            Some(GreenNode::new(grammar.kind(start), children).into())
        }
    };

    let errors = parser.errors;
    let mut document = Document::new(Arc::clone(grammar), start);
    let root = document.materialize(value, None);
    document.set_parsed(root, tree);
    Ok(Parsed { document, errors, trailing })
}

/// Matches `text` against `id` with hooks disabled, as the generator does
/// for values that are plain text. The whole text has to match; the inner
/// option is `None` when it matched without producing a node.
pub(crate) fn rematch<C: SemanticContext>(
    grammar: &Grammar<C>,
    id: ParseletId,
    text: &str,
    element: bool,
) -> Option<Option<ParseNode>> {
    let mut cx = C::default();
    let options = ParseOptions::default();
    let mut parser = Parser::new(grammar, text, &mut cx, &options, false);
    let matched = if element { parser.element(id) } else { parser.parselet(id) }?;
    if parser.pos != parser.len() {
        return None;
    }
    Some(matched.node)
}

/// Temporary value tree, turned into [`Document`] nodes once the parse
/// succeeded.
#[derive(Debug, Clone)]
pub(crate) enum Built {
    None,
    Text(String),
    Object {
        kind: Box<str>,
        fields: Vec<(Box<str>, Built)>,
        parselet: ParseletId,
        node: ParseNode,
    },
    List { items: Vec<Built>, parselet: ParseletId, node: ParseNode },
}

#[derive(Debug, Clone)]
struct Match {
    node: Option<ParseNode>,
    value: Built,
}

impl Match {
    const EMPTY: Self = Self { node: None, value: Built::None };
}

struct Memo<S> {
    end: TextSize,
    node: Option<ParseNode>,
    value: Built,
    errors: Vec<ParseError>,
    context: Option<S>,
}

/// Parselet, position, context fingerprint and whether diagnostics were
/// suppressed during the attempt.
type MemoKey = (ParseletId, TextSize, u64, bool);

enum Failure {
    Expected { at: TextSize, items: Vec<String> },
    Rejected { range: TextRange, message: String },
    Ambiguous { range: TextRange, rule: String },
}

impl Failure {
    /// Failures further into the input explain more. A rejected match ranks
    /// by its end even though it is reported at its start.
    fn rank(&self) -> TextSize {
        match self {
            Failure::Expected { at, .. } => *at,
            Failure::Rejected { range, .. } | Failure::Ambiguous { range, .. } => range.end(),
        }
    }
}

/// Saved parser state. Must be either committed or restored.
struct Checkpoint<S> {
    pos: TextSize,
    errors: usize,
    context: Option<S>,
    bomb: DropBomb,
}

impl<S> Checkpoint<S> {
    fn commit(mut self) {
        self.bomb.defuse();
    }
}

struct Parser<'a, C: SemanticContext> {
    grammar: &'a Grammar<C>,
    text: &'a str,
    pos: TextSize,
    cx: &'a mut C,
    options: &'a ParseOptions,
    hooks: bool,
    errors: Vec<ParseError>,
    failure: Option<Failure>,
    memo: FxHashMap<MemoKey, Option<Memo<C::Snapshot>>>,
    steps: u64,
    exceeded: Option<TextSize>,
    /// Inside a negation or recovery skipping.
    quiet: u32,
    /// Inside a `no_error` parselet.
    silent: u32,
    rejections: u32,
    rejected_until: TextSize,
}

impl<'a, C: SemanticContext> Parser<'a, C> {
    fn new(
        grammar: &'a Grammar<C>,
        text: &'a str,
        cx: &'a mut C,
        options: &'a ParseOptions,
        hooks: bool,
    ) -> Self {
        Self {
            grammar,
            text,
            pos: TextSize::new(0),
            cx,
            options,
            hooks,
            errors: Vec::new(),
            failure: None,
            memo: FxHashMap::default(),
            steps: 0,
            exceeded: None,
            quiet: 0,
            silent: 0,
            rejections: 0,
            rejected_until: TextSize::new(0),
        }
    }

    fn len(&self) -> TextSize {
        TextSize::of(self.text)
    }

    fn at_end(&self) -> bool {
        self.pos == self.len()
    }

    fn rest(&self) -> &'a str {
        &self.text[usize::from(self.pos)..]
    }

    fn slice(&self, start: TextSize) -> &'a str {
        &self.text[TextRange::new(start, self.pos)]
    }

    fn step(&mut self) -> bool {
        if self.exceeded.is_some() {
            return false;
        }
        self.steps += 1;
        if let Some(max) = self.options.max_steps
            && self.steps > max
        {
            self.exceeded = Some(self.pos);
            return false;
        }
        true
    }

    fn checkpoint(&self, context_sensitive: bool) -> Checkpoint<C::Snapshot> {
        Checkpoint {
            pos: self.pos,
            errors: self.errors.len(),
            context: (context_sensitive && self.hooks).then(|| self.cx.snapshot()),
            bomb: DropBomb::new("checkpoint must be either committed or restored"),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint<C::Snapshot>) {
        let Checkpoint { pos, errors, context, mut bomb } = checkpoint;
        bomb.defuse();
        self.pos = pos;
        self.errors.truncate(errors);
        if let Some(snapshot) = context {
            self.cx.restore(snapshot);
        }
    }

    fn parselet(&mut self, id: ParseletId) -> Option<Match> {
        if !self.step() {
            return None;
        }
        let grammar = self.grammar;
        let parselet = &grammar[id];
        let flags = parselet.flags();
        trace!("{} at {:?}", self.grammar.describe(id), self.pos);

        if flags.no_error {
            self.silent += 1;
        }
        let result = if parselet.is_zero_width() {
            self.zero_width(id)
        } else if flags.cache {
            self.memoized(id)
        } else {
            self.uncached(id)
        };
        if flags.no_error {
            self.silent -= 1;
        }
        result
    }

    fn memoized(&mut self, id: ParseletId) -> Option<Match> {
        let context_sensitive = self.hooks && self.grammar[id].is_context_sensitive();
        let fingerprint = match (context_sensitive, self.cx.fingerprint()) {
            (false, _) => 0,
            (true, Some(fingerprint)) => fingerprint,
            (true, None) => return self.uncached(id),
        };
        let key = (id, self.pos, fingerprint, self.quiet > 0);

        if let Some(entry) = self.memo.get(&key) {
            trace!("memo hit for {} at {:?}", self.grammar.describe(id), self.pos);
            let memo = entry.as_ref()?;
            self.pos = memo.end;
            self.errors.extend(memo.errors.iter().cloned());
            if let Some(snapshot) = &memo.context {
                self.cx.restore(snapshot.clone());
            }
            return Some(Match { node: memo.node.clone(), value: memo.value.clone() });
        }

        let errors = self.errors.len();
        let result = self.uncached(id);
        let memo = result.as_ref().map(|matched| Memo {
            end: self.pos,
            node: matched.node.clone(),
            value: matched.value.clone(),
            errors: self.errors[errors..].to_vec(),
            context: context_sensitive.then(|| self.cx.snapshot()),
        });
        self.memo.insert(key, memo);
        result
    }

    fn uncached(&mut self, id: ParseletId) -> Option<Match> {
        let grammar = self.grammar;
        let parselet = &grammar[id];
        let checkpoint = self.checkpoint(parselet.is_context_sensitive());
        let start = self.pos;
        let matched =
            if parselet.flags().repeat { self.repetition(id) } else { self.element(id) };
        match matched.and_then(|matched| self.check_hook(id, start, matched)) {
            Some(matched) => {
                checkpoint.commit();
                Some(matched)
            }
            None => {
                self.restore(checkpoint);
                parselet.flags().optional.then(|| self.absent(id))
            }
        }
    }

    fn zero_width(&mut self, id: ParseletId) -> Option<Match> {
        let grammar = self.grammar;
        let parselet = &grammar[id];
        let negate = parselet.flags().negate;
        let start = self.pos;
        let checkpoint = self.checkpoint(parselet.is_context_sensitive());
        if negate {
            self.quiet += 1;
        }
        let matched =
            if parselet.flags().repeat { self.repetition(id) } else { self.element(id) };
        let matched = matched.and_then(|matched| self.check_hook(id, start, matched));
        if negate {
            self.quiet -= 1;
        }
        self.restore(checkpoint);

        (matched.is_some() != negate || parselet.flags().optional).then_some(Match::EMPTY)
    }

    /// What an optional parselet yields when it does not match.
    fn absent(&self, id: ParseletId) -> Match {
        let parselet = &self.grammar[id];
        if !parselet.flags().repeat || parselet.is_lexical() {
            return Match::EMPTY;
        }
        let node: ParseNode = GreenNode::repeat(self.grammar.kind(id), Vec::new()).into();
        let value = match parselet.build() {
            Build::Discard => Built::None,
            _ => Built::List { items: Vec::new(), parselet: id, node: node.clone() },
        };
        Match { node: Some(node), value }
    }

    fn check_hook(&mut self, id: ParseletId, start: TextSize, matched: Match) -> Option<Match> {
        let grammar = self.grammar;
        if !self.hooks {
            return Some(matched);
        }
        let Some(hook) = grammar.hook(id) else {
            return Some(matched);
        };
        let range = TextRange::new(start, self.pos);
        let value = match &matched.value {
            Built::Text(text) => Some(text.as_str()),
            _ => None,
        };
        let input = AcceptInput { text: &self.text[range], value };
        match hook.accept(self.cx, input) {
            Ok(()) => Some(matched),
            Err(message) => {
                trace!("{} rejected {range:?}: {message}", grammar.describe(id));
                self.rejections += 1;
                self.rejected_until = self.rejected_until.max(range.end());
                self.rejected(range, message);
                None
            }
        }
    }

    fn repetition(&mut self, id: ParseletId) -> Option<Match> {
        let grammar = self.grammar;
        let parselet = &grammar[id];
        let start = self.pos;
        let mut elements = Vec::new();
        loop {
            let before = self.pos;
            let checkpoint = self.checkpoint(parselet.is_context_sensitive());
            match self.element(id) {
                Some(element) if self.pos > before => {
                    checkpoint.commit();
                    elements.push(element);
                }
                Some(_) => {
                    self.restore(checkpoint);
                    break;
                }
                None => {
                    self.restore(checkpoint);
                    match self.recover(id) {
                        Some(skipped) => elements.push(skipped),
                        None => break,
                    }
                }
            }
        }

        if elements.is_empty() {
            return None;
        }
        if parselet.is_lexical() {
            return Some(self.lexical(id, start));
        }
        let mut children = Vec::with_capacity(elements.len());
        let mut items = Vec::with_capacity(elements.len());
        for element in elements {
            children.extend(element.node);
            match element.value {
                Built::None => {}
                value => items.push(value),
            }
        }
        let node: ParseNode = GreenNode::repeat(grammar.kind(id), children).into();
        let value = match parselet.build() {
            Build::Discard => Built::None,
            _ => Built::List { items, parselet: id, node: node.clone() },
        };
        Some(Match { node: Some(node), value })
    }

    /// Skips over an element that failed to match, if the parselet and the
    /// options allow it. The skipped text becomes an error token.
    fn recover(&mut self, id: ParseletId) -> Option<Match> {
        let recovery = self.grammar[id].recovery();
        if !self.options.error_recovery
            || recovery == Recovery::None
            || self.quiet > 0
            || self.at_end()
            || self.exceeded.is_some()
        {
            return None;
        }
        let start = self.pos;
        let kind = match recovery {
            Recovery::SkipWith(skip) => {
                self.quiet += 1;
                let skipped = self.parselet(skip);
                self.quiet -= 1;
                if skipped.is_none() || self.pos == start {
                    self.pos = start;
                    return None;
                }
                self.grammar.kind(skip)
            }
            Recovery::Resync => {
                // A resynchronization character is only skipped if the
                // element got past it before failing.
                let rest = self.rest();
                let progressed =
                    self.failure.as_ref().is_some_and(|failure| failure.rank() > start);
                let from =
                    if progressed { rest.chars().next().map_or(0, char::len_utf8) } else { 0 };
                let skipped = rest[from..]
                    .char_indices()
                    .find(|&(_, c)| self.options.resync.contains(c))
                    .map_or(rest.len(), |(offset, _)| from + offset);
                if skipped == 0 {
                    return None;
                }
                let Ok(skipped) = TextSize::try_from(skipped) else { return None };
                self.pos += skipped;
                self.grammar.kind(id)
            }
            Recovery::None => return None,
        };

        let range = TextRange::new(start, self.pos);
        let error = match self.take_failure(start) {
            Some(
                ParseError::NoMatch { message, .. } | ParseError::PrematureEof { message, .. },
            ) => ParseError::NoMatch { range, message },
            Some(error) => error,
            None => ParseError::NoMatch { range, message: "unexpected input".to_string() },
        };
        debug!("skipped {range:?} in {}: {error}", self.grammar.describe(id));
        self.errors.push(error);
        let token = GreenToken::error(kind, self.slice(start));
        Some(Match { node: Some(token.into()), value: Built::None })
    }

    /// Matches the parselet once, ignoring its optional and repeat flags.
    fn element(&mut self, id: ParseletId) -> Option<Match> {
        let grammar = self.grammar;
        let start = self.pos;
        match grammar[id].kind() {
            ParseletKind::Literal(literal) => {
                if !self.rest().starts_with(&**literal) {
                    self.expected(start, id);
                    return None;
                }
                self.pos += TextSize::of(&**literal);
                Some(self.lexical(id, start))
            }
            ParseletKind::Class(set) => match self.rest().chars().next() {
                Some(c) if set.contains(c) => {
                    self.pos += TextSize::of(c);
                    Some(self.lexical(id, start))
                }
                _ => {
                    self.expected(start, id);
                    None
                }
            },
            ParseletKind::Sequence(slots) => self.sequence(id, slots),
            ParseletKind::Choice(alternatives) => {
                let inner = self.choice(id, alternatives)?;
                Some(self.pass_through(id, start, inner))
            }
            ParseletKind::Indexed { dispatch, default } => {
                let target = self.rest().chars().next().and_then(|c| dispatch.get(&c)).copied();
                let inner = match (target, *default) {
                    (Some(target), Some(default)) => {
                        self.parselet(target).or_else(|| self.parselet(default))
                    }
                    (Some(target), None) => self.parselet(target),
                    (None, Some(default)) => self.parselet(default),
                    (None, None) => {
                        self.expected(start, id);
                        None
                    }
                }?;
                Some(self.pass_through(id, start, inner))
            }
            ParseletKind::Forward(target) => {
                let inner = self.parselet((*target)?)?;
                Some(self.pass_through(id, start, inner))
            }
        }
    }

    fn sequence(&mut self, id: ParseletId, slots: &'a [Slot]) -> Option<Match> {
        let grammar = self.grammar;
        let start = self.pos;
        let checkpoint = self.checkpoint(grammar[id].is_context_sensitive());
        let mut children = Vec::with_capacity(slots.len());
        let mut values = Vec::with_capacity(slots.len());
        for slot in slots {
            match self.parselet(slot.parselet) {
                Some(matched) => {
                    children.extend(matched.node);
                    values.push(matched.value);
                }
                None if self.can_complete(start) => {
                    children.push(self.missing(slot.parselet));
                    values.push(Built::None);
                }
                None => {
                    self.restore(checkpoint);
                    return None;
                }
            }
        }
        checkpoint.commit();

        if grammar[id].is_lexical() {
            return Some(self.lexical(id, start));
        }
        let node: ParseNode = GreenNode::new(grammar.kind(id), children).into();
        let value = match grammar[id].build() {
            Build::Object(kind) => {
                let mut fields: Vec<(Box<str>, Built)> = Vec::new();
                for (slot, value) in slots.iter().zip(values) {
                    let Some(name) = &slot.field else { continue };
                    if grammar[slot.parselet].flags().skip
                        || matches!(value, Built::None)
                        || fields.iter().any(|(field, _)| field == name)
                    {
                        continue;
                    }
                    fields.push((name.clone(), value));
                }
                Built::Object { kind: kind.clone(), fields, parselet: id, node: node.clone() }
            }
            Build::List => {
                let mut items = Vec::new();
                for (slot, value) in slots.iter().zip(values) {
                    if !grammar.carries_value(slot) {
                        continue;
                    }
                    match value {
                        Built::None => {}
                        Built::List { items: inner, parselet, .. }
                            if parselet == slot.parselet && grammar[parselet].flags().repeat =>
                        {
                            items.extend(inner);
                        }
                        value => items.push(value),
                    }
                }
                Built::List { items, parselet: id, node: node.clone() }
            }
            Build::Text => Built::Text(self.slice(start).to_string()),
            Build::Pass(index) => values.into_iter().nth(*index).unwrap_or(Built::None),
            Build::Default | Build::Discard => Built::None,
        };
        Some(Match { node: Some(node), value })
    }

    /// In partial mode, a sequence that consumed input and ran into the end
    /// of it is completed with missing children.
    fn can_complete(&self, start: TextSize) -> bool {
        self.options.partial_values
            && self.quiet == 0
            && self.exceeded.is_none()
            && self.pos > start
            && self.at_end()
    }

    fn missing(&mut self, id: ParseletId) -> ParseNode {
        let grammar = self.grammar;
        let hook = grammar.hook(id).filter(|_| self.hooks);
        let message = hook
            .and_then(|hook| hook.on_missing(self.cx))
            .unwrap_or_else(|| format!("expected {}", grammar.describe(id)));
        debug!("completed missing {} at {:?}", grammar.describe(id), self.pos);
        self.errors.push(ParseError::PrematureEof { offset: self.pos, message });
        GreenToken::error(grammar.kind(id), "").into()
    }

    fn choice(&mut self, id: ParseletId, alternatives: &[ParseletId]) -> Option<Match> {
        let start = self.pos;
        let until = self.rejected_until;
        self.rejected_until = start;
        let mut rejected = 0;
        for &alternative in alternatives {
            let rejections = self.rejections;
            if let Some(matched) = self.parselet(alternative) {
                self.rejected_until = self.rejected_until.max(until);
                return Some(matched);
            }
            if self.rejections > rejections {
                rejected += 1;
            }
        }
        if alternatives.len() > 1 && rejected == alternatives.len() {
            let range = TextRange::new(start, self.rejected_until);
            self.ambiguous(range, id);
        }
        self.rejected_until = self.rejected_until.max(until);
        None
    }

    fn pass_through(&self, id: ParseletId, start: TextSize, inner: Match) -> Match {
        let parselet = &self.grammar[id];
        if parselet.is_lexical() {
            return self.lexical(id, start);
        }
        match parselet.build() {
            Build::Text => Match { node: inner.node, value: Built::Text(self.slice(start).into()) },
            Build::Discard => Match { node: inner.node, value: Built::None },
            _ => inner,
        }
    }

    /// A lexical match is a single token, whatever its inner structure.
    fn lexical(&self, id: ParseletId, start: TextSize) -> Match {
        let text = self.slice(start);
        let node = (!text.is_empty()).then(|| GreenToken::new(self.grammar.kind(id), text).into());
        let value = match self.grammar[id].build() {
            Build::Discard => Built::None,
            _ => Built::Text(text.to_string()),
        };
        Match { node, value }
    }

    fn reporting(&self) -> bool {
        self.quiet == 0 && self.silent == 0
    }

    fn expected(&mut self, at: TextSize, id: ParseletId) {
        if !self.reporting() {
            return;
        }
        let item = self.grammar.describe(id);
        match &mut self.failure {
            Some(Failure::Expected { at: best, items }) if *best == at => {
                if !items.contains(&item) {
                    items.push(item);
                }
            }
            Some(failure) if failure.rank() >= at => {}
            _ => self.failure = Some(Failure::Expected { at, items: vec![item] }),
        }
    }

    fn rejected(&mut self, range: TextRange, message: String) {
        if !self.reporting() {
            return;
        }
        let keep = self.failure.as_ref().is_some_and(|failure| match failure {
            Failure::Expected { .. } => failure.rank() > range.end(),
            Failure::Rejected { .. } | Failure::Ambiguous { .. } => failure.rank() >= range.end(),
        });
        if !keep {
            self.failure = Some(Failure::Rejected { range, message });
        }
    }

    fn ambiguous(&mut self, range: TextRange, id: ParseletId) {
        if !self.reporting() {
            return;
        }
        if self.failure.as_ref().is_some_and(|failure| failure.rank() > range.end()) {
            return;
        }
        self.failure = Some(Failure::Ambiguous { range, rule: self.grammar.describe(id) });
    }

    fn failure_error(&self) -> ParseError {
        match &self.failure {
            None => ParseError::NoMatch {
                range: TextRange::empty(self.pos),
                message: "input does not match".to_string(),
            },
            Some(Failure::Expected { at, items }) => {
                let message = format!("expected {}", items.join(" or "));
                match self.text[usize::from(*at)..].chars().next() {
                    None => ParseError::PrematureEof { offset: *at, message },
                    Some(c) => {
                        ParseError::NoMatch { range: TextRange::at(*at, TextSize::of(c)), message }
                    }
                }
            }
            Some(Failure::Rejected { range, message }) => {
                ParseError::NoMatch { range: *range, message: message.clone() }
            }
            Some(Failure::Ambiguous { range, rule }) => {
                ParseError::AmbiguousContext { range: *range, rule: rule.clone() }
            }
        }
    }

    /// The best failure at or after `start`, forgetting it afterwards.
    fn take_failure(&mut self, start: TextSize) -> Option<ParseError> {
        if self.failure.as_ref().is_none_or(|failure| failure.rank() < start) {
            return None;
        }
        let error = self.failure_error();
        self.failure = None;
        Some(error)
    }

    fn trailing_error(&mut self, range: TextRange) -> ParseError {
        self.take_failure(range.start()).unwrap_or_else(|| ParseError::NoMatch {
            range,
            message: "unexpected input".to_string(),
        })
    }
}
