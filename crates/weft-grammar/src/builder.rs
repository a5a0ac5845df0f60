use std::collections::hash_map::Entry as MapEntry;
use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;
use la_arena::Arena;
use rustc_hash::FxHashMap;
use weft_syntax::CharSet;

use crate::grammar::kind_index;
use crate::{
    Accept, Build, Grammar, GrammarError, Parselet, ParseletId, ParseletKind, Recovery, Slot,
};

/// A sequence slot whose value becomes the field `name` of the built object.
pub fn field(name: &str, parselet: ParseletId) -> Slot {
    Slot { parselet, field: Some(name.into()) }
}

/// Constructs a [`Grammar`].
///
/// Construction errors that cannot be returned from the fluent setters are
/// collected and reported by [`GrammarBuilder::start`].
pub struct GrammarBuilder<C> {
    grammar: Grammar<C>,
    errors: Vec<GrammarError>,
}

impl<C> Default for GrammarBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> GrammarBuilder<C> {
    pub fn new() -> Self {
        Self::from_grammar(Grammar {
            parselets: Arena::new(),
            hooks: FxHashMap::default(),
            names: FxHashMap::default(),
        })
    }

    pub(crate) fn from_grammar(grammar: Grammar<C>) -> Self {
        Self { grammar, errors: Vec::new() }
    }

    fn alloc(&mut self, kind: ParseletKind) -> ParseletMut<'_, C> {
        let id = self.grammar.parselets.alloc(Parselet::new(kind));
        ParseletMut { builder: self, id }
    }

    pub fn literal(&mut self, text: &str) -> ParseletMut<'_, C> {
        if text.is_empty() {
            self.errors.push(GrammarError::Empty("empty literal".to_string()));
        }
        self.alloc(ParseletKind::Literal(text.into()))
    }

    pub fn class(&mut self, set: CharSet) -> ParseletMut<'_, C> {
        self.alloc(ParseletKind::Class(set))
    }

    pub fn seq(&mut self, slots: impl IntoIterator<Item = Slot>) -> ParseletMut<'_, C> {
        self.alloc(ParseletKind::Sequence(slots.into_iter().collect()))
    }

    pub fn choice(
        &mut self,
        alternatives: impl IntoIterator<Item = ParseletId>,
    ) -> ParseletMut<'_, C> {
        self.alloc(ParseletKind::Choice(alternatives.into_iter().collect()))
    }

    pub fn indexed(
        &mut self,
        entries: impl IntoIterator<Item = (char, ParseletId)>,
        default: Option<ParseletId>,
    ) -> ParseletMut<'_, C> {
        let mut dispatch = IndexMap::new();
        let mut duplicates = Vec::new();
        for (key, target) in entries {
            if dispatch.insert(key, target).is_some() {
                duplicates.push(key);
            }
        }
        let kind = ParseletKind::Indexed { dispatch, default };
        let id = self.grammar.parselets.alloc(Parselet::new(kind));
        for key in duplicates {
            let parselet = self.label(id);
            self.errors.push(GrammarError::DuplicateDispatch { parselet, key });
        }
        self.get(id)
    }

    /// A placeholder for a recursive rule, defined later with
    /// [`GrammarBuilder::define`].
    pub fn forward(&mut self) -> ParseletMut<'_, C> {
        self.alloc(ParseletKind::Forward(None))
    }

    /// A parselet that matches exactly like `target` but carries its own
    /// flags, hook and name.
    pub fn reference(&mut self, target: ParseletId) -> ParseletMut<'_, C> {
        self.alloc(ParseletKind::Forward(Some(target)))
    }

    pub fn define(&mut self, forward: ParseletId, target: ParseletId) -> &mut Self {
        let label = self.label(forward);
        match &mut self.grammar.parselets[forward].kind {
            ParseletKind::Forward(slot @ None) => *slot = Some(target),
            ParseletKind::Forward(Some(_)) => {
                self.errors.push(GrammarError::AlreadyDefined(label));
            }
            _ => self.errors.push(GrammarError::WrongKind {
                parselet: label,
                expected: "a forward reference",
            }),
        }
        self
    }

    /// Opens a parselet that was already allocated.
    pub fn get(&mut self, id: ParseletId) -> ParseletMut<'_, C> {
        ParseletMut { builder: self, id }
    }

    pub fn lookup(&self, name: &str) -> Option<ParseletId> {
        self.grammar.lookup(name)
    }

    /// Adds a dispatch entry to an indexed choice.
    pub fn add_dispatch(
        &mut self,
        indexed: ParseletId,
        key: char,
        target: ParseletId,
    ) -> Result<(), GrammarError> {
        let label = self.label(indexed);
        let ParseletKind::Indexed { dispatch, .. } = &mut self.grammar.parselets[indexed].kind
        else {
            return Err(GrammarError::WrongKind { parselet: label, expected: "an indexed choice" });
        };
        match dispatch.entry(key) {
            Entry::Occupied(_) => Err(GrammarError::DuplicateDispatch { parselet: label, key }),
            Entry::Vacant(entry) => {
                entry.insert(target);
                Ok(())
            }
        }
    }

    /// Appends an alternative to an ordered choice.
    pub fn add_alternative(
        &mut self,
        choice: ParseletId,
        alternative: ParseletId,
    ) -> Result<(), GrammarError> {
        let label = self.label(choice);
        let ParseletKind::Choice(alternatives) = &mut self.grammar.parselets[choice].kind else {
            return Err(GrammarError::WrongKind { parselet: label, expected: "a choice" });
        };
        alternatives.push(alternative);
        Ok(())
    }

    /// Substitutes the parselet named `name` with `with`, everywhere it is
    /// referenced.
    pub fn replace(&mut self, name: &str, with: ParseletId) -> Result<ParseletId, GrammarError> {
        let old = self.lookup(name).ok_or_else(|| GrammarError::UnknownName(name.to_string()))?;
        if old != with {
            let name = self.grammar.parselets[old].name.take();
            let mut parselet = Parselet::new(ParseletKind::Forward(Some(with)));
            parselet.name = name;
            self.grammar.parselets[old] = parselet;
            self.grammar.hooks.remove(&old);
        }
        Ok(old)
    }

    /// Attaches an accept hook to `id`.
    pub fn set_hook(&mut self, id: ParseletId, hook: impl Accept<C> + Send + Sync + 'static) {
        self.grammar.hooks.insert(id, Arc::new(hook));
    }

    fn label(&self, id: ParseletId) -> String {
        let parselet = &self.grammar.parselets[id];
        match parselet.name() {
            Some(name) => name.to_string(),
            None => format!("{}#{}", parselet.kind.label(), kind_index(id)),
        }
    }

    /// Validates the grammar and computes the facts the engine relies on.
    pub fn start(mut self) -> Result<Grammar<C>, GrammarError> {
        if !self.errors.is_empty() {
            return Err(self.errors.swap_remove(0));
        }
        self.validate()?;
        let mut grammar = self.grammar;
        resolve(&mut grammar);
        Ok(grammar)
    }

    fn validate(&self) -> Result<(), GrammarError> {
        let parselets = &self.grammar.parselets;
        for (id, parselet) in parselets.iter() {
            match &parselet.kind {
                ParseletKind::Forward(None) => {
                    return Err(GrammarError::UnresolvedForward(self.label(id)));
                }
                ParseletKind::Forward(Some(_)) => {
                    let mut seen = vec![id];
                    let mut current = id;
                    while let ParseletKind::Forward(Some(target)) = &parselets[current].kind {
                        if seen.contains(target) {
                            return Err(GrammarError::CyclicForward(self.label(id)));
                        }
                        seen.push(*target);
                        current = *target;
                    }
                }
                ParseletKind::Sequence(slots) if slots.is_empty() => {
                    return Err(GrammarError::Empty(self.label(id)));
                }
                ParseletKind::Choice(alternatives) if alternatives.is_empty() => {
                    return Err(GrammarError::Empty(self.label(id)));
                }
                ParseletKind::Indexed { dispatch, default: None } if dispatch.is_empty() => {
                    return Err(GrammarError::Empty(self.label(id)));
                }
                _ => {}
            }

            let fits = match (&parselet.kind, &parselet.declared) {
                (_, Build::Default | Build::Text | Build::Discard) => true,
                (ParseletKind::Sequence(_), Build::Object(_) | Build::List) => true,
                (ParseletKind::Sequence(slots), Build::Pass(index)) => *index < slots.len(),
                (
                    ParseletKind::Choice(_)
                    | ParseletKind::Indexed { .. }
                    | ParseletKind::Forward(_),
                    Build::Pass(0),
                ) => true,
                _ => false,
            };
            if !fits {
                return Err(GrammarError::InvalidBuild {
                    parselet: self.label(id),
                    build: parselet.declared.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn resolve<C>(grammar: &mut Grammar<C>) {
    let ids: Vec<ParseletId> = grammar.parselets.iter().map(|(id, _)| id).collect();

    for &id in &ids {
        let parselet = &mut grammar.parselets[id];
        parselet.facts = Default::default();
        parselet.build = parselet.declared.clone();
    }

    // Lexical: greatest fixpoint, so recursive token rules stay tokens.
    for &id in &ids {
        let parselet = &grammar.parselets[id];
        let structured =
            matches!(parselet.declared, Build::Object(_) | Build::List | Build::Pass(_))
                && matches!(parselet.kind, ParseletKind::Sequence(_));
        let named = match &parselet.kind {
            ParseletKind::Sequence(slots) => slots.iter().any(|slot| slot.field.is_some()),
            _ => false,
        };
        grammar.parselets[id].facts.lexical = !structured && !named;
    }
    let mut changed = true;
    while changed {
        changed = false;
        for &id in &ids {
            let parselet = &grammar.parselets[id];
            if !parselet.facts.lexical {
                continue;
            }
            let lexical = parselet
                .kind
                .children()
                .into_iter()
                .all(|child| grammar.parselets[child].facts.lexical);
            if !lexical {
                grammar.parselets[id].facts.lexical = false;
                changed = true;
            }
        }
    }

    // Context sensitivity and value production: least fixpoints.
    for &id in &ids {
        grammar.parselets[id].facts.context_sensitive = grammar.hooks.contains_key(&id);
    }
    changed = true;
    while changed {
        changed = false;
        for &id in &ids {
            let parselet = &grammar.parselets[id];
            let context_sensitive = parselet.facts.context_sensitive
                || parselet
                    .kind
                    .children()
                    .into_iter()
                    .any(|child| grammar.parselets[child].facts.context_sensitive);
            let build = resolved_build(grammar, id);
            let produces = produces(grammar, id, &build);
            let parselet = &mut grammar.parselets[id];
            if context_sensitive != parselet.facts.context_sensitive
                || produces != parselet.facts.produces
                || build != parselet.build
            {
                parselet.facts.context_sensitive = context_sensitive;
                parselet.facts.produces = produces;
                parselet.build = build;
                changed = true;
            }
        }
    }
}

fn resolved_build<C>(grammar: &Grammar<C>, id: ParseletId) -> Build {
    let parselet = &grammar.parselets[id];
    if parselet.declared != Build::Default {
        return parselet.declared.clone();
    }
    match &parselet.kind {
        ParseletKind::Literal(_) | ParseletKind::Class(_) => Build::Text,
        ParseletKind::Sequence(_) if parselet.facts.lexical => Build::Text,
        ParseletKind::Sequence(slots) => slots
            .iter()
            .position(|slot| carries_value(grammar, slot))
            .map_or(Build::Discard, Build::Pass),
        ParseletKind::Choice(_) | ParseletKind::Indexed { .. } | ParseletKind::Forward(_) => {
            Build::Pass(0)
        }
    }
}

/// Whether a sequence slot takes part in the value of the sequence.
pub(crate) fn carries_value<C>(grammar: &Grammar<C>, slot: &Slot) -> bool {
    let parselet = &grammar.parselets[slot.parselet];
    if slot.field.is_some() {
        return !parselet.flags.skip;
    }
    parselet.facts.produces && !matches!(parselet.kind, ParseletKind::Literal(_))
}

fn produces<C>(grammar: &Grammar<C>, id: ParseletId, build: &Build) -> bool {
    let parselet = &grammar.parselets[id];
    if parselet.flags.skip || parselet.is_zero_width() {
        return false;
    }
    match (build, &parselet.kind) {
        (Build::Default | Build::Discard, _) => false,
        (Build::Object(_) | Build::List | Build::Text, _) => true,
        (Build::Pass(index), ParseletKind::Sequence(slots)) => {
            slots.get(*index).is_some_and(|slot| grammar.parselets[slot.parselet].facts.produces)
        }
        (Build::Pass(_), kind) => {
            kind.children().into_iter().any(|child| grammar.parselets[child].facts.produces)
        }
    }
}

/// Fluent access to a freshly allocated parselet.
pub struct ParseletMut<'a, C> {
    builder: &'a mut GrammarBuilder<C>,
    id: ParseletId,
}

impl<C> ParseletMut<'_, C> {
    fn parselet(&mut self) -> &mut Parselet {
        &mut self.builder.grammar.parselets[self.id]
    }

    pub fn id(&self) -> ParseletId {
        self.id
    }

    /// Names the parselet for lookup, debug trees and messages.
    pub fn named(mut self, name: &str) -> Self {
        let id = self.id;
        match self.builder.grammar.names.entry(name.into()) {
            MapEntry::Occupied(_) => {
                self.builder.errors.push(GrammarError::DuplicateName(name.to_string()));
            }
            MapEntry::Vacant(entry) => {
                entry.insert(id);
            }
        }
        self.parselet().name = Some(name.into());
        self
    }

    /// Overrides the description used in "expected ..." messages.
    pub fn describe(mut self, description: &str) -> Self {
        self.parselet().description = Some(description.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.parselet().flags.optional = true;
        self
    }

    pub fn repeat(mut self) -> Self {
        self.parselet().flags.repeat = true;
        self
    }

    pub fn skip(mut self) -> Self {
        self.parselet().flags.skip = true;
        self
    }

    pub fn lookahead(mut self) -> Self {
        self.parselet().flags.lookahead = true;
        self
    }

    pub fn negate(mut self) -> Self {
        self.parselet().flags.negate = true;
        self
    }

    pub fn cache(mut self) -> Self {
        self.parselet().flags.cache = true;
        self
    }

    pub fn no_error(mut self) -> Self {
        self.parselet().flags.no_error = true;
        self
    }

    pub fn build(mut self, build: Build) -> Self {
        self.parselet().declared = build;
        self
    }

    /// Shorthand for [`Build::Object`].
    pub fn object(self, kind: &str) -> Self {
        self.build(Build::Object(kind.into()))
    }

    pub fn recover(mut self, recovery: Recovery) -> Self {
        self.parselet().recovery = recovery;
        self
    }

    pub fn generate_default(mut self, text: &str) -> Self {
        self.parselet().default_text = Some(text.into());
        self
    }

    pub fn accept(self, hook: impl Accept<C> + Send + Sync + 'static) -> Self {
        self.builder.set_hook(self.id, hook);
        self
    }
}

