use std::ops::Index;
use std::sync::Arc;

use la_arena::{Arena, Idx, RawIdx};
use rustc_hash::{FxHashMap, FxHashSet};
use weft_syntax::SyntaxKind;

use crate::{Accept, Build, GrammarBuilder, Parselet, ParseletId, ParseletKind, Slot};

/// Shared accept hook.
pub type Hook<C> = Arc<dyn Accept<C> + Send + Sync>;

/// A started grammar: every forward reference is resolved and every
/// [`Build::Default`] is replaced by a concrete rule.
///
/// Immutable and freely shareable between threads.
pub struct Grammar<C> {
    pub(crate) parselets: Arena<Parselet>,
    pub(crate) hooks: FxHashMap<ParseletId, Hook<C>>,
    pub(crate) names: FxHashMap<Box<str>, ParseletId>,
}

impl<C> Clone for Grammar<C> {
    fn clone(&self) -> Self {
        Self {
            parselets: self.parselets.clone(),
            hooks: self.hooks.clone(),
            names: self.names.clone(),
        }
    }
}

impl<C> Grammar<C> {
    /// Re-opens the grammar so another grammar can be layered on top of it.
    pub fn extend(&self) -> GrammarBuilder<C> {
        GrammarBuilder::from_grammar(self.clone())
    }

    pub fn lookup(&self, name: &str) -> Option<ParseletId> {
        self.names.get(name).copied()
    }

    pub fn hook(&self, id: ParseletId) -> Option<&(dyn Accept<C> + Send + Sync)> {
        self.hooks.get(&id).map(|hook| &**hook)
    }

    pub fn len(&self) -> usize {
        self.parselets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parselets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParseletId, &Parselet)> {
        self.parselets.iter()
    }

    /// Kind of the parse nodes produced by `id`.
    pub fn kind(&self, id: ParseletId) -> SyntaxKind {
        SyntaxKind::new(u32::from(id.into_raw()))
    }

    pub fn parselet_of(&self, kind: SyntaxKind) -> Option<ParseletId> {
        ((kind.raw() as usize) < self.parselets.len())
            .then(|| Idx::from_raw(RawIdx::from(kind.raw())))
    }

    /// Name used for `kind` in debug trees.
    pub fn kind_name(&self, kind: SyntaxKind) -> String {
        let Some(id) = self.parselet_of(kind) else {
            return format!("?{}", kind.raw());
        };
        let parselet = &self[id];
        if let Some(name) = parselet.name() {
            return name.to_string();
        }
        match parselet.kind() {
            ParseletKind::Literal(text) => format!("'{text}'"),
            ParseletKind::Class(set) => set.to_string(),
            kind => format!("{}#{}", kind.label(), kind_index(id)),
        }
    }

    /// Human readable description of what `id` matches, used in messages.
    pub fn describe(&self, id: ParseletId) -> String {
        self.describe_at(id, 0)
    }

    fn describe_at(&self, id: ParseletId, depth: usize) -> String {
        let parselet = &self[id];
        if let Some(description) = &parselet.description {
            return description.to_string();
        }
        if let Some(name) = parselet.name() {
            return name.to_string();
        }
        if depth > 3 {
            return "input".to_string();
        }
        match parselet.kind() {
            ParseletKind::Literal(text) => format!("`{text}`"),
            ParseletKind::Class(set) => set.to_string(),
            ParseletKind::Sequence(slots) => match slots.first() {
                Some(slot) => self.describe_at(slot.parselet, depth + 1),
                None => "nothing".to_string(),
            },
            ParseletKind::Choice(alternatives) => alternatives
                .iter()
                .map(|&alternative| self.describe_at(alternative, depth + 1))
                .collect::<Vec<_>>()
                .join(" or "),
            ParseletKind::Indexed { dispatch, default } => {
                let mut items: Vec<String> =
                    dispatch.keys().map(|key| format!("`{key}`")).collect();
                if let Some(default) = default {
                    items.push(self.describe_at(*default, depth + 1));
                }
                items.join(" or ")
            }
            ParseletKind::Forward(Some(target)) => self.describe_at(*target, depth + 1),
            ParseletKind::Forward(None) => "input".to_string(),
        }
    }

    /// Whether a sequence slot takes part in the value of its sequence.
    pub fn carries_value(&self, slot: &Slot) -> bool {
        crate::builder::carries_value(self, slot)
    }

    /// Returns `true` if a value produced by `to` can be the value of `from`,
    /// following choices, forwards and slot pass-through.
    pub fn leads_to(&self, from: ParseletId, to: ParseletId) -> bool {
        let mut visited = FxHashSet::default();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            let parselet = &self[id];
            match (parselet.kind(), parselet.build()) {
                (ParseletKind::Sequence(slots), Build::Pass(index)) => {
                    stack.extend(slots.get(*index).map(|slot| slot.parselet));
                }
                (ParseletKind::Sequence(_), _) => {}
                (kind, Build::Pass(_)) => stack.extend(kind.children().into_iter().rev()),
                _ => {}
            }
        }
        false
    }
}

impl<C> Index<ParseletId> for Grammar<C> {
    type Output = Parselet;

    fn index(&self, id: ParseletId) -> &Parselet {
        &self.parselets[id]
    }
}

impl<C> std::fmt::Debug for Grammar<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grammar")
            .field("parselets", &self.parselets.len())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

pub(crate) fn kind_index(id: ParseletId) -> u32 {
    u32::from(id.into_raw())
}
