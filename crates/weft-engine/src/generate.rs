use std::sync::Arc;

use weft_grammar::{Build, Grammar, ParseletId, ParseletKind, SemanticContext, Slot};
use weft_syntax::{GreenNode, GreenToken, ParseNode};

use crate::GenerateError;
use crate::document::{Document, NodeData, NodeId, Value};
use crate::parser::rematch;

/// Renders `value` with `parselet` and returns the parse node of the text.
///
/// A final pass binds every semantic node it renders to its new parse node;
/// a draft pass only binds nodes that had no valid one.
pub fn generate<C: SemanticContext>(
    document: &mut Document<C>,
    parselet: ParseletId,
    value: &Value,
    final_pass: bool,
) -> Result<ParseNode, GenerateError> {
    let grammar = Arc::clone(&document.grammar);
    let (tree, bindings) = {
        let mut generator = Generator::new(&grammar, document, None);
        let tree = generator.parselet(parselet, value.into())?;
        (tree, generator.finish())
    };
    document.apply(bindings, final_pass, None);
    Ok(tree.unwrap_or_else(|| GreenNode::new(grammar.kind(parselet), Vec::new()).into()))
}

/// A parse node produced for a semantic node.
pub(crate) struct Binding {
    pub(crate) node: NodeId,
    pub(crate) parselet: ParseletId,
    pub(crate) tree: ParseNode,
}

/// The part of a semantic value a grammar position is asked to render.
#[derive(Debug, Clone, Copy)]
enum Input<'v> {
    None,
    Text(&'v str),
    Node(NodeId),
    /// A run of list items spread over a repeated slot.
    Items(&'v [Value]),
}

impl<'v> From<&'v Value> for Input<'v> {
    fn from(value: &'v Value) -> Self {
        match value {
            Value::None => Input::None,
            Value::Text(text) => Input::Text(text),
            Value::Node(id) => Input::Node(*id),
        }
    }
}

impl Input<'_> {
    fn is_none(self) -> bool {
        matches!(self, Input::None)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Arity {
    One,
    OptionalOne,
    Many,
}

pub(crate) struct Generator<'a, C> {
    grammar: &'a Grammar<C>,
    document: &'a Document<C>,
    /// Regenerated from scratch even if its parse node is valid.
    target: Option<NodeId>,
    bindings: Vec<Binding>,
}

impl<'a, C: SemanticContext> Generator<'a, C> {
    pub(crate) fn new(
        grammar: &'a Grammar<C>,
        document: &'a Document<C>,
        target: Option<NodeId>,
    ) -> Self {
        Self { grammar, document, target, bindings: Vec::new() }
    }

    pub(crate) fn finish(self) -> Vec<Binding> {
        self.bindings
    }

    /// Renders a semantic node with the parselet that produced it.
    pub(crate) fn node(
        &mut self,
        parselet: ParseletId,
        id: NodeId,
    ) -> Result<ParseNode, GenerateError> {
        let is_list = matches!(self.document.nodes[id].data, NodeData::List(_));
        let tree = if is_list && self.grammar[parselet].flags().repeat {
            self.repetition(parselet, Input::Node(id))?
        } else {
            self.element(parselet, Input::Node(id))?
        };
        tree.ok_or_else(|| self.mismatch(parselet, "renders as nothing"))
    }

    /// Renders one element of the repetition `parselet`.
    pub(crate) fn item(
        &mut self,
        parselet: ParseletId,
        item: &Value,
    ) -> Result<ParseNode, GenerateError> {
        self.element(parselet, item.into())?
            .ok_or_else(|| self.mismatch(parselet, "element renders as nothing"))
    }

    fn mismatch(&self, parselet: ParseletId, reason: impl Into<String>) -> GenerateError {
        GenerateError::ShapeMismatch {
            parselet: self.grammar.kind_name(self.grammar.kind(parselet)),
            reason: reason.into(),
        }
    }

    fn bind(&mut self, node: NodeId, parselet: ParseletId, tree: &ParseNode) {
        self.bindings.push(Binding { node, parselet, tree: tree.clone() });
    }

    /// The current parse node of `node`, if it can stand for a fresh
    /// rendering with `parselet`.
    fn reusable(&self, node: NodeId, parselet: ParseletId, repeat: bool) -> Option<ParseNode> {
        if self.target == Some(node) {
            return None;
        }
        let entry = &self.document.nodes[node];
        if entry.invalid || entry.parselet != Some(parselet) {
            return None;
        }
        let tree = entry.parse_node.as_ref()?;
        (tree.as_node().is_some_and(GreenNode::is_repeat) == repeat).then(|| tree.clone())
    }

    fn rematch(
        &self,
        id: ParseletId,
        text: &str,
        element: bool,
    ) -> Result<Option<ParseNode>, GenerateError> {
        rematch(self.grammar, id, text, element)
            .ok_or_else(|| self.mismatch(id, format!("{text:?} does not match")))
    }

    fn absent(&self, id: ParseletId) -> Option<ParseNode> {
        let parselet = &self.grammar[id];
        (parselet.flags().repeat && !parselet.is_lexical())
            .then(|| GreenNode::repeat(self.grammar.kind(id), Vec::new()).into())
    }

    /// Text for a parselet that was given no value.
    fn default_text(
        &mut self,
        id: ParseletId,
        element: bool,
    ) -> Result<Option<ParseNode>, GenerateError> {
        let parselet = &self.grammar[id];
        match parselet.default_text() {
            Some(text) => self.rematch(id, text, element),
            None if parselet.flags().optional => Ok(self.absent(id)),
            None => Err(self.mismatch(id, "no value and no default text")),
        }
    }

    fn parselet(
        &mut self,
        id: ParseletId,
        input: Input<'_>,
    ) -> Result<Option<ParseNode>, GenerateError> {
        let parselet = &self.grammar[id];
        if parselet.is_zero_width() {
            return match input {
                Input::None => Ok(None),
                _ => Err(self.mismatch(id, "matches no text but was given a value")),
            };
        }
        if input.is_none() && parselet.flags().optional && parselet.default_text().is_none() {
            return Ok(self.absent(id));
        }
        if parselet.flags().repeat { self.repetition(id, input) } else { self.element(id, input) }
    }

    fn repetition(
        &mut self,
        id: ParseletId,
        input: Input<'_>,
    ) -> Result<Option<ParseNode>, GenerateError> {
        let grammar = self.grammar;
        let document = self.document;
        let parselet = &grammar[id];
        if parselet.is_lexical() {
            return match input {
                Input::Text(text) => self.rematch(id, text, false),
                Input::None => self.default_text(id, false),
                _ => Err(self.mismatch(id, "expected text")),
            };
        }

        let items: &[Value] = match input {
            Input::Node(list) => {
                if let Some(tree) = self.reusable(list, id, true) {
                    return Ok(Some(tree));
                }
                match &document.nodes[list].data {
                    NodeData::List(items) => items,
                    NodeData::Object { kind, .. } => {
                        return Err(self.mismatch(id, format!("expected a list, found `{kind}`")));
                    }
                }
            }
            Input::Items(items) => items,
            Input::None => &[],
            Input::Text(_) => return Err(self.mismatch(id, "expected a list, found text")),
        };
        if items.is_empty() && !parselet.flags().optional {
            return Err(self.mismatch(id, "needs at least one element"));
        }

        let mut children = Vec::with_capacity(items.len());
        for item in items {
            children.push(self.item(id, item)?);
        }
        let tree: ParseNode = GreenNode::repeat(grammar.kind(id), children).into();
        if let Input::Node(list) = input {
            self.bind(list, id, &tree);
        }
        Ok(Some(tree))
    }

    /// Renders the parselet once, ignoring its optional and repeat flags.
    fn element(
        &mut self,
        id: ParseletId,
        input: Input<'_>,
    ) -> Result<Option<ParseNode>, GenerateError> {
        let grammar = self.grammar;
        let parselet = &grammar[id];
        if let Input::Node(node) = input
            && let Some(tree) = self.reusable(node, id, false)
        {
            return Ok(Some(tree));
        }

        match (parselet.kind(), parselet.build()) {
            (ParseletKind::Literal(literal), _) => match input {
                Input::None => Ok(Some(GreenToken::new(grammar.kind(id), literal).into())),
                Input::Text(text) if text == &**literal => {
                    Ok(Some(GreenToken::new(grammar.kind(id), literal).into()))
                }
                _ => Err(self.mismatch(id, format!("expected `{literal}`"))),
            },
            (_, Build::Discard) if parselet.is_lexical() => self.structural_token(id),
            (_, build) if parselet.is_lexical() || *build == Build::Text => match input {
                Input::Text(text) => self.rematch(id, text, true),
                Input::None if parselet.default_text().is_some() => self.default_text(id, true),
                Input::None if parselet.is_lexical() => self.structural_token(id),
                Input::None => self.default_text(id, true),
                _ => Err(self.mismatch(id, "expected text")),
            },
            (ParseletKind::Class(_), _) => self.default_text(id, true),
            (ParseletKind::Sequence(slots), _) => {
                let inputs = self.slot_inputs(id, slots, input)?;
                let tree = self.sequence(id, slots, &inputs)?;
                if let Input::Node(node) = input
                    && matches!(parselet.build(), Build::Object(_) | Build::List)
                {
                    self.bind(node, id, &tree);
                }
                Ok(Some(tree))
            }
            (ParseletKind::Choice(alternatives), build) => {
                let input = if *build == Build::Discard { Input::None } else { input };
                self.choice(id, alternatives, input)
            }
            (ParseletKind::Indexed { dispatch, default }, build) => {
                let input = if *build == Build::Discard { Input::None } else { input };
                let alternatives: Vec<ParseletId> =
                    dispatch.values().copied().chain(*default).collect();
                self.choice(id, &alternatives, input)
            }
            (ParseletKind::Forward(target), build) => {
                let target =
                    target.ok_or_else(|| self.mismatch(id, "undefined forward reference"))?;
                let input = if *build == Build::Discard { Input::None } else { input };
                self.parselet(target, input)
            }
        }
    }

    /// Renders a lexical parselet from its structure alone, as one token.
    fn structural_token(&mut self, id: ParseletId) -> Result<Option<ParseNode>, GenerateError> {
        let grammar = self.grammar;
        let tree = match grammar[id].kind() {
            ParseletKind::Literal(literal) => {
                return Ok(Some(GreenToken::new(grammar.kind(id), literal).into()));
            }
            ParseletKind::Class(_) => return self.default_text(id, true),
            ParseletKind::Sequence(slots) => {
                let inputs = vec![Input::None; slots.len()];
                Some(self.sequence(id, slots, &inputs)?)
            }
            ParseletKind::Choice(alternatives) => self.choice(id, alternatives, Input::None)?,
            ParseletKind::Indexed { dispatch, default } => {
                let alternatives: Vec<ParseletId> =
                    dispatch.values().copied().chain(*default).collect();
                self.choice(id, &alternatives, Input::None)?
            }
            ParseletKind::Forward(target) => {
                let target =
                    target.ok_or_else(|| self.mismatch(id, "undefined forward reference"))?;
                self.parselet(target, Input::None)?
            }
        };
        Ok(tree
            .map(|tree| tree.text())
            .filter(|text| !text.is_empty())
            .map(|text| GreenToken::new(grammar.kind(id), &text).into()))
    }

    fn sequence(
        &mut self,
        id: ParseletId,
        slots: &[Slot],
        inputs: &[Input<'_>],
    ) -> Result<ParseNode, GenerateError> {
        let mut children = Vec::with_capacity(slots.len());
        for (slot, input) in slots.iter().zip(inputs) {
            children.extend(self.parselet(slot.parselet, *input)?);
        }
        Ok(GreenNode::new(self.grammar.kind(id), children).into())
    }

    /// Splits the value of a sequence over its slots.
    fn slot_inputs<'v>(
        &self,
        id: ParseletId,
        slots: &[Slot],
        input: Input<'v>,
    ) -> Result<Vec<Input<'v>>, GenerateError>
    where
        'a: 'v,
    {
        let grammar = self.grammar;
        let document: &'v Document<C> = self.document;
        let mut inputs = vec![Input::None; slots.len()];
        match grammar[id].build() {
            Build::Object(kind) => {
                let Input::Node(node) = input else {
                    return Err(self.mismatch(id, format!("expected an object `{kind}`")));
                };
                let NodeData::Object { kind: actual, fields } = &document.nodes[node].data else {
                    let reason = format!("expected an object `{kind}`, found a list");
                    return Err(self.mismatch(id, reason));
                };
                if actual != kind {
                    let reason = format!("expected an object `{kind}`, found `{actual}`");
                    return Err(self.mismatch(id, reason));
                }
                for (name, value) in fields {
                    let has_slot = slots.iter().any(|slot| slot.field.as_deref() == Some(&**name));
                    if !value.is_none() && !has_slot {
                        return Err(self.mismatch(id, format!("field `{name}` has no slot")));
                    }
                }
                for (slot, input) in slots.iter().zip(&mut inputs) {
                    if let Some(name) = &slot.field
                        && !grammar[slot.parselet].flags().skip
                        && let Some(value) = fields.get(name)
                    {
                        *input = value.into();
                    }
                }
            }
            Build::List => {
                let items: &[Value] = match input {
                    Input::Node(node) => match &document.nodes[node].data {
                        NodeData::List(items) => items,
                        NodeData::Object { kind, .. } => {
                            let reason = format!("expected a list, found `{kind}`");
                            return Err(self.mismatch(id, reason));
                        }
                    },
                    Input::Items(items) => items,
                    Input::None => &[],
                    Input::Text(_) => return Err(self.mismatch(id, "expected a list, found text")),
                };
                self.distribute(id, slots, items, &mut inputs)?;
            }
            Build::Pass(index) => {
                if let Some(slot) = inputs.get_mut(*index) {
                    *slot = input;
                }
            }
            Build::Text | Build::Default | Build::Discard => {}
        }
        Ok(inputs)
    }

    /// Hands list items to the value-carrying slots in order. Repeated slots
    /// take as many items as the slots after them leave over.
    fn distribute<'v>(
        &self,
        id: ParseletId,
        slots: &[Slot],
        items: &'v [Value],
        inputs: &mut [Input<'v>],
    ) -> Result<(), GenerateError> {
        let grammar = self.grammar;
        let carrying: Vec<(usize, Arity)> = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| grammar.carries_value(slot))
            .map(|(index, slot)| {
                let parselet = &grammar[slot.parselet];
                let arity = if parselet.flags().repeat && !parselet.is_lexical() {
                    Arity::Many
                } else if parselet.flags().optional {
                    Arity::OptionalOne
                } else {
                    Arity::One
                };
                (index, arity)
            })
            .collect();

        let mut cursor = 0;
        for (position, &(index, arity)) in carrying.iter().enumerate() {
            let required_after =
                carrying[position + 1..].iter().filter(|(_, arity)| *arity == Arity::One).count();
            let remaining = items.len() - cursor;
            let take = match arity {
                Arity::One => 1,
                Arity::OptionalOne => usize::from(remaining > required_after),
                Arity::Many => remaining.saturating_sub(required_after),
            };
            if take > remaining {
                return Err(self.mismatch(id, "too few list items"));
            }
            inputs[index] = match arity {
                Arity::Many => Input::Items(&items[cursor..cursor + take]),
                _ if take == 1 => (&items[cursor]).into(),
                _ => Input::None,
            };
            cursor += take;
        }
        if cursor < items.len() {
            return Err(self.mismatch(id, "too many list items"));
        }
        Ok(())
    }

    /// Tries the alternatives in order, starting with those that can lead to
    /// the parselet the node was last rendered with.
    fn choice(
        &mut self,
        id: ParseletId,
        alternatives: &[ParseletId],
        input: Input<'_>,
    ) -> Result<Option<ParseNode>, GenerateError> {
        let grammar = self.grammar;
        let previous = match input {
            Input::Node(node) => self.document.nodes[node].parselet,
            _ => None,
        };
        let (mut order, rest): (Vec<ParseletId>, Vec<ParseletId>) = alternatives
            .iter()
            .copied()
            .partition(|&alternative| {
                previous.is_some_and(|to| grammar.leads_to(alternative, to))
            });
        order.extend(rest);

        let mark = self.bindings.len();
        let mut first_error = None;
        for alternative in order {
            match self.parselet(alternative, input) {
                Ok(tree) => return Ok(tree),
                Err(error) => {
                    self.bindings.truncate(mark);
                    first_error.get_or_insert(error);
                }
            }
        }
        Err(first_error.unwrap_or_else(|| self.mismatch(id, "no alternative fits")))
    }
}
