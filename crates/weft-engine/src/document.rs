use std::sync::Arc;

use indexmap::IndexMap;
use la_arena::{Arena, Idx};
use log::warn;
use rustc_hash::FxHashMap;
use weft_grammar::{Grammar, ParseletId, SemanticContext};
use weft_syntax::{DebugTree, ParseNode};

use crate::GenerateError;
use crate::generate::{self, Binding, Generator};
use crate::parser::Built;

pub type NodeId = Idx<SemanticNode>;

/// Maps original nodes to their copies.
pub type IdentityMap = FxHashMap<NodeId, NodeId>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    #[default]
    None,
    Text(String),
    Node(NodeId),
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Node(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Object { kind: Box<str>, fields: IndexMap<Box<str>, Value> },
    List(Vec<Value>),
}

/// Readiness of a semantic node. Consumers decide what each stage means;
/// the engine only distinguishes live nodes from the rest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    #[default]
    Created,
    Initialized,
    Started,
    Validated,
    Processed,
    Stopped,
}

impl Stage {
    /// Edits of live nodes are patched into their parse nodes in place.
    pub fn is_live(self) -> bool {
        self >= Stage::Started && self != Stage::Stopped
    }
}

#[derive(Debug, Clone)]
pub struct SemanticNode {
    pub(crate) data: NodeData,
    pub(crate) parent: Option<NodeId>,
    pub(crate) parselet: Option<ParseletId>,
    pub(crate) parse_node: Option<ParseNode>,
    pub(crate) invalid: bool,
    pub(crate) stage: Stage,
}

impl SemanticNode {
    fn unbound(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            parselet: None,
            parse_node: None,
            invalid: true,
            stage: Stage::Created,
        }
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    fn values(&self) -> impl Iterator<Item = &Value> {
        let (fields, items) = match &self.data {
            NodeData::Object { fields, .. } => (Some(fields.values()), None),
            NodeData::List(items) => (None, Some(items.iter())),
        };
        fields.into_iter().flatten().chain(items.into_iter().flatten())
    }

    fn values_mut(&mut self) -> Box<dyn Iterator<Item = &mut Value> + '_> {
        match &mut self.data {
            NodeData::Object { fields, .. } => Box::new(fields.values_mut()),
            NodeData::List(items) => Box::new(items.iter_mut()),
        }
    }
}

/// What [`Document::deep_copy`] carries over to the copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyOptions {
    /// Bind the copy to the same parse nodes. Without this the copy is
    /// invalid and regenerates on first read.
    pub parse_nodes: bool,
    /// Keep the stages of the original nodes.
    pub lifecycle: bool,
}

/// A semantic tree paired with the parse tree it was read from.
///
/// Every semantic node is either bound to a parse node whose text reflects
/// its content, or marked invalid and regenerated before its text is read.
pub struct Document<C> {
    pub(crate) grammar: Arc<Grammar<C>>,
    pub(crate) start: ParseletId,
    pub(crate) nodes: Arena<SemanticNode>,
    pub(crate) root: Value,
    pub(crate) tree: Option<ParseNode>,
    pub(crate) tree_invalid: bool,
}

impl<C: SemanticContext> Document<C> {
    pub fn new(grammar: Arc<Grammar<C>>, start: ParseletId) -> Self {
        Self {
            grammar,
            start,
            nodes: Arena::new(),
            root: Value::None,
            tree: None,
            tree_invalid: true,
        }
    }

    pub fn grammar(&self) -> &Arc<Grammar<C>> {
        &self.grammar
    }

    pub fn start(&self) -> ParseletId {
        self.start
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn set_root(&mut self, value: Value) {
        if let Value::Node(id) = self.root {
            self.nodes[id].parent = None;
        }
        self.root = value;
        self.tree_invalid = true;
    }

    /// Parse tree of the whole text, including what surrounds the root value.
    pub fn tree(&self) -> Option<&ParseNode> {
        self.tree.as_ref()
    }

    pub fn debug_tree(&self) -> String {
        let name = |kind| self.grammar.kind_name(kind);
        self.tree.as_ref().map(|tree| DebugTree::new(tree, &name).to_string()).unwrap_or_default()
    }

    pub fn new_object(&mut self, kind: &str) -> NodeId {
        let data = NodeData::Object { kind: kind.into(), fields: IndexMap::new() };
        self.nodes.alloc(SemanticNode::unbound(data))
    }

    pub fn new_list(&mut self) -> NodeId {
        self.nodes.alloc(SemanticNode::unbound(NodeData::List(Vec::new())))
    }

    pub fn node(&self, id: NodeId) -> &SemanticNode {
        &self.nodes[id]
    }

    pub fn kind(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].data {
            NodeData::Object { kind, .. } => Some(kind),
            NodeData::List(_) => None,
        }
    }

    pub fn field(&self, id: NodeId, name: &str) -> Option<&Value> {
        match &self.nodes[id].data {
            NodeData::Object { fields, .. } => fields.get(name),
            NodeData::List(_) => None,
        }
    }

    pub fn items(&self, id: NodeId) -> Option<&[Value]> {
        match &self.nodes[id].data {
            NodeData::List(items) => Some(items),
            NodeData::Object { .. } => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn parse_node(&self, id: NodeId) -> Option<&ParseNode> {
        self.nodes[id].parse_node.as_ref()
    }

    pub fn parselet(&self, id: NodeId) -> Option<ParseletId> {
        self.nodes[id].parselet
    }

    /// Chooses the parselet `id` is rendered with. The node has to be
    /// regenerated afterwards.
    pub fn set_parselet(&mut self, id: NodeId, parselet: ParseletId) {
        self.nodes[id].parselet = Some(parselet);
        self.invalidate(id);
    }

    pub fn is_invalid(&self, id: NodeId) -> bool {
        self.nodes[id].invalid
    }

    pub fn stage(&self, id: NodeId) -> Stage {
        self.nodes[id].stage
    }

    /// Moves `id` and everything below it to `stage`.
    pub fn set_stage(&mut self, id: NodeId, stage: Stage) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            self.nodes[id].stage = stage;
            stack.extend(self.nodes[id].values().filter_map(Value::as_node));
        }
    }

    /// Raises the stage of a newly attached subtree to that of its container.
    pub(crate) fn raise_stage(&mut self, id: NodeId, container: NodeId) {
        let stage = self.nodes[container].stage;
        if stage == Stage::Stopped {
            return;
        }
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let node = &mut self.nodes[id];
            if node.stage < stage {
                node.stage = stage;
            }
            stack.extend(self.nodes[id].values().filter_map(Value::as_node));
        }
    }

    /// Exact source text of `id`, regenerating it first if it is invalid.
    pub fn to_text(&mut self, id: NodeId) -> Result<String, GenerateError> {
        self.try_regenerate(id, true)?;
        Ok(self.nodes[id].parse_node.as_ref().map(ParseNode::text).unwrap_or_default())
    }

    /// Text of the whole document.
    pub fn text(&mut self) -> Result<String, GenerateError> {
        if self.tree_invalid || self.tree.is_none() {
            let (start, root) = (self.start, self.root.clone());
            let tree = generate::generate(self, start, &root, true)?;
            self.tree = Some(tree);
            self.tree_invalid = false;
        }
        Ok(self.tree.as_ref().map(ParseNode::text).unwrap_or_default())
    }

    /// Re-derives the parse node of `id` from its content. Does nothing for
    /// a valid node.
    pub fn regenerate(&mut self, id: NodeId, final_pass: bool) -> bool {
        match self.try_regenerate(id, final_pass) {
            Ok(()) => true,
            Err(error) => {
                warn!("cannot regenerate {id:?}: {error}");
                false
            }
        }
    }

    pub fn try_regenerate(&mut self, id: NodeId, final_pass: bool) -> Result<(), GenerateError> {
        let node = &self.nodes[id];
        if !node.invalid && node.parse_node.is_some() {
            return Ok(());
        }
        let parselet = node.parselet.ok_or(GenerateError::Unbound)?;
        let (tree, bindings) = {
            let mut generator = Generator::new(&self.grammar, self, Some(id));
            let tree = generator.node(parselet, id)?;
            (tree, generator.finish())
        };
        self.apply(bindings, final_pass, Some(id));
        let node = &mut self.nodes[id];
        node.parse_node = Some(tree);
        node.invalid = false;
        Ok(())
    }

    /// Binds generated parse nodes. A draft pass only binds the target and
    /// nodes that had no valid parse node.
    pub(crate) fn apply(
        &mut self,
        bindings: Vec<Binding>,
        final_pass: bool,
        target: Option<NodeId>,
    ) {
        for Binding { node, parselet, tree } in bindings {
            let entry = &mut self.nodes[node];
            if final_pass || entry.invalid || Some(node) == target {
                entry.parse_node = Some(tree);
                entry.parselet = Some(parselet);
                entry.invalid = false;
            }
        }
    }

    /// Marks `id` and its ancestors as owing a fresh parse node.
    pub(crate) fn invalidate(&mut self, id: NodeId) {
        let mut current = Some(id);
        let mut last = id;
        while let Some(id) = current {
            self.nodes[id].invalid = true;
            last = id;
            current = self.nodes[id].parent;
        }
        if self.root == Value::Node(last) {
            self.tree_invalid = true;
        }
    }

    /// Copies the subtree of `id` into this document. The copy is detached.
    pub fn deep_copy(&mut self, id: NodeId, options: CopyOptions, map: &mut IdentityMap) -> NodeId {
        let plan = self.copy_plan(id, options);
        insert_copies(&mut self.nodes, plan, map)
    }

    /// Copies the subtree of `id` into a new document with the same grammar,
    /// rooted at the copy.
    pub fn extract(&self, id: NodeId, options: CopyOptions) -> Self {
        let mut document = Self::new(Arc::clone(&self.grammar), self.start);
        let plan = self.copy_plan(id, options);
        let root = insert_copies(&mut document.nodes, plan, &mut IdentityMap::default());
        document.root = Value::Node(root);
        document
    }

    fn copy_plan(&self, id: NodeId, options: CopyOptions) -> Vec<(NodeId, SemanticNode)> {
        let mut plan = Vec::new();
        let mut stack = vec![id];
        while let Some(original) = stack.pop() {
            let mut node = self.nodes[original].clone();
            if original == id {
                node.parent = None;
            }
            if !options.parse_nodes {
                node.parse_node = None;
                node.invalid = true;
            }
            if !options.lifecycle {
                node.stage = Stage::Created;
            }
            let children: Vec<NodeId> = node.values().filter_map(Value::as_node).collect();
            stack.extend(children.into_iter().rev());
            plan.push((original, node));
        }
        plan
    }

    pub(crate) fn materialize(&mut self, built: Built, parent: Option<NodeId>) -> Value {
        let (data, parselet, tree, children) = match built {
            Built::None => return Value::None,
            Built::Text(text) => return Value::Text(text),
            Built::Object { kind, fields, parselet, node } => {
                let data = NodeData::Object { kind, fields: IndexMap::new() };
                let children: Vec<_> =
                    fields.into_iter().map(|(name, value)| (Some(name), value)).collect();
                (data, parselet, node, children)
            }
            Built::List { items, parselet, node } => {
                let children = items.into_iter().map(|item| (None, item)).collect();
                (NodeData::List(Vec::new()), parselet, node, children)
            }
        };
        let id = self.nodes.alloc(SemanticNode {
            data,
            parent,
            parselet: Some(parselet),
            parse_node: Some(tree),
            invalid: false,
            stage: Stage::Created,
        });
        for (name, child) in children {
            let value = self.materialize(child, Some(id));
            if value.is_none() {
                continue;
            }
            match (&mut self.nodes[id].data, name) {
                (NodeData::Object { fields, .. }, Some(name)) => {
                    fields.insert(name, value);
                }
                (NodeData::List(items), _) => items.push(value),
                (NodeData::Object { .. }, None) => {}
            }
        }
        Value::Node(id)
    }

    pub(crate) fn set_parsed(&mut self, root: Value, tree: Option<ParseNode>) {
        self.root = root;
        self.tree_invalid = tree.is_none();
        self.tree = tree;
    }

    /// Indented dump of the semantic tree below `value`.
    pub fn dump(&self, value: &Value) -> String {
        let mut buf = String::new();
        self.dump_value(value, 0, &mut buf);
        buf.push('\n');
        buf
    }

    fn dump_value(&self, value: &Value, depth: usize, buf: &mut String) {
        let id = match value {
            Value::None => {
                buf.push_str("none");
                return;
            }
            Value::Text(text) => {
                buf.push_str(&format!("{text:?}"));
                return;
            }
            Value::Node(id) => *id,
        };
        let indent = "  ".repeat(depth + 1);
        match &self.nodes[id].data {
            NodeData::Object { kind, fields } => {
                buf.push_str(kind);
                for (name, value) in fields {
                    buf.push_str(&format!("\n{indent}{name}: "));
                    self.dump_value(value, depth + 1, buf);
                }
            }
            NodeData::List(items) if items.is_empty() => buf.push_str("[]"),
            NodeData::List(items) => {
                buf.push('[');
                for item in items {
                    buf.push_str(&format!("\n{indent}"));
                    self.dump_value(item, depth + 1, buf);
                }
                buf.push_str(&format!("\n{}]", "  ".repeat(depth)));
            }
        }
    }
}

fn insert_copies(
    nodes: &mut Arena<SemanticNode>,
    plan: Vec<(NodeId, SemanticNode)>,
    map: &mut IdentityMap,
) -> NodeId {
    let mut copies = Vec::with_capacity(plan.len());
    for (original, node) in plan {
        let copy = nodes.alloc(node);
        map.insert(original, copy);
        copies.push(copy);
    }
    for &copy in &copies {
        let node = &mut nodes[copy];
        node.parent = node.parent.and_then(|parent| map.get(&parent).copied());
        for value in node.values_mut() {
            if let Value::Node(child) = value
                && let Some(&mapped) = map.get(&*child)
            {
                *child = mapped;
            }
        }
    }
    copies[0]
}
