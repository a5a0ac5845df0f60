//! Edits of the semantic tree.
//!
//! A list edit on a live, bound node is patched into the parse tree: only
//! the changed element is generated and every untouched sibling keeps its
//! parse node. When that is not possible the changed node is regenerated on
//! its own, and if even that fails it is invalidated together with its
//! ancestors.

use std::sync::Arc;

use log::{debug, trace};
use weft_grammar::{ParseletId, SemanticContext};
use weft_syntax::ParseNode;

use crate::document::{Document, NodeData, NodeId, Value};
use crate::generate::Generator;
use crate::{EditError, GenerateError};

#[derive(Debug, Clone, Copy)]
enum Change {
    Insert(usize),
    Replace(usize),
    Remove(usize),
}

impl<C: SemanticContext> Document<C> {
    pub fn insert(&mut self, list: NodeId, index: usize, value: Value) -> Result<(), EditError> {
        let len = self.list_len(list)?;
        if index > len {
            return Err(EditError::IndexOutOfBounds { index, len });
        }
        self.check_detached(&value, list)?;
        if let NodeData::List(items) = &mut self.nodes[list].data {
            items.insert(index, value.clone());
        }
        self.adopt(&value, list);
        self.list_changed(list, Change::Insert(index), len);
        Ok(())
    }

    pub fn push(&mut self, list: NodeId, value: Value) -> Result<(), EditError> {
        let len = self.list_len(list)?;
        self.insert(list, len, value)
    }

    /// Replaces the item at `index` and returns the old one, now detached.
    pub fn replace(
        &mut self,
        list: NodeId,
        index: usize,
        value: Value,
    ) -> Result<Value, EditError> {
        let len = self.list_len(list)?;
        if index >= len {
            return Err(EditError::IndexOutOfBounds { index, len });
        }
        self.check_detached(&value, list)?;
        let old = match &mut self.nodes[list].data {
            NodeData::List(items) => std::mem::replace(&mut items[index], value.clone()),
            NodeData::Object { .. } => return Err(EditError::NotAList),
        };
        self.release(&old);
        self.adopt(&value, list);
        self.list_changed(list, Change::Replace(index), len);
        Ok(old)
    }

    pub fn remove(&mut self, list: NodeId, index: usize) -> Result<Value, EditError> {
        let len = self.list_len(list)?;
        if index >= len {
            return Err(EditError::IndexOutOfBounds { index, len });
        }
        let old = match &mut self.nodes[list].data {
            NodeData::List(items) => items.remove(index),
            NodeData::Object { .. } => return Err(EditError::NotAList),
        };
        self.release(&old);
        self.list_changed(list, Change::Remove(index), len);
        Ok(old)
    }

    /// Sets a field and returns its previous value. Setting [`Value::None`]
    /// keeps the field but leaves it empty.
    pub fn set_field(
        &mut self,
        object: NodeId,
        name: &str,
        value: Value,
    ) -> Result<Value, EditError> {
        if !matches!(self.nodes[object].data, NodeData::Object { .. }) {
            return Err(EditError::NotAnObject);
        }
        self.check_detached(&value, object)?;
        let old = match &mut self.nodes[object].data {
            NodeData::Object { fields, .. } => {
                fields.insert(name.into(), value.clone()).unwrap_or_default()
            }
            NodeData::List(_) => return Err(EditError::NotAnObject),
        };
        self.release(&old);
        self.adopt(&value, object);
        self.object_changed(object);
        Ok(old)
    }

    pub fn remove_field(&mut self, object: NodeId, name: &str) -> Result<Value, EditError> {
        let old = match &mut self.nodes[object].data {
            NodeData::Object { fields, .. } => fields.shift_remove(name).unwrap_or_default(),
            NodeData::List(_) => return Err(EditError::NotAnObject),
        };
        self.release(&old);
        self.object_changed(object);
        Ok(old)
    }

    fn list_len(&self, list: NodeId) -> Result<usize, EditError> {
        self.items(list).map(<[Value]>::len).ok_or(EditError::NotAList)
    }

    fn check_detached(&self, value: &Value, container: NodeId) -> Result<(), EditError> {
        let Value::Node(id) = *value else { return Ok(()) };
        let mut current = Some(container);
        while let Some(ancestor) = current {
            if ancestor == id {
                return Err(EditError::AlreadyAttached);
            }
            current = self.nodes[ancestor].parent;
        }
        if self.nodes[id].parent.is_some() || self.root == *value {
            return Err(EditError::AlreadyAttached);
        }
        Ok(())
    }

    fn adopt(&mut self, value: &Value, container: NodeId) {
        if let Value::Node(id) = *value {
            self.nodes[id].parent = Some(container);
            self.raise_stage(id, container);
        }
    }

    fn release(&mut self, value: &Value) {
        if let Value::Node(id) = *value {
            self.nodes[id].parent = None;
        }
    }

    /// Bound, valid and live: edits can be carried over to the parse node.
    fn patchable(&self, id: NodeId) -> bool {
        let node = &self.nodes[id];
        node.stage.is_live() && !node.invalid && node.parse_node.is_some()
    }

    fn list_changed(&mut self, list: NodeId, change: Change, old_len: usize) {
        if !self.patchable(list) {
            self.invalidate(list);
            return;
        }
        if let Err(error) = self.patch(list, change, old_len) {
            debug!("cannot patch {list:?} ({change:?}): {error}");
            self.rebuild(list);
        }
    }

    fn object_changed(&mut self, object: NodeId) {
        if self.patchable(object) {
            self.rebuild(object);
        } else {
            self.invalidate(object);
        }
    }

    /// Applies a list edit to the repetition node the list is bound to.
    fn patch(&mut self, list: NodeId, change: Change, old_len: usize) -> Result<(), GenerateError> {
        let grammar = Arc::clone(&self.grammar);
        let node = &self.nodes[list];
        let parselet = node.parselet.ok_or(GenerateError::Unbound)?;
        let mismatch = |reason: &str| GenerateError::ShapeMismatch {
            parselet: grammar.kind_name(grammar.kind(parselet)),
            reason: reason.to_string(),
        };
        let flags = grammar[parselet].flags();
        if !flags.repeat || grammar[parselet].is_lexical() {
            return Err(mismatch("list is not bound to a repetition"));
        }
        let old = node.parse_node.clone().ok_or(GenerateError::Unbound)?;
        let composite = match old.as_node() {
            Some(composite) if composite.is_repeat() && composite.children().len() == old_len => {
                composite.clone()
            }
            _ => return Err(mismatch("parse node does not line up with the list")),
        };

        let patched = match change {
            Change::Insert(index) => {
                let child = self.generate_item(parselet, list, index)?;
                composite.insert_child(index, child)
            }
            Change::Replace(index) => {
                let child = self.generate_item(parselet, list, index)?;
                composite.replace_child(index, child)
            }
            Change::Remove(_) if old_len == 1 && !flags.optional => {
                return Err(mismatch("needs at least one element"));
            }
            Change::Remove(index) => composite.remove_child(index),
        };
        let new: ParseNode = patched.into();
        trace!("patched {list:?} ({change:?})");
        self.nodes[list].parse_node = Some(new.clone());
        self.splice_up(list, old, new);
        Ok(())
    }

    fn generate_item(
        &mut self,
        parselet: ParseletId,
        list: NodeId,
        index: usize,
    ) -> Result<ParseNode, GenerateError> {
        let grammar = Arc::clone(&self.grammar);
        let item = self.items(list).and_then(|items| items.get(index)).cloned().unwrap_or_default();
        let (tree, bindings) = {
            let mut generator = Generator::new(&grammar, self, None);
            let tree = generator.item(parselet, &item)?;
            (tree, generator.finish())
        };
        self.apply(bindings, true, None);
        Ok(tree)
    }

    /// Regenerates a changed node from its content alone and splices the
    /// result into its ancestors.
    fn rebuild(&mut self, id: NodeId) {
        let old = self.nodes[id].parse_node.clone();
        self.nodes[id].invalid = true;
        match (old, self.try_regenerate(id, false)) {
            (Some(old), Ok(())) => {
                if let Some(new) = self.nodes[id].parse_node.clone() {
                    self.splice_up(id, old, new);
                }
            }
            (_, result) => {
                if let Err(error) = result {
                    debug!("cannot regenerate {id:?}: {error}");
                }
                self.invalidate(id);
            }
        }
    }

    /// Replaces `old` by `new` in the parse nodes of the ancestors of `id`.
    /// Ancestors that do not contain `old` are invalidated.
    pub(crate) fn splice_up(&mut self, id: NodeId, old: ParseNode, new: ParseNode) {
        let (mut child, mut old, mut new) = (id, old, new);
        loop {
            let Some(parent) = self.nodes[child].parent else {
                if self.root == Value::Node(child) && !self.tree_invalid {
                    match self.tree.as_ref().and_then(|tree| tree.replace(&old, &new)) {
                        Some(tree) => self.tree = Some(tree),
                        None => self.tree_invalid = true,
                    }
                }
                return;
            };
            let node = &self.nodes[parent];
            if node.invalid {
                return;
            }
            let Some(parent_old) = node.parse_node.clone() else {
                self.invalidate(parent);
                return;
            };
            let Some(parent_new) = parent_old.replace(&old, &new) else {
                debug!("parse node of {child:?} is not below {parent:?}");
                self.invalidate(parent);
                return;
            };
            self.nodes[parent].parse_node = Some(parent_new.clone());
            (child, old, new) = (parent, parent_old, parent_new);
        }
    }
}
