//! # Operations
//!
//! The closed set of primitive edits. Everything the editor does to a tree,
//! whether asked by a caller or by a schema repair, is one of these.
//!
//! ## Design Principles
//!
//! 1. **Self-contained**: each record carries what it needs to apply and to
//!    invert itself, so an operation log can be replayed or undone without
//!    the tree it came from
//! 2. **Total**: a violated precondition is an `InvalidOperation` error,
//!    never a panic or a silent no-op
//! 3. **Pure**: applying produces a new tree and selection; the inputs are
//!    left untouched
//!
//! ## Selection Semantics
//!
//! ### RemoveNode
//! - Endpoints inside the removed subtree move to the end of the previous
//!   surviving text, else the start of the next one, else the selection is
//!   unset
//!
//! ### MergeNode / SplitNode (text)
//! - Endpoints follow their characters into the merged or split node
//!
//! ### InsertText / RemoveText
//! - Endpoints after the edit shift by its length; endpoints inside a
//!   removed span collapse to its start

use crate::errors::{EditorError, EditorResult};
use folio_document::{Data, DocumentError, Key, Leaf, Mark, Node, Point, Selection, Text, Tree};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Element properties touched by `SetNode`, `MergeNode` and `SplitNode`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeProperties {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_void: Option<bool>,
}

impl NodeProperties {
    pub fn node_type(node_type: impl Into<String>) -> Self {
        Self {
            node_type: Some(node_type.into()),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: Data) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_void(mut self, is_void: bool) -> Self {
        self.is_void = Some(is_void);
        self
    }

    /// Every property `node` has
    pub fn of(node: &Node) -> Self {
        match node {
            Node::Block(element) | Node::Inline(element) => Self {
                node_type: Some(element.node_type.clone()),
                data: Some(element.data.clone()),
                is_void: Some(element.is_void),
            },
            Node::Document(document) => Self {
                data: Some(document.data.clone()),
                ..Self::default()
            },
            Node::Text(_) => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.node_type.is_none() && self.data.is_none() && self.is_void.is_none()
    }

    /// Current values of `node` for the properties set on `self`
    pub fn previous_of(&self, node: &Node) -> Self {
        let current = Self::of(node);
        Self {
            node_type: self.node_type.as_ref().and(current.node_type),
            data: self.data.as_ref().and(current.data),
            is_void: self.is_void.and(current.is_void),
        }
    }

    pub fn apply_to(&self, node: &Node) -> EditorResult<Node> {
        let mut node = node.clone();
        match &mut node {
            Node::Block(element) | Node::Inline(element) => {
                if let Some(node_type) = &self.node_type {
                    element.node_type = node_type.clone();
                }
                if let Some(data) = &self.data {
                    element.data = data.clone();
                }
                if let Some(is_void) = self.is_void {
                    element.is_void = is_void;
                }
            }
            Node::Document(document) if self.node_type.is_none() && self.is_void.is_none() => {
                if let Some(data) = &self.data {
                    document.data = data.clone();
                }
            }
            Node::Text(_) if self.is_empty() => {}
            other => {
                return Err(EditorError::invalid(format!(
                    "cannot set {:?} on {:?} node {}",
                    self,
                    other.kind(),
                    other.key()
                )))
            }
        }
        Ok(node)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Insert `node` as child `index` of `parent_key`
    InsertNode {
        parent_key: Key,
        index: usize,
        node: Arc<Node>,
    },

    /// Remove child `index` of `parent_key`; `node` is the captured subtree
    RemoveNode {
        parent_key: Key,
        index: usize,
        node: Arc<Node>,
    },

    /// Merge `key` into its previous sibling `previous_key`
    ///
    /// `position` is the boundary inside the merged node: the text length
    /// or child count of `previous_key` before the merge.
    MergeNode {
        key: Key,
        previous_key: Key,
        position: usize,
        properties: NodeProperties,
    },

    /// Split `key` at `position`, moving the right half into `new_key`
    SplitNode {
        key: Key,
        position: usize,
        new_key: Key,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        properties: Option<NodeProperties>,
    },

    SetNode {
        key: Key,
        properties: NodeProperties,
        previous: NodeProperties,
    },

    InsertText {
        key: Key,
        offset: usize,
        leaves: Vec<Leaf>,
    },

    /// `leaves` is the removed content
    RemoveText {
        key: Key,
        offset: usize,
        leaves: Vec<Leaf>,
    },

    AddMark {
        key: Key,
        offset: usize,
        length: usize,
        mark: Mark,
    },

    RemoveMark {
        key: Key,
        offset: usize,
        length: usize,
        mark: Mark,
    },

    SetSelection {
        properties: Selection,
        previous: Selection,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::InsertNode { .. } => "insert_node",
            Operation::RemoveNode { .. } => "remove_node",
            Operation::MergeNode { .. } => "merge_node",
            Operation::SplitNode { .. } => "split_node",
            Operation::SetNode { .. } => "set_node",
            Operation::InsertText { .. } => "insert_text",
            Operation::RemoveText { .. } => "remove_text",
            Operation::AddMark { .. } => "add_mark",
            Operation::RemoveMark { .. } => "remove_mark",
            Operation::SetSelection { .. } => "set_selection",
        }
    }

    /// Apply to a tree and selection, producing new ones
    pub fn apply(&self, tree: &Tree, selection: &Selection) -> EditorResult<(Tree, Selection)> {
        match self {
            Operation::InsertNode { parent_key, index, node } => {
                Self::apply_insert_node(tree, selection, parent_key, *index, node)
            }

            Operation::RemoveNode { parent_key, index, node } => {
                Self::apply_remove_node(tree, selection, parent_key, *index, node)
            }

            Operation::MergeNode { key, previous_key, position, .. } => {
                Self::apply_merge_node(tree, selection, key, previous_key, *position)
            }

            Operation::SplitNode { key, position, new_key, properties } => {
                Self::apply_split_node(tree, selection, key, *position, new_key, properties.as_ref())
            }

            Operation::SetNode { key, properties, .. } => {
                let updated = properties.apply_to(tree.get_node(key)?)?;
                let tree = tree.update_node(key, |_| Ok(updated))?;
                Ok((tree, selection.clone()))
            }

            Operation::InsertText { key, offset, leaves } => {
                Self::apply_insert_text(tree, selection, key, *offset, leaves)
            }

            Operation::RemoveText { key, offset, leaves } => {
                Self::apply_remove_text(tree, selection, key, *offset, leaves)
            }

            Operation::AddMark { key, offset, length, mark } => {
                let tree = Self::update_text(tree, key, *offset, *length, |text| {
                    text.add_mark(*offset, *length, mark)
                })?;
                Ok((tree, selection.clone()))
            }

            Operation::RemoveMark { key, offset, length, mark } => {
                let tree = Self::update_text(tree, key, *offset, *length, |text| {
                    text.remove_mark(*offset, *length, mark)
                })?;
                Ok((tree, selection.clone()))
            }

            Operation::SetSelection { properties, .. } => {
                for point in [properties.anchor(), properties.focus_point()].into_iter().flatten() {
                    let len = tree.get_node(&point.key)?.text_len();
                    check_position(point.offset, len, &point.key)?;
                }
                Ok((tree.clone(), properties.clone()))
            }
        }
    }

    /// The operation that undoes this one
    pub fn invert(&self) -> Operation {
        match self.clone() {
            Operation::InsertNode { parent_key, index, node } => {
                Operation::RemoveNode { parent_key, index, node }
            }
            Operation::RemoveNode { parent_key, index, node } => {
                Operation::InsertNode { parent_key, index, node }
            }
            Operation::MergeNode { key, previous_key, position, properties } => Operation::SplitNode {
                key: previous_key,
                position,
                new_key: key,
                properties: Some(properties),
            },
            Operation::SplitNode { key, position, new_key, properties } => Operation::MergeNode {
                key: new_key,
                previous_key: key,
                position,
                properties: properties.unwrap_or_default(),
            },
            Operation::SetNode { key, properties, previous } => Operation::SetNode {
                key,
                properties: previous,
                previous: properties,
            },
            Operation::InsertText { key, offset, leaves } => {
                Operation::RemoveText { key, offset, leaves }
            }
            Operation::RemoveText { key, offset, leaves } => {
                Operation::InsertText { key, offset, leaves }
            }
            Operation::AddMark { key, offset, length, mark } => {
                Operation::RemoveMark { key, offset, length, mark }
            }
            Operation::RemoveMark { key, offset, length, mark } => {
                Operation::AddMark { key, offset, length, mark }
            }
            Operation::SetSelection { properties, previous } => Operation::SetSelection {
                properties: previous,
                previous: properties,
            },
        }
    }

    /// Keys whose subtree the schema has to look at again after this
    /// operation; callers add ancestors
    pub fn dirty_keys(&self) -> Vec<Key> {
        match self {
            Operation::InsertNode { parent_key, node, .. } => {
                let mut keys = vec![parent_key.clone(), node.key().clone()];
                keys.extend(node.descendants().map(|child| child.key().clone()));
                keys
            }
            Operation::RemoveNode { parent_key, .. } => vec![parent_key.clone()],
            Operation::MergeNode { previous_key, .. } => vec![previous_key.clone()],
            Operation::SplitNode { key, new_key, .. } => vec![key.clone(), new_key.clone()],
            Operation::SetNode { key, .. }
            | Operation::InsertText { key, .. }
            | Operation::RemoveText { key, .. }
            | Operation::AddMark { key, .. }
            | Operation::RemoveMark { key, .. } => vec![key.clone()],
            Operation::SetSelection { .. } => Vec::new(),
        }
    }

    fn apply_insert_node(
        tree: &Tree,
        selection: &Selection,
        parent_key: &Key,
        index: usize,
        node: &Arc<Node>,
    ) -> EditorResult<(Tree, Selection)> {
        let parent = tree.get_node(parent_key)?;
        if parent.is_text() {
            return Err(EditorError::invalid(format!("text node {} cannot have children", parent_key)));
        }
        if node.is_document() {
            return Err(EditorError::invalid("cannot insert a document node"));
        }
        if index > parent.nodes().len() {
            return Err(EditorError::invalid(format!(
                "index {} out of bounds for {} ({} children)",
                index,
                parent_key,
                parent.nodes().len()
            )));
        }
        if let Some(existing) = std::iter::once(node.as_ref())
            .chain(node.descendants())
            .find(|candidate| tree.has_node(candidate.key()))
        {
            return Err(EditorError::invalid(format!("key {} already exists", existing.key())));
        }

        let tree = tree.insert_node(parent_key, index, Arc::clone(node))?;
        Ok((tree, selection.clone()))
    }

    fn apply_remove_node(
        tree: &Tree,
        selection: &Selection,
        parent_key: &Key,
        index: usize,
        node: &Arc<Node>,
    ) -> EditorResult<(Tree, Selection)> {
        let parent = tree.get_node(parent_key)?;
        let key = node.key();
        match parent.child(index) {
            Some(child) if child.key() == key => {}
            _ => {
                return Err(EditorError::invalid(format!(
                    "{} is not child {} of {}",
                    key, index, parent_key
                )))
            }
        }

        let removed = tree.get_node(key)?;
        let selection = if selection.has_edge_in(removed) {
            let replacement = match (tree.get_previous_text(key)?, tree.get_next_text(key)?) {
                (Some(previous), _) => Some(Point::new(previous.key().clone(), previous.text_len())),
                (None, Some(next)) => Some(Point::new(next.key().clone(), 0)),
                (None, None) => None,
            };
            match replacement {
                Some(replacement) => selection.map_points(|point| {
                    if removed.contains_key(&point.key) {
                        replacement.clone()
                    } else {
                        point
                    }
                }),
                None => Selection {
                    is_focused: selection.is_focused,
                    ..Selection::unset()
                },
            }
        } else {
            selection.clone()
        };

        let (tree, _) = tree.remove_node(key)?;
        Ok((tree, selection))
    }

    fn apply_merge_node(
        tree: &Tree,
        selection: &Selection,
        key: &Key,
        previous_key: &Key,
        position: usize,
    ) -> EditorResult<(Tree, Selection)> {
        let node = Arc::clone(tree.get_node(key)?);
        let parent = tree.get_parent(key)?;
        let index = parent
            .child_index(key)
            .ok_or_else(|| EditorError::NotFound(key.clone()))?;
        if index == 0 {
            return Err(EditorError::invalid(format!("{} has no previous sibling", key)));
        }
        let previous = Arc::clone(&parent.nodes()[index - 1]);
        if previous.key() != previous_key {
            return Err(EditorError::invalid(format!(
                "previous sibling of {} is {}, not {}",
                key,
                previous.key(),
                previous_key
            )));
        }
        if previous.kind() != node.kind() {
            return Err(EditorError::invalid(format!(
                "cannot merge {:?} {} into {:?} {}",
                node.kind(),
                key,
                previous.kind(),
                previous_key
            )));
        }

        let merged = match (previous.as_ref(), node.as_ref()) {
            (Node::Text(left), Node::Text(right)) => {
                check_boundary(position, left.len(), previous_key)?;
                Node::Text(left.concat(right))
            }
            _ => {
                check_boundary(position, previous.nodes().len(), previous_key)?;
                let mut merged = previous.as_ref().clone();
                if let Some(nodes) = merged.nodes_mut() {
                    nodes.extend(node.nodes().iter().cloned());
                }
                merged
            }
        };

        let parent_key = parent.key().clone();
        let tree = tree.update_children(&parent_key, |nodes| {
            nodes[index - 1] = Arc::new(merged);
            nodes.remove(index);
            Ok(())
        })?;

        let selection = if node.is_text() {
            selection.map_points(|point| {
                if &point.key == key {
                    Point::new(previous_key.clone(), point.offset + position)
                } else {
                    point
                }
            })
        } else {
            selection.clone()
        };

        Ok((tree, selection))
    }

    fn apply_split_node(
        tree: &Tree,
        selection: &Selection,
        key: &Key,
        position: usize,
        new_key: &Key,
        properties: Option<&NodeProperties>,
    ) -> EditorResult<(Tree, Selection)> {
        let node = tree.get_node(key)?;
        if node.is_document() {
            return Err(EditorError::invalid("cannot split the document"));
        }
        if tree.has_node(new_key) {
            return Err(EditorError::invalid(format!("key {} already exists", new_key)));
        }

        let (left, right) = match node.as_ref() {
            Node::Text(text) => {
                check_position(position, text.len(), key)?;
                let (left, right) = text.split_at(position);
                (
                    Node::text_with_leaves(left).with_key(key.clone()),
                    Node::text_with_leaves(right).with_key(new_key.clone()),
                )
            }
            element => {
                check_position(position, element.nodes().len(), key)?;
                let mut left = element.clone();
                let mut right = element.clone().with_key(new_key.clone());
                if let Some(nodes) = left.nodes_mut() {
                    nodes.truncate(position);
                }
                if let Some(nodes) = right.nodes_mut() {
                    nodes.drain(..position);
                }
                if let Some(properties) = properties {
                    right = properties.apply_to(&right)?;
                }
                (left, right)
            }
        };

        let is_text = node.is_text();
        let parent_key = tree.get_parent(key)?.key().clone();
        let tree = tree.update_children(&parent_key, |nodes| {
            let index = nodes
                .iter()
                .position(|child| child.key() == key)
                .ok_or_else(|| DocumentError::NotFound(key.clone()))?;
            nodes[index] = Arc::new(left);
            nodes.insert(index + 1, Arc::new(right));
            Ok(())
        })?;

        let selection = if is_text {
            selection.map_points(|point| {
                if &point.key == key && point.offset >= position {
                    Point::new(new_key.clone(), point.offset - position)
                } else {
                    point
                }
            })
        } else {
            selection.clone()
        };

        Ok((tree, selection))
    }

    fn apply_insert_text(
        tree: &Tree,
        selection: &Selection,
        key: &Key,
        offset: usize,
        leaves: &[Leaf],
    ) -> EditorResult<(Tree, Selection)> {
        let inserted: usize = leaves.iter().map(Leaf::len).sum();
        let tree = Self::update_text(tree, key, offset, 0, |text| text.insert_leaves(offset, leaves))?;

        let selection = selection.map_points(|point| {
            if &point.key == key && point.offset >= offset {
                Point::new(point.key, point.offset + inserted)
            } else {
                point
            }
        });

        Ok((tree, selection))
    }

    fn apply_remove_text(
        tree: &Tree,
        selection: &Selection,
        key: &Key,
        offset: usize,
        leaves: &[Leaf],
    ) -> EditorResult<(Tree, Selection)> {
        let length: usize = leaves.iter().map(Leaf::len).sum();
        let text = tree
            .get_node(key)?
            .as_text()
            .ok_or_else(|| EditorError::invalid(format!("{} is not a text node", key)))?;
        let in_bounds = offset.checked_add(length).is_some_and(|end| end <= text.len());
        if in_bounds && !text.has_leaves_at(offset, leaves) {
            return Err(EditorError::invalid(format!(
                "content at {} in {} does not match the removed text",
                offset, key
            )));
        }
        let tree = Self::update_text(tree, key, offset, length, |text| text.remove_text(offset, length).0)?;

        let selection = selection.map_points(|point| {
            if &point.key != key || point.offset <= offset {
                point
            } else if point.offset >= offset + length {
                Point::new(point.key, point.offset - length)
            } else {
                Point::new(point.key, offset)
            }
        });

        Ok((tree, selection))
    }

    /// Replace a text node after checking `offset..offset + length` is in
    /// bounds
    fn update_text<F>(tree: &Tree, key: &Key, offset: usize, length: usize, f: F) -> EditorResult<Tree>
    where
        F: FnOnce(&Text) -> Text,
    {
        let node = tree.get_node(key)?;
        let text = node
            .as_text()
            .ok_or_else(|| EditorError::invalid(format!("{} is not a text node", key)))?;
        if !offset.checked_add(length).is_some_and(|end| end <= text.len()) {
            return Err(EditorError::invalid(format!(
                "range of {} chars at {} is past the end of {} (length {})",
                length,
                offset,
                key,
                text.len()
            )));
        }

        let updated = Node::Text(f(text));
        Ok(tree.update_node(key, |_| Ok(updated))?)
    }
}

/// Inverses of `operations`, in the order that undoes them
pub fn invert_operations(operations: &[Operation]) -> Vec<Operation> {
    operations.iter().rev().map(Operation::invert).collect()
}

/// A merge boundary must match the previous node exactly
fn check_boundary(position: usize, boundary: usize, key: &Key) -> EditorResult<()> {
    if position != boundary {
        return Err(EditorError::invalid(format!(
            "position {} does not match the end of {} ({})",
            position, key, boundary
        )));
    }
    Ok(())
}

fn check_position(position: usize, boundary: usize, key: &Key) -> EditorResult<()> {
    if position > boundary {
        return Err(EditorError::invalid(format!(
            "position {} is past the end of {} ({})",
            position, key, boundary
        )));
    }
    Ok(())
}
