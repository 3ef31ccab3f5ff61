//! # Tree Snapshots
//!
//! A `Tree` is one immutable snapshot of a document. It pairs the root node
//! with a key → path index so that parent and ancestor lookups are index
//! lookups instead of back-pointers.
//!
//! Editing primitives never touch the receiver. They copy the nodes on the
//! path from the root to the edit and reuse every other subtree, so an
//! unchanged paragraph is the same `Arc` in both snapshots.

use crate::error::{DocumentError, DocumentResult};
use crate::key::Key;
use crate::node::{Node, Texts};
use crate::selection::Selection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

/// Child indexes leading from the document to a node
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Path(Vec<usize>);

impl Path {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(indexes: Vec<usize>) -> Self {
        Self(indexes)
    }

    pub fn child(&self, index: usize) -> Path {
        let mut indexes = self.0.clone();
        indexes.push(index);
        Path(indexes)
    }

    pub fn parent(&self) -> Option<Path> {
        let (_, parent) = self.0.split_last()?;
        Some(Path(parent.to_vec()))
    }

    /// Index within the parent
    pub fn index(&self) -> Option<usize> {
        self.0.last().copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Strict ancestor test
    pub fn is_ancestor_of(&self, other: &Path) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }
}

impl Deref for Path {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.0
    }
}

/// Immutable document snapshot
#[derive(Debug, Clone)]
pub struct Tree {
    document: Arc<Node>,
    index: Arc<HashMap<Key, Path>>,
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.document == other.document
    }
}

impl Tree {
    /// Wrap a document node, rejecting other kinds and duplicate keys
    pub fn new(document: Node) -> DocumentResult<Self> {
        Self::from_root(Arc::new(document))
    }

    /// Build a document from top-level nodes
    pub fn from_nodes(nodes: Vec<Node>) -> DocumentResult<Self> {
        Self::new(Node::document(nodes))
    }

    fn from_root(document: Arc<Node>) -> DocumentResult<Self> {
        if !document.is_document() {
            return Err(DocumentError::NotADocument(document.kind()));
        }

        let mut index = HashMap::new();
        index_node(&document, Path::root(), &mut index)?;

        Ok(Self {
            document,
            index: Arc::new(index),
        })
    }

    pub fn document(&self) -> &Arc<Node> {
        &self.document
    }

    /// Number of nodes, document included
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.nodes().is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.index.keys()
    }

    pub fn has_node(&self, key: &Key) -> bool {
        self.index.contains_key(key)
    }

    pub fn get_path(&self, key: &Key) -> DocumentResult<&Path> {
        self.index
            .get(key)
            .ok_or_else(|| DocumentError::NotFound(key.clone()))
    }

    pub fn node_at_path(&self, path: &[usize]) -> Option<&Arc<Node>> {
        let mut node = &self.document;
        for &index in path {
            node = node.child(index)?;
        }
        Some(node)
    }

    pub fn get_node(&self, key: &Key) -> DocumentResult<&Arc<Node>> {
        let path = self.get_path(key)?;
        self.node_at_path(path)
            .ok_or_else(|| DocumentError::InvalidPath(format!("stale index entry for {}", key)))
    }

    pub fn get_parent(&self, key: &Key) -> DocumentResult<&Arc<Node>> {
        let parent = self
            .get_path(key)?
            .parent()
            .ok_or_else(|| DocumentError::NoParent(key.clone()))?;
        self.node_at_path(&parent)
            .ok_or_else(|| DocumentError::InvalidPath(format!("missing parent of {}", key)))
    }

    /// Ancestors from the document down, excluding the node itself
    pub fn get_ancestors(&self, key: &Key) -> DocumentResult<Vec<&Arc<Node>>> {
        let path = self.get_path(key)?;
        let mut ancestors = Vec::with_capacity(path.depth());
        let mut node = &self.document;
        for &index in path.iter() {
            ancestors.push(node);
            node = node
                .child(index)
                .ok_or_else(|| DocumentError::InvalidPath(format!("broken path to {}", key)))?;
        }
        Ok(ancestors)
    }

    /// Nearest block ancestor
    pub fn get_closest_block(&self, key: &Key) -> DocumentResult<Option<&Arc<Node>>> {
        Ok(self
            .get_ancestors(key)?
            .into_iter()
            .rev()
            .find(|node| node.is_block()))
    }

    /// Nearest inline ancestor
    pub fn get_closest_inline(&self, key: &Key) -> DocumentResult<Option<&Arc<Node>>> {
        Ok(self
            .get_ancestors(key)?
            .into_iter()
            .rev()
            .find(|node| node.is_inline()))
    }

    pub fn get_texts(&self) -> Texts<'_> {
        self.document.texts()
    }

    pub fn get_first_text(&self) -> Option<&Node> {
        self.get_texts().next()
    }

    pub fn get_last_text(&self) -> Option<&Node> {
        self.get_texts().last()
    }

    /// Last text that ends before the node with `key` starts
    pub fn get_previous_text(&self, key: &Key) -> DocumentResult<Option<&Node>> {
        let path = self.get_path(key)?;
        Ok(self
            .get_texts()
            .take_while(|text| self.position_of(text) < Some(path))
            .filter(|text| !self.is_within(text, path))
            .last())
    }

    /// First text that starts after the node with `key` ends
    pub fn get_next_text(&self, key: &Key) -> DocumentResult<Option<&Node>> {
        let path = self.get_path(key)?;
        Ok(self
            .get_texts()
            .find(|text| self.position_of(text) > Some(path) && !self.is_within(text, path)))
    }

    /// Text nodes spanned by a selection, in document order
    pub fn get_texts_in_range(&self, selection: &Selection) -> DocumentResult<Vec<&Node>> {
        let (Some(start), Some(end)) = (selection.start(self), selection.end(self)) else {
            return Ok(Vec::new());
        };
        let start_path = self.get_path(&start.key)?;
        let end_path = self.get_path(&end.key)?;

        Ok(self
            .get_texts()
            .filter(|text| {
                self.position_of(text)
                    .map(|path| path >= start_path && path <= end_path)
                    .unwrap_or(false)
            })
            .collect())
    }

    /// Both snapshots hold the very same allocation for `key`
    pub fn shares_node(&self, other: &Tree, key: &Key) -> bool {
        match (self.get_node(key), other.get_node(key)) {
            (Ok(a), Ok(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Structural equality ignoring keys
    pub fn content_eq(&self, other: &Tree) -> bool {
        self.document.content_eq(&other.document)
    }

    /// Replace the node with `key` by the result of `f`
    pub fn update_node<F>(&self, key: &Key, f: F) -> DocumentResult<Tree>
    where
        F: FnOnce(&Node) -> DocumentResult<Node>,
    {
        let path = self.get_path(key)?.clone();
        let document = rebuild(&self.document, &path, f)?;
        Self::from_root(document)
    }

    /// Edit the child list of `parent_key` in place on a copy
    pub fn update_children<F>(&self, parent_key: &Key, f: F) -> DocumentResult<Tree>
    where
        F: FnOnce(&mut Vec<Arc<Node>>) -> DocumentResult<()>,
    {
        self.update_node(parent_key, |parent| {
            let mut parent = parent.clone();
            let nodes = parent
                .nodes_mut()
                .ok_or_else(|| DocumentError::InvalidPath(format!("{} cannot have children", parent_key)))?;
            f(nodes)?;
            Ok(parent)
        })
    }

    pub fn insert_node(&self, parent_key: &Key, index: usize, node: Arc<Node>) -> DocumentResult<Tree> {
        self.update_children(parent_key, |nodes| {
            if index > nodes.len() {
                return Err(DocumentError::InvalidPath(format!(
                    "index {} out of bounds for {} children",
                    index,
                    nodes.len()
                )));
            }
            nodes.insert(index, node);
            Ok(())
        })
    }

    /// Remove the node with `key`, returning the new snapshot and the
    /// detached subtree
    pub fn remove_node(&self, key: &Key) -> DocumentResult<(Tree, Arc<Node>)> {
        let removed = Arc::clone(self.get_node(key)?);
        let parent_key = self.get_parent(key)?.key().clone();
        let tree = self.update_children(&parent_key, |nodes| {
            nodes.retain(|child| child.key() != key);
            Ok(())
        })?;
        Ok((tree, removed))
    }

    fn position_of(&self, node: &Node) -> Option<&Path> {
        self.index.get(node.key())
    }

    fn is_within(&self, node: &Node, ancestor: &Path) -> bool {
        self.position_of(node)
            .map(|path| path == ancestor || ancestor.is_ancestor_of(path))
            .unwrap_or(false)
    }
}

fn index_node(node: &Node, path: Path, index: &mut HashMap<Key, Path>) -> DocumentResult<()> {
    for (i, child) in node.nodes().iter().enumerate() {
        index_node(child, path.child(i), index)?;
    }
    let key = node.key();
    if index.insert(key.clone(), path).is_some() {
        return Err(DocumentError::DuplicateKey(key.clone()));
    }
    key.observe();
    Ok(())
}

/// Copy the nodes along `path`, replacing its target with `f(target)`
fn rebuild<F>(node: &Arc<Node>, path: &[usize], f: F) -> DocumentResult<Arc<Node>>
where
    F: FnOnce(&Node) -> DocumentResult<Node>,
{
    let Some((&index, rest)) = path.split_first() else {
        return f(node).map(Arc::new);
    };

    let child = node
        .child(index)
        .ok_or_else(|| DocumentError::InvalidPath(format!("no child at index {}", index)))?;
    let updated = rebuild(child, rest, f)?;

    let mut copy = (**node).clone();
    if let Some(nodes) = copy.nodes_mut() {
        nodes[index] = updated;
    }
    Ok(Arc::new(copy))
}
