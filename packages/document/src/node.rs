//! # Document Nodes
//!
//! The typed node hierarchy: a document holds blocks, blocks hold blocks or
//! inlines and texts, inlines hold inlines and texts, texts hold leaves.
//!
//! Children are shared through `Arc`, so cloning a node is shallow: the
//! clone owns a fresh child vector pointing at the same subtrees. Editing
//! code relies on that to copy only the path from the root to the edit.
//!
//! All text offsets count `char`s, never bytes.

use crate::key::Key;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Caller-defined metadata attached to documents and elements
pub type Data = BTreeMap<String, serde_json::Value>;

/// Ordered set of marks carried by a leaf
pub type Marks = BTreeSet<Mark>;

/// Node kind discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Document,
    Block,
    Inline,
    Text,
}

/// Opaque formatting tag
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub mark_type: String,
}

impl Mark {
    pub fn new(mark_type: impl Into<String>) -> Self {
        Self {
            mark_type: mark_type.into(),
        }
    }
}

/// A run of text sharing one set of marks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaf {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

impl Leaf {
    pub fn new(text: impl Into<String>, marks: Marks) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Marks::new())
    }

    /// Length in chars
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Root container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub key: Key,
    #[serde(default)]
    pub data: Data,
    #[serde(default)]
    pub nodes: Vec<Arc<Node>>,
}

/// Block or inline container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub key: Key,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub data: Data,
    #[serde(rename = "isVoid", default)]
    pub is_void: bool,
    #[serde(default)]
    pub nodes: Vec<Arc<Node>>,
}

/// Text leaf node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub key: Key,
    #[serde(default)]
    pub leaves: Vec<Leaf>,
}

impl Text {
    pub fn new(text: &str) -> Self {
        Self::from_leaves(vec![Leaf::plain(text)])
    }

    /// Build a text node from leaves, dropping empty ones
    pub fn from_leaves(leaves: Vec<Leaf>) -> Self {
        Self {
            key: Key::generate(),
            leaves: leaves.into_iter().filter(|leaf| !leaf.is_empty()).collect(),
        }
    }

    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    pub fn text(&self) -> String {
        self.leaves.iter().map(|leaf| leaf.text.as_str()).collect()
    }

    /// Length in chars
    pub fn len(&self) -> usize {
        self.leaves.iter().map(Leaf::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.iter().all(Leaf::is_empty)
    }

    /// Marks in effect at `offset`: those of the char before it, or of the
    /// first char when `offset` is zero
    pub fn marks_at(&self, offset: usize) -> Marks {
        let mut end = 0;
        for leaf in &self.leaves {
            end += leaf.len();
            if offset <= end && (offset > 0 || end > 0) {
                return leaf.marks.clone();
            }
        }
        self.leaves
            .last()
            .map(|leaf| leaf.marks.clone())
            .unwrap_or_default()
    }

    /// Split the leaves at a char offset
    pub fn split_at(&self, offset: usize) -> (Vec<Leaf>, Vec<Leaf>) {
        split_leaves(&self.leaves, offset)
    }

    /// Leaves covering `offset..offset + len`
    pub fn slice(&self, offset: usize, len: usize) -> Vec<Leaf> {
        let (_, rest) = split_leaves(&self.leaves, offset);
        split_leaves(&rest, len).0
    }

    /// Whether `leaves` is exactly the content at `offset`, ignoring how
    /// either side splits into leaves
    pub fn has_leaves_at(&self, offset: usize, leaves: &[Leaf]) -> bool {
        let len = leaves.iter().map(Leaf::len).sum();
        coalesce(self.slice(offset, len)) == coalesce(leaves.to_vec())
    }

    /// Insert leaves at `offset`, coalescing neighbours with equal marks
    pub fn insert_leaves(&self, offset: usize, inserted: &[Leaf]) -> Text {
        let (mut leaves, right) = split_leaves(&self.leaves, offset);
        leaves.extend(inserted.iter().cloned());
        leaves.extend(right);
        self.with_leaves(coalesce(leaves))
    }

    pub fn insert_text(&self, offset: usize, text: &str, marks: Marks) -> Text {
        self.insert_leaves(offset, &[Leaf::new(text, marks)])
    }

    /// Remove `len` chars at `offset`, returning the new node and the
    /// removed leaves
    pub fn remove_text(&self, offset: usize, len: usize) -> (Text, Vec<Leaf>) {
        let (mut leaves, rest) = split_leaves(&self.leaves, offset);
        let (removed, right) = split_leaves(&rest, len);
        leaves.extend(right);
        (self.with_leaves(coalesce(leaves)), removed)
    }

    pub fn add_mark(&self, offset: usize, len: usize, mark: &Mark) -> Text {
        self.map_marks(offset, len, |marks| {
            marks.insert(mark.clone());
        })
    }

    pub fn remove_mark(&self, offset: usize, len: usize, mark: &Mark) -> Text {
        self.map_marks(offset, len, |marks| {
            marks.remove(mark);
        })
    }

    /// Append another text's leaves verbatim (no coalescing)
    pub fn concat(&self, other: &Text) -> Text {
        let mut leaves = self.leaves.clone();
        leaves.extend(other.leaves.iter().filter(|leaf| !leaf.is_empty()).cloned());
        self.with_leaves(leaves)
    }

    fn map_marks(&self, offset: usize, len: usize, mut f: impl FnMut(&mut Marks)) -> Text {
        let (mut leaves, rest) = split_leaves(&self.leaves, offset);
        let (middle, right) = split_leaves(&rest, len);
        for mut leaf in middle {
            f(&mut leaf.marks);
            leaves.push(leaf);
        }
        leaves.extend(right);
        self.with_leaves(coalesce(leaves))
    }

    fn with_leaves(&self, leaves: Vec<Leaf>) -> Text {
        Text {
            key: self.key.clone(),
            leaves,
        }
    }
}

/// Byte index of the `offset`-th char
fn byte_index(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

fn split_leaves(leaves: &[Leaf], offset: usize) -> (Vec<Leaf>, Vec<Leaf>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut start = 0;

    for leaf in leaves {
        let len = leaf.len();
        if start + len <= offset {
            left.push(leaf.clone());
        } else if start >= offset {
            right.push(leaf.clone());
        } else {
            let at = byte_index(&leaf.text, offset - start);
            left.push(Leaf::new(&leaf.text[..at], leaf.marks.clone()));
            right.push(Leaf::new(&leaf.text[at..], leaf.marks.clone()));
        }
        start += len;
    }

    (
        left.into_iter().filter(|leaf| !leaf.is_empty()).collect(),
        right.into_iter().filter(|leaf| !leaf.is_empty()).collect(),
    )
}

/// Merge neighbouring leaves with identical marks and drop empty ones
fn coalesce(leaves: Vec<Leaf>) -> Vec<Leaf> {
    let mut result: Vec<Leaf> = Vec::with_capacity(leaves.len());
    for leaf in leaves.into_iter().filter(|leaf| !leaf.is_empty()) {
        match result.last_mut() {
            Some(last) if last.marks == leaf.marks => last.text.push_str(&leaf.text),
            _ => result.push(leaf),
        }
    }
    result
}

/// A node of the document tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Document(Document),
    Block(Element),
    Inline(Element),
    Text(Text),
}

impl Node {
    pub fn document(nodes: Vec<Node>) -> Self {
        Node::Document(Document {
            key: Key::generate(),
            data: Data::new(),
            nodes: nodes.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn block(node_type: impl Into<String>, nodes: Vec<Node>) -> Self {
        Node::Block(Element::new(node_type, nodes))
    }

    pub fn inline(node_type: impl Into<String>, nodes: Vec<Node>) -> Self {
        Node::Inline(Element::new(node_type, nodes))
    }

    pub fn text(text: &str) -> Self {
        Node::Text(Text::new(text))
    }

    pub fn text_with_leaves(leaves: Vec<Leaf>) -> Self {
        Node::Text(Text::from_leaves(leaves))
    }

    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        let key = key.into();
        match &mut self {
            Node::Document(document) => document.key = key,
            Node::Block(element) | Node::Inline(element) => element.key = key,
            Node::Text(text) => text.key = key,
        }
        self
    }

    /// Replace the data map; ignored on text nodes
    pub fn with_data(mut self, data: Data) -> Self {
        match &mut self {
            Node::Document(document) => document.data = data,
            Node::Block(element) | Node::Inline(element) => element.data = data,
            Node::Text(_) => {}
        }
        self
    }

    /// Mark an element as void; ignored on documents and texts
    pub fn with_void(mut self, is_void: bool) -> Self {
        if let Node::Block(element) | Node::Inline(element) = &mut self {
            element.is_void = is_void;
        }
        self
    }

    pub fn key(&self) -> &Key {
        match self {
            Node::Document(document) => &document.key,
            Node::Block(element) | Node::Inline(element) => &element.key,
            Node::Text(text) => &text.key,
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Node::Document(_) => Kind::Document,
            Node::Block(_) => Kind::Block,
            Node::Inline(_) => Kind::Inline,
            Node::Text(_) => Kind::Text,
        }
    }

    pub fn node_type(&self) -> Option<&str> {
        self.as_element().map(|element| element.node_type.as_str())
    }

    pub fn data(&self) -> Option<&Data> {
        match self {
            Node::Document(document) => Some(&document.data),
            Node::Block(element) | Node::Inline(element) => Some(&element.data),
            Node::Text(_) => None,
        }
    }

    pub fn is_void(&self) -> bool {
        self.as_element().map(|element| element.is_void).unwrap_or(false)
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Node::Document(_))
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Node::Block(_))
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Node::Inline(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }

    /// Block or inline
    pub fn is_element(&self) -> bool {
        self.as_element().is_some()
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Block(element) | Node::Inline(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Node::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Children; empty for text nodes
    pub fn nodes(&self) -> &[Arc<Node>] {
        match self {
            Node::Document(document) => &document.nodes,
            Node::Block(element) | Node::Inline(element) => &element.nodes,
            Node::Text(_) => &[],
        }
    }

    pub fn nodes_mut(&mut self) -> Option<&mut Vec<Arc<Node>>> {
        match self {
            Node::Document(document) => Some(&mut document.nodes),
            Node::Block(element) | Node::Inline(element) => Some(&mut element.nodes),
            Node::Text(_) => None,
        }
    }

    pub fn child(&self, index: usize) -> Option<&Arc<Node>> {
        self.nodes().get(index)
    }

    pub fn first_child(&self) -> Option<&Arc<Node>> {
        self.nodes().first()
    }

    pub fn last_child(&self) -> Option<&Arc<Node>> {
        self.nodes().last()
    }

    /// Index of the direct child with `key`
    pub fn child_index(&self, key: &Key) -> Option<usize> {
        self.nodes().iter().position(|child| child.key() == key)
    }

    /// Concatenated text of every descendant text node
    pub fn text_content(&self) -> String {
        match self {
            Node::Text(text) => text.text(),
            _ => self.texts().filter_map(Node::as_text).map(|text| text.text()).collect(),
        }
    }

    /// Text length in chars
    pub fn text_len(&self) -> usize {
        self.texts()
            .filter_map(Node::as_text)
            .map(Text::len)
            .sum()
    }

    pub fn is_empty_text(&self) -> bool {
        self.texts()
            .filter_map(Node::as_text)
            .all(Text::is_empty)
    }

    /// Text leaves in document order
    pub fn texts(&self) -> Texts<'_> {
        Texts::new(self)
    }

    /// Every descendant in pre-order, excluding `self`
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: vec![self.nodes().iter()],
        }
    }

    pub fn find_descendant(&self, key: &Key) -> Option<&Node> {
        self.descendants().find(|node| node.key() == key)
    }

    /// `self` or one of its descendants carries `key`
    pub fn contains_key(&self, key: &Key) -> bool {
        self.key() == key || self.find_descendant(key).is_some()
    }

    /// Structural equality ignoring keys
    pub fn content_eq(&self, other: &Node) -> bool {
        let same_node = match (self, other) {
            (Node::Document(a), Node::Document(b)) => a.data == b.data,
            (Node::Block(a), Node::Block(b)) | (Node::Inline(a), Node::Inline(b)) => {
                a.node_type == b.node_type && a.data == b.data && a.is_void == b.is_void
            }
            (Node::Text(a), Node::Text(b)) => return a.leaves == b.leaves,
            _ => false,
        };

        same_node
            && self.nodes().len() == other.nodes().len()
            && self
                .nodes()
                .iter()
                .zip(other.nodes())
                .all(|(a, b)| a.content_eq(b))
    }
}

impl Element {
    pub fn new(node_type: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            key: Key::generate(),
            node_type: node_type.into(),
            data: Data::new(),
            is_void: false,
            nodes: nodes.into_iter().map(Arc::new).collect(),
        }
    }
}

/// Lazy depth-first iterator over text leaves
pub struct Texts<'a> {
    root: Option<&'a Node>,
    stack: Vec<std::slice::Iter<'a, Arc<Node>>>,
}

impl<'a> Texts<'a> {
    fn new(node: &'a Node) -> Self {
        if node.is_text() {
            Self {
                root: Some(node),
                stack: Vec::new(),
            }
        } else {
            Self {
                root: None,
                stack: vec![node.nodes().iter()],
            }
        }
    }
}

impl<'a> Iterator for Texts<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        if let Some(root) = self.root.take() {
            return Some(root);
        }

        loop {
            let next = self.stack.last_mut()?.next();
            match next {
                Some(child) if child.is_text() => return Some(child.as_ref()),
                Some(child) => self.stack.push(child.nodes().iter()),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Lazy pre-order iterator over descendants
pub struct Descendants<'a> {
    stack: Vec<std::slice::Iter<'a, Arc<Node>>>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        loop {
            let next = self.stack.last_mut()?.next();
            match next {
                Some(child) => {
                    self.stack.push(child.nodes().iter());
                    return Some(child.as_ref());
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold() -> Marks {
        [Mark::new("bold")].into_iter().collect()
    }

    fn sample() -> Node {
        Node::document(vec![
            Node::block(
                "paragraph",
                vec![
                    Node::text("one"),
                    Node::inline("link", vec![Node::text("two")]),
                    Node::text(""),
                ],
            ),
            Node::block("paragraph", vec![Node::text("three")]),
        ])
    }

    #[test]
    fn test_texts_are_depth_first_and_restartable() {
        let doc = sample();
        let texts: Vec<String> = doc.texts().map(Node::text_content).collect();
        assert_eq!(texts, vec!["one", "two", "", "three"]);

        // A fresh call starts over
        assert_eq!(doc.texts().count(), 4);
        assert_eq!(doc.text_content(), "onetwothree");
    }

    #[test]
    fn test_structural_queries_on_empty_children() {
        let empty = Node::block("paragraph", vec![]);
        assert!(empty.first_child().is_none());
        assert!(empty.last_child().is_none());
        assert!(empty.child(3).is_none());

        let text = Node::text("abc");
        assert!(text.nodes().is_empty());
        assert!(text.first_child().is_none());
    }

    #[test]
    fn test_descendants_preorder() {
        let doc = sample();
        let kinds: Vec<Kind> = doc.descendants().map(Node::kind).collect();
        assert_eq!(
            kinds,
            vec![
                Kind::Block,
                Kind::Text,
                Kind::Inline,
                Kind::Text,
                Kind::Text,
                Kind::Block,
                Kind::Text
            ]
        );
    }

    #[test]
    fn test_insert_text_coalesces_matching_marks() {
        let text = Text::new("hello");
        let updated = text.insert_text(5, " world", Marks::new());
        assert_eq!(updated.leaves().len(), 1);
        assert_eq!(updated.text(), "hello world");
        assert_eq!(updated.key, text.key);

        let marked = text.insert_text(2, "XX", bold());
        assert_eq!(marked.text(), "heXXllo");
        assert_eq!(marked.leaves().len(), 3);
        assert_eq!(marked.leaves()[1].marks, bold());
    }

    #[test]
    fn test_remove_text_returns_removed_leaves() {
        let text = Text::from_leaves(vec![Leaf::plain("ab"), Leaf::new("cd", bold())]);
        let (updated, removed) = text.remove_text(1, 2);

        assert_eq!(updated.text(), "ad");
        assert_eq!(removed, vec![Leaf::plain("b"), Leaf::new("c", bold())]);
    }

    #[test]
    fn test_add_and_remove_mark() {
        let text = Text::new("hello");
        let marked = text.add_mark(1, 3, &Mark::new("bold"));
        assert_eq!(
            marked.leaves(),
            &[Leaf::plain("h"), Leaf::new("ell", bold()), Leaf::plain("o")]
        );

        let unmarked = marked.remove_mark(0, 5, &Mark::new("bold"));
        assert_eq!(unmarked.leaves(), &[Leaf::plain("hello")]);
    }

    #[test]
    fn test_concat_keeps_leaves_verbatim() {
        let left = Text::new("ab");
        let right = Text::new("cd");
        let merged = left.concat(&right);

        assert_eq!(merged.key, left.key);
        assert_eq!(merged.leaves(), &[Leaf::plain("ab"), Leaf::plain("cd")]);
    }

    #[test]
    fn test_offsets_count_chars() {
        let text = Text::new("héllo");
        assert_eq!(text.len(), 5);
        let (left, right) = text.split_at(2);
        assert_eq!(left, vec![Leaf::plain("hé")]);
        assert_eq!(right, vec![Leaf::plain("llo")]);
    }

    #[test]
    fn test_marks_at_offset() {
        let text = Text::from_leaves(vec![Leaf::plain("ab"), Leaf::new("cd", bold())]);
        assert!(text.marks_at(0).is_empty());
        assert!(text.marks_at(2).is_empty());
        assert_eq!(text.marks_at(3), bold());
        assert!(Text::new("").marks_at(0).is_empty());
    }

    #[test]
    fn test_content_eq_ignores_keys() {
        let a = sample();
        let b = sample();
        assert_ne!(a, b);
        assert!(a.content_eq(&b));
    }

    #[test]
    fn test_node_serde_is_tagged_by_kind() {
        let node = Node::block("quote", vec![Node::text("hi")]).with_key("k1");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["kind"], "block");
        assert_eq!(json["type"], "quote");
        assert_eq!(json["key"], "k1");

        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }
}
