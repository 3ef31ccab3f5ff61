//! # Selections
//!
//! A selection is a pair of points (anchor and focus) into text nodes plus
//! the pending marks that the next inserted text will carry. A fresh
//! selection is unset: it points nowhere until something selects.

use crate::error::{DocumentError, DocumentResult};
use crate::key::Key;
use crate::node::{Marks, Node};
use crate::tree::Tree;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A char offset inside a text node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub key: Key,
    pub offset: usize,
}

impl Point {
    pub fn new(key: impl Into<Key>, offset: usize) -> Self {
        Self {
            key: key.into(),
            offset,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub anchor_key: Option<Key>,
    pub anchor_offset: usize,
    pub focus_key: Option<Key>,
    pub focus_offset: usize,
    pub is_focused: bool,
    /// Marks applied to the next inserted text
    pub marks: Option<Marks>,
}

/// Partial update for [`Selection::merge`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPatch {
    pub anchor_key: Option<Option<Key>>,
    pub anchor_offset: Option<usize>,
    pub focus_key: Option<Option<Key>>,
    pub focus_offset: Option<usize>,
    pub is_focused: Option<bool>,
    pub marks: Option<Option<Marks>>,
}

impl Selection {
    pub fn unset() -> Self {
        Self::default()
    }

    pub fn collapsed(key: impl Into<Key>, offset: usize) -> Self {
        let key = key.into();
        Self {
            anchor_key: Some(key.clone()),
            anchor_offset: offset,
            focus_key: Some(key),
            focus_offset: offset,
            ..Self::default()
        }
    }

    pub fn between(anchor: Point, focus: Point) -> Self {
        Self {
            anchor_key: Some(anchor.key),
            anchor_offset: anchor.offset,
            focus_key: Some(focus.key),
            focus_offset: focus.offset,
            ..Self::default()
        }
    }

    /// Collapsed at the start of the first text inside `node`
    pub fn at_start_of(node: &Node) -> Self {
        match node.texts().next() {
            Some(text) => Self::collapsed(text.key().clone(), 0),
            None => Self::unset(),
        }
    }

    /// Collapsed at the end of the last text inside `node`
    pub fn at_end_of(node: &Node) -> Self {
        match node.texts().last() {
            Some(text) => Self::collapsed(text.key().clone(), text.text_len()),
            None => Self::unset(),
        }
    }

    pub fn merge(&self, patch: &SelectionPatch) -> Self {
        let patch = patch.clone();
        Self {
            anchor_key: patch.anchor_key.unwrap_or_else(|| self.anchor_key.clone()),
            anchor_offset: patch.anchor_offset.unwrap_or(self.anchor_offset),
            focus_key: patch.focus_key.unwrap_or_else(|| self.focus_key.clone()),
            focus_offset: patch.focus_offset.unwrap_or(self.focus_offset),
            is_focused: patch.is_focused.unwrap_or(self.is_focused),
            marks: patch.marks.unwrap_or_else(|| self.marks.clone()),
        }
    }

    pub fn is_set(&self) -> bool {
        self.anchor_key.is_some() && self.focus_key.is_some()
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor_key == self.focus_key && self.anchor_offset == self.focus_offset
    }

    pub fn anchor(&self) -> Option<Point> {
        self.anchor_key
            .as_ref()
            .map(|key| Point::new(key.clone(), self.anchor_offset))
    }

    pub fn focus_point(&self) -> Option<Point> {
        self.focus_key
            .as_ref()
            .map(|key| Point::new(key.clone(), self.focus_offset))
    }

    /// Focus precedes anchor in document order
    pub fn is_backward(&self, tree: &Tree) -> bool {
        match (self.anchor(), self.focus_point()) {
            (Some(anchor), Some(focus)) => compare_points(tree, &focus, &anchor) == Ordering::Less,
            _ => false,
        }
    }

    /// First endpoint in document order
    pub fn start(&self, tree: &Tree) -> Option<Point> {
        if self.is_backward(tree) {
            self.focus_point()
        } else {
            self.anchor()
        }
    }

    /// Last endpoint in document order
    pub fn end(&self, tree: &Tree) -> Option<Point> {
        if self.is_backward(tree) {
            self.anchor()
        } else {
            self.focus_point()
        }
    }

    /// Either endpoint lies inside `node`
    pub fn has_edge_in(&self, node: &Node) -> bool {
        [&self.anchor_key, &self.focus_key]
            .into_iter()
            .flatten()
            .any(|key| node.contains_key(key))
    }

    pub fn with_anchor(&self, point: Point) -> Self {
        Self {
            anchor_key: Some(point.key),
            anchor_offset: point.offset,
            ..self.clone()
        }
    }

    pub fn with_focus(&self, point: Point) -> Self {
        Self {
            focus_key: Some(point.key),
            focus_offset: point.offset,
            ..self.clone()
        }
    }

    pub fn with_marks(&self, marks: Option<Marks>) -> Self {
        Self {
            marks,
            ..self.clone()
        }
    }

    /// Rewrite both endpoints; an unset selection is returned as is
    pub fn map_points(&self, mut f: impl FnMut(Point) -> Point) -> Self {
        let mut next = self.clone();
        if let Some(anchor) = self.anchor() {
            let point = f(anchor);
            next.anchor_key = Some(point.key);
            next.anchor_offset = point.offset;
        }
        if let Some(focus) = self.focus_point() {
            let point = f(focus);
            next.focus_key = Some(point.key);
            next.focus_offset = point.offset;
        }
        next
    }

    pub fn collapse_to_anchor(&self) -> Self {
        Self {
            focus_key: self.anchor_key.clone(),
            focus_offset: self.anchor_offset,
            ..self.clone()
        }
    }

    pub fn collapse_to_focus(&self) -> Self {
        Self {
            anchor_key: self.focus_key.clone(),
            anchor_offset: self.focus_offset,
            ..self.clone()
        }
    }

    pub fn collapse_to_start(&self, tree: &Tree) -> Self {
        if self.is_backward(tree) {
            self.collapse_to_focus()
        } else {
            self.collapse_to_anchor()
        }
    }

    pub fn collapse_to_end(&self, tree: &Tree) -> Self {
        if self.is_backward(tree) {
            self.collapse_to_anchor()
        } else {
            self.collapse_to_focus()
        }
    }

    pub fn focus(&self) -> Self {
        Self {
            is_focused: true,
            ..self.clone()
        }
    }

    pub fn blur(&self) -> Self {
        Self {
            is_focused: false,
            ..self.clone()
        }
    }

    /// Shift both offsets by `n` chars within their own text nodes
    pub fn move_by(&self, n: isize, tree: &Tree) -> DocumentResult<Self> {
        let mut failure = None;
        let moved = self.map_points(|point| {
            match shift(tree, &point, n) {
                Ok(offset) => Point::new(point.key, offset),
                Err(err) => {
                    failure.get_or_insert(err);
                    point
                }
            }
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(moved),
        }
    }

    /// Point both endpoints at existing text nodes
    ///
    /// Endpoints on elements are resolved to the text holding that char
    /// offset, offsets are clamped to the text length, and a selection
    /// whose keys no longer exist becomes unset.
    pub fn normalize(&self, tree: &Tree) -> Self {
        let (Some(anchor), Some(focus)) = (self.anchor(), self.focus_point()) else {
            return self.unset_keeping_focus();
        };

        match (resolve(tree, &anchor), resolve(tree, &focus)) {
            (Some(anchor), Some(focus)) => Self {
                anchor_key: Some(anchor.key),
                anchor_offset: anchor.offset,
                focus_key: Some(focus.key),
                focus_offset: focus.offset,
                ..self.clone()
            },
            _ => self.unset_keeping_focus(),
        }
    }

    fn unset_keeping_focus(&self) -> Self {
        Self {
            is_focused: self.is_focused,
            ..Self::unset()
        }
    }
}

fn shift(tree: &Tree, point: &Point, n: isize) -> DocumentResult<usize> {
    let len = tree.get_node(&point.key)?.text_len();
    match point.offset.checked_add_signed(n) {
        Some(offset) if offset <= len => Ok(offset),
        _ => {
            let start = isize::try_from(point.offset).unwrap_or(isize::MAX);
            Err(DocumentError::out_of_bounds(&point.key, start.saturating_add(n), len))
        }
    }
}

fn resolve(tree: &Tree, point: &Point) -> Option<Point> {
    let node = tree.get_node(&point.key).ok()?;
    if node.is_text() {
        return Some(Point::new(point.key.clone(), point.offset.min(node.text_len())));
    }

    let mut remaining = point.offset;
    let mut last = None;
    for text in node.texts() {
        let len = text.text_len();
        if remaining <= len {
            return Some(Point::new(text.key().clone(), remaining));
        }
        remaining -= len;
        last = Some(Point::new(text.key().clone(), len));
    }
    last
}

fn compare_points(tree: &Tree, a: &Point, b: &Point) -> Ordering {
    if a.key == b.key {
        return a.offset.cmp(&b.offset);
    }
    match (tree.get_path(&a.key), tree.get_path(&b.key)) {
        (Ok(a), Ok(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Tree {
        Tree::from_nodes(vec![
            Node::block("paragraph", vec![Node::text("hello").with_key("a")]).with_key("p1"),
            Node::block("paragraph", vec![Node::text("world").with_key("b")]).with_key("p2"),
        ])
        .unwrap()
    }

    #[test]
    fn test_fresh_selection_is_unset() {
        let selection = Selection::default();
        assert!(!selection.is_set());
        assert!(selection.anchor().is_none());
        assert!(!selection.is_focused);
    }

    #[test]
    fn test_backward_and_edges() {
        let tree = tree();
        let selection = Selection::between(Point::new("b", 2), Point::new("a", 1));
        assert!(selection.is_backward(&tree));
        assert_eq!(selection.start(&tree), Some(Point::new("a", 1)));
        assert_eq!(selection.end(&tree), Some(Point::new("b", 2)));

        let collapsed = selection.collapse_to_start(&tree);
        assert!(collapsed.is_collapsed());
        assert_eq!(collapsed.anchor(), Some(Point::new("a", 1)));

        let same_text = Selection::between(Point::new("a", 4), Point::new("a", 2));
        assert!(same_text.is_backward(&tree));
    }

    #[test]
    fn test_move_by_rejects_out_of_bounds() {
        let tree = tree();
        let selection = Selection::collapsed("a", 3);

        let moved = selection.move_by(2, &tree).unwrap();
        assert_eq!(moved.anchor_offset, 5);
        assert_eq!(moved.focus_offset, 5);

        let err = selection.move_by(3, &tree).unwrap_err();
        assert_eq!(err, DocumentError::out_of_bounds(&"a".into(), 6, 5));
        assert!(selection.move_by(-4, &tree).is_err());
    }

    #[test]
    fn test_move_by_extreme_distances_fails_without_overflow() {
        let tree = tree();
        let selection = Selection::collapsed("a", 1);

        let err = selection.move_by(isize::MAX, &tree).unwrap_err();
        assert_eq!(err, DocumentError::out_of_bounds(&"a".into(), isize::MAX, 5));
        assert!(selection.move_by(isize::MIN, &tree).is_err());
    }

    #[test]
    fn test_normalize_resolves_elements_and_missing_keys() {
        let tree = tree();
        let on_block = Selection::collapsed("p2", 3).normalize(&tree);
        assert_eq!(on_block.anchor(), Some(Point::new("b", 3)));

        let clamped = Selection::collapsed("a", 40).normalize(&tree);
        assert_eq!(clamped.anchor_offset, 5);

        let gone = Selection::collapsed("zzz", 0).focus().normalize(&tree);
        assert!(!gone.is_set());
        assert!(gone.is_focused);
    }

    #[test]
    fn test_merge_patch() {
        let selection = Selection::collapsed("a", 1);
        let merged = selection.merge(&SelectionPatch {
            focus_offset: Some(4),
            is_focused: Some(true),
            ..SelectionPatch::default()
        });
        assert_eq!(merged.anchor_offset, 1);
        assert_eq!(merged.focus_offset, 4);
        assert!(merged.is_focused);
    }

    #[test]
    fn test_has_edge_in() {
        let tree = tree();
        let selection = Selection::collapsed("a", 0);
        assert!(selection.has_edge_in(tree.get_node(&"p1".into()).unwrap()));
        assert!(!selection.has_edge_in(tree.get_node(&"p2".into()).unwrap()));
    }

    #[test]
    fn test_serializes_camel_case() {
        let value = serde_json::to_value(Selection::collapsed("a", 2)).unwrap();
        assert_eq!(value["anchorKey"], "a");
        assert_eq!(value["focusOffset"], 2);
        assert_eq!(value["isFocused"], false);
    }
}
