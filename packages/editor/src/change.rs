//! # Changes
//!
//! A `Change` is an open transaction against a committed [`State`]. It
//! applies operations eagerly to a working tree, remembers which nodes they
//! touched, and on `commit` hands the touched nodes to the schema engine
//! until the document is valid again.
//!
//! ```rust
//! use folio_document::{Node, Selection};
//! use folio_editor::State;
//!
//! let state = State::from_document(Node::document(vec![
//!     Node::block("paragraph", vec![Node::text("one").with_key("t")]),
//! ]))?;
//!
//! let mut change = state.change();
//! change.select(Selection::collapsed("t", 3))?.insert_text("!")?;
//! let committed = change.commit()?;
//!
//! assert_eq!(committed.state.document().text_content(), "one!");
//! # Ok::<(), folio_editor::EditorError>(())
//! ```
//!
//! The first failing call poisons the transaction. Every later call, and
//! `commit`, returns [`EditorError::Aborted`]. The base state is never
//! touched, so dropping a poisoned change is enough to recover.

use crate::errors::{EditorError, EditorResult};
use crate::operations::{NodeProperties, Operation};
use crate::schema::{normalizer, Schema, SchemaOptions};
use crate::state::State;
use folio_document::{Key, Leaf, Mark, Marks, Node, Point, Selection, Text, Tree};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Per-call application options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Mark the touched nodes for the schema engine
    pub normalize: bool,
}

impl ApplyOptions {
    /// Used by schema repairs, which do their own bookkeeping
    pub const SILENT: ApplyOptions = ApplyOptions { normalize: false };
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self { normalize: true }
    }
}

/// Result of a successful commit
#[derive(Debug, Clone)]
pub struct Committed {
    pub state: State,
    /// Every operation applied, caller edits and schema repairs alike
    pub operations: Vec<Operation>,
}

pub struct Change {
    base: State,
    tree: Tree,
    selection: Selection,
    operations: Vec<Operation>,
    dirty: HashSet<Key>,
    schema: Arc<Schema>,
    options: SchemaOptions,
    failure: Option<String>,
}

impl Change {
    pub fn new(base: State, schema: Arc<Schema>, options: SchemaOptions) -> Self {
        Self {
            tree: base.tree().clone(),
            selection: base.selection().clone(),
            base,
            operations: Vec::new(),
            dirty: HashSet::new(),
            schema,
            options,
            failure: None,
        }
    }

    pub fn base(&self) -> &State {
        &self.base
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn is_aborted(&self) -> bool {
        self.failure.is_some()
    }

    /// Apply one operation to the working tree and selection
    pub fn apply_operation(&mut self, operation: Operation, options: ApplyOptions) -> EditorResult<&mut Self> {
        self.guarded(|change| {
            let (tree, selection) = operation.apply(&change.tree, &change.selection)?;
            change.tree = tree;
            change.selection = selection;

            if options.normalize {
                for key in operation.dirty_keys() {
                    change.mark_dirty(&key);
                }
            }

            debug!(
                operation = operation.name(),
                normalize = options.normalize,
                dirty = change.dirty.len(),
                "applied operation"
            );
            change.operations.push(operation);
            Ok(())
        })?;
        Ok(self)
    }

    pub fn insert_node_by_key(&mut self, parent_key: &Key, index: usize, node: Node) -> EditorResult<&mut Self> {
        self.insert_node_by_key_with(parent_key, index, node, ApplyOptions::default())
    }

    pub fn insert_node_by_key_with(
        &mut self,
        parent_key: &Key,
        index: usize,
        node: Node,
        options: ApplyOptions,
    ) -> EditorResult<&mut Self> {
        let operation = Operation::InsertNode {
            parent_key: parent_key.clone(),
            index,
            node: Arc::new(node),
        };
        self.apply_operation(operation, options)
    }

    pub fn remove_node_by_key(&mut self, key: &Key) -> EditorResult<&mut Self> {
        self.remove_node_by_key_with(key, ApplyOptions::default())
    }

    pub fn remove_node_by_key_with(&mut self, key: &Key, options: ApplyOptions) -> EditorResult<&mut Self> {
        let operation = self.guarded(|change| {
            let node = Arc::clone(change.tree.get_node(key)?);
            let parent = change.tree.get_parent(key)?;
            let index = child_index(parent, key)?;
            Ok(Operation::RemoveNode {
                parent_key: parent.key().clone(),
                index,
                node,
            })
        })?;
        self.apply_operation(operation, options)
    }

    /// Merge a node into its previous sibling
    pub fn merge_node_by_key(&mut self, key: &Key) -> EditorResult<&mut Self> {
        self.merge_node_by_key_with(key, ApplyOptions::default())
    }

    pub fn merge_node_by_key_with(&mut self, key: &Key, options: ApplyOptions) -> EditorResult<&mut Self> {
        let operation = self.guarded(|change| {
            let node = change.tree.get_node(key)?;
            let parent = change.tree.get_parent(key)?;
            let index = child_index(parent, key)?;
            let previous = index
                .checked_sub(1)
                .and_then(|index| parent.child(index))
                .ok_or_else(|| EditorError::invalid(format!("{} has no previous sibling", key)))?;

            let position = if previous.is_text() {
                previous.text_len()
            } else {
                previous.nodes().len()
            };

            Ok(Operation::MergeNode {
                key: key.clone(),
                previous_key: previous.key().clone(),
                position,
                properties: NodeProperties::of(node),
            })
        })?;
        self.apply_operation(operation, options)
    }

    /// Split a node at `position`, returning the key of the new right half
    pub fn split_node_by_key(&mut self, key: &Key, position: usize) -> EditorResult<Key> {
        self.split_node_by_key_with(key, position, ApplyOptions::default())
    }

    pub fn split_node_by_key_with(&mut self, key: &Key, position: usize, options: ApplyOptions) -> EditorResult<Key> {
        let mut new_key = Key::generate();
        while self.tree.has_node(&new_key) {
            new_key = Key::generate();
        }
        let operation = Operation::SplitNode {
            key: key.clone(),
            position,
            new_key: new_key.clone(),
            properties: None,
        };
        self.apply_operation(operation, options)?;
        Ok(new_key)
    }

    pub fn set_node_by_key(&mut self, key: &Key, properties: NodeProperties) -> EditorResult<&mut Self> {
        self.set_node_by_key_with(key, properties, ApplyOptions::default())
    }

    pub fn set_node_by_key_with(
        &mut self,
        key: &Key,
        properties: NodeProperties,
        options: ApplyOptions,
    ) -> EditorResult<&mut Self> {
        let operation = self.guarded(|change| {
            let node = change.tree.get_node(key)?;
            Ok(Operation::SetNode {
                key: key.clone(),
                previous: properties.previous_of(node),
                properties,
            })
        })?;
        self.apply_operation(operation, options)
    }

    /// Insert text; `marks` defaults to the marks in effect at `offset`
    pub fn insert_text_by_key(
        &mut self,
        key: &Key,
        offset: usize,
        text: &str,
        marks: Option<Marks>,
    ) -> EditorResult<&mut Self> {
        self.insert_text_by_key_with(key, offset, text, marks, ApplyOptions::default())
    }

    pub fn insert_text_by_key_with(
        &mut self,
        key: &Key,
        offset: usize,
        text: &str,
        marks: Option<Marks>,
        options: ApplyOptions,
    ) -> EditorResult<&mut Self> {
        if text.is_empty() {
            self.guarded(|_| Ok(()))?;
            return Ok(self);
        }

        let operation = self.guarded(|change| {
            let marks = match marks {
                Some(marks) => marks,
                None => text_at(&change.tree, key)?.marks_at(offset),
            };
            Ok(Operation::InsertText {
                key: key.clone(),
                offset,
                leaves: vec![Leaf::new(text, marks)],
            })
        })?;
        self.apply_operation(operation, options)
    }

    pub fn remove_text_by_key(&mut self, key: &Key, offset: usize, length: usize) -> EditorResult<&mut Self> {
        self.remove_text_by_key_with(key, offset, length, ApplyOptions::default())
    }

    pub fn remove_text_by_key_with(
        &mut self,
        key: &Key,
        offset: usize,
        length: usize,
        options: ApplyOptions,
    ) -> EditorResult<&mut Self> {
        let operation = self.guarded(|change| {
            let text = text_at(&change.tree, key)?;
            check_span(key, offset, length, text.len())?;
            Ok(Operation::RemoveText {
                key: key.clone(),
                offset,
                leaves: text.slice(offset, length),
            })
        })?;

        if length == 0 {
            return Ok(self);
        }
        self.apply_operation(operation, options)
    }

    pub fn add_mark_by_key(&mut self, key: &Key, offset: usize, length: usize, mark: Mark) -> EditorResult<&mut Self> {
        self.add_mark_by_key_with(key, offset, length, mark, ApplyOptions::default())
    }

    pub fn add_mark_by_key_with(
        &mut self,
        key: &Key,
        offset: usize,
        length: usize,
        mark: Mark,
        options: ApplyOptions,
    ) -> EditorResult<&mut Self> {
        let operation = Operation::AddMark {
            key: key.clone(),
            offset,
            length,
            mark,
        };
        self.apply_operation(operation, options)
    }

    pub fn remove_mark_by_key(&mut self, key: &Key, offset: usize, length: usize, mark: Mark) -> EditorResult<&mut Self> {
        self.remove_mark_by_key_with(key, offset, length, mark, ApplyOptions::default())
    }

    pub fn remove_mark_by_key_with(
        &mut self,
        key: &Key,
        offset: usize,
        length: usize,
        mark: Mark,
        options: ApplyOptions,
    ) -> EditorResult<&mut Self> {
        let operation = Operation::RemoveMark {
            key: key.clone(),
            offset,
            length,
            mark,
        };
        self.apply_operation(operation, options)
    }

    pub fn select(&mut self, selection: Selection) -> EditorResult<&mut Self> {
        let operation = Operation::SetSelection {
            properties: selection,
            previous: self.selection.clone(),
        };
        self.apply_operation(operation, ApplyOptions::default())
    }

    pub fn focus(&mut self) -> EditorResult<&mut Self> {
        let selection = self.selection.focus();
        self.select(selection)
    }

    pub fn blur(&mut self) -> EditorResult<&mut Self> {
        let selection = self.selection.blur();
        self.select(selection)
    }

    /// Move both selection offsets by `n` chars
    pub fn move_selection_by(&mut self, n: isize) -> EditorResult<&mut Self> {
        let selection = self.guarded(|change| Ok(change.selection.move_by(n, &change.tree)?))?;
        self.select(selection)
    }

    /// Insert text at the cursor, replacing an expanded selection
    pub fn insert_text(&mut self, text: &str) -> EditorResult<&mut Self> {
        self.guarded(|change| {
            if !change.selection.is_set() {
                return Err(EditorError::invalid("cannot insert text without a selection"));
            }
            if !change.selection.is_collapsed() {
                change.delete_selection()?;
            }

            let Some(point) = change.selection.anchor() else {
                return Err(EditorError::invalid("selection was lost while deleting"));
            };
            let marks = change.selection.marks.clone();
            change.insert_text_by_key(&point.key, point.offset, text, marks)?;
            Ok(())
        })?;
        Ok(self)
    }

    /// Remove the selected content and collapse to its start
    ///
    /// When the selection spans two sibling blocks, the blocks between them
    /// are removed and the last one is merged into the first.
    pub fn delete_selection(&mut self) -> EditorResult<&mut Self> {
        self.guarded(|change| {
            if !change.selection.is_set() || change.selection.is_collapsed() {
                return Ok(());
            }
            let (start, end) = change.edges()?;

            for (key, offset, length) in change.selected_spans()?.into_iter().rev() {
                change.remove_text_by_key(&key, offset, length)?;
            }

            let start_block = change.tree.get_closest_block(&start.key)?.map(|node| node.key().clone());
            let end_block = change.tree.get_closest_block(&end.key)?.map(|node| node.key().clone());
            if let (Some(start_block), Some(end_block)) = (start_block, end_block) {
                if start_block != end_block {
                    change.join_blocks(&start_block, &end_block)?;
                }
            }

            let collapsed = Selection {
                is_focused: change.selection.is_focused,
                marks: change.selection.marks.clone(),
                ..Selection::collapsed(start.key, start.offset)
            };
            change.select(collapsed)?;
            Ok(())
        })?;
        Ok(self)
    }

    /// Add a mark to the selection, or to the pending marks when collapsed
    pub fn add_mark(&mut self, mark: Mark) -> EditorResult<&mut Self> {
        self.guarded(|change| {
            if change.selection.is_collapsed() {
                let mut marks = change.pending_marks()?;
                marks.insert(mark);
                let selection = change.selection.with_marks(Some(marks));
                change.select(selection)?;
                return Ok(());
            }
            for (key, offset, length) in change.selected_spans()? {
                if length > 0 {
                    change.add_mark_by_key(&key, offset, length, mark.clone())?;
                }
            }
            Ok(())
        })?;
        Ok(self)
    }

    pub fn remove_mark(&mut self, mark: Mark) -> EditorResult<&mut Self> {
        self.guarded(|change| {
            if change.selection.is_collapsed() {
                let mut marks = change.pending_marks()?;
                marks.remove(&mark);
                let selection = change.selection.with_marks(Some(marks));
                change.select(selection)?;
                return Ok(());
            }
            for (key, offset, length) in change.selected_spans()? {
                if length > 0 {
                    change.remove_mark_by_key(&key, offset, length, mark.clone())?;
                }
            }
            Ok(())
        })?;
        Ok(self)
    }

    /// Remove `mark` if the whole selection carries it, add it otherwise
    pub fn toggle_mark(&mut self, mark: Mark) -> EditorResult<&mut Self> {
        let present = self.guarded(|change| {
            if change.selection.is_collapsed() {
                return Ok(change.pending_marks()?.contains(&mark));
            }
            let mut present = true;
            for (key, offset, length) in change.selected_spans()? {
                let text = text_at(&change.tree, &key)?;
                present &= text
                    .slice(offset, length)
                    .iter()
                    .all(|leaf| leaf.marks.contains(&mark));
            }
            Ok(present)
        })?;

        if present {
            self.remove_mark(mark)
        } else {
            self.add_mark(mark)
        }
    }

    /// Set properties on every block holding selected text
    pub fn set_block(&mut self, properties: NodeProperties) -> EditorResult<&mut Self> {
        self.guarded(|change| {
            for key in change.selected_ancestors(Node::is_block)? {
                change.set_node_by_key(&key, properties.clone())?;
            }
            Ok(())
        })?;
        Ok(self)
    }

    /// Set properties on every inline holding selected text
    pub fn set_inline(&mut self, properties: NodeProperties) -> EditorResult<&mut Self> {
        self.guarded(|change| {
            for key in change.selected_ancestors(Node::is_inline)? {
                change.set_node_by_key(&key, properties.clone())?;
            }
            Ok(())
        })?;
        Ok(self)
    }

    /// Queue every node for validation, as for a freshly loaded document
    pub fn normalize_document(&mut self) -> &mut Self {
        let keys: Vec<Key> = self.tree.keys().cloned().collect();
        self.dirty.extend(keys);
        self
    }

    /// Normalize and publish the working state
    #[instrument(skip(self), fields(operations = self.operations.len(), dirty = self.dirty.len()))]
    pub fn commit(mut self) -> EditorResult<Committed> {
        if let Some(reason) = &self.failure {
            warn!(reason = %reason, "commit of aborted transaction");
            return Err(EditorError::Aborted(reason.clone()));
        }

        let caller_operations = self.operations.len();
        let iterations = normalizer::normalize(&mut self)?;
        let selection = self.selection.normalize(&self.tree);

        info!(
            operations = self.operations.len(),
            repairs = self.operations.len() - caller_operations,
            iterations,
            "committed change"
        );

        Ok(Committed {
            state: State::new(self.tree).with_selection(selection),
            operations: self.operations,
        })
    }

    /// Run `f` unless the transaction is already poisoned; poison it if
    /// `f` fails
    fn guarded<T, F>(&mut self, f: F) -> EditorResult<T>
    where
        F: FnOnce(&mut Self) -> EditorResult<T>,
    {
        if let Some(reason) = &self.failure {
            return Err(EditorError::Aborted(reason.clone()));
        }

        let result = f(self);
        if let Err(err) = &result {
            if self.failure.is_none() {
                warn!(error = %err, "transaction aborted");
                self.failure = Some(err.to_string());
            }
        }
        result
    }

    pub(crate) fn dirty(&self) -> &HashSet<Key> {
        &self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Mark a node and its ancestors
    pub(crate) fn mark_dirty(&mut self, key: &Key) {
        let Ok(ancestors) = self.tree.get_ancestors(key) else {
            return;
        };
        let ancestors: Vec<Key> = ancestors.into_iter().map(|node| node.key().clone()).collect();
        self.dirty.extend(ancestors);
        self.dirty.insert(key.clone());
    }

    /// Mark a repaired node, its ancestors and its current children
    pub(crate) fn mark_repaired(&mut self, key: &Key) {
        self.mark_dirty(key);
        let children: Vec<Key> = match self.tree.get_node(key) {
            Ok(node) => node.nodes().iter().map(|child| child.key().clone()).collect(),
            Err(_) => return,
        };
        self.dirty.extend(children);
    }

    fn edges(&self) -> EditorResult<(Point, Point)> {
        match (self.selection.start(&self.tree), self.selection.end(&self.tree)) {
            (Some(start), Some(end)) => Ok((start, end)),
            _ => Err(EditorError::invalid("selection is not set")),
        }
    }

    /// `(key, offset, length)` of the selected part of each text
    fn selected_spans(&self) -> EditorResult<Vec<(Key, usize, usize)>> {
        let (start, end) = self.edges()?;
        let texts = self.tree.get_texts_in_range(&self.selection)?;

        Ok(texts
            .into_iter()
            .map(|text| {
                let len = text.text_len();
                let from = if text.key() == &start.key { start.offset.min(len) } else { 0 };
                let to = if text.key() == &end.key { end.offset.min(len) } else { len };
                (text.key().clone(), from, to.saturating_sub(from))
            })
            .collect())
    }

    /// Nearest ancestors matching `predicate` of every selected text, deduped
    /// in document order
    fn selected_ancestors(&self, predicate: fn(&Node) -> bool) -> EditorResult<Vec<Key>> {
        let mut keys = Vec::new();
        for text in self.tree.get_texts_in_range(&self.selection)? {
            let ancestor = self
                .tree
                .get_ancestors(text.key())?
                .into_iter()
                .rev()
                .find(|node| predicate(node))
                .map(|node| node.key().clone());
            if let Some(key) = ancestor {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }

    fn pending_marks(&self) -> EditorResult<Marks> {
        if let Some(marks) = &self.selection.marks {
            return Ok(marks.clone());
        }
        match self.selection.anchor() {
            Some(point) => Ok(text_at(&self.tree, &point.key)?.marks_at(point.offset)),
            None => Ok(Marks::new()),
        }
    }

    /// Remove the siblings between two blocks and merge the second into the
    /// first; blocks under different parents are left alone
    fn join_blocks(&mut self, first: &Key, last: &Key) -> EditorResult<()> {
        let parent = self.tree.get_parent(first)?;
        let Some(last_index) = parent.child_index(last) else {
            return Ok(());
        };
        let first_index = child_index(parent, first)?;
        let between: Vec<Key> = parent.nodes()[first_index + 1..last_index]
            .iter()
            .map(|node| node.key().clone())
            .collect();

        for key in between {
            self.remove_node_by_key(&key)?;
        }
        self.merge_node_by_key(last)?;
        Ok(())
    }
}

impl std::fmt::Debug for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Change")
            .field("operations", &self.operations.len())
            .field("dirty", &self.dirty.len())
            .field("schema", &self.schema)
            .field("failure", &self.failure)
            .finish()
    }
}

fn child_index(parent: &Node, key: &Key) -> EditorResult<usize> {
    parent
        .child_index(key)
        .ok_or_else(|| EditorError::NotFound(key.clone()))
}

fn text_at<'a>(tree: &'a Tree, key: &Key) -> EditorResult<&'a Text> {
    tree.get_node(key)?
        .as_text()
        .ok_or_else(|| EditorError::invalid(format!("{} is not a text node", key)))
}

fn check_span(key: &Key, offset: usize, length: usize, len: usize) -> EditorResult<()> {
    match offset.checked_add(length) {
        Some(end) if end <= len => Ok(()),
        _ => Err(EditorError::invalid(format!(
            "range of {} chars at {} is past the end of {} (length {})",
            length, offset, key, len
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> State {
        State::from_document(Node::document(vec![Node::block(
            "paragraph",
            vec![Node::text("one").with_key("t")],
        )
        .with_key("p")]))
        .unwrap()
    }

    #[test]
    fn test_edits_mark_the_node_and_its_ancestors() {
        let state = state();
        let mut change = state.change();
        change.insert_text_by_key(&"t".into(), 0, "x", None).unwrap();

        let dirty = change.dirty();
        assert!(dirty.contains(&Key::from("t")));
        assert!(dirty.contains(&Key::from("p")));
        assert!(dirty.contains(state.document().key()));
    }

    #[test]
    fn test_silent_edits_are_not_marked() {
        let mut change = state().change();
        change
            .insert_text_by_key_with(&"t".into(), 0, "x", None, ApplyOptions::SILENT)
            .unwrap();

        assert!(change.dirty().is_empty());
        assert_eq!(change.operations().len(), 1);
    }

    #[test]
    fn test_empty_insert_and_remove_record_nothing() {
        let mut change = state().change();
        change
            .insert_text_by_key(&"t".into(), 1, "", None)
            .unwrap()
            .remove_text_by_key(&"t".into(), 1, 0)
            .unwrap();
        assert!(change.operations().is_empty());
    }

    #[test]
    fn test_commit_reports_caller_and_repair_operations() {
        let mut change = state().change();
        change
            .insert_node_by_key(&"p".into(), 1, Node::text("two"))
            .unwrap();
        let committed = change.commit().unwrap();

        let names: Vec<_> = committed.operations.iter().map(Operation::name).collect();
        assert_eq!(names, vec!["insert_node", "merge_node"]);
        assert_eq!(committed.state.document().text_content(), "onetwo");
    }

    #[test]
    fn test_select_rejects_points_outside_the_tree() {
        let mut change = state().change();
        assert!(matches!(
            change.select(Selection::collapsed("t", 4)),
            Err(EditorError::InvalidOperation(_))
        ));

        let mut change = state().change();
        assert_eq!(
            change.select(Selection::collapsed("missing", 0)).unwrap_err(),
            EditorError::NotFound("missing".into())
        );
        assert!(matches!(change.focus(), Err(EditorError::Aborted(_))));
        assert!(change.commit().is_err());
    }

    #[test]
    fn test_overflowing_spans_are_rejected() {
        let mut change = state().change();
        assert!(matches!(
            change.remove_text_by_key(&"t".into(), 1, usize::MAX),
            Err(EditorError::InvalidOperation(_))
        ));

        let mut change = state().change();
        assert!(matches!(
            change.add_mark_by_key(&"t".into(), 1, usize::MAX, Mark::new("bold")),
            Err(EditorError::InvalidOperation(_))
        ));
        assert!(change.operations().is_empty());
    }

    #[test]
    fn test_split_never_reuses_a_key_in_the_tree() {
        let next: u64 = Key::generate().as_str().parse().unwrap();
        let taken = Key::new((next + 1).to_string());
        let state = State::from_document(Node::document(vec![Node::block(
            "paragraph",
            vec![Node::text("one").with_key("t")],
        )
        .with_key(taken.clone())]))
        .unwrap();

        let mut change = state.change();
        let right = change.split_node_by_key(&"t".into(), 1).unwrap();
        assert_ne!(right, taken);
        assert_eq!(change.tree().get_node(&right).unwrap().text_content(), "ne");
    }
}
