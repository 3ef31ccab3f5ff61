//! Committed editor state

use crate::change::Change;
use crate::errors::EditorResult;
use crate::schema::{Schema, SchemaOptions};
use folio_document::{Node, Selection, Tree};
use std::sync::Arc;

/// An immutable `{tree, selection}` snapshot
///
/// Cloning is cheap: the tree is shared through `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    tree: Tree,
    selection: Selection,
}

impl State {
    pub fn new(tree: Tree) -> Self {
        Self {
            tree,
            selection: Selection::unset(),
        }
    }

    pub fn from_document(document: Node) -> EditorResult<Self> {
        Ok(Self::new(Tree::new(document)?))
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn document(&self) -> &Arc<Node> {
        self.tree.document()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Open a transaction validated by the core rules
    pub fn change(&self) -> Change {
        self.change_with(Arc::new(Schema::core()))
    }

    pub fn change_with(&self, schema: Arc<Schema>) -> Change {
        self.change_with_options(schema, SchemaOptions::default())
    }

    pub fn change_with_options(&self, schema: Arc<Schema>, options: SchemaOptions) -> Change {
        Change::new(self.clone(), schema, options)
    }

    /// Run a full normalization pass with the core rules
    pub fn normalized(&self) -> EditorResult<State> {
        self.normalized_with(Arc::new(Schema::core()), SchemaOptions::default())
    }

    pub fn normalized_with(&self, schema: Arc<Schema>, options: SchemaOptions) -> EditorResult<State> {
        let mut change = self.change_with_options(schema, options);
        change.normalize_document();
        Ok(change.commit()?.state)
    }
}
