use super::{children_where, remove_nodes};
use crate::change::Change;
use crate::errors::EditorResult;
use crate::schema::SchemaRule;
use folio_document::{Key, Node};

/// Only blocks may sit directly under the document
pub struct DocumentChildrenRule;

impl SchemaRule for DocumentChildrenRule {
    type Invalid = Vec<Key>;

    fn name(&self) -> &'static str {
        "document-children-blocks"
    }

    fn description(&self) -> &'static str {
        "Document children must be blocks"
    }

    fn matches(&self, node: &Node) -> bool {
        node.is_document()
    }

    fn validate(&self, node: &Node) -> Option<Vec<Key>> {
        children_where(node, |child| !child.is_block())
    }

    fn normalize(&self, change: &mut Change, _node: &Node, invalid: Vec<Key>) -> EditorResult<()> {
        remove_nodes(change, &invalid)
    }

    fn describe(&self, invalid: &Vec<Key>) -> String {
        format!("{} non-block children of the document", invalid.len())
    }
}
