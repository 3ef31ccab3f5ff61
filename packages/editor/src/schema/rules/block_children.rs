use super::{children_where, remove_nodes};
use crate::change::Change;
use crate::errors::EditorResult;
use crate::schema::SchemaRule;
use folio_document::{Key, Node};

/// A block holds either blocks or inline content, never both
///
/// The first child decides which; dissenting children are removed.
pub struct BlockChildrenRule;

impl SchemaRule for BlockChildrenRule {
    type Invalid = Vec<Key>;

    fn name(&self) -> &'static str {
        "block-children-uniform"
    }

    fn description(&self) -> &'static str {
        "Block children must be all blocks or all inlines and texts"
    }

    fn matches(&self, node: &Node) -> bool {
        node.is_block()
    }

    fn validate(&self, node: &Node) -> Option<Vec<Key>> {
        let holds_blocks = node.first_child()?.is_block();
        children_where(node, |child| child.is_block() != holds_blocks)
    }

    fn normalize(&self, change: &mut Change, _node: &Node, invalid: Vec<Key>) -> EditorResult<()> {
        remove_nodes(change, &invalid)
    }

    fn describe(&self, invalid: &Vec<Key>) -> String {
        format!("{} children disagree with the first child's kind", invalid.len())
    }
}
