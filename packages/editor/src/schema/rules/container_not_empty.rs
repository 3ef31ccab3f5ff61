use crate::change::{ApplyOptions, Change};
use crate::errors::EditorResult;
use crate::schema::SchemaRule;
use folio_document::Node;

/// Every block and inline has at least one child
pub struct ContainerNotEmptyRule;

impl SchemaRule for ContainerNotEmptyRule {
    type Invalid = ();

    fn name(&self) -> &'static str {
        "container-not-empty"
    }

    fn description(&self) -> &'static str {
        "Blocks and inlines must have at least one child"
    }

    fn matches(&self, node: &Node) -> bool {
        node.is_element()
    }

    fn validate(&self, node: &Node) -> Option<()> {
        node.nodes().is_empty().then_some(())
    }

    fn normalize(&self, change: &mut Change, node: &Node, _invalid: ()) -> EditorResult<()> {
        change.insert_node_by_key_with(node.key(), 0, Node::text(""), ApplyOptions::SILENT)?;
        Ok(())
    }
}
