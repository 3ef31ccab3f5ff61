use super::remove_nodes;
use crate::change::{ApplyOptions, Change};
use crate::errors::EditorResult;
use crate::schema::SchemaRule;
use folio_document::{Key, Node};

const VOID_TEXT: &str = " ";

/// A void holds exactly one text containing a single space
pub struct VoidContentRule;

impl SchemaRule for VoidContentRule {
    /// Children to replace
    type Invalid = Vec<Key>;

    fn name(&self) -> &'static str {
        "void-content"
    }

    fn description(&self) -> &'static str {
        "Void nodes must contain exactly one single-space text"
    }

    fn matches(&self, node: &Node) -> bool {
        node.is_element() && node.is_void()
    }

    fn validate(&self, node: &Node) -> Option<Vec<Key>> {
        match node.nodes() {
            [only] if only.is_text() && only.text_content() == VOID_TEXT => None,
            children => Some(children.iter().map(|child| child.key().clone()).collect()),
        }
    }

    // Insert first so removals have a text to move the selection to
    fn normalize(&self, change: &mut Change, node: &Node, invalid: Vec<Key>) -> EditorResult<()> {
        change.insert_node_by_key_with(node.key(), 0, Node::text(VOID_TEXT), ApplyOptions::SILENT)?;
        remove_nodes(change, &invalid)
    }

    fn describe(&self, invalid: &Vec<Key>) -> String {
        format!("void node has {} unexpected children", invalid.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::rules::testing::normalized;

    #[test]
    fn test_replaces_content_with_single_space() {
        let tree = normalized(vec![Node::block("image", vec![Node::text("x")])
            .with_void(true)
            .with_key("image")]);

        let image = tree.get_node(&"image".into()).unwrap();
        assert_eq!(image.nodes().len(), 1);
        assert_eq!(image.text_content(), " ");
    }

    #[test]
    fn test_valid_void_passes() {
        let void = Node::inline("emoji", vec![Node::text(" ")]).with_void(true);
        assert!(VoidContentRule.validate(&void).is_none());

        let empty = Node::inline("emoji", vec![]).with_void(true);
        assert_eq!(VoidContentRule.validate(&empty), Some(Vec::new()));
    }
}
