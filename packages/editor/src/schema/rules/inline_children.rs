use super::{children_where, remove_nodes};
use crate::change::Change;
use crate::errors::EditorResult;
use crate::schema::SchemaRule;
use folio_document::{Key, Node};

/// Inlines hold only inlines and texts
pub struct InlineChildrenRule;

impl SchemaRule for InlineChildrenRule {
    type Invalid = Vec<Key>;

    fn name(&self) -> &'static str {
        "inline-children"
    }

    fn description(&self) -> &'static str {
        "Inline children must be inlines or texts"
    }

    fn matches(&self, node: &Node) -> bool {
        node.is_inline()
    }

    fn validate(&self, node: &Node) -> Option<Vec<Key>> {
        children_where(node, |child| !(child.is_inline() || child.is_text()))
    }

    fn normalize(&self, change: &mut Change, _node: &Node, invalid: Vec<Key>) -> EditorResult<()> {
        remove_nodes(change, &invalid)
    }

    fn describe(&self, invalid: &Vec<Key>) -> String {
        format!("{} block children inside an inline", invalid.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::rules::testing::normalized;

    #[test]
    fn test_removes_blocks_inside_inlines() {
        let tree = normalized(vec![Node::block(
            "paragraph",
            vec![Node::inline(
                "link",
                vec![
                    Node::text("keep"),
                    Node::block("paragraph", vec![Node::text("drop")]),
                ],
            )
            .with_key("link")],
        )]);

        let link = tree.get_node(&"link".into()).unwrap();
        assert!(link.nodes().iter().all(|child| !child.is_block()));
        assert_eq!(link.text_content(), "keep");
    }
}
