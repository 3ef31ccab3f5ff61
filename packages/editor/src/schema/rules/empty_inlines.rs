use super::remove_nodes;
use crate::change::{ApplyOptions, Change};
use crate::errors::EditorResult;
use crate::schema::SchemaRule;
use folio_document::{Key, Node};

/// Inline children without any text are removed
pub struct EmptyInlinesRule;

#[derive(Debug, Clone, PartialEq)]
pub struct EmptyInlines {
    pub keys: Vec<Key>,
    /// Every child is being removed
    pub all: bool,
}

impl SchemaRule for EmptyInlinesRule {
    type Invalid = EmptyInlines;

    fn name(&self) -> &'static str {
        "no-empty-inlines"
    }

    fn description(&self) -> &'static str {
        "Inline children must contain text"
    }

    fn matches(&self, node: &Node) -> bool {
        node.is_element() && !node.is_void()
    }

    fn validate(&self, node: &Node) -> Option<EmptyInlines> {
        let keys: Vec<Key> = node
            .nodes()
            .iter()
            .filter(|child| child.is_inline() && !child.is_void() && child.text_content().is_empty())
            .map(|child| child.key().clone())
            .collect();

        if keys.is_empty() {
            return None;
        }
        Some(EmptyInlines {
            all: keys.len() == node.nodes().len(),
            keys,
        })
    }

    fn normalize(&self, change: &mut Change, node: &Node, invalid: EmptyInlines) -> EditorResult<()> {
        // Keep the parent addressable once every child is gone
        if invalid.all {
            change.insert_node_by_key_with(node.key(), 0, Node::text(""), ApplyOptions::SILENT)?;
        }
        remove_nodes(change, &invalid.keys)
    }

    fn describe(&self, invalid: &EmptyInlines) -> String {
        format!("{} inline children have no text", invalid.keys.len())
    }
}
