use crate::change::{ApplyOptions, Change};
use crate::errors::EditorResult;
use crate::schema::SchemaRule;
use folio_document::{Key, Node};

/// Adjacent text siblings are merged
pub struct AdjacentTextsRule;

impl SchemaRule for AdjacentTextsRule {
    /// Texts that directly follow another text, in document order
    type Invalid = Vec<Key>;

    fn name(&self) -> &'static str {
        "merge-adjacent-texts"
    }

    fn description(&self) -> &'static str {
        "Adjacent texts must be merged"
    }

    fn matches(&self, node: &Node) -> bool {
        node.is_element()
    }

    fn validate(&self, node: &Node) -> Option<Vec<Key>> {
        let keys: Vec<Key> = node
            .nodes()
            .windows(2)
            .filter(|pair| pair[0].is_text() && pair[1].is_text())
            .map(|pair| pair[1].key().clone())
            .collect();
        (!keys.is_empty()).then_some(keys)
    }

    // Right to left, so every merge target still exists when it is reached
    fn normalize(&self, change: &mut Change, _node: &Node, invalid: Vec<Key>) -> EditorResult<()> {
        for key in invalid.iter().rev() {
            change.merge_node_by_key_with(key, ApplyOptions::SILENT)?;
        }
        Ok(())
    }

    fn describe(&self, invalid: &Vec<Key>) -> String {
        format!("{} texts follow another text", invalid.len())
    }
}
