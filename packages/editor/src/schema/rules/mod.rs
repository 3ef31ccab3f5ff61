mod adjacent_texts;
mod block_children;
mod container_not_empty;
mod document_children;
mod empty_inlines;
mod empty_texts;
mod inline_boundaries;
mod inline_children;
mod void_content;

pub use adjacent_texts::AdjacentTextsRule;
pub use block_children::BlockChildrenRule;
pub use container_not_empty::ContainerNotEmptyRule;
pub use document_children::DocumentChildrenRule;
pub use empty_inlines::EmptyInlinesRule;
pub use empty_texts::EmptyTextsRule;
pub use inline_boundaries::InlineBoundariesRule;
pub use inline_children::InlineChildrenRule;
pub use void_content::VoidContentRule;

use crate::change::{ApplyOptions, Change};
use crate::errors::EditorResult;
use folio_document::{Key, Node};

/// Keys of the children of `node` matching `predicate`, or `None` when
/// there are none
fn children_where(node: &Node, predicate: impl Fn(&Node) -> bool) -> Option<Vec<Key>> {
    let keys: Vec<Key> = node
        .nodes()
        .iter()
        .filter(|child| predicate(child))
        .map(|child| child.key().clone())
        .collect();
    (!keys.is_empty()).then_some(keys)
}

fn remove_nodes(change: &mut Change, keys: &[Key]) -> EditorResult<()> {
    for key in keys {
        change.remove_node_by_key_with(key, ApplyOptions::SILENT)?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::State;
    use folio_document::{Node, Tree};

    /// Normalize a document built from `nodes` with the core schema
    pub fn normalized(nodes: Vec<Node>) -> Tree {
        State::from_document(Node::document(nodes))
            .and_then(|state| state.normalized())
            .map(|state| state.tree().clone())
            .unwrap()
    }

    /// `(kind, text)` of each child of the first block
    pub fn shape(tree: &Tree) -> Vec<(String, String)> {
        tree.document().nodes()[0]
            .nodes()
            .iter()
            .map(|child| {
                let label = match child.node_type() {
                    Some(node_type) if child.is_void() => format!("{}!", node_type),
                    Some(node_type) => node_type.to_string(),
                    None => "text".to_string(),
                };
                (label, child.text_content())
            })
            .collect()
    }
}
