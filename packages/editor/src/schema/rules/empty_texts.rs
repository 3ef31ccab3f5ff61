use super::remove_nodes;
use crate::change::Change;
use crate::errors::EditorResult;
use crate::schema::SchemaRule;
use folio_document::{Key, Node};
use std::sync::Arc;

/// Empty texts are removed unless an inline needs them
///
/// An empty text stays when it is the only child, when it sits between two
/// inlines, when it bounds a non-void inline at an edge, or when it is the
/// only text beside a void inline whose other side is an edge.
pub struct EmptyTextsRule;

impl SchemaRule for EmptyTextsRule {
    type Invalid = Vec<Key>;

    fn name(&self) -> &'static str {
        "prune-empty-texts"
    }

    fn description(&self) -> &'static str {
        "Empty texts must be required by a neighbouring inline"
    }

    fn matches(&self, node: &Node) -> bool {
        node.is_element()
    }

    fn validate(&self, node: &Node) -> Option<Vec<Key>> {
        let keys = redundant_texts(node.nodes());
        (!keys.is_empty()).then_some(keys)
    }

    fn normalize(&self, change: &mut Change, _node: &Node, invalid: Vec<Key>) -> EditorResult<()> {
        remove_nodes(change, &invalid)
    }

    fn describe(&self, invalid: &Vec<Key>) -> String {
        format!("{} empty texts are not needed", invalid.len())
    }
}

/// Decided left to right against the siblings kept so far
fn redundant_texts(nodes: &[Arc<Node>]) -> Vec<Key> {
    if nodes.len() <= 1 {
        return Vec::new();
    }

    let mut kept: Vec<&Node> = Vec::new();
    let mut redundant = Vec::new();

    for (index, child) in nodes.iter().map(Arc::as_ref).enumerate() {
        let is_empty_text = child.is_text() && child.is_empty_text();
        if !is_empty_text {
            kept.push(child);
            continue;
        }

        let previous = kept.last().copied();
        let before_previous = kept.len().checked_sub(2).map(|index| kept[index]);
        let next = nodes.get(index + 1).map(Arc::as_ref);
        let after_next = nodes.get(index + 2);

        if is_required(previous, before_previous.is_none(), next, after_next.is_none()) {
            kept.push(child);
        } else {
            redundant.push(child.key().clone());
        }
    }

    redundant
}

fn is_required(
    previous: Option<&Node>,
    previous_at_edge: bool,
    next: Option<&Node>,
    next_at_edge: bool,
) -> bool {
    let inline = |node: Option<&Node>| node.map(Node::is_inline).unwrap_or(false);
    let solid_inline = |node: Option<&Node>| node.map(|node| node.is_inline() && !node.is_void()).unwrap_or(false);
    let void_inline = |node: Option<&Node>| node.map(|node| node.is_inline() && node.is_void()).unwrap_or(false);

    match (previous, next) {
        (None, None) => true,
        _ if inline(previous) && inline(next) => true,
        (None, _) if solid_inline(next) => true,
        (_, None) if solid_inline(previous) => true,
        _ if void_inline(previous) && previous_at_edge => true,
        _ if void_inline(next) && next_at_edge => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::rules::testing::{normalized, shape};

    fn emoji() -> Node {
        Node::inline("emoji", vec![Node::text(" ")]).with_void(true)
    }

    #[test]
    fn test_drops_empty_text_after_bounded_void() {
        let tree = normalized(vec![Node::block(
            "paragraph",
            vec![Node::text("a"), emoji(), Node::text("")],
        )]);
        assert_eq!(
            shape(&tree),
            vec![
                ("text".to_string(), "a".to_string()),
                ("emoji!".to_string(), " ".to_string()),
            ]
        );
    }

    #[test]
    fn test_keeps_texts_a_void_at_the_edge_needs() {
        let block = Node::block("paragraph", vec![emoji(), Node::text("")]);
        assert!(EmptyTextsRule.validate(&block).is_none());

        let leading = Node::block("paragraph", vec![Node::text(""), emoji()]);
        assert!(EmptyTextsRule.validate(&leading).is_none());
    }

    #[test]
    fn test_keeps_text_between_inlines() {
        let block = Node::block(
            "paragraph",
            vec![
                Node::text(""),
                Node::inline("link", vec![Node::text("a")]),
                Node::text(""),
                emoji(),
            ],
        );
        assert!(EmptyTextsRule.validate(&block).is_none());
    }

    #[test]
    fn test_only_child_is_kept() {
        let block = Node::block("paragraph", vec![Node::text("")]);
        assert!(EmptyTextsRule.validate(&block).is_none());
    }
}
