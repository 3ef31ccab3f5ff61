use crate::change::{ApplyOptions, Change};
use crate::errors::EditorResult;
use crate::schema::SchemaRule;
use folio_document::Node;
use std::sync::Arc;

/// Every inline is bounded by texts
///
/// Two adjacent inlines get a text between them and a non-void inline at
/// either edge gets a text on that edge. A void inline may occupy one edge
/// without a text, but a void that is the only child gets a text after it.
pub struct InlineBoundariesRule;

impl SchemaRule for InlineBoundariesRule {
    /// Child indexes a text must be inserted before, ascending; the child
    /// count means "at the end"
    type Invalid = Vec<usize>;

    fn name(&self) -> &'static str {
        "inline-text-boundaries"
    }

    fn description(&self) -> &'static str {
        "Inlines must be surrounded by texts"
    }

    fn matches(&self, node: &Node) -> bool {
        node.is_element() && !node.is_void() && node.nodes().iter().any(|child| child.is_inline())
    }

    fn validate(&self, node: &Node) -> Option<Vec<usize>> {
        let positions = missing_boundaries(node.nodes());
        (!positions.is_empty()).then_some(positions)
    }

    fn normalize(&self, change: &mut Change, node: &Node, invalid: Vec<usize>) -> EditorResult<()> {
        for (shift, position) in invalid.into_iter().enumerate() {
            change.insert_node_by_key_with(node.key(), position + shift, Node::text(""), ApplyOptions::SILENT)?;
        }
        Ok(())
    }

    fn describe(&self, invalid: &Vec<usize>) -> String {
        format!("{} inline boundaries lack a text", invalid.len())
    }
}

fn missing_boundaries(nodes: &[Arc<Node>]) -> Vec<usize> {
    let mut positions = Vec::new();

    for (index, child) in nodes.iter().enumerate() {
        if !child.is_inline() {
            continue;
        }
        let previous = index.checked_sub(1).and_then(|index| nodes.get(index));
        let next = nodes.get(index + 1);

        match previous {
            Some(previous) if previous.is_inline() => positions.push(index),
            None if !child.is_void() => positions.push(index),
            _ => {}
        }
        if next.is_none() && (!child.is_void() || previous.is_none()) {
            positions.push(nodes.len());
        }
    }

    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::rules::testing::{normalized, shape};

    fn link(text: &str) -> Node {
        Node::inline("link", vec![Node::text(text)])
    }

    fn emoji() -> Node {
        Node::inline("emoji", vec![Node::text(" ")]).with_void(true)
    }

    #[test]
    fn test_positions() {
        let lone = Node::block("p", vec![link("a")]);
        assert_eq!(InlineBoundariesRule.validate(&lone), Some(vec![0, 1]));

        let pair = Node::block("p", vec![Node::text("x"), link("a"), link("b"), Node::text("y")]);
        assert_eq!(InlineBoundariesRule.validate(&pair), Some(vec![2]));

        let void_at_edge = Node::block("p", vec![Node::text("x"), emoji()]);
        assert!(InlineBoundariesRule.validate(&void_at_edge).is_none());

        let lone_void = Node::block("p", vec![emoji()]);
        assert_eq!(InlineBoundariesRule.validate(&lone_void), Some(vec![1]));
    }

    #[test]
    fn test_inserts_texts_around_adjacent_inlines() {
        let tree = normalized(vec![Node::block("paragraph", vec![link("a"), link("b")])]);
        let labels: Vec<_> = shape(&tree).into_iter().map(|(label, _)| label).collect();
        assert_eq!(labels, vec!["text", "link", "text", "link", "text"]);
    }
}
