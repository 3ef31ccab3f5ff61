//! # Raw Serialization
//!
//! Conversion between a [`Tree`] and the plain nested JSON shape used at
//! the edges of the system:
//!
//! ```json
//! { "kind": "state",
//!   "document": { "kind": "document", "data": {}, "nodes": [
//!     { "kind": "block", "type": "paragraph", "data": {}, "isVoid": false,
//!       "nodes": [ { "kind": "text",
//!                    "ranges": [ { "kind": "range", "text": "one", "marks": [] } ] } ] } ] } }
//! ```
//!
//! Keys are dropped on the way out and regenerated on the way in unless the
//! caller asks to preserve them.

use crate::error::{DocumentError, DocumentResult};
use crate::key::Key;
use crate::node::{Data, Document, Element, Leaf, Mark, Node, Text};
use crate::tree::Tree;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawStateKind {
    #[default]
    State,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawLeafKind {
    #[default]
    Range,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawMarkKind {
    #[default]
    Mark,
}

/// Top level raw value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawState {
    #[serde(default)]
    pub kind: RawStateKind,
    pub document: RawNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RawNode {
    Document(RawDocument),
    Block(RawElement),
    Inline(RawElement),
    Text(RawText),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub data: Data,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub data: Data,
    #[serde(rename = "isVoid", default)]
    pub is_void: bool,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawText {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub ranges: Vec<RawLeaf>,
    /// Shorthand for a single unmarked range, accepted on input only
    #[serde(default, skip_serializing)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLeaf {
    #[serde(default)]
    pub kind: RawLeafKind,
    pub text: String,
    #[serde(default)]
    pub marks: Vec<RawMark>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMark {
    #[serde(default)]
    pub kind: RawMarkKind,
    #[serde(rename = "type")]
    pub mark_type: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializeOptions {
    pub preserve_keys: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeserializeOptions {
    pub preserve_keys: bool,
}

pub fn serialize(tree: &Tree, options: &SerializeOptions) -> RawState {
    RawState {
        kind: RawStateKind::State,
        document: serialize_node(tree.document(), options),
    }
}

pub fn serialize_node(node: &Node, options: &SerializeOptions) -> RawNode {
    let key = options.preserve_keys.then(|| node.key().to_string());
    let children = |nodes: &[Arc<Node>]| -> Vec<RawNode> {
        nodes
            .iter()
            .map(|child| serialize_node(child, options))
            .collect()
    };

    match node {
        Node::Document(document) => RawNode::Document(RawDocument {
            key,
            data: document.data.clone(),
            nodes: children(&document.nodes),
        }),
        Node::Block(element) => RawNode::Block(serialize_element(element, key, children(&element.nodes))),
        Node::Inline(element) => RawNode::Inline(serialize_element(element, key, children(&element.nodes))),
        Node::Text(text) => RawNode::Text(RawText {
            key,
            ranges: text.leaves().iter().map(serialize_leaf).collect(),
            text: None,
        }),
    }
}

fn serialize_element(element: &Element, key: Option<String>, nodes: Vec<RawNode>) -> RawElement {
    RawElement {
        key,
        node_type: element.node_type.clone(),
        data: element.data.clone(),
        is_void: element.is_void,
        nodes,
    }
}

fn serialize_leaf(leaf: &Leaf) -> RawLeaf {
    RawLeaf {
        kind: RawLeafKind::Range,
        text: leaf.text.clone(),
        marks: leaf
            .marks
            .iter()
            .map(|mark| RawMark {
                kind: RawMarkKind::Mark,
                mark_type: mark.mark_type.clone(),
            })
            .collect(),
    }
}

pub fn deserialize(raw: RawState, options: &DeserializeOptions) -> DocumentResult<Tree> {
    let RawNode::Document(document) = raw.document else {
        return Err(DocumentError::invalid_raw("state must wrap a document node"));
    };
    if options.preserve_keys {
        // Keys generated for unkeyed nodes below must not reuse a preserved one
        document.key.iter().for_each(|key| Key::new(key.as_str()).observe());
        document.nodes.iter().for_each(observe_keys);
    }

    let nodes = document
        .nodes
        .into_iter()
        .map(|node| deserialize_node(node, options).map(Arc::new))
        .collect::<DocumentResult<Vec<_>>>()?;

    Tree::new(Node::Document(Document {
        key: assign_key(document.key, options),
        data: document.data,
        nodes,
    }))
}

/// Build a non-document node from its raw form
pub fn deserialize_node(raw: RawNode, options: &DeserializeOptions) -> DocumentResult<Node> {
    match raw {
        RawNode::Document(_) => Err(DocumentError::invalid_raw("document nodes cannot be nested")),
        RawNode::Block(element) => deserialize_element(element, options).map(Node::Block),
        RawNode::Inline(element) => deserialize_element(element, options).map(Node::Inline),
        RawNode::Text(text) => {
            let leaves = match (text.ranges.is_empty(), text.text) {
                (true, Some(text)) => vec![Leaf::plain(text)],
                _ => text.ranges.into_iter().map(deserialize_leaf).collect(),
            };
            let mut node = Text::from_leaves(leaves);
            node.key = assign_key(text.key, options);
            Ok(Node::Text(node))
        }
    }
}

fn deserialize_element(raw: RawElement, options: &DeserializeOptions) -> DocumentResult<Element> {
    let nodes = raw
        .nodes
        .into_iter()
        .map(|node| deserialize_node(node, options).map(Arc::new))
        .collect::<DocumentResult<Vec<_>>>()?;

    Ok(Element {
        key: assign_key(raw.key, options),
        node_type: raw.node_type,
        data: raw.data,
        is_void: raw.is_void,
        nodes,
    })
}

fn deserialize_leaf(raw: RawLeaf) -> Leaf {
    Leaf::new(
        raw.text,
        raw.marks.into_iter().map(|mark| Mark::new(mark.mark_type)).collect(),
    )
}

fn observe_keys(raw: &RawNode) {
    let (key, nodes) = match raw {
        RawNode::Document(document) => (&document.key, document.nodes.as_slice()),
        RawNode::Block(element) | RawNode::Inline(element) => (&element.key, element.nodes.as_slice()),
        RawNode::Text(text) => (&text.key, &[][..]),
    };
    if let Some(key) = key {
        Key::new(key.as_str()).observe();
    }
    nodes.iter().for_each(observe_keys);
}

fn assign_key(key: Option<String>, options: &DeserializeOptions) -> Key {
    match key {
        Some(key) if options.preserve_keys => Key::new(key),
        _ => Key::generate(),
    }
}

pub fn to_value(tree: &Tree, options: &SerializeOptions) -> DocumentResult<serde_json::Value> {
    Ok(serde_json::to_value(serialize(tree, options))?)
}

pub fn to_json(tree: &Tree, options: &SerializeOptions) -> DocumentResult<String> {
    Ok(serde_json::to_string_pretty(&serialize(tree, options))?)
}

pub fn from_value(value: serde_json::Value, options: &DeserializeOptions) -> DocumentResult<Tree> {
    deserialize(serde_json::from_value(value)?, options)
}

pub fn from_json(json: &str, options: &DeserializeOptions) -> DocumentResult<Tree> {
    deserialize(serde_json::from_str(json)?, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn one_paragraph() -> serde_json::Value {
        json!({
            "kind": "state",
            "document": {
                "kind": "document",
                "data": {},
                "nodes": [{
                    "kind": "block",
                    "type": "paragraph",
                    "data": {},
                    "isVoid": false,
                    "nodes": [{
                        "kind": "text",
                        "ranges": [{ "kind": "range", "text": "one", "marks": [] }]
                    }]
                }]
            }
        })
    }

    #[test]
    fn test_round_trip_is_identical() {
        let input = one_paragraph();
        let tree = from_value(input.clone(), &DeserializeOptions::default()).unwrap();
        let output = to_value(&tree, &SerializeOptions::default()).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_missing_fields_default() {
        let tree = from_value(
            json!({
                "kind": "state",
                "document": {
                    "kind": "document",
                    "nodes": [{ "kind": "block", "type": "image", "isVoid": true }]
                }
            }),
            &DeserializeOptions::default(),
        )
        .unwrap();

        let image = &tree.document().nodes()[0];
        assert!(image.is_void());
        assert!(image.nodes().is_empty());
        assert!(image.data().unwrap().is_empty());
    }

    #[test]
    fn test_text_shorthand_and_marks() {
        let tree = from_value(
            json!({
                "kind": "state",
                "document": { "kind": "document", "nodes": [{
                    "kind": "block", "type": "p", "nodes": [
                        { "kind": "text", "text": "plain" },
                        { "kind": "text", "ranges": [
                            { "text": "bold", "marks": [{ "type": "bold" }] }
                        ] }
                    ]
                }] }
            }),
            &DeserializeOptions::default(),
        )
        .unwrap();

        let texts: Vec<_> = tree.get_texts().filter_map(Node::as_text).collect();
        assert_eq!(texts[0].text(), "plain");
        assert!(texts[1].leaves()[0].marks.contains(&Mark::new("bold")));
    }

    #[test]
    fn test_keys_are_preserved_on_request() {
        let tree = Tree::from_nodes(vec![
            Node::block("p", vec![Node::text("x").with_key("t")]).with_key("b"),
        ])
        .unwrap();

        let keep = to_value(&tree, &SerializeOptions { preserve_keys: true }).unwrap();
        assert_eq!(keep["document"]["nodes"][0]["key"], "b");

        let reloaded = from_value(keep.clone(), &DeserializeOptions { preserve_keys: true }).unwrap();
        assert!(reloaded.has_node(&"t".into()));

        let fresh = from_value(keep, &DeserializeOptions::default()).unwrap();
        assert!(!fresh.has_node(&"t".into()));
        assert!(fresh.content_eq(&tree));
    }

    #[test]
    fn test_unkeyed_nodes_never_take_a_preserved_key() {
        let next: u64 = Key::generate().as_str().parse().unwrap();
        let taken = (next + 1).to_string();
        let tree = from_value(
            serde_json::json!({
                "document": { "kind": "document", "nodes": [{
                    "kind": "block", "type": "p", "nodes": [
                        { "kind": "text", "text": "unkeyed" },
                        { "kind": "text", "key": taken, "text": "keyed" }
                    ]
                }] }
            }),
            &DeserializeOptions { preserve_keys: true },
        )
        .unwrap();

        assert_eq!(tree.get_node(&taken.as_str().into()).unwrap().text_content(), "keyed");
        assert_eq!(tree.get_texts().count(), 2);
    }

    #[test]
    fn test_nested_document_is_rejected() {
        let err = from_value(
            json!({
                "kind": "state",
                "document": { "kind": "document", "nodes": [{ "kind": "document" }] }
            }),
            &DeserializeOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidRaw(_)));

        assert!(from_json("{ not json", &DeserializeOptions::default()).is_err());
    }

    #[test]
    fn test_empty_text_serializes_without_ranges() {
        let tree = Tree::from_nodes(vec![Node::block("p", vec![Node::text("")])]).unwrap();
        let value = to_value(&tree, &SerializeOptions::default()).unwrap();
        assert_eq!(value["document"]["nodes"][0]["nodes"][0]["ranges"], json!([]));
    }
}
