//! Raw JSON boundary tests

use folio_document::raw::{self, DeserializeOptions, SerializeOptions};
use folio_document::{DocumentError, Leaf, Mark, Marks, Node, Tree};
use serde_json::json;

#[test]
fn test_paragraph_round_trip_is_identical() -> anyhow::Result<()> {
    let input = json!({
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
    });

    let tree = raw::from_value(input.clone(), &DeserializeOptions::default())?;
    assert_eq!(tree.get_first_text().map(Node::text_content).as_deref(), Some("one"));

    let output = raw::to_value(&tree, &SerializeOptions::default())?;
    assert_eq!(output, input);
    Ok(())
}

#[test]
fn test_nested_structure_round_trips_up_to_keys() -> anyhow::Result<()> {
    let mut data = folio_document::Data::new();
    data.insert("href".to_string(), json!("https://example.com"));

    let bold: Marks = [Mark::new("bold")].into_iter().collect();
    let tree = Tree::from_nodes(vec![
        Node::block(
            "quote",
            vec![Node::block(
                "paragraph",
                vec![
                    Node::text_with_leaves(vec![Leaf::plain("see "), Leaf::new("this", bold)]),
                    Node::inline("link", vec![Node::text("link")]).with_data(data),
                    Node::text(""),
                ],
            )],
        ),
        Node::block("image", vec![Node::text(" ")]).with_void(true),
    ])?;

    let json = raw::to_json(&tree, &SerializeOptions::default())?;
    let reloaded = raw::from_json(&json, &DeserializeOptions::default())?;

    assert!(reloaded.content_eq(&tree));
    assert_ne!(reloaded.document().key(), tree.document().key());
    assert_eq!(raw::to_json(&reloaded, &SerializeOptions::default())?, json);
    Ok(())
}

#[test]
fn test_state_must_hold_a_document() {
    let result = raw::from_value(
        json!({ "kind": "state", "document": { "kind": "text", "ranges": [] } }),
        &DeserializeOptions::default(),
    );
    assert!(matches!(result, Err(DocumentError::InvalidRaw(_))));
}

#[test]
fn test_duplicate_preserved_keys_are_rejected() {
    let result = raw::from_value(
        json!({
            "kind": "state",
            "document": { "kind": "document", "nodes": [
                { "kind": "block", "key": "b", "type": "p", "nodes": [] },
                { "kind": "block", "key": "b", "type": "p", "nodes": [] }
            ] }
        }),
        &DeserializeOptions { preserve_keys: true },
    );
    assert_eq!(result.unwrap_err(), DocumentError::DuplicateKey("b".into()));
}
