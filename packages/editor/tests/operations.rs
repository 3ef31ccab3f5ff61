use anyhow::Result;
use folio_document::{DocumentError, Key, Leaf, Mark, Marks, Node, Point, Selection};
use folio_editor::{invert_operations, EditorError, NodeProperties, Operation, Schema, State};

fn two_paragraphs() -> Result<State> {
    let state = State::from_document(Node::document(vec![
        Node::block("paragraph", vec![Node::text("hello").with_key("a")]).with_key("p"),
        Node::block("paragraph", vec![Node::text("world").with_key("b")]).with_key("q"),
    ]))?;
    Ok(state.normalized()?)
}

fn bold() -> Mark {
    Mark::new("bold")
}

#[test]
fn test_inverted_log_restores_the_base_tree() -> Result<()> {
    let state = two_paragraphs()?;
    let document = state.document().key().clone();

    let mut change = state.change();
    change
        .select(Selection::collapsed("a", 5))?
        .insert_text("!")?
        .add_mark_by_key(&"a".into(), 0, 5, bold())?
        .set_node_by_key(&"p".into(), NodeProperties::node_type("heading"))?
        .insert_node_by_key(&document, 2, Node::block("paragraph", vec![]))?;
    change.split_node_by_key(&"q".into(), 1)?;
    let committed = change.commit()?;

    assert_eq!(committed.state.document().nodes().len(), 4);
    assert_ne!(committed.state.tree(), state.tree());

    let undo = invert_operations(&committed.operations);
    let (restored, _) = undo.iter().try_fold(
        (committed.state.tree().clone(), committed.state.selection().clone()),
        |(tree, selection), operation| operation.apply(&tree, &selection),
    )?;

    assert!(restored.content_eq(state.tree()));
    assert_eq!(restored.document().text_content(), "helloworld");
    assert!(Schema::core().check(&restored).is_empty());
    Ok(())
}

#[test]
fn test_failed_operation_poisons_the_transaction() -> Result<()> {
    let state = two_paragraphs()?;

    let mut change = state.change();
    change.insert_text_by_key(&"a".into(), 0, "x", None)?;

    let err = change.remove_text_by_key(&"a".into(), 4, 10).unwrap_err();
    assert!(matches!(err, EditorError::InvalidOperation(_)));
    assert!(change.is_aborted());

    let err = change.insert_text_by_key(&"b".into(), 0, "y", None).unwrap_err();
    assert!(matches!(err, EditorError::Aborted(_)));
    assert!(matches!(change.commit(), Err(EditorError::Aborted(_))));

    assert_eq!(state.document().text_content(), "helloworld");
    Ok(())
}

#[test]
fn test_missing_keys_surface_as_not_found() -> Result<()> {
    let state = two_paragraphs()?;

    let mut change = state.change();
    let err = change.remove_node_by_key(&"missing".into()).unwrap_err();
    assert_eq!(err, EditorError::NotFound(Key::from("missing")));
    Ok(())
}

#[test]
fn test_moving_past_the_text_end_fails() -> Result<()> {
    let state = two_paragraphs()?;

    let mut change = state.change();
    change.select(Selection::collapsed("a", 1))?.move_selection_by(3)?;
    assert_eq!(change.selection().anchor(), Some(Point::new("a", 4)));

    let err = change.move_selection_by(100).unwrap_err();
    assert!(matches!(
        err,
        EditorError::Document(DocumentError::OffsetOutOfBounds { .. })
    ));
    Ok(())
}

#[test]
fn test_typing_over_a_selection_across_blocks() -> Result<()> {
    let state = two_paragraphs()?;

    let mut change = state.change();
    change
        .select(Selection::between(Point::new("a", 2), Point::new("b", 3)))?
        .insert_text("y")?;
    let committed = change.commit()?;
    let next = committed.state;

    assert_eq!(next.document().nodes().len(), 1);
    assert_eq!(next.document().text_content(), "heyld");
    assert!(!next.tree().has_node(&"q".into()));
    assert_eq!(next.selection().anchor(), Some(Point::new("a", 3)));
    assert!(next.selection().is_collapsed());
    Ok(())
}

#[test]
fn test_toggle_mark_adds_then_removes() -> Result<()> {
    let state = two_paragraphs()?;
    let range = Selection::between(Point::new("a", 0), Point::new("a", 4));

    let mut change = state.change();
    change.select(range)?.toggle_mark(bold())?;
    let marked = change.commit()?.state;

    let leaves = marked.tree().get_node(&"a".into())?.as_text().map(|text| text.leaves().to_vec());
    assert_eq!(
        leaves,
        Some(vec![Leaf::new("hell", Marks::from([bold()])), Leaf::plain("o")])
    );

    let mut change = marked.change();
    change.toggle_mark(bold())?;
    let unmarked = change.commit()?.state;

    let leaves = unmarked.tree().get_node(&"a".into())?.as_text().map(|text| text.leaves().to_vec());
    assert_eq!(leaves, Some(vec![Leaf::plain("hello")]));
    Ok(())
}

#[test]
fn test_collapsed_marks_apply_to_the_next_insertion() -> Result<()> {
    let state = two_paragraphs()?;

    let mut change = state.change();
    change
        .select(Selection::collapsed("b", 5))?
        .add_mark(bold())?
        .insert_text("!")?;
    let next = change.commit()?.state;

    let leaves = next.tree().get_node(&"b".into())?.as_text().map(|text| text.leaves().to_vec());
    assert_eq!(
        leaves,
        Some(vec![Leaf::plain("world"), Leaf::new("!", Marks::from([bold()]))])
    );
    Ok(())
}

#[test]
fn test_set_block_and_set_inline() -> Result<()> {
    let state = State::from_document(Node::document(vec![Node::block(
        "paragraph",
        vec![
            Node::text("see "),
            Node::inline("link", vec![Node::text("docs").with_key("l")]).with_key("link"),
            Node::text(""),
        ],
    )
    .with_key("p")]))?
    .normalized()?;

    let mut change = state.change();
    change
        .select(Selection::collapsed("l", 1))?
        .set_block(NodeProperties::node_type("heading"))?
        .set_inline(NodeProperties::node_type("mention"))?;
    let names: Vec<&str> = change.operations().iter().map(Operation::name).collect();
    assert_eq!(names, vec!["set_selection", "set_node", "set_node"]);

    let next = change.commit()?.state;
    assert_eq!(next.tree().get_node(&"p".into())?.node_type(), Some("heading"));
    assert_eq!(next.tree().get_node(&"link".into())?.node_type(), Some("mention"));
    Ok(())
}

#[test]
fn test_dropped_change_leaves_base_untouched() -> Result<()> {
    let state = two_paragraphs()?;
    let before = state.clone();

    let mut change = state.change();
    change
        .remove_node_by_key(&"q".into())?
        .insert_text_by_key(&"a".into(), 0, "oh ", None)?;
    assert_eq!(change.tree().document().text_content(), "oh hello");
    drop(change);

    assert_eq!(state, before);
    Ok(())
}
