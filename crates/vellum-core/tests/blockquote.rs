use vellum_core::{
    Document, Editor, Node, Point, Selection, blockquote_enter, to_html,
};

fn editor_with(children: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document { children }, selection)
}

#[test]
fn enter_at_the_end_splits_into_two_sibling_quotes() {
    let mut editor = editor_with(
        vec![Node::element(
            "blockquote",
            vec![Node::paragraph("This is a simple paragraph")],
        )],
        Selection::collapsed(Point::new(vec![0, 0, 0], 26)),
    );

    let tx = blockquote_enter(&editor).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<blockquote><p>This is a simple paragraph</p></blockquote>\
         <blockquote><p><br></p></blockquote>"
    );
    assert_eq!(editor.selection().focus, Point::new(vec![1, 0, 0], 0));
}

#[test]
fn enter_mid_text_puts_the_tail_in_the_second_quote() {
    let mut editor = editor_with(
        vec![Node::element(
            "blockquote",
            vec![Node::paragraph("headtail")],
        )],
        Selection::collapsed(Point::new(vec![0, 0, 0], 4)),
    );

    let tx = blockquote_enter(&editor).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<blockquote><p>head</p></blockquote><blockquote><p>tail</p></blockquote>"
    );
    assert_eq!(editor.selection().focus, Point::new(vec![1, 0, 0], 0));
}

#[test]
fn surrounding_blocks_stay_with_their_halves() {
    let mut editor = editor_with(
        vec![Node::element(
            "blockquote",
            vec![
                Node::paragraph("before"),
                Node::paragraph("split"),
                Node::paragraph("after"),
            ],
        )],
        Selection::collapsed(Point::new(vec![0, 1, 0], 2)),
    );

    let tx = blockquote_enter(&editor).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<blockquote><p>before</p><p>sp</p></blockquote>\
         <blockquote><p>lit</p><p>after</p></blockquote>"
    );
}

#[test]
fn enter_on_an_empty_block_exits_a_depth_one_quote() {
    let mut editor = editor_with(
        vec![Node::element(
            "blockquote",
            vec![Node::paragraph("text"), Node::paragraph("")],
        )],
        Selection::collapsed(Point::new(vec![0, 1, 0], 0)),
    );

    let tx = blockquote_enter(&editor).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<blockquote><p>text</p></blockquote><p><br></p>"
    );
    assert_eq!(editor.selection().focus, Point::new(vec![1, 0], 0));
}

#[test]
fn empty_block_in_a_nested_quote_still_splits() {
    let mut editor = editor_with(
        vec![Node::element(
            "blockquote",
            vec![Node::element(
                "blockquote",
                vec![Node::paragraph("")],
            )],
        )],
        Selection::collapsed(Point::new(vec![0, 0, 0, 0], 0)),
    );

    let tx = blockquote_enter(&editor).unwrap();
    editor.apply(tx).unwrap();

    // Depth 2: the inner quote splits instead of exiting.
    assert_eq!(
        to_html(editor.doc(), false, false),
        "<blockquote><blockquote><p><br></p></blockquote>\
         <blockquote><p><br></p></blockquote></blockquote>"
    );
}

#[test]
fn enter_outside_a_quote_is_rejected() {
    let editor = editor_with(
        vec![Node::paragraph("plain")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );
    assert!(blockquote_enter(&editor).is_err());
}
