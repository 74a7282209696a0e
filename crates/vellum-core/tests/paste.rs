use vellum_core::{
    Document, Editor, Node, Point, Selection, paste_html, paste_text, to_html,
};

fn editor_with(children: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document { children }, selection)
}

#[test]
fn word_processor_heading_paste_is_cleaned() {
    let mut editor = editor_with(
        vec![Node::paragraph("")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );

    let markup = "<h1 style=\"margin:0;font-family:Helvetica\"><b>Welcome</b></h1>\
                  <br class=\"Apple-interchange-newline\">";
    let tx = paste_html(&editor, markup).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<h1><strong>Welcome</strong></h1><p><br></p>"
    );
}

#[test]
fn single_paragraph_fragment_splices_inline() {
    let mut editor = editor_with(
        vec![Node::paragraph("Hello world")],
        Selection::collapsed(Point::new(vec![0, 0], 6)),
    );

    let tx = paste_html(&editor, "<p><b>brave </b></p>").unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<p>Hello <strong>brave </strong>world</p>"
    );
    // Caret lands after the spliced text.
    assert_eq!(editor.selection().focus, Point::new(vec![0, 2], 0));
}

#[test]
fn multi_block_paste_splits_the_caret_block() {
    let mut editor = editor_with(
        vec![Node::paragraph("headtail")],
        Selection::collapsed(Point::new(vec![0, 0], 4)),
    );

    let tx = paste_html(&editor, "<p>one</p><p>two</p>").unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<p>head</p><p>one</p><p>two</p><p>tail</p>"
    );
}

#[test]
fn paste_replaces_an_empty_caret_block() {
    let mut editor = editor_with(
        vec![Node::paragraph("keep"), Node::paragraph("")],
        Selection::collapsed(Point::new(vec![1, 0], 0)),
    );

    let tx = paste_html(&editor, "<ul><li><p>x</p></li></ul>").unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<p>keep</p><ul><li><p>x</p></li></ul>"
    );
}

#[test]
fn paste_text_strips_marks_links_and_styles() {
    let mut editor = editor_with(
        vec![Node::paragraph("")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );

    let markup = "<h2><b>Title</b></h2><p><a href=\"https://x\">link</a> tail</p>";
    let tx = paste_text(&editor, markup).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<p>Title</p><p>link tail</p>"
    );
}

#[test]
fn paste_text_flattens_list_items_to_paragraphs() {
    let mut editor = editor_with(
        vec![Node::paragraph("")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );

    let tx = paste_text(&editor, "<ul><li><p>one</p></li><li><p>two</p></li></ul>").unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<p>one</p><p>two</p>"
    );
}

#[test]
fn empty_fragment_changes_nothing() {
    let mut editor = editor_with(
        vec![Node::paragraph("stay")],
        Selection::collapsed(Point::new(vec![0, 0], 2)),
    );

    let tx = paste_html(&editor, "<!-- comment --><style>p{}</style>").unwrap();
    assert!(tx.is_empty());
    editor.apply(tx).unwrap();

    assert_eq!(to_html(editor.doc(), false, false), "<p>stay</p>");
    assert!(!editor.can_undo());
}
