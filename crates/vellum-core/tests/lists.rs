use vellum_core::{
    Document, Editor, ListType, Marks, Node, Point, Selection, indent, list_enter, outdent,
    to_html, toggle_list,
};

fn item(text: &str) -> Node {
    Node::element("li", vec![Node::paragraph(text)])
}

fn editor_with(children: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document { children }, selection)
}

#[test]
fn toggle_wraps_a_paragraph_and_toggles_back() {
    let mut editor = editor_with(
        vec![Node::element(
            "p",
            vec![
                Node::text("Hello "),
                Node::run(
                    "world",
                    Marks {
                        bold: true,
                        ..Marks::default()
                    },
                ),
            ],
        )],
        Selection::collapsed(Point::new(vec![0, 0], 2)),
    );

    let tx = toggle_list(&editor, ListType::Ordered).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<ol><li><p>Hello <strong>world</strong></p></li></ol>"
    );
    assert_eq!(editor.selection().focus, Point::new(vec![0, 0, 0, 0], 2));

    let tx = toggle_list(&editor, ListType::Ordered).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<p>Hello <strong>world</strong></p>"
    );
    assert_eq!(editor.selection().focus, Point::new(vec![0, 0], 2));
}

#[test]
fn toggle_merges_contiguous_blocks_into_one_list() {
    let mut editor = editor_with(
        vec![
            Node::paragraph("a"),
            Node::paragraph("b"),
            Node::paragraph("after"),
        ],
        Selection {
            anchor: Point::new(vec![0, 0], 0),
            focus: Point::new(vec![1, 0], 1),
        },
    );

    let tx = toggle_list(&editor, ListType::Unordered).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<ul><li><p>a</p></li><li><p>b</p></li></ul><p>after</p>"
    );
}

#[test]
fn toggle_detaches_a_suffix_of_items() {
    let mut editor = editor_with(
        vec![Node::element(
            "ul",
            vec![item("one"), item("two"), item("three")],
        )],
        Selection {
            anchor: Point::new(vec![0, 1, 0, 0], 0),
            focus: Point::new(vec![0, 2, 0, 0], 5),
        },
    );

    let tx = toggle_list(&editor, ListType::Unordered).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<ul><li><p>one</p></li></ul><p>two</p><p>three</p>"
    );
}

#[test]
fn toggle_splits_the_list_around_an_interior_item() {
    let mut editor = editor_with(
        vec![Node::element(
            "ul",
            vec![item("one"), item("two"), item("three")],
        )],
        Selection::collapsed(Point::new(vec![0, 1, 0, 0], 1)),
    );

    let tx = toggle_list(&editor, ListType::Unordered).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<ul><li><p>one</p></li></ul><p>two</p><ul><li><p>three</p></li></ul>"
    );
    assert_eq!(editor.selection().focus, Point::new(vec![1, 0], 1));
}

#[test]
fn retyping_a_single_item_list_changes_the_tag() {
    let mut editor = editor_with(
        vec![Node::element("ul", vec![item("only")])],
        Selection::collapsed(Point::new(vec![0, 0, 0, 0], 0)),
    );

    let tx = toggle_list(&editor, ListType::Ordered).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<ol><li><p>only</p></li></ol>"
    );
}

#[test]
fn retyping_one_item_of_a_multi_item_list_is_a_no_op() {
    let mut editor = editor_with(
        vec![Node::element("ul", vec![item("one"), item("two")])],
        Selection::collapsed(Point::new(vec![0, 0, 0, 0], 0)),
    );

    let tx = toggle_list(&editor, ListType::Ordered).unwrap();
    assert!(tx.is_empty());
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<ul><li><p>one</p></li><li><p>two</p></li></ul>"
    );
    assert!(!editor.can_undo());
}

#[test]
fn indent_nests_an_item_under_its_previous_sibling() {
    let mut editor = editor_with(
        vec![Node::element("ul", vec![item("one"), item("two")])],
        Selection::collapsed(Point::new(vec![0, 1, 0, 0], 0)),
    );

    let tx = indent(&editor).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<ul><li><p>one</p><ul><li><p>two</p></li></ul></li></ul>"
    );
    assert_eq!(editor.selection().focus, Point::new(vec![0, 0, 1, 0, 0, 0], 0));
}

#[test]
fn indent_of_the_first_item_is_a_no_op() {
    let mut editor = editor_with(
        vec![Node::element("ul", vec![item("one"), item("two")])],
        Selection::collapsed(Point::new(vec![0, 0, 0, 0], 0)),
    );

    let tx = indent(&editor).unwrap();
    assert!(tx.is_empty());
    assert!(!editor.can_undo());
}

#[test]
fn outdent_lifts_the_last_nested_item() {
    let mut editor = editor_with(
        vec![Node::element(
            "ul",
            vec![Node::element(
                "li",
                vec![
                    Node::paragraph("one"),
                    Node::element("ul", vec![item("two")]),
                ],
            )],
        )],
        Selection::collapsed(Point::new(vec![0, 0, 1, 0, 0, 0], 0)),
    );

    let tx = outdent(&editor).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<ul><li><p>one</p></li><li><p>two</p></li></ul>"
    );
    assert_eq!(editor.selection().focus, Point::new(vec![0, 1, 0, 0], 0));
}

#[test]
fn outdent_of_an_interior_nested_item_is_a_no_op() {
    let mut editor = editor_with(
        vec![Node::element(
            "ul",
            vec![Node::element(
                "li",
                vec![
                    Node::paragraph("one"),
                    Node::element("ul", vec![item("two"), item("three")]),
                ],
            )],
        )],
        Selection::collapsed(Point::new(vec![0, 0, 1, 0, 0, 0], 0)),
    );

    let tx = outdent(&editor).unwrap();
    assert!(tx.is_empty());
}

#[test]
fn list_enter_splits_an_item_and_relocates_the_sublist() {
    let mut editor = editor_with(
        vec![Node::element(
            "ul",
            vec![Node::element(
                "li",
                vec![
                    Node::block("h2", "Item"),
                    Node::element("ul", vec![item("sub")]),
                ],
            )],
        )],
        Selection::collapsed(Point::new(vec![0, 0, 0, 0], 2)),
    );

    let tx = list_enter(&editor).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<ul><li><h2>It</h2></li><li><h2>em</h2><ul><li><p>sub</p></li></ul></li></ul>"
    );
    assert_eq!(editor.selection().focus, Point::new(vec![0, 1, 0, 0], 0));
}

#[test]
fn list_enter_at_the_end_opens_an_empty_item() {
    let mut editor = editor_with(
        vec![Node::element("ul", vec![item("one")])],
        Selection::collapsed(Point::new(vec![0, 0, 0, 0], 3)),
    );

    let tx = list_enter(&editor).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        "<ul><li><p>one</p></li><li><p><br></p></li></ul>"
    );
}
