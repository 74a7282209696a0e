use vellum_core::{
    Document, Editor, Node, Point, Selection, Side, TableBorder, add_col, add_header, add_row,
    delete_col, delete_row, insert_table, set_border, to_html,
};

fn editor_with(children: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document { children }, selection)
}

fn cell(text: &str) -> String {
    if text.is_empty() {
        "<td><p><br></p></td>".to_string()
    } else {
        format!("<td><p>{text}</p></td>")
    }
}

#[test]
fn insert_at_block_start_lands_before_the_paragraph() {
    let mut editor = editor_with(
        vec![Node::paragraph("Text")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );

    let tx = insert_table(&editor, 2, 2).unwrap();
    editor.apply(tx).unwrap();

    let empty_row = format!("<tr>{}{}</tr>", cell(""), cell(""));
    assert_eq!(
        to_html(editor.doc(), false, false),
        format!(
            "<table class=\"table-border-cell\">{empty_row}{empty_row}</table><p>Text</p>"
        )
    );
    // Caret in the first cell's block.
    assert_eq!(editor.selection().focus, Point::new(vec![0, 0, 0, 0, 0], 0));
}

#[test]
fn insert_mid_block_splits_the_paragraph() {
    let mut editor = editor_with(
        vec![Node::paragraph("headtail")],
        Selection::collapsed(Point::new(vec![0, 0], 4)),
    );

    let tx = insert_table(&editor, 1, 1).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        format!(
            "<p>head</p><table class=\"table-border-cell\"><tr>{}</tr></table><p>tail</p>",
            cell("")
        )
    );
}

fn small_table() -> Node {
    Node::element(
        "table",
        vec![
            Node::element(
                "tr",
                vec![
                    Node::element("td", vec![Node::paragraph("a")]),
                    Node::element("td", vec![Node::paragraph("b")]),
                ],
            ),
            Node::element(
                "tr",
                vec![
                    Node::element("td", vec![Node::paragraph("c")]),
                    Node::element("td", vec![Node::paragraph("d")]),
                ],
            ),
        ],
    )
}

#[test]
fn add_row_after_the_caret_row() {
    let mut editor = editor_with(
        vec![small_table()],
        Selection::collapsed(Point::new(vec![0, 0, 1, 0, 0], 1)),
    );

    let tx = add_row(&editor, Side::After).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        format!(
            "<table><tr>{}{}</tr><tr>{}{}</tr><tr>{}{}</tr></table>",
            cell("a"),
            cell("b"),
            cell(""),
            cell(""),
            cell("c"),
            cell("d"),
        )
    );
    // Caret moves into the new row, same column.
    assert_eq!(editor.selection().focus, Point::new(vec![0, 1, 1, 0, 0], 0));
}

#[test]
fn add_col_before_the_caret_column() {
    let mut editor = editor_with(
        vec![small_table()],
        Selection::collapsed(Point::new(vec![0, 0, 0, 0, 0], 0)),
    );

    let tx = add_col(&editor, Side::Before).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        format!(
            "<table><tr>{}{}{}</tr><tr>{}{}{}</tr></table>",
            cell(""),
            cell("a"),
            cell("b"),
            cell(""),
            cell("c"),
            cell("d"),
        )
    );
}

#[test]
fn add_header_prepends_a_th_row_once() {
    let mut editor = editor_with(
        vec![small_table()],
        Selection::collapsed(Point::new(vec![0, 0, 0, 0, 0], 0)),
    );

    let tx = add_header(&editor).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        format!(
            "<table><tr><th><p><br></p></th><th><p><br></p></th></tr>\
             <tr>{}{}</tr><tr>{}{}</tr></table>",
            cell("a"),
            cell("b"),
            cell("c"),
            cell("d"),
        )
    );
    // Caret followed its row down.
    assert_eq!(editor.selection().focus, Point::new(vec![0, 1, 0, 0, 0], 0));

    // Second request finds the header in place and does nothing.
    let tx = add_header(&editor).unwrap();
    assert!(tx.is_empty());
}

#[test]
fn delete_row_keeps_the_rest_of_the_grid() {
    let mut editor = editor_with(
        vec![small_table()],
        Selection::collapsed(Point::new(vec![0, 0, 0, 0, 0], 0)),
    );

    let tx = delete_row(&editor).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        format!("<table><tr>{}{}</tr></table>", cell("c"), cell("d"))
    );
}

#[test]
fn deleting_the_last_row_deletes_the_table() {
    let mut editor = editor_with(
        vec![Node::element(
            "table",
            vec![Node::element(
                "tr",
                vec![Node::element("td", vec![Node::paragraph("only")])],
            )],
        )],
        Selection::collapsed(Point::new(vec![0, 0, 0, 0, 0], 0)),
    );

    let tx = delete_row(&editor).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(to_html(editor.doc(), false, false), "<p><br></p>");
}

#[test]
fn deleting_the_last_column_deletes_the_table() {
    let mut editor = editor_with(
        vec![Node::element(
            "table",
            vec![Node::element(
                "tr",
                vec![Node::element("td", vec![Node::paragraph("only")])],
            )],
        )],
        Selection::collapsed(Point::new(vec![0, 0, 0, 0, 0], 0)),
    );

    let tx = delete_col(&editor).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(to_html(editor.doc(), false, false), "<p><br></p>");
}

#[test]
fn delete_col_removes_the_caret_column_from_every_row() {
    let mut editor = editor_with(
        vec![small_table()],
        Selection::collapsed(Point::new(vec![0, 0, 1, 0, 0], 0)),
    );

    let tx = delete_col(&editor).unwrap();
    editor.apply(tx).unwrap();

    assert_eq!(
        to_html(editor.doc(), false, false),
        format!("<table><tr>{}</tr><tr>{}</tr></table>", cell("a"), cell("c"))
    );
}

#[test]
fn border_class_is_a_single_attribute() {
    let mut editor = editor_with(
        vec![small_table()],
        Selection::collapsed(Point::new(vec![0, 0, 0, 0, 0], 0)),
    );

    let tx = set_border(&editor, TableBorder::Outer).unwrap();
    editor.apply(tx).unwrap();

    assert!(
        to_html(editor.doc(), false, false)
            .starts_with("<table class=\"table-border-outer\">")
    );

    // Selection untouched by the attribute write.
    assert_eq!(editor.selection().focus, Point::new(vec![0, 0, 0, 0, 0], 0));
}

#[test]
fn caret_outside_a_table_is_rejected() {
    let editor = editor_with(
        vec![Node::paragraph("no table")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );
    assert!(delete_row(&editor).is_err());
    assert!(add_header(&editor).is_err());
}
