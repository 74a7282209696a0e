use vellum_core::{
    Document, Marks, Node, document_from_fragment, parse_fragment, sanitize, to_html,
};

fn canonical(markup: &str) -> Document {
    document_from_fragment(&sanitize(parse_fragment(markup)))
}

#[test]
fn canonical_markup_survives_a_round_trip() {
    let cases = [
        "<p>plain text</p>",
        "<h2>heading</h2>",
        "<p>a <strong>b</strong> <em>c</em></p>",
        "<p><a href=\"https://example.com\">link</a></p>",
        "<ul><li><p>one</p></li><li><p>two</p><ul><li><p>deep</p></li></ul></li></ul>",
        "<blockquote><p>quoted</p></blockquote>",
        "<table><tr><th><p>h</p></th></tr><tr><td><p>c</p></td></tr></table>",
        "<p><br></p>",
    ];
    for case in cases {
        let doc = canonical(case);
        assert_eq!(to_html(&doc, false, false), case, "round trip for {case:?}");
        // And the serialized form parses back to the same tree.
        assert_eq!(canonical(&to_html(&doc, false, false)), doc);
    }
}

#[test]
fn mark_nesting_order_is_fixed() {
    let doc = Document {
        children: vec![Node::element(
            "p",
            vec![Node::run(
                "x",
                Marks {
                    bold: true,
                    italic: true,
                    underline: true,
                    ..Marks::default()
                },
            )],
        )],
    };
    assert_eq!(
        to_html(&doc, false, false),
        "<p><strong><em><u>x</u></em></strong></p>"
    );

    // The reversed source nesting parses to the same runs.
    let doc2 = canonical("<p><u><em><strong>x</strong></em></u></p>");
    assert_eq!(to_html(&doc2, false, false), to_html(&doc, false, false));
}

#[test]
fn pretty_print_indents_block_structure_only() {
    let doc = canonical("<blockquote><p>a <strong>b</strong></p><p>c</p></blockquote>");
    assert_eq!(
        to_html(&doc, true, false),
        "<blockquote>\n  <p>a <strong>b</strong></p>\n  <p>c</p>\n</blockquote>"
    );
}

#[test]
fn clean_mode_drops_ids_and_image_metadata() {
    let doc = canonical("<p id=\"x\">pic <img src=\"u.png\" alt=\"u\"></p>");
    let full = to_html(&doc, false, false);
    assert!(full.contains("id=\"x\""));
    assert!(full.contains("data-resizable=\"true\""));

    let clean = to_html(&doc, false, true);
    assert_eq!(
        clean,
        "<p>pic <img alt=\"u\" height=\"auto\" src=\"u.png\" width=\"100%\"></p>"
    );
}

#[test]
fn unknown_structure_degrades_to_paragraphs() {
    let doc = canonical("loose text<div><p>real</p></div>");
    assert_eq!(to_html(&doc, false, false), "<p>loose text</p><p>real</p>");
}
