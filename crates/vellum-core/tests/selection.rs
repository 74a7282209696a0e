use vellum_core::{
    Document, Editor, Node, Point, Selection, SelectionCode, blocks_between, decode_selection,
    encode_selection, leaf_blocks,
};

fn two_block_doc() -> Document {
    let mut first = Node::paragraph("alpha");
    if let Node::Element(el) = &mut first {
        el.attrs.insert("id".to_string(), "a".to_string());
    }
    let mut second = Node::paragraph("beta");
    if let Node::Element(el) = &mut second {
        el.attrs.insert("id".to_string(), "b".to_string());
    }
    Document {
        children: vec![first, second],
    }
}

#[test]
fn selection_round_trips_through_the_host_encoding() {
    let doc = two_block_doc();
    let code = SelectionCode {
        start_id: "a".to_string(),
        start_offset: 2,
        end_id: "b".to_string(),
        end_offset: 4,
        start_child: Some(0),
        end_child: Some(0),
    };

    let selection = decode_selection(&doc, &code).unwrap();
    assert_eq!(selection.anchor, Point::new(vec![0, 0], 2));
    assert_eq!(selection.focus, Point::new(vec![1, 0], 4));

    let encoded = encode_selection(&doc, &selection).unwrap();
    assert_eq!(encoded, code);
}

#[test]
fn decoding_an_unknown_id_fails() {
    let doc = two_block_doc();
    let code = SelectionCode {
        start_id: "missing".to_string(),
        start_offset: 0,
        end_id: "missing".to_string(),
        end_offset: 0,
        start_child: None,
        end_child: None,
    };
    assert!(decode_selection(&doc, &code).is_err());
}

#[test]
fn leaf_blocks_sees_through_containers() {
    let doc = Document {
        children: vec![
            Node::paragraph("top"),
            Node::element(
                "blockquote",
                vec![Node::element(
                    "ul",
                    vec![Node::element("li", vec![Node::paragraph("deep")])],
                )],
            ),
        ],
    };
    assert_eq!(leaf_blocks(&doc), vec![vec![0], vec![1, 0, 0, 0]]);
}

#[test]
fn blocks_between_is_ordered_and_restartable() {
    let doc = Document {
        children: vec![
            Node::paragraph("a"),
            Node::paragraph("b"),
            Node::paragraph("c"),
        ],
    };
    // Backwards selection: focus before anchor.
    let selection = Selection {
        anchor: Point::new(vec![2, 0], 1),
        focus: Point::new(vec![0, 0], 0),
    };
    let mut blocks = blocks_between(&doc, &selection).unwrap();
    let collected: Vec<_> = blocks.by_ref().collect();
    assert_eq!(collected, vec![vec![0], vec![1], vec![2]]);

    blocks.restart();
    assert_eq!(blocks.next(), Some(vec![0]));
}

#[test]
fn a_stale_selection_heals_to_a_nearby_run() {
    let doc = Document {
        children: vec![Node::paragraph("short")],
    };
    // Points at a block that does not exist.
    let selection = Selection::collapsed(Point::new(vec![4, 2], 10));
    let editor = Editor::new(doc, selection);

    // Offset clamps, path heals.
    let focus = &editor.selection().focus;
    assert_eq!(focus.path, vec![0, 0]);
    assert!(focus.offset <= "short".len());
}
