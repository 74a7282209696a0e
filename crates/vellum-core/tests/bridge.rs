use serde_json::json;
use vellum_core::{Bridge, Event, Point};

#[test]
fn a_fresh_bridge_announces_readiness() {
    let mut bridge = Bridge::new();
    assert_eq!(bridge.take_events(), vec![Event::Ready]);
    assert!(bridge.take_events().is_empty());
}

#[test]
fn commands_run_by_id_and_emit_input_events() {
    let mut bridge = Bridge::with_html("<p id=\"a\">alpha beta</p>");
    bridge.take_events();

    bridge
        .handle(
            "selection.set",
            Some(json!({
                "startElementId": "a",
                "startOffset": 0,
                "endElementId": "a",
                "endOffset": 5,
                "startChild": 0,
                "endChild": 0,
            })),
        )
        .unwrap();
    assert!(bridge.take_events().is_empty());

    bridge
        .handle("marks.toggle", Some(json!({ "mark": "bold" })))
        .unwrap();

    let html = bridge
        .handle("doc.get_html", None)
        .unwrap()
        .unwrap();
    assert_eq!(
        html.as_str().unwrap(),
        "<p id=\"a\"><strong>alpha</strong> beta</p>"
    );

    let events = bridge.take_events();
    assert!(events.contains(&Event::Input {
        focused: Some("a".to_string())
    }));
}

#[test]
fn clean_serialization_drops_bookkeeping_attributes() {
    let mut bridge = Bridge::with_html("<p id=\"a\">text</p>");
    let html = bridge
        .handle("doc.get_html", Some(json!({ "clean": true })))
        .unwrap()
        .unwrap();
    assert_eq!(html.as_str().unwrap(), "<p>text</p>");
}

#[test]
fn unknown_commands_surface_an_error_signal() {
    let mut bridge = Bridge::new();
    bridge.take_events();

    let err = bridge.handle("definitely.not_a_command", None).unwrap_err();
    assert_eq!(err.code, "not_found");
    assert!(err.alert);

    let events = bridge.take_events();
    assert!(events.iter().any(|e| matches!(e, Event::Error(_))));
}

#[test]
fn failures_leave_a_log_event_for_the_host() {
    let mut bridge = Bridge::new();
    bridge.take_events();

    bridge.handle("definitely.not_a_command", None).unwrap_err();

    let events = bridge.take_events();
    let logged = events.iter().find_map(|e| match e {
        Event::Log { message } => Some(message.as_str()),
        _ => None,
    });
    let message = logged.expect("a log event is queued alongside the error");
    assert!(message.contains("definitely.not_a_command"));
    assert!(bridge.take_events().is_empty());
}

#[test]
fn structural_commands_emit_update_height() {
    let mut bridge = Bridge::with_html("<p id=\"a\">text</p>");
    bridge.take_events();

    bridge
        .handle("block.set_style", Some(json!({ "tag": "h1" })))
        .unwrap();

    let events = bridge.take_events();
    assert!(events.contains(&Event::UpdateHeight));
}

#[test]
fn set_html_resets_the_document_and_history() {
    let mut bridge = Bridge::with_html("<p>old</p>");
    bridge
        .handle("block.set_style", Some(json!({ "tag": "h2" })))
        .unwrap();
    assert!(bridge.editor().can_undo());

    bridge
        .handle("doc.set_html", Some(json!({ "html": "<p>new</p>" })))
        .unwrap();

    assert!(!bridge.editor().can_undo());
    let html = bridge.handle("doc.get_html", None).unwrap().unwrap();
    assert_eq!(html.as_str().unwrap(), "<p>new</p>");
}

#[test]
fn undo_round_trips_through_the_bridge() {
    let mut bridge = Bridge::with_html("<p>text</p>");
    bridge
        .handle("block.set_style", Some(json!({ "tag": "h3" })))
        .unwrap();
    bridge.handle("core.undo", None).unwrap();

    let html = bridge.handle("doc.get_html", None).unwrap().unwrap();
    assert_eq!(html.as_str().unwrap(), "<p>text</p>");

    bridge.handle("core.redo", None).unwrap();
    let html = bridge.handle("doc.get_html", None).unwrap().unwrap();
    assert_eq!(html.as_str().unwrap(), "<h3>text</h3>");
}

#[test]
fn search_selects_the_next_match() {
    let mut bridge = Bridge::with_html("<p id=\"a\">alpha</p><p id=\"b\">beta</p>");
    bridge.take_events();

    let answer = bridge
        .handle("find.search", Some(json!({ "text": "bet" })))
        .unwrap()
        .unwrap();
    assert_eq!(answer["found"], json!(true));

    let focus = &bridge.editor().selection().focus;
    assert_eq!(focus, &Point::new(vec![1, 0], 3));
}

#[test]
fn search_is_case_insensitive_and_can_miss() {
    let mut bridge = Bridge::with_html("<p>Alpha</p>");

    let answer = bridge
        .handle("find.search", Some(json!({ "text": "ALPHA" })))
        .unwrap()
        .unwrap();
    assert_eq!(answer["found"], json!(true));

    let answer = bridge
        .handle("find.search", Some(json!({ "text": "missing" })))
        .unwrap()
        .unwrap();
    assert_eq!(answer["found"], json!(false));
    assert_eq!(answer["active"], json!(true));
}

#[test]
fn search_offsets_survive_multibyte_case_folds() {
    // Dotted capital I folds to two chars, shifting byte offsets in the
    // lowercased haystack relative to the original text.
    let mut bridge = Bridge::with_html("<p>İstanbul otel</p>");

    let answer = bridge
        .handle("find.search", Some(json!({ "text": "OTEL" })))
        .unwrap()
        .unwrap();
    assert_eq!(answer["found"], json!(true));

    let selection = bridge.editor().selection();
    assert_eq!(selection.anchor, Point::new(vec![0, 0], 10));
    assert_eq!(selection.focus, Point::new(vec![0, 0], 14));
}

#[test]
fn search_deactivates_on_request() {
    let mut bridge = Bridge::with_html("<p>alpha</p>");
    let answer = bridge
        .handle(
            "find.search",
            Some(json!({ "text": "alpha", "activate": false })),
        )
        .unwrap()
        .unwrap();
    assert_eq!(answer["active"], json!(false));
}

#[test]
fn bad_arguments_are_rejected_without_mutation() {
    let mut bridge = Bridge::with_html("<p>safe</p>");
    bridge.take_events();

    let err = bridge
        .handle("block.set_style", Some(json!({ "tag": "marquee" })))
        .unwrap_err();
    assert_eq!(err.code, "unsupported");
    assert!(!err.alert);

    let html = bridge.handle("doc.get_html", None).unwrap().unwrap();
    assert_eq!(html.as_str().unwrap(), "<p>safe</p>");
}
