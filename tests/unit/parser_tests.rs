use agent_bridge::models::event::StreamEvent;
use agent_bridge::stream::parser::{classify_line, parse_line, Ignored, LineOutcome};

// ── Assistant messages ────────────────────────────────────────────────────────

/// Text blocks are joined with a newline in order.
#[test]
fn assistant_text_blocks_are_joined() {
    let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"A"},{"type":"text","text":"B"}]}}"#;
    assert_eq!(
        parse_line(line),
        Some(StreamEvent::Assistant {
            content: "A\nB".into()
        })
    );
}

#[test]
fn assistant_with_only_tool_use_is_dropped() {
    let line = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"check_schema","input":{}}]}}"#;
    assert_eq!(classify_line(line), LineOutcome::Ignored(Ignored::NoText));
}

#[test]
fn assistant_with_empty_content_is_dropped() {
    let line = r#"{"type":"assistant","message":{"content":[]}}"#;
    assert_eq!(parse_line(line), None);
}

/// Agent stdout using the bridge's own vocabulary is not trusted as an event.
#[test]
fn flat_assistant_content_is_not_an_agent_envelope() {
    let line = r#"{"type":"assistant","content":"hello"}"#;
    assert_eq!(classify_line(line), LineOutcome::Ignored(Ignored::NoText));
}

// ── Partial deltas ────────────────────────────────────────────────────────────

#[test]
fn text_delta_becomes_assistant_delta() {
    let line = r#"{"type":"stream_event","event":{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hel"}}}"#;
    assert_eq!(
        parse_line(line),
        Some(StreamEvent::AssistantDelta {
            content: "Hel".into()
        })
    );
}

#[test]
fn other_partial_events_are_diagnostic() {
    let line = r#"{"type":"stream_event","event":{"type":"message_start","message":{}}}"#;
    assert_eq!(classify_line(line), LineOutcome::Ignored(Ignored::Diagnostic));
}

#[test]
fn deltas_keep_their_order() {
    let lines = [
        r#"{"type":"stream_event","event":{"type":"content_block_delta","delta":{"type":"text_delta","text":"one "}}}"#,
        r#"{"type":"stream_event","event":{"type":"content_block_delta","delta":{"type":"text_delta","text":"two "}}}"#,
        r#"{"type":"stream_event","event":{"type":"content_block_delta","delta":{"type":"text_delta","text":"three"}}}"#,
    ];

    let joined: String = lines
        .iter()
        .filter_map(|line| parse_line(line))
        .map(|event| match event {
            StreamEvent::AssistantDelta { content } => content,
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(joined, "one two three");
}

// ── Results ───────────────────────────────────────────────────────────────────

#[test]
fn result_carries_stop_reason() {
    let line = r#"{"type":"result","subtype":"end_turn"}"#;
    assert_eq!(
        parse_line(line),
        Some(StreamEvent::Result {
            stop_reason: Some("end_turn".into()),
            cost: None,
            turns: None,
        })
    );
}

/// Agents put both `subtype` and `stop_reason` on result envelopes.
#[test]
fn result_with_subtype_and_stop_reason_keeps_subtype() {
    let line = r#"{"type":"result","subtype":"success","stop_reason":"end_turn","total_cost_usd":0.1,"num_turns":2}"#;
    let Some(StreamEvent::Result {
        stop_reason,
        cost,
        turns,
    }) = parse_line(line)
    else {
        panic!("expected result event");
    };
    assert_eq!(stop_reason.as_deref(), Some("success"));
    assert!((cost.expect("cost") - 0.1).abs() < f64::EPSILON);
    assert_eq!(turns, Some(2));
}

/// Relayed results use the short field names.
#[test]
fn result_accepts_relayed_field_names() {
    let line = r#"{"type":"result","stop_reason":"end_turn","cost":0.5,"turns":4}"#;
    assert_eq!(
        parse_line(line),
        Some(StreamEvent::Result {
            stop_reason: Some("end_turn".into()),
            cost: Some(0.5),
            turns: Some(4),
        })
    );
}

#[test]
fn result_carries_cost_and_turns() {
    let line = r#"{"type":"result","subtype":"success","is_error":false,"total_cost_usd":0.0123,"num_turns":3,"result":"done"}"#;
    let Some(StreamEvent::Result {
        stop_reason,
        cost,
        turns,
    }) = parse_line(line)
    else {
        panic!("expected result event");
    };
    assert_eq!(stop_reason.as_deref(), Some("success"));
    assert!((cost.expect("cost") - 0.0123).abs() < f64::EPSILON);
    assert_eq!(turns, Some(3));
}

#[test]
fn result_without_subtype_is_still_terminal() {
    let event = parse_line(r#"{"type":"result"}"#).expect("result event");
    assert!(event.is_terminal());
}

// ── Dropped lines ─────────────────────────────────────────────────────────────

#[test]
fn malformed_line_is_skipped() {
    assert_eq!(
        classify_line("{not json"),
        LineOutcome::Ignored(Ignored::Malformed)
    );
}

/// One bad line does not affect the lines after it.
#[test]
fn parsing_continues_after_malformed_line() {
    let lines = [
        "garbage",
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"ok"}]}}"#,
    ];
    let events: Vec<StreamEvent> = lines.iter().filter_map(|l| parse_line(l)).collect();
    assert_eq!(
        events,
        vec![StreamEvent::Assistant {
            content: "ok".into()
        }]
    );
}

#[test]
fn blank_line_is_skipped() {
    assert_eq!(classify_line("   "), LineOutcome::Ignored(Ignored::Blank));
}

#[test]
fn system_init_is_diagnostic() {
    let line = r#"{"type":"system","subtype":"init","mcp_servers":[{"name":"schema-db","status":"connected"},{"name":"other","status":"failed"}]}"#;
    assert_eq!(classify_line(line), LineOutcome::Ignored(Ignored::Diagnostic));
}

#[test]
fn unknown_kind_is_unrecognized() {
    let line = r#"{"type":"user","message":{"content":[{"type":"tool_result"}]}}"#;
    assert_eq!(
        classify_line(line),
        LineOutcome::Ignored(Ignored::Unrecognized(Some("user".into())))
    );
}

#[test]
fn wrong_field_type_is_unexpected() {
    let line = r#"{"type":"result","num_turns":"three"}"#;
    assert_eq!(classify_line(line), LineOutcome::Ignored(Ignored::Unexpected));
}

#[test]
fn non_object_json_is_dropped() {
    assert_eq!(parse_line("[1,2,3]"), None);
    assert_eq!(parse_line("42"), None);
}

#[test]
fn bridge_vocabulary_kinds_are_unrecognized() {
    assert_eq!(
        classify_line(r#"{"type":"error","content":"x"}"#),
        LineOutcome::Ignored(Ignored::Unrecognized(Some("error".into())))
    );
    assert_eq!(
        classify_line(r#"{"type":"assistant_delta","content":"He"}"#),
        LineOutcome::Ignored(Ignored::Unrecognized(Some("assistant_delta".into())))
    );
}
