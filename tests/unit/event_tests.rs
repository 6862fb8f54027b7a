//! Unit tests for the event model and its wire form.

use chrono::{TimeZone, Utc};
use research_core::mode::Mode;
use research_core::models::request::{Request, RequestStatus};
use research_core::protocol::event::{
    HistoryMessage, Phase, PhaseState, Role, Unrecoverable, PROTOCOL_VERSION,
};
use research_core::protocol::{ControlMessage, Event};
use research_core::AppError;
use serde_json::{json, Value};

fn wire(event: &Event) -> Value {
    serde_json::to_value(event).expect("serialize")
}

#[test]
fn content_delta_wire_form() {
    assert_eq!(
        wire(&Event::content_delta("hi")),
        json!({"type": "content_delta", "text": "hi"})
    );
}

#[test]
fn phase_status_wire_form() {
    assert_eq!(
        wire(&Event::phase_status(Phase::Synthesizing, PhaseState::Working)),
        json!({"type": "phase_status", "phase": "synthesizing", "status": "working"})
    );
}

#[test]
fn progress_wire_form_and_bounds() {
    let event = Event::progress(100, "done").expect("in range");
    assert_eq!(
        wire(&event),
        json!({"type": "progress", "percent": 100, "message": "done"})
    );
    assert!(Event::progress(0, "start").is_ok());

    let err = Event::progress(101, "too far").expect_err("out of range");
    assert!(matches!(err, AppError::Protocol(_)));
}

#[test]
fn progress_percent_is_checked_when_parsing() {
    let ok: Event =
        serde_json::from_value(json!({"type": "progress", "percent": 100, "message": "done"}))
            .expect("in range");
    assert_eq!(ok, Event::progress(100, "done").unwrap());

    let err = serde_json::from_value::<Event>(
        json!({"type": "progress", "percent": 200, "message": "too far"}),
    )
    .expect_err("out of range");
    assert!(err.to_string().contains("progress percent out of range: 200"));
}

#[test]
fn tool_events_wire_form() {
    assert_eq!(
        wire(&Event::tool_call("exa", "rust ownership")),
        json!({"type": "tool_call", "tool": "exa", "query": "rust ownership"})
    );
    assert_eq!(
        wire(&Event::tool_succeeded("exa", "Found 1 results: Book")),
        json!({"type": "tool_result", "tool": "exa", "success": true, "summary": "Found 1 results: Book"})
    );
    assert_eq!(
        wire(&Event::tool_failed("exa", "timeout")),
        json!({
            "type": "tool_result",
            "tool": "exa",
            "success": false,
            "summary": "search failed: timeout",
            "error": "timeout"
        })
    );
}

#[test]
fn artifact_id_uses_camel_case() {
    let event = Event::ToolResult {
        tool: "exa".into(),
        success: true,
        summary: "ok".into(),
        artifact_id: Some("art_1".into()),
        error: None,
    };
    let value = wire(&event);
    assert_eq!(value["artifactId"], "art_1");
    assert_eq!(serde_json::from_value::<Event>(value).unwrap(), event);
}

#[test]
fn terminal_events_wire_form() {
    assert_eq!(wire(&Event::complete()), json!({"type": "complete"}));
    assert_eq!(
        wire(&Event::aborted(true)),
        json!({"type": "aborted", "partialSaved": true})
    );
    assert_eq!(
        wire(&Event::error("provider: down")),
        json!({"type": "error", "message": "provider: down", "recoverable": false})
    );
}

#[test]
fn error_events_are_never_recoverable() {
    let parsed: Event =
        serde_json::from_value(json!({"type": "error", "message": "x"})).expect("default");
    assert_eq!(
        parsed,
        Event::Error {
            message: "x".into(),
            recoverable: Unrecoverable
        }
    );

    let rejected = serde_json::from_value::<Event>(
        json!({"type": "error", "message": "x", "recoverable": true}),
    );
    assert!(rejected.is_err());
}

#[test]
fn events_parse_back_field_for_field() {
    let events = [
        Event::content_delta("a\nb \"quoted\""),
        Event::phase_status(Phase::Researching, PhaseState::Complete),
        Event::progress(42, "halfway").unwrap(),
        Event::tool_failed("exa", "rate limited"),
        Event::aborted(false),
        Event::error("nope"),
    ];
    for event in events {
        let line = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, event, "{line}");
    }
}

#[test]
fn terminal_status_mapping() {
    assert_eq!(
        Event::complete().terminal_status(),
        Some(RequestStatus::Complete)
    );
    assert_eq!(
        Event::aborted(true).terminal_status(),
        Some(RequestStatus::Error)
    );
    assert_eq!(Event::error("x").terminal_status(), Some(RequestStatus::Error));
    assert!(Event::content_delta("x").terminal_status().is_none());
    assert!(!Event::tool_call("exa", "q").is_terminal());
    assert!(Event::complete().is_terminal());
}

#[test]
fn kind_matches_wire_tag() {
    let events = [
        Event::content_delta("x"),
        Event::phase_status(Phase::Planning, PhaseState::Idle),
        Event::tool_call("exa", "q"),
        Event::complete(),
        Event::aborted(false),
        Event::error("e"),
        Event::QueryHistoryResult { sessions: vec![] },
    ];
    for event in events {
        assert_eq!(wire(&event)["type"], event.kind());
    }
}

#[test]
fn ready_line_wire_form() {
    let value = serde_json::to_value(ControlMessage::ready()).unwrap();
    assert_eq!(
        value,
        json!({"type": "ready", "protocolVersion": "1.0", "capabilities": ["chat", "plan", "research"]})
    );
    assert_eq!(PROTOCOL_VERSION, "1.0");
}

#[test]
fn history_message_expands_request_turns() {
    let created = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    let completed = Utc.timestamp_millis_opt(1_700_000_000_500).unwrap();
    let mut request = Request::started(
        "r1".into(),
        "sess".into(),
        Mode::Chat,
        "hello".into(),
    );
    request.created_at = created;

    let pending = HistoryMessage::from_request(&request);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].role, Role::User);
    assert_eq!(pending[0].status, RequestStatus::Streaming);

    request.assistant_content = Some("Chat mode: hello".into());
    request.status = RequestStatus::Complete;
    request.completed_at = Some(completed);

    let turns = HistoryMessage::from_request(&request);
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].content, "hello");
    assert_eq!(turns[0].timestamp, 1_700_000_000_000);
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].content, "Chat mode: hello");
    assert_eq!(turns[1].timestamp, 1_700_000_000_500);

    let value = serde_json::to_value(&turns[1]).unwrap();
    assert_eq!(value["requestId"], "r1");
    assert_eq!(value["role"], "assistant");
    assert_eq!(value["status"], "complete");
}
