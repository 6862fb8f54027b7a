//! Unit tests for inbound command parsing.

use research_core::mode::Mode;
use research_core::protocol::command::{DEFAULT_HISTORY_LIMIT, DEFAULT_REQUEST_ID};
use research_core::protocol::{parse_command, Command};
use research_core::AppError;

#[test]
fn parses_request_commands_for_every_mode() {
    for mode in Mode::ALL {
        let line = format!(r#"{{"type":"{mode}","requestId":"r1","content":"hello"}}"#);
        let command = parse_command(&line).unwrap().expect("recognized");
        assert_eq!(
            command,
            Command::Request {
                mode,
                request_id: "r1".into(),
                content: "hello".into(),
            }
        );
        assert_eq!(command.dispatched_request_id(), Some("r1"));
    }
}

#[test]
fn request_fields_default_when_omitted() {
    let command = parse_command(r#"{"type":"chat"}"#).unwrap().unwrap();
    assert_eq!(
        command,
        Command::Request {
            mode: Mode::Chat,
            request_id: DEFAULT_REQUEST_ID.into(),
            content: String::new(),
        }
    );
    assert_eq!(DEFAULT_REQUEST_ID, "req_default");
}

#[test]
fn control_commands_are_not_dispatchable() {
    let heartbeat = parse_command(r#"{"type":"heartbeat"}"#).unwrap().unwrap();
    assert_eq!(heartbeat, Command::Heartbeat);
    assert!(heartbeat.dispatched_request_id().is_none());

    let set_mode = parse_command(r#"{"type":"set_mode","mode":"research"}"#)
        .unwrap()
        .unwrap();
    assert_eq!(
        set_mode,
        Command::SetMode {
            mode: Some(Mode::Research)
        }
    );
    assert!(set_mode.dispatched_request_id().is_none());
}

#[test]
fn set_mode_with_unknown_mode_carries_none() {
    let command = parse_command(r#"{"type":"set_mode","mode":"poetry"}"#)
        .unwrap()
        .unwrap();
    assert_eq!(command, Command::SetMode { mode: None });
}

#[test]
fn abort_request_id_is_optional() {
    assert_eq!(
        parse_command(r#"{"type":"abort"}"#).unwrap(),
        Some(Command::Abort { request_id: None })
    );
    assert_eq!(
        parse_command(r#"{"type":"abort","requestId":"r9"}"#).unwrap(),
        Some(Command::Abort {
            request_id: Some("r9".into())
        })
    );
}

#[test]
fn lookup_commands_parse_with_defaults() {
    assert_eq!(
        parse_command(r#"{"type":"query_history","requestId":"h1"}"#).unwrap(),
        Some(Command::QueryHistory {
            request_id: "h1".into(),
            limit: DEFAULT_HISTORY_LIMIT,
        })
    );
    assert_eq!(
        parse_command(r#"{"type":"query_history","requestId":"h1","limit":3}"#).unwrap(),
        Some(Command::QueryHistory {
            request_id: "h1".into(),
            limit: 3,
        })
    );
    assert_eq!(
        parse_command(r#"{"type":"get_session","requestId":"g1","sessionId":"s2"}"#).unwrap(),
        Some(Command::GetSession {
            request_id: "g1".into(),
            session_id: Some("s2".into()),
        })
    );
}

#[test]
fn unknown_type_is_skipped() {
    assert_eq!(parse_command(r#"{"type":"teleport","x":1}"#).unwrap(), None);
}

#[test]
fn blank_lines_are_skipped() {
    assert_eq!(parse_command("").unwrap(), None);
    assert_eq!(parse_command("   \t").unwrap(), None);
}

#[test]
fn malformed_lines_are_protocol_errors() {
    for line in ["{not json", r#"{"content":"no type"}"#, "[1,2,3]", r#"{"type":7}"#] {
        let err = parse_command(line).expect_err(line);
        assert!(
            matches!(err, AppError::Protocol(ref msg) if msg.starts_with("malformed json")),
            "unexpected error for {line}: {err}"
        );
    }
}

#[test]
fn extra_fields_are_ignored() {
    let command = parse_command(r#"{"type":"plan","requestId":"p","content":"x","priority":5}"#)
        .unwrap()
        .unwrap();
    assert!(matches!(command, Command::Request { mode: Mode::Plan, .. }));
}
