//! Inbound command parsing.
//!
//! # Known command types
//!
//! | `type`                       | Maps to                     |
//! |------------------------------|-----------------------------|
//! | `heartbeat`                  | [`Command::Heartbeat`]      |
//! | `set_mode`                   | [`Command::SetMode`]        |
//! | `chat` / `plan` / `research` | [`Command::Request`]        |
//! | `abort`                      | [`Command::Abort`]          |
//! | `query_history`              | [`Command::QueryHistory`]   |
//! | `get_session`                | [`Command::GetSession`]     |
//! | *(any other)*                | Skipped; logged at `DEBUG`  |

use serde::Deserialize;
use tracing::debug;

use crate::mode::Mode;
use crate::{AppError, Result};

/// Request id used when a dispatchable command omits `requestId`.
pub const DEFAULT_REQUEST_ID: &str = "req_default";

/// Session count returned by `query_history` when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

/// Raw inbound object. Every field except `type` is optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCommand {
    #[serde(rename = "type")]
    kind: String,
    request_id: Option<String>,
    content: Option<String>,
    mode: Option<String>,
    session_id: Option<String>,
    limit: Option<u32>,
}

/// A recognized client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Liveness probe; answered with a bare `heartbeat_ack`.
    Heartbeat,
    /// Change the session's mode metadata. `None` when absent or invalid.
    SetMode {
        /// Requested mode.
        mode: Option<Mode>,
    },
    /// Start a request in the given mode.
    Request {
        /// Handler to dispatch to.
        mode: Mode,
        /// Client-chosen id, [`DEFAULT_REQUEST_ID`] when omitted.
        request_id: String,
        /// User input, empty when omitted.
        content: String,
    },
    /// Cancel the active request (all requests when `request_id` is `None`).
    Abort {
        /// Only abort if the active request has this id.
        request_id: Option<String>,
    },
    /// List recently active sessions.
    QueryHistory {
        /// Envelope request id for the answer.
        request_id: String,
        /// Maximum sessions to return.
        limit: u32,
    },
    /// Fetch one session's conversation.
    GetSession {
        /// Envelope request id for the answer.
        request_id: String,
        /// Session to fetch; the engine's own when `None`.
        session_id: Option<String>,
    },
}

impl Command {
    /// Id of a command that belongs to the request lifecycle and is
    /// therefore subject to the busy policy; `None` for everything else.
    #[must_use]
    pub fn dispatched_request_id(&self) -> Option<&str> {
        match self {
            Self::Request { request_id, .. } => Some(request_id),
            _ => None,
        }
    }
}

/// Parse one inbound line.
///
/// # Return value
///
/// - `Ok(Some(command))`: a recognized command.
/// - `Ok(None)`: blank line, or an unknown `type` (logged at `DEBUG`).
/// - `Err(AppError::Protocol(...))`: not a JSON object with a string `type`.
///
/// # Errors
///
/// Returns [`AppError::Protocol`]`("malformed json: …")` for lines that do
/// not parse; the caller skips them.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let raw: RawCommand = serde_json::from_str(line)
        .map_err(|e| AppError::Protocol(format!("malformed json: {e}")))?;

    let request_id = || {
        raw.request_id
            .clone()
            .unwrap_or_else(|| DEFAULT_REQUEST_ID.to_owned())
    };

    let command = match raw.kind.as_str() {
        "heartbeat" => Command::Heartbeat,
        "set_mode" => Command::SetMode {
            mode: raw.mode.as_deref().and_then(|m| m.parse().ok()),
        },
        "chat" | "plan" | "research" => Command::Request {
            mode: raw.kind.parse()?,
            request_id: request_id(),
            content: raw.content.clone().unwrap_or_default(),
        },
        "abort" => Command::Abort {
            request_id: raw.request_id.clone(),
        },
        "query_history" => Command::QueryHistory {
            request_id: request_id(),
            limit: raw.limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
        },
        "get_session" => Command::GetSession {
            request_id: request_id(),
            session_id: raw.session_id.clone(),
        },
        other => {
            debug!(command_type = other, "skipping unknown command type");
            return Ok(None);
        }
    };

    Ok(Some(command))
}
