//! Protocol event vocabulary.
//!
//! Two kinds of output line share stdout:
//!
//! - [`Envelope`]: wraps an [`Event`] with session id, request id, a
//!   per-request sequence number and a millisecond timestamp.
//! - [`ControlMessage`]: bare lines outside any request (`ready`,
//!   `heartbeat_ack`). They carry no ids and no sequence number.
//!
//! Field names are camelCase on the wire.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::mode::Mode;
use crate::models::request::{Request, RequestStatus};
use crate::models::session::{Session, SessionSummary};
use crate::{AppError, Result};

/// Version advertised in the `ready` line.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Sub-stage of a research request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Deciding what to search for.
    Planning,
    /// Waiting on external tools.
    Researching,
    /// Composing the answer.
    Synthesizing,
}

/// State reported for a [`Phase`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    /// Not started.
    Idle,
    /// In progress.
    Working,
    /// Finished.
    Complete,
    /// Failed.
    Error,
}

/// The `recoverable` field of an `error` event: always `false`.
///
/// Serializes as `false`; deserializing `true` is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unrecoverable;

impl Serialize for Unrecoverable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bool(false)
    }
}

impl<'de> Deserialize<'de> for Unrecoverable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if bool::deserialize(deserializer)? {
            Err(de::Error::custom("error events are never recoverable"))
        } else {
            Ok(Self)
        }
    }
}

/// Largest `progress.percent` value.
pub const MAX_PERCENT: u8 = 100;

fn percent_in_range<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let percent = u8::deserialize(deserializer)?;
    if percent > MAX_PERCENT {
        return Err(de::Error::custom(format!(
            "progress percent out of range: {percent}"
        )));
    }
    Ok(percent)
}

/// Who authored a history message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The protocol client.
    User,
    /// This process.
    Assistant,
}

/// Session metadata as sent in lookup results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Session identifier.
    pub id: String,
    /// Current mode.
    pub mode: Mode,
    /// Creation time, epoch ms.
    pub created_at: i64,
    /// Last activity, epoch ms.
    pub updated_at: i64,
    /// Number of recorded requests, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_count: Option<i64>,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            mode: session.mode,
            created_at: session.created_at.timestamp_millis(),
            updated_at: session.updated_at.timestamp_millis(),
            request_count: None,
        }
    }
}

impl From<&SessionSummary> for SessionInfo {
    fn from(summary: &SessionSummary) -> Self {
        Self {
            request_count: Some(summary.request_count),
            ..Self::from(&summary.session)
        }
    }
}

/// One turn of a stored conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMessage {
    /// Request the turn belongs to.
    pub request_id: String,
    /// Author.
    pub role: Role,
    /// Text.
    pub content: String,
    /// Mode the request ran under.
    pub mode: Mode,
    /// Request status at lookup time.
    pub status: RequestStatus,
    /// Epoch ms: request creation for user turns, completion for assistant turns.
    pub timestamp: i64,
}

impl HistoryMessage {
    /// Expand a stored request into its user turn and, once it has
    /// output, its assistant turn.
    #[must_use]
    pub fn from_request(request: &Request) -> Vec<Self> {
        let mut turns = vec![Self {
            request_id: request.id.clone(),
            role: Role::User,
            content: request.user_content.clone(),
            mode: request.mode,
            status: request.status,
            timestamp: request.created_at.timestamp_millis(),
        }];

        if let Some(ref content) = request.assistant_content {
            turns.push(Self {
                request_id: request.id.clone(),
                role: Role::Assistant,
                content: content.clone(),
                mode: request.mode,
                status: request.status,
                timestamp: request
                    .completed_at
                    .unwrap_or(request.created_at)
                    .timestamp_millis(),
            });
        }

        turns
    }
}

/// A discrete, typed unit of request output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Text fragment of the answer.
    ContentDelta {
        /// Fragment text.
        text: String,
    },
    /// Research phase change.
    PhaseStatus {
        /// Phase being reported.
        phase: Phase,
        /// Its new state.
        status: PhaseState,
    },
    /// Coarse progress indicator.
    Progress {
        /// Percentage, 0 to 100.
        #[serde(deserialize_with = "percent_in_range")]
        percent: u8,
        /// Human-readable description.
        message: String,
    },
    /// An external tool is being invoked.
    ToolCall {
        /// Tool name.
        tool: String,
        /// Query sent to the tool.
        query: String,
    },
    /// Outcome of the preceding tool call.
    ToolResult {
        /// Tool name.
        tool: String,
        /// Whether the call succeeded.
        success: bool,
        /// Result summary.
        summary: String,
        /// Identifier of a stored artifact, if any.
        #[serde(rename = "artifactId", default, skip_serializing_if = "Option::is_none")]
        artifact_id: Option<String>,
        /// Failure description when `success` is false.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Request finished normally. Terminal.
    Complete,
    /// Request was cancelled. Terminal.
    Aborted {
        /// Whether streamed output was kept as the request's content.
        #[serde(rename = "partialSaved")]
        partial_saved: bool,
    },
    /// Request failed. Terminal.
    Error {
        /// Human-readable failure description.
        message: String,
        /// Always `false`.
        #[serde(default)]
        recoverable: Unrecoverable,
    },
    /// Answer to `query_history`.
    QueryHistoryResult {
        /// Recent sessions, most recently active first.
        sessions: Vec<SessionInfo>,
    },
    /// Answer to `get_session`.
    GetSessionResult {
        /// The session.
        session: SessionInfo,
        /// Its conversation, oldest first.
        messages: Vec<HistoryMessage>,
    },
}

impl Event {
    /// A `content_delta` event.
    #[must_use]
    pub fn content_delta(text: impl Into<String>) -> Self {
        Self::ContentDelta { text: text.into() }
    }

    /// A `phase_status` event.
    #[must_use]
    pub fn phase_status(phase: Phase, status: PhaseState) -> Self {
        Self::PhaseStatus { phase, status }
    }

    /// A `progress` event.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if `percent` exceeds 100.
    pub fn progress(percent: u8, message: impl Into<String>) -> Result<Self> {
        if percent > MAX_PERCENT {
            return Err(AppError::Protocol(format!(
                "progress percent out of range: {percent}"
            )));
        }
        Ok(Self::Progress {
            percent,
            message: message.into(),
        })
    }

    /// A `tool_call` event.
    #[must_use]
    pub fn tool_call(tool: impl Into<String>, query: impl Into<String>) -> Self {
        Self::ToolCall {
            tool: tool.into(),
            query: query.into(),
        }
    }

    /// A successful `tool_result` event.
    #[must_use]
    pub fn tool_succeeded(tool: impl Into<String>, summary: impl Into<String>) -> Self {
        Self::ToolResult {
            tool: tool.into(),
            success: true,
            summary: summary.into(),
            artifact_id: None,
            error: None,
        }
    }

    /// A failed `tool_result` event.
    #[must_use]
    pub fn tool_failed(tool: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self::ToolResult {
            tool: tool.into(),
            success: false,
            summary: format!("search failed: {error}"),
            artifact_id: None,
            error: Some(error),
        }
    }

    /// The `complete` event.
    #[must_use]
    pub fn complete() -> Self {
        Self::Complete
    }

    /// An `aborted` event.
    #[must_use]
    pub fn aborted(partial_saved: bool) -> Self {
        Self::Aborted { partial_saved }
    }

    /// An `error` event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            recoverable: Unrecoverable,
        }
    }

    /// The wire `type` tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ContentDelta { .. } => "content_delta",
            Self::PhaseStatus { .. } => "phase_status",
            Self::Progress { .. } => "progress",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Complete => "complete",
            Self::Aborted { .. } => "aborted",
            Self::Error { .. } => "error",
            Self::QueryHistoryResult { .. } => "query_history_result",
            Self::GetSessionResult { .. } => "get_session_result",
        }
    }

    /// Whether this event ends a request's stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.terminal_status().is_some()
    }

    /// Persisted status implied by a terminal event.
    ///
    /// `complete` maps to `complete`; `error` and `aborted` map to `error`.
    #[must_use]
    pub fn terminal_status(&self) -> Option<RequestStatus> {
        match self {
            Self::Complete => Some(RequestStatus::Complete),
            Self::Aborted { .. } | Self::Error { .. } => Some(RequestStatus::Error),
            _ => None,
        }
    }
}

/// An [`Event`] bound to its request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Owning session.
    pub session_id: String,
    /// Owning request.
    pub request_id: String,
    /// 1-based, gap-free within the request.
    pub seq: u64,
    /// Emission time, epoch ms.
    pub timestamp: i64,
    /// Payload.
    pub event: Event,
}

/// Bare lines that live outside the request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Startup announcement, written once before anything else.
    Ready {
        /// Protocol version.
        #[serde(rename = "protocolVersion")]
        protocol_version: String,
        /// Modes this process serves.
        capabilities: Vec<Mode>,
    },
    /// Answer to a `heartbeat` command.
    HeartbeatAck,
}

impl ControlMessage {
    /// The `ready` line advertising every mode.
    #[must_use]
    pub fn ready() -> Self {
        Self::Ready {
            protocol_version: PROTOCOL_VERSION.to_owned(),
            capabilities: Mode::ALL.to_vec(),
        }
    }
}
