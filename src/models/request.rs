//! Request model and lifecycle helpers.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mode::Mode;
use crate::AppError;

/// Lifecycle status for a request.
///
/// Transitions are monotonic: `pending → streaming → {complete | error}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Accepted but not yet handed to a mode handler.
    Pending,
    /// Handler running and emitting events.
    Streaming,
    /// Finished with a `complete` event.
    Complete,
    /// Finished with an `error` or `aborted` event.
    Error,
}

impl RequestStatus {
    /// Storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Streaming => "streaming",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Streaming | Self::Error)
                | (Self::Streaming, Self::Complete | Self::Error)
        )
    }
}

impl FromStr for RequestStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "streaming" => Ok(Self::Streaming),
            "complete" => Ok(Self::Complete),
            "error" => Ok(Self::Error),
            other => Err(AppError::Db(format!("invalid request status: {other}"))),
        }
    }
}

/// One command's unit of work within a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Request {
    /// Identifier, unique across all sessions in the store.
    pub id: String,
    /// Owning session.
    pub session_id: String,
    /// Mode the request ran under.
    pub mode: Mode,
    /// Input text.
    pub user_content: String,
    /// Accumulated output text; `None` until the request is terminal.
    pub assistant_content: Option<String>,
    /// Current lifecycle status.
    pub status: RequestStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Set when the request reaches a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Request {
    /// Construct a request that is already streaming, as recorded at start.
    #[must_use]
    pub fn started(id: String, session_id: String, mode: Mode, user_content: String) -> Self {
        Self {
            id,
            session_id,
            mode,
            user_content,
            assistant_content: None,
            status: RequestStatus::Streaming,
            created_at: super::now(),
            completed_at: None,
        }
    }
}
