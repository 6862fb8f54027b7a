//! Session model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mode::Mode;

/// The single conversation a process instance serves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Session {
    /// Globally unique identifier (configured or generated).
    pub id: String,
    /// Mode of the most recent request or `set_mode` command.
    pub mode: Mode,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last activity timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Construct a new session record stamped with the current time.
    #[must_use]
    pub fn new(id: String, mode: Mode) -> Self {
        let now = super::now();
        Self {
            id,
            mode,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A session row plus the number of requests recorded under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// The session itself.
    pub session: Session,
    /// Count of request rows owned by the session.
    pub request_count: i64,
}
