//! Tool trace model: one external-tool invocation tied to a request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only record of a tool call made while serving a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ToolTrace {
    /// Unique record identifier.
    pub id: String,
    /// Owning request.
    pub request_id: String,
    /// Tool name (e.g. `exa`).
    pub tool: String,
    /// Query sent to the tool.
    pub query: String,
    /// Whether the call succeeded.
    pub success: bool,
    /// Result summary or failure description.
    pub summary: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl ToolTrace {
    /// Construct a new trace with a generated identifier.
    #[must_use]
    pub fn new(
        request_id: String,
        tool: String,
        query: String,
        success: bool,
        summary: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request_id,
            tool,
            query,
            success,
            summary,
            created_at: super::now(),
        }
    }
}
