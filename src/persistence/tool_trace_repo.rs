//! Tool trace repository for `SQLite` persistence.

use std::sync::Arc;

use crate::models::from_millis;
use crate::models::tool_trace::ToolTrace;
use crate::{AppError, Result};

use super::db::Database;

/// Repository for append-only tool trace records.
#[derive(Clone)]
pub struct ToolTraceRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct ToolTraceRow {
    id: String,
    request_id: String,
    tool: String,
    query: String,
    success: i64,
    summary: Option<String>,
    created_at: i64,
}

impl ToolTraceRow {
    fn into_trace(self) -> Result<ToolTrace> {
        Ok(ToolTrace {
            created_at: from_millis("created_at", self.created_at)?,
            id: self.id,
            request_id: self.request_id,
            tool: self.tool,
            query: self.query,
            success: self.success != 0,
            summary: self.summary.unwrap_or_default(),
        })
    }
}

impl ToolTraceRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a trace row. Rows are never updated afterwards.
    ///
    /// # Errors
    ///
    /// Returns `AppError::UnknownRequestId` if the owning request does not
    /// exist, or `AppError::Db` if the insert fails.
    pub async fn insert(&self, trace: &ToolTrace) -> Result<ToolTrace> {
        let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM requests WHERE id = ?1")
            .bind(&trace.request_id)
            .fetch_optional(self.db.as_ref())
            .await?;
        if exists.is_none() {
            return Err(AppError::UnknownRequestId(trace.request_id.clone()));
        }

        sqlx::query(
            "INSERT INTO tool_traces (id, request_id, tool, query, success, summary, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&trace.id)
        .bind(&trace.request_id)
        .bind(&trace.tool)
        .bind(&trace.query)
        .bind(i64::from(trace.success))
        .bind(&trace.summary)
        .bind(trace.created_at.timestamp_millis())
        .execute(self.db.as_ref())
        .await?;

        Ok(trace.clone())
    }

    /// List the traces recorded for a request, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_request(&self, request_id: &str) -> Result<Vec<ToolTrace>> {
        let rows: Vec<ToolTraceRow> = sqlx::query_as(
            "SELECT * FROM tool_traces WHERE request_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )
        .bind(request_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(ToolTraceRow::into_trace).collect()
    }
}
