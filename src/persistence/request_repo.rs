//! Request repository for `SQLite` persistence.

use std::sync::Arc;

use crate::models::request::{Request, RequestStatus};
use crate::models::{from_millis, now};
use crate::{AppError, Result};

use super::db::Database;
use super::session_repo::parse_mode;

/// Repository wrapper around `SQLite` for request records.
#[derive(Clone)]
pub struct RequestRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct RequestRow {
    id: String,
    session_id: String,
    mode: String,
    user_content: String,
    assistant_content: Option<String>,
    status: String,
    created_at: i64,
    completed_at: Option<i64>,
}

impl RequestRow {
    /// Convert a database row into the domain model.
    fn into_request(self) -> Result<Request> {
        let completed_at = self
            .completed_at
            .map(|ms| from_millis("completed_at", ms))
            .transpose()?;

        Ok(Request {
            mode: parse_mode(&self.mode)?,
            status: self.status.parse()?,
            created_at: from_millis("created_at", self.created_at)?,
            completed_at,
            id: self.id,
            session_id: self.session_id,
            user_content: self.user_content,
            assistant_content: self.assistant_content,
        })
    }
}

impl RequestRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new request record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::DuplicateRequestId` if a request with the same id
    /// exists under any session, or `AppError::Db` if the insert fails
    /// (including an unknown owning session).
    pub async fn insert(&self, request: &Request) -> Result<Request> {
        let result = sqlx::query(
            "INSERT INTO requests (id, session_id, mode, user_content, assistant_content,
             status, created_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&request.id)
        .bind(&request.session_id)
        .bind(request.mode.as_str())
        .bind(&request.user_content)
        .bind(&request.assistant_content)
        .bind(request.status.as_str())
        .bind(request.created_at.timestamp_millis())
        .bind(request.completed_at.map(|ts| ts.timestamp_millis()))
        .execute(self.db.as_ref())
        .await;

        match result {
            Ok(_) => Ok(request.clone()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(AppError::DuplicateRequestId(request.id.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Retrieve a request by identifier.
    ///
    /// Returns `Ok(None)` if the request does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Request>> {
        let row: Option<RequestRow> = sqlx::query_as("SELECT * FROM requests WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(RequestRow::into_request).transpose()
    }

    /// Move a live request to a terminal status, recording its output.
    ///
    /// The current status must allow the move (see
    /// [`RequestStatus::can_transition_to`]). The `UPDATE` is guarded on the
    /// status that was read, so two concurrent callers cannot both succeed.
    ///
    /// # Errors
    ///
    /// - `AppError::InvalidTransition` if `status` is not terminal or the
    ///   request's current status does not allow the move.
    /// - `AppError::UnknownRequestId` if no such request exists.
    /// - `AppError::Db` if the update fails.
    pub async fn mark_terminal(
        &self,
        id: &str,
        status: RequestStatus,
        assistant_content: Option<&str>,
    ) -> Result<Request> {
        if !status.is_terminal() {
            return Err(AppError::InvalidTransition(format!(
                "{} is not a terminal status",
                status.as_str()
            )));
        }

        let current = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::UnknownRequestId(id.to_owned()))?;
        if !current.status.can_transition_to(status) {
            return Err(transition_error(id, current.status, status));
        }

        let result = sqlx::query(
            "UPDATE requests SET status = ?1, assistant_content = ?2, completed_at = ?3
             WHERE id = ?4 AND status = ?5",
        )
        .bind(status.as_str())
        .bind(assistant_content)
        .bind(now().timestamp_millis())
        .bind(id)
        .bind(current.status.as_str())
        .execute(self.db.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_by_id(id).await? {
                None => Err(AppError::UnknownRequestId(id.to_owned())),
                Some(raced) => Err(transition_error(id, raced.status, status)),
            };
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| AppError::UnknownRequestId(id.to_owned()))
    }

    /// List a session's requests in creation order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_session(&self, session_id: &str) -> Result<Vec<Request>> {
        let rows: Vec<RequestRow> = sqlx::query_as(
            "SELECT * FROM requests WHERE session_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )
        .bind(session_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(RequestRow::into_request).collect()
    }

    /// Mark every request still `pending` or `streaming` as `error`.
    ///
    /// Used at startup: a request left live by a previous process can never
    /// be finished. Returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn fail_unfinished(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE requests SET status = 'error', completed_at = ?1
             WHERE status IN ('pending', 'streaming')",
        )
        .bind(now().timestamp_millis())
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected())
    }
}

fn transition_error(id: &str, from: RequestStatus, to: RequestStatus) -> AppError {
    if from.is_terminal() {
        AppError::InvalidTransition(format!("request {id} is already {}", from.as_str()))
    } else {
        AppError::InvalidTransition(format!(
            "request {id} cannot move from {} to {}",
            from.as_str(),
            to.as_str()
        ))
    }
}
