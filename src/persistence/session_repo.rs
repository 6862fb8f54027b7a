//! Session repository for `SQLite` persistence.

use std::sync::Arc;

use crate::mode::Mode;
use crate::models::session::{Session, SessionSummary};
use crate::models::{from_millis, now};
use crate::{AppError, Result};

use super::db::Database;

/// Repository wrapper around `SQLite` for session records.
#[derive(Clone)]
pub struct SessionRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    mode: String,
    created_at: i64,
    updated_at: i64,
}

impl SessionRow {
    /// Convert a database row into the domain model.
    fn into_session(self) -> Result<Session> {
        Ok(Session {
            mode: parse_mode(&self.mode)?,
            created_at: from_millis("created_at", self.created_at)?,
            updated_at: from_millis("updated_at", self.updated_at)?,
            id: self.id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: String,
    mode: String,
    created_at: i64,
    updated_at: i64,
    request_count: i64,
}

pub(crate) fn parse_mode(s: &str) -> Result<Mode> {
    s.parse()
        .map_err(|_| AppError::Db(format!("invalid mode: {s}")))
}

impl SessionRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a session, or refresh `updated_at` if the id already exists.
    ///
    /// An existing row keeps its `created_at` and `mode`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the upsert fails.
    pub async fn upsert(&self, session: &Session) -> Result<Session> {
        sqlx::query(
            "INSERT INTO sessions (id, mode, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at",
        )
        .bind(&session.id)
        .bind(session.mode.as_str())
        .bind(session.created_at.timestamp_millis())
        .bind(session.updated_at.timestamp_millis())
        .execute(self.db.as_ref())
        .await?;

        self.get_by_id(&session.id)
            .await?
            .ok_or_else(|| AppError::Db("failed to upsert session".into()))
    }

    /// Retrieve a session by identifier.
    ///
    /// Returns `Ok(None)` if the session does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as("SELECT * FROM sessions WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(SessionRow::into_session).transpose()
    }

    /// Set the session's mode and bump `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session does not exist, or
    /// `AppError::Db` if the update fails.
    pub async fn update_mode(&self, id: &str, mode: Mode) -> Result<Session> {
        let result = sqlx::query("UPDATE sessions SET mode = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(mode.as_str())
            .bind(now().timestamp_millis())
            .bind(id)
            .execute(self.db.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("session {id}")));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("session {id}")))
    }

    /// List sessions by most recent activity, with their request counts.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<SessionSummary>> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            "SELECT s.id, s.mode, s.created_at, s.updated_at, COUNT(r.id) AS request_count
             FROM sessions s LEFT JOIN requests r ON r.session_id = s.id
             GROUP BY s.id
             ORDER BY s.updated_at DESC, s.id ASC
             LIMIT ?1",
        )
        .bind(i64::from(limit))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter()
            .map(|row| {
                let session = SessionRow {
                    id: row.id,
                    mode: row.mode,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                }
                .into_session()?;
                Ok(SessionSummary {
                    session,
                    request_count: row.request_count,
                })
            })
            .collect()
    }
}
