//! Durable record of sessions, requests, and tool traces.
//!
//! [`SessionStore`] is the single persistence surface the protocol engine
//! talks to. Each call is its own `SQLite` statement (or guarded statement
//! pair), durable on return; there is no transaction spanning a request's
//! whole lifecycle, so a crash between start and terminal leaves a
//! `streaming` row that [`SessionStore::recover_interrupted`] cleans up.

use std::sync::Arc;

use crate::mode::Mode;
use crate::models::request::{Request, RequestStatus};
use crate::models::session::{Session, SessionSummary};
use crate::models::tool_trace::ToolTrace;
use crate::Result;

use super::db::Database;
use super::request_repo::RequestRepo;
use super::session_repo::SessionRepo;
use super::tool_trace_repo::ToolTraceRepo;

/// Facade over the session, request, and tool-trace repositories.
#[derive(Clone)]
pub struct SessionStore {
    sessions: SessionRepo,
    requests: RequestRepo,
    traces: ToolTraceRepo,
}

impl SessionStore {
    /// Build a store over a connected database.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            sessions: SessionRepo::new(Arc::clone(&db)),
            requests: RequestRepo::new(Arc::clone(&db)),
            traces: ToolTraceRepo::new(db),
        }
    }

    /// Upsert the session row. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn create_or_replace_session(&self, id: &str, mode: Mode) -> Result<Session> {
        self.sessions
            .upsert(&Session::new(id.to_owned(), mode))
            .await
    }

    /// Record the session's current mode.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session does not exist, or
    /// `AppError::Db` if the write fails.
    pub async fn set_session_mode(&self, id: &str, mode: Mode) -> Result<Session> {
        self.sessions.update_mode(id, mode).await
    }

    /// Insert a request row with status `streaming`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::DuplicateRequestId` if the id is already recorded
    /// under any session, or `AppError::Db` if the write fails.
    pub async fn save_request_start(
        &self,
        request_id: &str,
        session_id: &str,
        mode: Mode,
        user_content: &str,
    ) -> Result<Request> {
        let request = Request::started(
            request_id.to_owned(),
            session_id.to_owned(),
            mode,
            user_content.to_owned(),
        );
        self.requests.insert(&request).await
    }

    /// Set the final status, output, and completion time of a request.
    ///
    /// # Errors
    ///
    /// Returns `AppError::UnknownRequestId` if absent, `AppError::InvalidTransition`
    /// if already terminal, or `AppError::Db` if the write fails.
    pub async fn mark_request_terminal(
        &self,
        request_id: &str,
        status: RequestStatus,
        assistant_content: Option<&str>,
    ) -> Result<Request> {
        self.requests
            .mark_terminal(request_id, status, assistant_content)
            .await
    }

    /// Append an immutable tool trace to a request.
    ///
    /// # Errors
    ///
    /// Returns `AppError::UnknownRequestId` if the request is absent, or
    /// `AppError::Db` if the write fails.
    pub async fn append_tool_trace(
        &self,
        request_id: &str,
        tool: &str,
        query: &str,
        success: bool,
        summary: &str,
    ) -> Result<ToolTrace> {
        let trace = ToolTrace::new(
            request_id.to_owned(),
            tool.to_owned(),
            query.to_owned(),
            success,
            summary.to_owned(),
        );
        self.traces.insert(&trace).await
    }

    /// Fetch one session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        self.sessions.get_by_id(id).await
    }

    /// Fetch one request.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_request(&self, id: &str) -> Result<Option<Request>> {
        self.requests.get_by_id(id).await
    }

    /// Requests of a session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_requests(&self, session_id: &str) -> Result<Vec<Request>> {
        self.requests.list_for_session(session_id).await
    }

    /// Tool traces of a request, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_tool_traces(&self, request_id: &str) -> Result<Vec<ToolTrace>> {
        self.traces.list_for_request(request_id).await
    }

    /// Most recently active sessions with request counts.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn recent_sessions(&self, limit: u32) -> Result<Vec<SessionSummary>> {
        self.sessions.list_recent(limit).await
    }

    /// Fail requests a previous process left `pending` or `streaming`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn recover_interrupted(&self) -> Result<u64> {
        self.requests.fail_unfinished().await
    }
}
