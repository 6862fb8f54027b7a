//! Protocol engine: the per-session request state machine.
//!
//! A request moves `none → pending → active → terminal`. The engine opens
//! the emitter context, records the request start, runs the mode handler,
//! and persists the terminal status read from the handler's final event.
//! Control commands (`heartbeat`, `set_mode`, `abort`) never enter that
//! lifecycle.
//!
//! [`ingest`] owns the input stream and feeds commands in.

pub mod ingest;

use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::{BusyPolicy, GlobalConfig};
use crate::handlers::ModeHandlers;
use crate::mode::Mode;
use crate::persistence::SessionStore;
use crate::protocol::emitter::Transcript;
use crate::protocol::event::{HistoryMessage, SessionInfo};
use crate::protocol::{Command, ControlMessage, Emitter, Event};
use crate::{AppError, Result};

/// Message of the `error` event sent when a request is refused under
/// [`BusyPolicy::Reject`].
pub const SESSION_BUSY: &str = "session busy";

#[derive(Debug)]
struct ActiveRequest {
    request_id: String,
    cancel: CancellationToken,
}

/// Drives commands for one session.
pub struct ProtocolEngine {
    emitter: Arc<Emitter>,
    store: SessionStore,
    handlers: ModeHandlers,
    default_mode: Mode,
    busy_policy: BusyPolicy,
    queue_capacity: usize,
    session_created: OnceCell<()>,
    active: Mutex<Option<ActiveRequest>>,
}

impl ProtocolEngine {
    /// Engine for the emitter's session.
    #[must_use]
    pub fn new(
        emitter: Arc<Emitter>,
        store: SessionStore,
        handlers: ModeHandlers,
        config: &GlobalConfig,
    ) -> Self {
        Self {
            emitter,
            store,
            handlers,
            default_mode: config.default_mode,
            busy_policy: config.busy_policy,
            queue_capacity: config.queue_capacity,
            session_created: OnceCell::new(),
            active: Mutex::new(None),
        }
    }

    /// The session this engine serves.
    #[must_use]
    pub fn session_id(&self) -> &str {
        self.emitter.session_id()
    }

    /// Output side.
    #[must_use]
    pub fn emitter(&self) -> &Arc<Emitter> {
        &self.emitter
    }

    /// Persistence side.
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// What to do with a request that arrives while another is in flight.
    #[must_use]
    pub fn busy_policy(&self) -> BusyPolicy {
        self.busy_policy
    }

    /// Bound of the pending-command queue.
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Id of the request currently running, if any.
    pub async fn active_request(&self) -> Option<String> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|active| active.request_id.clone())
    }

    /// Handle one command to completion.
    ///
    /// Per-request failures are reported on the wire as `error` events and
    /// logged; they never surface here.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the output stream is closed.
    pub async fn handle_command(&self, command: Command) -> Result<()> {
        match command {
            Command::Heartbeat => self.emitter.emit_control(&ControlMessage::HeartbeatAck).await,
            Command::SetMode { mode } => {
                self.set_mode(mode).await;
                Ok(())
            }
            Command::Request {
                mode,
                request_id,
                content,
            } => self.run_request(mode, &request_id, &content).await,
            Command::Abort { request_id } => {
                self.abort(request_id.as_deref()).await;
                Ok(())
            }
            Command::QueryHistory { request_id, limit } => {
                self.query_history(&request_id, limit).await
            }
            Command::GetSession {
                request_id,
                session_id,
            } => self.get_session(&request_id, session_id.as_deref()).await,
        }
    }

    /// Cancel the active request if `request_id` is `None` or matches it.
    ///
    /// Returns whether a request was signalled.
    pub async fn abort(&self, request_id: Option<&str>) -> bool {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(current) if request_id.is_none_or(|id| id == current.request_id) => {
                info!(request_id = %current.request_id, "abort requested");
                current.cancel.cancel();
                true
            }
            Some(current) => {
                debug!(
                    requested = request_id,
                    active = %current.request_id,
                    "abort does not match active request, ignoring"
                );
                false
            }
            None => {
                debug!(requested = request_id, "abort with no active request, ignoring");
                false
            }
        }
    }

    /// Refuse a request because another one is in flight.
    ///
    /// Writes a standalone `error` envelope with `seq` 1; nothing is
    /// persisted.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the output stream is closed.
    pub async fn reject_busy(&self, request_id: &str) -> Result<()> {
        warn!(request_id, "session busy, rejecting request");
        self.emitter
            .emit_standalone(request_id, Event::error(SESSION_BUSY))
            .await
    }

    async fn ensure_session(&self) -> Result<()> {
        self.session_created
            .get_or_try_init(|| async {
                let session = self
                    .store
                    .create_or_replace_session(self.session_id(), self.default_mode)
                    .await?;
                info!(session_id = %session.id, mode = %session.mode, "session opened");
                Ok::<(), AppError>(())
            })
            .await?;
        Ok(())
    }

    async fn set_mode(&self, mode: Option<Mode>) {
        let Some(mode) = mode else {
            warn!("set_mode without a valid mode, ignoring");
            return;
        };
        let updated = async {
            self.ensure_session().await?;
            self.store.set_session_mode(self.session_id(), mode).await
        }
        .await;
        match updated {
            Ok(session) => info!(session_id = %session.id, %mode, "session mode set"),
            Err(err) => warn!(%mode, error = %err, "failed to persist session mode"),
        }
    }

    async fn run_request(&self, mode: Mode, request_id: &str, content: &str) -> Result<()> {
        let cancel = CancellationToken::new();
        *self.active.lock().await = Some(ActiveRequest {
            request_id: request_id.to_owned(),
            cancel: cancel.clone(),
        });

        let span = info_span!("request", request_id, %mode);
        let result = self
            .execute_request(mode, request_id, content, cancel)
            .instrument(span)
            .await;

        *self.active.lock().await = None;
        result
    }

    async fn execute_request(
        &self,
        mode: Mode,
        request_id: &str,
        content: &str,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.emitter.start_request(request_id).await;

        if let Err(err) = self.record_start(mode, request_id, content).await {
            warn!(error = %err, "request start not recorded");
            let emitted = self.emitter.emit(Event::error(err.to_string())).await;
            self.emitter.finish_request().await;
            return emitted.map(|_| ());
        }
        debug!("request started");

        let handler = self.handlers.for_mode(mode);
        let outcome = handler
            .handle(content, &self.emitter, request_id, cancel)
            .await;

        let failure = match outcome {
            Ok(()) => None,
            Err(err) if err.is_fatal() => {
                self.emitter.finish_request().await;
                return Err(err);
            }
            Err(err) => {
                warn!(error = %err, "handler failed");
                Some(err)
            }
        };

        if !self.emitter.terminal_emitted().await {
            let message = failure.map_or_else(
                || "request ended without a terminal event".to_owned(),
                |err| err.to_string(),
            );
            if let Err(err) = self.emitter.emit(Event::error(message)).await {
                self.emitter.finish_request().await;
                if err.is_fatal() {
                    return Err(err);
                }
                warn!(error = %err, "could not emit closing error");
                return Ok(());
            }
        }

        let transcript = self.emitter.finish_request().await.unwrap_or_default();
        self.persist_outcome(request_id, &transcript).await;
        Ok(())
    }

    async fn record_start(&self, mode: Mode, request_id: &str, content: &str) -> Result<()> {
        self.ensure_session().await?;
        self.store.set_session_mode(self.session_id(), mode).await?;
        self.store
            .save_request_start(request_id, self.session_id(), mode, content)
            .await?;
        Ok(())
    }

    /// Store the terminal status and tool traces. Failures are logged only:
    /// the terminal event is already on the wire.
    async fn persist_outcome(&self, request_id: &str, transcript: &Transcript) {
        let Some(status) = transcript
            .terminal
            .as_ref()
            .and_then(Event::terminal_status)
        else {
            warn!("request finished without a terminal event");
            return;
        };

        let content = (!transcript.content.is_empty()).then_some(transcript.content.as_str());
        match self
            .store
            .mark_request_terminal(request_id, status, content)
            .await
        {
            Ok(request) => info!(
                status = request.status.as_str(),
                events = transcript.event_count,
                "request finished"
            ),
            Err(err) => warn!(error = %err, "failed to persist terminal status"),
        }

        for call in &transcript.tools {
            if let Err(err) = self
                .store
                .append_tool_trace(
                    request_id,
                    &call.tool,
                    &call.query,
                    call.success.unwrap_or(false),
                    &call.summary,
                )
                .await
            {
                warn!(tool = %call.tool, error = %err, "failed to persist tool trace");
            }
        }
    }

    async fn query_history(&self, request_id: &str, limit: u32) -> Result<()> {
        self.emitter.start_request(request_id).await;
        let result = match self.store.recent_sessions(limit).await {
            Ok(summaries) => {
                let sessions = summaries.iter().map(SessionInfo::from).collect();
                self.emit_lookup(Event::QueryHistoryResult { sessions }).await
            }
            Err(err) => self.emit_lookup_failure(err).await,
        };
        self.emitter.finish_request().await;
        result
    }

    async fn get_session(&self, request_id: &str, session_id: Option<&str>) -> Result<()> {
        self.emitter.start_request(request_id).await;
        let result = match self.load_session(session_id).await {
            Ok(event) => self.emit_lookup(event).await,
            Err(err) => self.emit_lookup_failure(err).await,
        };
        self.emitter.finish_request().await;
        result
    }

    async fn load_session(&self, session_id: Option<&str>) -> Result<Event> {
        let session_id = match session_id {
            Some(id) => id,
            None => {
                self.ensure_session().await?;
                self.session_id()
            }
        };
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("session {session_id}")))?;
        let messages = self
            .store
            .list_requests(session_id)
            .await?
            .iter()
            .flat_map(HistoryMessage::from_request)
            .collect();
        Ok(Event::GetSessionResult {
            session: SessionInfo::from(&session),
            messages,
        })
    }

    async fn emit_lookup(&self, result: Event) -> Result<()> {
        self.emitter.emit(result).await?;
        self.emitter.emit(Event::complete()).await?;
        Ok(())
    }

    async fn emit_lookup_failure(&self, err: AppError) -> Result<()> {
        warn!(error = %err, "lookup failed");
        self.emitter.emit(Event::error(err.to_string())).await?;
        Ok(())
    }
}

impl std::fmt::Debug for ProtocolEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("session_id", &self.session_id())
            .field("default_mode", &self.default_mode)
            .field("busy_policy", &self.busy_policy)
            .finish_non_exhaustive()
    }
}
