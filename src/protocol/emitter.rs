//! Event emitter: envelopes events and hands each finished line to the
//! output writer.
//!
//! The emitter owns the sequence discipline. `start_request` opens a
//! request context and resets the counter; every `emit` increments it by
//! exactly one, so a request's lines carry `seq` 1, 2, 3, … with no gaps.
//! The counter, the envelope build, and the channel send happen under one
//! lock, so line order on stdout always equals `seq` order.
//!
//! Lines travel through a single `mpsc` channel to the writer task (see
//! [`super::writer`]); that one consumer is what keeps concurrent control
//! lines (`heartbeat_ack`) from ever splitting an envelope line.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::trace;

use super::event::{ControlMessage, Envelope, Event};
use crate::{AppError, Result};

/// A tool call observed on the event stream, paired with its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Tool name.
    pub tool: String,
    /// Query from the `tool_call` event.
    pub query: String,
    /// `None` until a matching `tool_result` arrives.
    pub success: Option<bool>,
    /// Summary from the `tool_result` event.
    pub summary: String,
}

/// What a request emitted, collected for persistence once it ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    /// Concatenated `content_delta` text.
    pub content: String,
    /// Tool calls in emission order.
    pub tools: Vec<ToolInvocation>,
    /// The terminal event, once emitted.
    pub terminal: Option<Event>,
    /// Number of events emitted (equals the last `seq`).
    pub event_count: u64,
}

impl Transcript {
    fn record(&mut self, event: &Event) {
        self.event_count += 1;
        match event {
            Event::ContentDelta { text } => self.content.push_str(text),
            Event::ToolCall { tool, query } => self.tools.push(ToolInvocation {
                tool: tool.clone(),
                query: query.clone(),
                success: None,
                summary: String::new(),
            }),
            Event::ToolResult {
                tool,
                success,
                summary,
                ..
            } => {
                let pending = self
                    .tools
                    .iter_mut()
                    .rev()
                    .find(|call| call.tool == *tool && call.success.is_none());
                match pending {
                    Some(call) => {
                        call.success = Some(*success);
                        call.summary.clone_from(summary);
                    }
                    None => self.tools.push(ToolInvocation {
                        tool: tool.clone(),
                        query: String::new(),
                        success: Some(*success),
                        summary: summary.clone(),
                    }),
                }
            }
            other if other.is_terminal() => self.terminal = Some(other.clone()),
            _ => {}
        }
    }
}

#[derive(Debug, Default)]
struct RequestContext {
    request_id: Option<String>,
    seq: u64,
    transcript: Transcript,
}

/// Serializes protocol output for one session.
#[derive(Debug)]
pub struct Emitter {
    session_id: String,
    out: mpsc::Sender<String>,
    context: Mutex<RequestContext>,
    ready_sent: AtomicBool,
}

impl Emitter {
    /// Create an emitter for `session_id` writing lines into `out`.
    #[must_use]
    pub fn new(session_id: impl Into<String>, out: mpsc::Sender<String>) -> Self {
        Self {
            session_id: session_id.into(),
            out,
            context: Mutex::new(RequestContext::default()),
            ready_sent: AtomicBool::new(false),
        }
    }

    /// The session every envelope is stamped with.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Open a request context and reset the sequence counter to 0.
    ///
    /// Any previous context is discarded; the engine only calls this after
    /// the previous request's terminal event.
    pub async fn start_request(&self, request_id: &str) {
        let mut ctx = self.context.lock().await;
        *ctx = RequestContext {
            request_id: Some(request_id.to_owned()),
            ..RequestContext::default()
        };
        trace!(session_id = %self.session_id, request_id, "request context opened");
    }

    /// The currently open request, if any.
    pub async fn current_request(&self) -> Option<String> {
        self.context.lock().await.request_id.clone()
    }

    /// Whether the open request already emitted its terminal event.
    pub async fn terminal_emitted(&self) -> bool {
        self.context.lock().await.transcript.terminal.is_some()
    }

    /// Envelope `event` under the open request and write it as one line.
    ///
    /// Returns the sequence number assigned to the event.
    ///
    /// # Errors
    ///
    /// - [`AppError::NoActiveRequest`] if no request context is open.
    /// - [`AppError::Protocol`] if the request already emitted its terminal event.
    /// - [`AppError::Io`] if the output stream is closed.
    pub async fn emit(&self, event: Event) -> Result<u64> {
        let mut ctx = self.context.lock().await;
        let Some(request_id) = ctx.request_id.clone() else {
            return Err(AppError::NoActiveRequest);
        };
        if ctx.transcript.terminal.is_some() {
            return Err(AppError::Protocol(format!(
                "request {request_id} already emitted its terminal event"
            )));
        }

        let seq = ctx.seq + 1;
        let kind = event.kind();
        let envelope = Envelope {
            session_id: self.session_id.clone(),
            request_id,
            seq,
            timestamp: Utc::now().timestamp_millis(),
            event,
        };
        let line = serde_json::to_string(&envelope)?;
        self.write_line(line).await?;

        ctx.seq = seq;
        ctx.transcript.record(&envelope.event);
        trace!(request_id = %envelope.request_id, seq, kind, "event emitted");
        Ok(seq)
    }

    /// Close the open request context and return what it emitted.
    ///
    /// Returns `None` if no context was open. Later `emit` calls fail with
    /// [`AppError::NoActiveRequest`].
    pub async fn finish_request(&self) -> Option<Transcript> {
        let mut ctx = self.context.lock().await;
        let finished = std::mem::take(&mut *ctx);
        finished.request_id.map(|_| finished.transcript)
    }

    /// Write the bare `ready` line.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] on a second call, or [`AppError::Io`]
    /// if the output stream is closed.
    pub async fn emit_ready(&self) -> Result<()> {
        if self.ready_sent.swap(true, Ordering::SeqCst) {
            return Err(AppError::Protocol("ready already emitted".into()));
        }
        self.emit_control(&ControlMessage::ready()).await
    }

    /// Write a bare control line. Does not touch request or sequence state.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the output stream is closed.
    pub async fn emit_control(&self, message: &ControlMessage) -> Result<()> {
        let line = serde_json::to_string(message)?;
        self.write_line(line).await
    }

    /// Write a single-event envelope (`seq` 1) for a request that never
    /// opens a context, such as one refused because the session is busy.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the output stream is closed.
    pub async fn emit_standalone(&self, request_id: &str, event: Event) -> Result<()> {
        let envelope = Envelope {
            session_id: self.session_id.clone(),
            request_id: request_id.to_owned(),
            seq: 1,
            timestamp: Utc::now().timestamp_millis(),
            event,
        };
        let line = serde_json::to_string(&envelope)?;
        self.write_line(line).await
    }

    async fn write_line(&self, line: String) -> Result<()> {
        self.out
            .send(line)
            .await
            .map_err(|_| AppError::Io("output stream closed".into()))
    }
}
