//! MiniMax streaming chat completion.
//!
//! Posts `{"model", "messages", "stream": true}` and reads the response as
//! server-sent events: each `data: {json}` line carries
//! `choices[0].delta.content`; `data: [DONE]` ends the stream. A non-zero
//! `base_resp.status_code` is an API error.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};
use tracing::debug;

use super::{ChatMessage, LlmProvider, TextStream};
use crate::config::{ApiKey, ProviderConfig};
use crate::{AppError, Result};

/// MiniMax chat completion client.
#[derive(Debug, Clone)]
pub struct MiniMaxProvider {
    client: reqwest::Client,
    api_key: ApiKey,
    base_url: String,
    model: String,
}

impl MiniMaxProvider {
    /// Build a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Provider`] if the HTTP client cannot be built.
    pub fn new(api_key: ApiKey, config: &ProviderConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_seconds);
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: config.minimax_base_url.clone(),
            model: config.minimax_model.clone(),
        })
    }
}

impl LlmProvider for MiniMaxProvider {
    fn name(&self) -> &str {
        "minimax"
    }

    fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Pin<Box<dyn Future<Output = Result<TextStream>> + Send + '_>> {
        Box::pin(async move {
            let body = json!({
                "model": self.model,
                "messages": messages,
                "stream": true,
            });

            let response = self
                .client
                .post(&self.base_url)
                .bearer_auth(self.api_key.expose())
                .json(&body)
                .send()
                .await?
                .error_for_status()?;

            debug!(status = %response.status(), "minimax stream opened");
            Ok(sse_text_stream(response.bytes_stream().boxed()))
        })
    }
}

/// Classification of one server-sent-event line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// A non-empty content fragment.
    Text(String),
    /// The `[DONE]` sentinel.
    Done,
    /// An API error reported in-band.
    Failed(String),
    /// Anything else (comments, keep-alives, role-only deltas).
    Skip,
}

/// Classify one SSE line from the MiniMax stream.
#[must_use]
pub fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }

    let Ok(value) = serde_json::from_str::<Value>(data) else {
        return SseLine::Skip;
    };

    let status_code = value
        .pointer("/base_resp/status_code")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    if status_code != 0 {
        let message = value
            .pointer("/base_resp/status_msg")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return SseLine::Failed(format!("minimax status {status_code}: {message}"));
    }

    match value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
    {
        Some(text) if !text.is_empty() => SseLine::Text(text.to_owned()),
        _ => SseLine::Skip,
    }
}

struct SseState {
    inner: BoxStream<'static, reqwest::Result<Bytes>>,
    buffer: Vec<u8>,
    pending: VecDeque<Result<String>>,
    done: bool,
}

impl SseState {
    /// Move every complete line in the buffer into `pending`.
    fn drain_lines(&mut self, flush: bool) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.classify(&line);
        }
        if flush && !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.classify(&rest);
        }
    }

    fn classify(&mut self, raw: &[u8]) {
        if self.done {
            return;
        }
        match parse_sse_line(&String::from_utf8_lossy(raw)) {
            SseLine::Text(text) => self.pending.push_back(Ok(text)),
            SseLine::Done => self.done = true,
            SseLine::Failed(message) => {
                self.pending.push_back(Err(AppError::Provider(message)));
                self.done = true;
            }
            SseLine::Skip => {}
        }
    }
}

/// Turn a raw SSE byte stream into content fragments.
///
/// Bytes are buffered until a full line arrives, so multi-byte characters
/// split across chunks decode intact.
fn sse_text_stream(inner: BoxStream<'static, reqwest::Result<Bytes>>) -> TextStream {
    let state = SseState {
        inner,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }
            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(&chunk);
                    state.drain_lines(false);
                }
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(AppError::Provider(err.to_string())), state));
                }
                None => {
                    state.drain_lines(true);
                    state.done = true;
                }
            }
        }
    })
    .boxed()
}
