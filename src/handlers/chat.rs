//! Chat mode: stream an LLM completion as `content_delta` events.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ModeHandler;
use crate::protocol::{Emitter, Event};
use crate::providers::{ChatMessage, LlmProvider};
use crate::Result;

/// Forwards every fragment of a single-turn completion.
pub struct ChatHandler {
    provider: Arc<dyn LlmProvider>,
}

impl ChatHandler {
    /// Chat over `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

impl ModeHandler for ChatHandler {
    fn handle<'a>(
        &'a self,
        query: &'a str,
        emitter: &'a Emitter,
        request_id: &'a str,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let provider = self.provider.name();
            debug!(request_id, provider, "chat completion starting");

            let opened = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!(request_id, "chat aborted before first fragment");
                    emitter.emit(Event::aborted(false)).await?;
                    return Ok(());
                }
                opened = self.provider.stream_chat(vec![ChatMessage::user(query)]) => opened,
            };

            let mut fragments = match opened {
                Ok(stream) => stream,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(request_id, provider, error = %err, "chat completion failed to start");
                    emitter.emit(Event::error(err.to_string())).await?;
                    return Ok(());
                }
            };

            let mut streamed = false;
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        info!(request_id, streamed, "chat aborted mid-stream");
                        emitter.emit(Event::aborted(streamed)).await?;
                        return Ok(());
                    }
                    next = fragments.next() => match next {
                        Some(Ok(text)) => {
                            emitter.emit(Event::content_delta(text)).await?;
                            streamed = true;
                        }
                        Some(Err(err)) => {
                            warn!(request_id, provider, error = %err, "chat stream failed");
                            emitter.emit(Event::error(err.to_string())).await?;
                            return Ok(());
                        }
                        None => break,
                    },
                }
            }

            emitter.emit(Event::complete()).await?;
            Ok(())
        })
    }
}
