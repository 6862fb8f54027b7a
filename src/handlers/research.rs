//! Research mode: one search call bracketed by explicit phase events.
//!
//! Event order on success:
//!
//! 1. `phase_status(planning, working)`
//! 2. `tool_call(<tool>, query)`
//! 3. `tool_result(<tool>, success=true, summary)`
//! 4. `phase_status(synthesizing, working)`
//! 5. `content_delta` (findings plus a `## Citations` list)
//! 6. `complete`
//!
//! A failed search emits `tool_result(success=false, error)` and ends with
//! `error`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::ModeHandler;
use crate::export::{export_markdown, Citation};
use crate::protocol::{Emitter, Event, Phase, PhaseState};
use crate::providers::{SearchProvider, SearchResult};
use crate::Result;

/// Search-then-synthesize handler.
pub struct ResearchHandler {
    search: Arc<dyn SearchProvider>,
}

impl ResearchHandler {
    /// Research over `search`.
    #[must_use]
    pub fn new(search: Arc<dyn SearchProvider>) -> Self {
        Self { search }
    }
}

/// Synthesized answer text for a successful search.
#[must_use]
pub fn synthesize(query: &str, result: &SearchResult) -> String {
    let citations: Vec<Citation> = result.hits.iter().map(Citation::from).collect();
    let findings = format!("Research findings for: {query}\n\n{}", result.summary);
    export_markdown(&findings, &citations)
}

impl ModeHandler for ResearchHandler {
    fn handle<'a>(
        &'a self,
        query: &'a str,
        emitter: &'a Emitter,
        request_id: &'a str,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let tool = self.search.name();

            emitter
                .emit(Event::phase_status(Phase::Planning, PhaseState::Working))
                .await?;
            emitter.emit(Event::tool_call(tool, query)).await?;

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!(request_id, tool, "research aborted during search");
                    emitter.emit(Event::aborted(false)).await?;
                    return Ok(());
                }
                outcome = self.search.search(query) => outcome,
            };

            let result = match outcome {
                Ok(result) => result,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(request_id, tool, error = %err, "search failed");
                    emitter.emit(Event::tool_failed(tool, err.to_string())).await?;
                    emitter
                        .emit(Event::error(format!("research failed: {err}")))
                        .await?;
                    return Ok(());
                }
            };

            emitter
                .emit(Event::tool_succeeded(tool, result.summary.clone()))
                .await?;

            if cancel.is_cancelled() {
                info!(request_id, "research aborted before synthesis");
                emitter.emit(Event::aborted(false)).await?;
                return Ok(());
            }

            emitter
                .emit(Event::phase_status(Phase::Synthesizing, PhaseState::Working))
                .await?;
            emitter
                .emit(Event::content_delta(synthesize(query, &result)))
                .await?;
            emitter.emit(Event::complete()).await?;
            Ok(())
        })
    }
}
