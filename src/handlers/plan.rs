//! Plan mode: a static research plan built from the query text alone.

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use super::ModeHandler;
use crate::protocol::{Emitter, Event};
use crate::Result;

/// Emits one plan `content_delta` and `complete`. Never calls a provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanHandler;

/// Render the plan text for `query`.
#[must_use]
pub fn render_plan(query: &str) -> String {
    format!(
        "Research Plan\n\n\
         Query: {query}\n\n\
         Key Questions:\n\
         1. What is {query}?\n\
         2. How does it work?\n\n\
         Search Strategy:\n\
         - Query 1: '{query} definition' -> Academic sources\n\
         - Query 2: '{query} examples' -> Practical applications\n\n\
         Expected Output: Comprehensive analysis with citations\n\n\
         [Approve to execute in Research Mode, or suggest modifications]"
    )
}

impl ModeHandler for PlanHandler {
    fn handle<'a>(
        &'a self,
        query: &'a str,
        emitter: &'a Emitter,
        _request_id: &'a str,
        _cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            emitter.emit(Event::content_delta(render_plan(query))).await?;
            emitter.emit(Event::complete()).await?;
            Ok(())
        })
    }
}
