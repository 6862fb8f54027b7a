//! Mode handlers: one per [`Mode`], each turning a query into a stream of
//! events that ends with exactly one terminal event.
//!
//! The engine opens the request context before calling a handler and
//! persists the outcome after it returns. A handler reports provider
//! failures as an `error` event and returns `Ok(())`; it only returns
//! `Err` when the output stream itself is gone.

pub mod chat;
pub mod plan;
pub mod research;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::mode::Mode;
use crate::protocol::Emitter;
use crate::providers::{LlmProvider, SearchProvider};
use crate::Result;

pub use chat::ChatHandler;
pub use plan::PlanHandler;
pub use research::ResearchHandler;

/// Execute one request, emitting its events through `emitter`.
pub trait ModeHandler: Send + Sync {
    /// Run `query` under the request context already opened for
    /// `request_id`.
    ///
    /// Must emit exactly one terminal event (`complete`, `aborted`, or
    /// `error`) as the last event. When `cancel` fires, interruptible
    /// handlers stop and emit `aborted`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`](crate::AppError::Io) if the output stream
    /// is closed.
    fn handle<'a>(
        &'a self,
        query: &'a str,
        emitter: &'a Emitter,
        request_id: &'a str,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// The handler set the engine dispatches over.
#[derive(Clone)]
pub struct ModeHandlers {
    chat: Arc<dyn ModeHandler>,
    plan: Arc<dyn ModeHandler>,
    research: Arc<dyn ModeHandler>,
}

impl ModeHandlers {
    /// Standard handlers over the given providers.
    #[must_use]
    pub fn new(llm: Arc<dyn LlmProvider>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            chat: Arc::new(ChatHandler::new(llm)),
            plan: Arc::new(PlanHandler),
            research: Arc::new(ResearchHandler::new(search)),
        }
    }

    /// Handler set built from arbitrary implementations.
    #[must_use]
    pub fn from_parts(
        chat: Arc<dyn ModeHandler>,
        plan: Arc<dyn ModeHandler>,
        research: Arc<dyn ModeHandler>,
    ) -> Self {
        Self {
            chat,
            plan,
            research,
        }
    }

    /// The handler for `mode`.
    #[must_use]
    pub fn for_mode(&self, mode: Mode) -> Arc<dyn ModeHandler> {
        match mode {
            Mode::Chat => Arc::clone(&self.chat),
            Mode::Plan => Arc::clone(&self.plan),
            Mode::Research => Arc::clone(&self.research),
        }
    }
}

impl std::fmt::Debug for ModeHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeHandlers").finish_non_exhaustive()
    }
}
