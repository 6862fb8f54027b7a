//! External collaborators: LLM completion and web search.
//!
//! Mode handlers see only the [`LlmProvider`] and [`SearchProvider`]
//! traits. Concrete variants:
//!
//! - `minimax`: streaming chat over HTTP (`MINIMAX_API_KEY`).
//! - `exa`: web search over HTTP (`EXA_API_KEY`).
//! - `offline`: echo chat and placeholder search, used when no key is set.

pub mod exa;
pub mod minimax;
pub mod offline;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::GlobalConfig;
use crate::Result;

/// Lazily produced text fragments from a completion.
pub type TextStream = BoxStream<'static, Result<String>>;

/// Author of a chat message sent to the LLM.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// Instructions.
    System,
    /// The end user.
    User,
    /// Prior model output.
    Assistant,
}

/// One message of the conversation sent to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Author.
    pub role: ChatRole,
    /// Text.
    pub content: String,
}

impl ChatMessage {
    /// A `user` message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// One search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchHit {
    /// Page title, when the provider knows it.
    pub title: Option<String>,
    /// Page URL.
    pub url: String,
    /// Extract from the page.
    pub snippet: Option<String>,
}

/// Outcome of a search call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    /// Tool that produced the result.
    pub tool: String,
    /// Query as sent.
    pub query: String,
    /// Hits in provider ranking order.
    pub hits: Vec<SearchHit>,
    /// One-paragraph summary for the `tool_result` event.
    pub summary: String,
}

/// Streaming chat completion.
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Start a completion over `messages` and return its text fragments.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Provider`](crate::AppError::Provider) if the call
    /// cannot be started. Mid-stream failures arrive as `Err` items.
    fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Pin<Box<dyn Future<Output = Result<TextStream>> + Send + '_>>;
}

/// Web search.
pub trait SearchProvider: Send + Sync {
    /// Tool name reported in `tool_call`/`tool_result` events.
    fn name(&self) -> &str;

    /// Run `query` and summarize the hits.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Search`](crate::AppError::Search) on network,
    /// timeout, or API failure.
    fn search<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SearchResult>> + Send + 'a>>;
}

/// Pick the chat provider for `config`: MiniMax with a key, echo without.
///
/// # Errors
///
/// Returns [`AppError::Provider`](crate::AppError::Provider) if the HTTP
/// client cannot be built.
pub fn build_llm_provider(config: &GlobalConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.credentials.minimax {
        Some(ref key) => {
            info!(provider = "minimax", "chat provider configured");
            Ok(Arc::new(minimax::MiniMaxProvider::new(
                key.clone(),
                &config.providers,
            )?))
        }
        None => {
            info!(provider = "echo", "no chat credentials; using offline provider");
            Ok(Arc::new(offline::EchoProvider))
        }
    }
}

/// Pick the search provider for `config`: Exa with a key, placeholder without.
///
/// # Errors
///
/// Returns [`AppError::Search`](crate::AppError::Search) if the HTTP
/// client cannot be built.
pub fn build_search_provider(config: &GlobalConfig) -> Result<Arc<dyn SearchProvider>> {
    match config.credentials.exa {
        Some(ref key) => {
            info!(
                tool = "exa",
                available = ?config.available_search_tools(),
                "search provider configured"
            );
            Ok(Arc::new(exa::ExaSearch::new(key.clone(), &config.providers)?))
        }
        None => {
            info!(tool = "exa", "no search credentials; using placeholder search");
            Ok(Arc::new(offline::PlaceholderSearch))
        }
    }
}
