//! Providers that need no network or credentials.

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{self, StreamExt};

use super::{
    ChatMessage, ChatRole, LlmProvider, SearchProvider, SearchResult, TextStream,
};
use crate::Result;

/// Chat provider that answers with the last user message.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoProvider;

impl LlmProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Pin<Box<dyn Future<Output = Result<TextStream>> + Send + '_>> {
        Box::pin(async move {
            let query = messages
                .into_iter()
                .rev()
                .find(|m| m.role == ChatRole::User)
                .map(|m| m.content)
                .unwrap_or_default();
            let reply: Result<String> = Ok(format!("Chat mode: {query}"));
            Ok(stream::iter([reply]).boxed())
        })
    }
}

/// Search tool stand-in that reports itself as `exa` and returns no hits.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderSearch;

impl SearchProvider for PlaceholderSearch {
    fn name(&self) -> &str {
        "exa"
    }

    fn search<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SearchResult>> + Send + 'a>> {
        Box::pin(async move {
            Ok(SearchResult {
                tool: self.name().to_owned(),
                query: query.to_owned(),
                hits: Vec::new(),
                summary: "Exa search placeholder".to_owned(),
            })
        })
    }
}
