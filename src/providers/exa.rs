//! Exa web search.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{SearchHit, SearchProvider, SearchResult};
use crate::config::{ApiKey, ProviderConfig};
use crate::{AppError, Result};

/// Exa search client.
#[derive(Debug, Clone)]
pub struct ExaSearch {
    client: reqwest::Client,
    api_key: ApiKey,
    base_url: String,
    num_results: u32,
}

#[derive(Debug, Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Debug, Deserialize)]
struct ExaResult {
    title: Option<String>,
    url: String,
    text: Option<String>,
}

impl ExaSearch {
    /// Build a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Search`] if the HTTP client cannot be built.
    pub fn new(api_key: ApiKey, config: &ProviderConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_seconds);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(search_error)?;
        Ok(Self {
            client,
            api_key,
            base_url: config.exa_base_url.clone(),
            num_results: config.exa_num_results,
        })
    }
}

fn search_error(err: reqwest::Error) -> AppError {
    AppError::Search(err.to_string())
}

impl SearchProvider for ExaSearch {
    fn name(&self) -> &str {
        "exa"
    }

    fn search<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SearchResult>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.base_url)
                .header("x-api-key", self.api_key.expose())
                .json(&json!({ "query": query, "numResults": self.num_results }))
                .send()
                .await
                .map_err(search_error)?
                .error_for_status()
                .map_err(search_error)?;

            let body: ExaResponse = response.json().await.map_err(search_error)?;
            debug!(query, hits = body.results.len(), "exa search finished");

            let hits: Vec<SearchHit> = body
                .results
                .into_iter()
                .map(|r| SearchHit {
                    title: r.title,
                    url: r.url,
                    snippet: r.text,
                })
                .collect();

            Ok(SearchResult {
                tool: self.name().to_owned(),
                query: query.to_owned(),
                summary: summarize_hits(query, &hits),
                hits,
            })
        })
    }
}

/// One-line summary of `hits` for a `tool_result` event.
#[must_use]
pub fn summarize_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No results found for: {query}");
    }
    let titles: Vec<&str> = hits
        .iter()
        .map(|h| h.title.as_deref().unwrap_or(h.url.as_str()))
        .collect();
    format!("Found {} results: {}", hits.len(), titles.join("; "))
}
