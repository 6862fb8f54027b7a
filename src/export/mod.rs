//! Renderers that turn a finished answer and its sources into a document.

mod html;
mod markdown;

pub use html::export_html;
pub use markdown::export_markdown;

use crate::providers::SearchHit;

/// Title shown for a citation without one.
pub const UNTITLED: &str = "Untitled";

/// A source cited by an answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Citation {
    /// Page title.
    pub title: Option<String>,
    /// Page URL.
    pub url: Option<String>,
}

impl Citation {
    /// Citation for `url` with an optional `title`.
    #[must_use]
    pub fn new(title: Option<String>, url: impl Into<String>) -> Self {
        Self {
            title,
            url: Some(url.into()),
        }
    }

    pub(crate) fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(UNTITLED)
    }

    pub(crate) fn display_url(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }
}

impl From<&SearchHit> for Citation {
    fn from(hit: &SearchHit) -> Self {
        Self::new(hit.title.clone(), hit.url.clone())
    }
}
