//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fmt::{Debug, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::mode::Mode;
use crate::{AppError, Result};

/// An API credential. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a raw credential value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw credential, for building request headers.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for ApiKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Provider credentials loaded from the environment at runtime.
///
/// Never read from the TOML file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// `MINIMAX_API_KEY`.
    pub minimax: Option<ApiKey>,
    /// `OPENROUTER_API_KEY`.
    pub openrouter: Option<ApiKey>,
    /// `EXA_API_KEY`.
    pub exa: Option<ApiKey>,
    /// `TAVILY_API_KEY`.
    pub tavily: Option<ApiKey>,
    /// `FIRECRAWL_API_KEY`.
    pub firecrawl: Option<ApiKey>,
    /// `BRAVE_API_KEY`.
    pub brave: Option<ApiKey>,
}

/// What to do with a `chat`/`plan`/`research` command that arrives while
/// another request is in flight.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Run it after the current one, in arrival order.
    #[default]
    Queue,
    /// Answer it immediately with a `session busy` error.
    Reject,
}

/// Remote provider endpoints and limits.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ProviderConfig {
    /// MiniMax chat completion endpoint.
    #[serde(default = "default_minimax_base_url")]
    pub minimax_base_url: String,
    /// MiniMax model name.
    #[serde(default = "default_minimax_model")]
    pub minimax_model: String,
    /// Exa search endpoint.
    #[serde(default = "default_exa_base_url")]
    pub exa_base_url: String,
    /// Number of hits requested from Exa.
    #[serde(default = "default_exa_num_results")]
    pub exa_num_results: u32,
    /// Per-call HTTP timeout.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_minimax_base_url() -> String {
    "https://api.minimax.chat/v1/text/chatcompletion_v2".into()
}

fn default_minimax_model() -> String {
    "abab6.5s-chat".into()
}

fn default_exa_base_url() -> String {
    "https://api.exa.ai/search".into()
}

fn default_exa_num_results() -> u32 {
    5
}

fn default_request_timeout_seconds() -> u64 {
    60
}

fn default_queue_capacity() -> usize {
    64
}

fn default_db_path() -> PathBuf {
    PathBuf::from("research-core.db")
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            minimax_base_url: default_minimax_base_url(),
            minimax_model: default_minimax_model(),
            exa_base_url: default_exa_base_url(),
            exa_num_results: default_exa_num_results(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

/// Global configuration parsed from an optional `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Fixed session identifier; a fresh `sess_<uuid>` is generated when absent.
    #[serde(default)]
    pub session_id: Option<String>,
    /// `SQLite` database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Mode recorded on the session before any request sets one.
    #[serde(default)]
    pub default_mode: Mode,
    /// Handling of requests arriving while one is in flight.
    #[serde(default)]
    pub busy_policy: BusyPolicy,
    /// Maximum number of queued commands awaiting the worker.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Remote provider settings.
    #[serde(default)]
    pub providers: ProviderConfig,
    /// Credentials (populated at runtime).
    #[serde(skip)]
    pub credentials: Credentials,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            session_id: None,
            db_path: default_db_path(),
            default_mode: Mode::default(),
            busy_policy: BusyPolicy::default(),
            queue_capacity: default_queue_capacity(),
            providers: ProviderConfig::default(),
            credentials: Credentials::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Populate [`Credentials`] from the process environment.
    ///
    /// Unset or empty variables leave the corresponding key absent.
    pub fn load_credentials(&mut self) {
        self.credentials = Credentials {
            minimax: load_credential("MINIMAX_API_KEY"),
            openrouter: load_credential("OPENROUTER_API_KEY"),
            exa: load_credential("EXA_API_KEY"),
            tavily: load_credential("TAVILY_API_KEY"),
            firecrawl: load_credential("FIRECRAWL_API_KEY"),
            brave: load_credential("BRAVE_API_KEY"),
        };
    }

    /// Search tools with a configured credential, in preference order.
    #[must_use]
    pub fn available_search_tools(&self) -> Vec<&'static str> {
        let creds = &self.credentials;
        [
            ("exa", creds.exa.is_some()),
            ("tavily", creds.tavily.is_some()),
            ("firecrawl", creds.firecrawl.is_some()),
            ("brave", creds.brave.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }

    /// The configured session identifier, or a newly generated one.
    #[must_use]
    pub fn resolve_session_id(&self) -> String {
        self.session_id
            .clone()
            .unwrap_or_else(|| format!("sess_{}", Uuid::new_v4().simple()))
    }

    fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(AppError::Config(
                "queue_capacity must be greater than zero".into(),
            ));
        }

        if self.providers.request_timeout_seconds == 0 {
            return Err(AppError::Config(
                "request_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self
            .session_id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty())
        {
            return Err(AppError::Config("session_id must not be empty".into()));
        }

        Ok(())
    }
}

fn load_credential(env_key: &str) -> Option<ApiKey> {
    match env::var(env_key) {
        Ok(value) if !value.trim().is_empty() => Some(ApiKey::new(value)),
        _ => {
            debug!(key = env_key, "credential not set");
            None
        }
    }
}
