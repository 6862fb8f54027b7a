//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// Output or input stream failure.
    Io(String),
    /// Line framing failure on the inbound stream.
    Codec(String),
    /// Protocol contract violation (bad event fields, emission after a terminal event).
    Protocol(String),
    /// LLM completion provider failure.
    Provider(String),
    /// Web-search provider failure.
    Search(String),
    /// `emit` was called with no request context open.
    NoActiveRequest,
    /// A request with this identifier has already been recorded.
    DuplicateRequestId(String),
    /// No request with this identifier exists.
    UnknownRequestId(String),
    /// The requested status change is not permitted from the current status.
    InvalidTransition(String),
    /// Requested entity does not exist.
    NotFound(String),
}

impl AppError {
    /// Whether this error ends the process rather than a single request.
    ///
    /// Only a broken output stream is fatal: nothing further can be
    /// delivered to the client once stdout is gone.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Codec(msg) => write!(f, "codec: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Provider(msg) => write!(f, "provider: {msg}"),
            Self::Search(msg) => write!(f, "search: {msg}"),
            Self::NoActiveRequest => write!(f, "no active request"),
            Self::DuplicateRequestId(id) => write!(f, "duplicate request id: {id}"),
            Self::UnknownRequestId(id) => write!(f, "unknown request id: {id}"),
            Self::InvalidTransition(msg) => write!(f, "invalid transition: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("json: {err}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Provider(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
