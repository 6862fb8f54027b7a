//! Domain model module declarations.

use chrono::{DateTime, Utc};

use crate::{AppError, Result};

pub mod request;
pub mod session;
pub mod tool_trace;

/// Current time truncated to millisecond precision.
///
/// Persisted timestamps are epoch milliseconds; truncating at construction
/// keeps in-memory models equal to what a later read returns.
#[must_use]
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Convert stored epoch milliseconds back into a timestamp.
///
/// # Errors
///
/// Returns `AppError::Db` if the value is outside chrono's representable range.
pub(crate) fn from_millis(column: &str, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::Db(format!("invalid {column}: {millis}")))
}
