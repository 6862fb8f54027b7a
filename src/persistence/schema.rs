//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS` — safe to
//! re-run on every startup. Timestamps are epoch milliseconds.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// Creates the `sessions`, `requests`, and `tool_traces` tables
/// idempotently. Safe to call on every startup.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS sessions (
    id              TEXT PRIMARY KEY NOT NULL,
    mode            TEXT NOT NULL DEFAULT 'chat' CHECK(mode IN ('chat','plan','research')),
    created_at      INTEGER NOT NULL,
    updated_at      INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS requests (
    id                TEXT PRIMARY KEY NOT NULL,
    session_id        TEXT NOT NULL REFERENCES sessions(id),
    mode              TEXT NOT NULL CHECK(mode IN ('chat','plan','research')),
    user_content      TEXT NOT NULL,
    assistant_content TEXT,
    status            TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending','streaming','complete','error')),
    created_at        INTEGER NOT NULL,
    completed_at      INTEGER
);

CREATE TABLE IF NOT EXISTS tool_traces (
    id              TEXT PRIMARY KEY NOT NULL,
    request_id      TEXT NOT NULL REFERENCES requests(id),
    tool            TEXT NOT NULL,
    query           TEXT NOT NULL,
    success         INTEGER NOT NULL,
    summary         TEXT,
    created_at      INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_requests_session ON requests(session_id);
CREATE INDEX IF NOT EXISTS idx_tool_traces_request ON tool_traces(request_id);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
