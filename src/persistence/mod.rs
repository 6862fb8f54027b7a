//! Persistence layer modules.

pub mod db;
pub mod request_repo;
pub mod schema;
pub mod session_repo;
pub mod store;
pub mod tool_trace_repo;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;

pub use store::SessionStore;
