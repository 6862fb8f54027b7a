#![forbid(unsafe_code)]

//! `research-core`: a line-delimited JSON protocol engine for chat, plan,
//! and research requests over stdio.

pub mod config;
pub mod engine;
pub mod errors;
pub mod export;
pub mod handlers;
pub mod mode;
pub mod models;
pub mod persistence;
pub mod protocol;
pub mod providers;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
