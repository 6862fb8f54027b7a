#![forbid(unsafe_code)]

//! `research-core` binary: serves the NDJSON protocol on stdin/stdout.
//!
//! stdout carries protocol lines only; logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use research_core::config::GlobalConfig;
use research_core::engine::{ingest, ProtocolEngine};
use research_core::handlers::ModeHandlers;
use research_core::mode::Mode;
use research_core::persistence::{db, SessionStore};
use research_core::protocol::writer::run_writer;
use research_core::protocol::Emitter;
use research_core::providers::{build_llm_provider, build_search_provider};
use research_core::{AppError, Result};

/// Lines buffered between the emitter and the stdout writer.
const OUTPUT_BUFFER: usize = 256;

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "research-core", about = "NDJSON chat/plan/research engine over stdio", version, long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the database path.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Override the session id.
    #[arg(long)]
    session_id: Option<String>,

    /// Mode recorded for a session before its first request.
    #[arg(long, value_enum)]
    default_mode: Option<Mode>,

    /// Keep all state in memory; nothing is written to disk.
    #[arg(long, conflicts_with = "db")]
    memory: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("research-core bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match args.config {
        Some(ref path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(db_path) = args.db {
        config.db_path = db_path;
    }
    if let Some(mode) = args.default_mode {
        config.default_mode = mode;
    }
    if let Some(session_id) = args.session_id {
        config.session_id = Some(session_id);
    }
    config.load_credentials();
    let session_id = config.resolve_session_id();
    info!(
        session_id,
        search_tools = ?config.available_search_tools(),
        "configuration loaded"
    );

    // ── Initialize database ─────────────────────────────
    let db = if args.memory {
        db::connect_memory().await?
    } else {
        db::connect(&config.db_path).await?
    };
    let store = SessionStore::new(Arc::new(db));
    match store.recover_interrupted().await {
        Ok(0) => info!("no interrupted requests found on startup"),
        Ok(count) => warn!(count, "marked interrupted requests as error"),
        Err(err) => error!(%err, "startup recovery failed"),
    }

    // ── Providers and handlers ──────────────────────────
    let handlers = ModeHandlers::new(build_llm_provider(&config)?, build_search_provider(&config)?);

    // ── Output path ─────────────────────────────────────
    let (line_tx, line_rx) = mpsc::channel(OUTPUT_BUFFER);
    let writer_handle = tokio::spawn(run_writer(tokio::io::stdout(), line_rx));
    let emitter = Arc::new(Emitter::new(session_id, line_tx));
    let engine = Arc::new(ProtocolEngine::new(
        Arc::clone(&emitter),
        store,
        handlers,
        &config,
    ));

    emitter.emit_ready().await?;
    info!("ready");

    // ── Serve stdin until EOF or a shutdown signal ──────
    let ct = CancellationToken::new();
    let signal_ct = ct.clone();
    let signal_handle = tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        signal_ct.cancel();
    });

    let served = ingest::run(Arc::clone(&engine), tokio::io::stdin(), ct).await;
    signal_handle.abort();

    // Closing the last sender lets the writer drain and stop.
    drop(engine);
    drop(emitter);
    match writer_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!(%err, "output writer failed"),
        Err(err) => error!(%err, "output writer task panicked"),
    }

    served?;
    info!("research-core shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
