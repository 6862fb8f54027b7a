//! Output writer task.
//!
//! Receives finished JSON lines from the [`Emitter`](super::emitter::Emitter)
//! channel, appends `\n`, writes them to the output stream, and flushes
//! after every line so the client can act on each one as it arrives.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{AppError, Result};

/// Writer task: drain `line_rx` into `out` until every sender is dropped.
///
/// # Errors
///
/// Returns [`AppError::Io`]`("write failed: …")` if a write or flush fails
/// (e.g. the client closed the pipe). The receiver is dropped on return, so
/// every later `emit` fails with [`AppError::Io`] too.
pub async fn run_writer<W>(mut out: W, mut line_rx: mpsc::Receiver<String>) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    while let Some(line) = line_rx.recv().await {
        let mut bytes = line.into_bytes();
        bytes.push(b'\n');

        out.write_all(&bytes).await.map_err(|e| {
            warn!(error = %e, "output write failed");
            AppError::Io(format!("write failed: {e}"))
        })?;
        out.flush().await.map_err(|e| {
            warn!(error = %e, "output flush failed");
            AppError::Io(format!("flush failed: {e}"))
        })?;
    }

    debug!("line channel closed, writer stopping");
    Ok(())
}
