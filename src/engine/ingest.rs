//! Input ingestion: the single reader of the command stream.
//!
//! The reader answers `heartbeat` and `abort` on the spot so they work
//! while a request is streaming. Every other command goes into a bounded
//! FIFO consumed by one worker task, so no two requests interleave their
//! events. Under [`BusyPolicy::Reject`] a request that arrives while another
//! is queued or running is refused instead of queued.
//!
//! Malformed, oversized, and unknown lines are logged and skipped.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ProtocolEngine;
use crate::config::BusyPolicy;
use crate::protocol::codec::NdjsonCodec;
use crate::protocol::{parse_command, Command};
use crate::{AppError, Result};

/// Ids of requests accepted but not yet finished, queued or running.
#[derive(Debug, Default)]
struct InFlight(Mutex<Vec<String>>);

impl InFlight {
    async fn contains(&self, request_id: &str) -> bool {
        self.0.lock().await.iter().any(|id| id == request_id)
    }

    async fn is_empty(&self) -> bool {
        self.0.lock().await.is_empty()
    }

    async fn insert(&self, request_id: &str) {
        self.0.lock().await.push(request_id.to_owned());
    }

    async fn remove(&self, request_id: &str) {
        let mut ids = self.0.lock().await;
        if let Some(pos) = ids.iter().position(|id| id == request_id) {
            ids.remove(pos);
        }
    }
}

/// Read commands from `input` until EOF or `cancel`, then drain the queue.
///
/// On EOF every queued command still runs. On cancellation the active
/// request is aborted and queued commands are dropped.
///
/// # Errors
///
/// Returns [`AppError::Io`] if the output stream closes; the process
/// cannot continue without it.
pub async fn run<R>(engine: Arc<ProtocolEngine>, input: R, cancel: CancellationToken) -> Result<()>
where
    R: AsyncRead + Unpin + Send,
{
    let stop = cancel.child_token();
    let in_flight = Arc::new(InFlight::default());
    let (queue_tx, queue_rx) = mpsc::channel(engine.queue_capacity());

    let worker = tokio::spawn(run_worker(
        Arc::clone(&engine),
        queue_rx,
        Arc::clone(&in_flight),
        stop.clone(),
    ));

    let mut reader = Reader {
        engine: &engine,
        queue_tx,
        in_flight: &in_flight,
        backlog: VecDeque::new(),
    };
    let read_result = reader.read_commands(input, &stop).await;
    drop(reader);

    if read_result.is_err() {
        stop.cancel();
    }
    if stop.is_cancelled() {
        engine.abort(None).await;
    }

    let worker_result = worker
        .await
        .map_err(|e| AppError::Io(format!("worker task failed: {e}")))?;

    read_result?;
    worker_result
}

/// The input side: parses lines, answers control commands inline, and
/// feeds the worker queue.
///
/// Commands that find the queue full wait in `backlog` so the reader keeps
/// reading `heartbeat` and `abort`. The backlog holds at most the queue's
/// capacity; beyond that requests are refused as busy.
struct Reader<'a> {
    engine: &'a ProtocolEngine,
    queue_tx: mpsc::Sender<Command>,
    in_flight: &'a InFlight,
    backlog: VecDeque<Command>,
}

impl Reader<'_> {
    async fn read_commands<R>(&mut self, input: R, stop: &CancellationToken) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut framed = FramedRead::new(input, NdjsonCodec::new());
        // FramedRead yields one `None` right after a decode error; the stream
        // itself is still open.
        let mut after_codec_error = false;
        let mut input_done = false;

        loop {
            if input_done && self.backlog.is_empty() {
                return Ok(());
            }

            let item = tokio::select! {
                biased;
                () = stop.cancelled() => {
                    info!("shutdown requested, input reader stopping");
                    return Ok(());
                }
                permit = self.queue_tx.reserve(), if !self.backlog.is_empty() => {
                    let Ok(permit) = permit else {
                        debug!("command queue closed, input reader stopping");
                        return Ok(());
                    };
                    if let Some(command) = self.backlog.pop_front() {
                        permit.send(command);
                    }
                    continue;
                }
                item = framed.next(), if !input_done => item,
            };

            let line = match item {
                None if after_codec_error => {
                    after_codec_error = false;
                    continue;
                }
                None => {
                    debug!(backlog = self.backlog.len(), "input closed");
                    input_done = true;
                    continue;
                }
                Some(Err(AppError::Codec(msg))) => {
                    warn!(error = %msg, "skipping oversized input line");
                    after_codec_error = true;
                    continue;
                }
                Some(Err(err)) => {
                    warn!(error = %err, "input stream failed, stopping");
                    input_done = true;
                    continue;
                }
                Some(Ok(line)) => line,
            };
            after_codec_error = false;

            let command = match parse_command(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(err) => {
                    warn!(error = %err, "skipping malformed input line");
                    continue;
                }
            };

            if !self.accept(command).await? {
                debug!("command queue closed, input reader stopping");
                return Ok(());
            }
        }
    }

    /// Handle or enqueue one command. Returns `false` once the queue is closed.
    async fn accept(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::Heartbeat => {
                self.engine.handle_command(Command::Heartbeat).await?;
                return Ok(true);
            }
            Command::Abort { request_id } => {
                self.engine.abort(request_id.as_deref()).await;
                return Ok(true);
            }
            _ => {}
        }

        let request_id = command.dispatched_request_id().map(str::to_owned);
        if let Some(ref request_id) = request_id {
            if self.engine.busy_policy() == BusyPolicy::Reject && !self.in_flight.is_empty().await {
                self.refuse(request_id).await?;
                return Ok(true);
            }
        }

        if self.backlog.is_empty() {
            match self.queue_tx.try_reserve() {
                Ok(permit) => {
                    if let Some(ref request_id) = request_id {
                        self.in_flight.insert(request_id).await;
                    }
                    permit.send(command);
                    return Ok(true);
                }
                Err(TrySendError::Closed(())) => return Ok(false),
                Err(TrySendError::Full(())) => {}
            }
        }
        self.push_backlog(command, request_id.as_deref()).await
    }

    async fn push_backlog(&mut self, command: Command, request_id: Option<&str>) -> Result<bool> {
        if self.backlog.len() >= self.engine.queue_capacity() {
            match request_id {
                Some(request_id) => self.refuse(request_id).await?,
                None => warn!(command = ?command, "command backlog full, dropping"),
            }
            return Ok(true);
        }
        if let Some(request_id) = request_id {
            self.in_flight.insert(request_id).await;
        }
        debug!(backlog = self.backlog.len() + 1, "command queue full, holding");
        self.backlog.push_back(command);
        Ok(true)
    }

    /// Answer a request that cannot be accepted now.
    ///
    /// A request reusing the id of one still queued or running is dropped
    /// without output: an envelope under that id would interleave with the
    /// live request's sequence.
    async fn refuse(&self, request_id: &str) -> Result<()> {
        if self.in_flight.contains(request_id).await {
            warn!(request_id, "request id already in flight, dropping");
            return Ok(());
        }
        self.engine.reject_busy(request_id).await
    }
}

async fn run_worker(
    engine: Arc<ProtocolEngine>,
    mut queue_rx: mpsc::Receiver<Command>,
    in_flight: Arc<InFlight>,
    stop: CancellationToken,
) -> Result<()> {
    loop {
        let command = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            command = queue_rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        let finished = command.dispatched_request_id().map(str::to_owned);
        let result = engine.handle_command(command).await;
        if let Some(request_id) = finished {
            in_flight.remove(&request_id).await;
        }

        if let Err(err) = result {
            warn!(error = %err, "output lost, stopping worker");
            stop.cancel();
            return Err(err);
        }
    }

    debug!("command worker stopped");
    Ok(())
}
