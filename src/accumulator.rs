//! Response Accumulator
//!
//! Sentinel-free companion to the multiplexer: no framing is attempted.
//! A reader pump moves raw chunks from the transport into a bounded queue;
//! an aggregator drains the queue into a growing text buffer and applies a
//! quiet-period policy to decide when the interesting output is over.
//! Useful when the remote side has no recognizable prompt, at the price of
//! giving up per-command boundaries.
//!
//! The handle returned by [`ResponseAccumulator::start`] can be polled for
//! the text seen so far at any point; there is no guarantee the buffer is
//! complete for any particular command.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::{AccumulatorConfig, QuietPolicy};
use crate::error::{Error, Result};
use crate::transport::TransportReader;

/// Where an accumulator session currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccumulatorStatus {
    /// Both tasks are live; the buffer may still grow
    Running,

    /// The quiet policy ended aggregation; the transport may still be open
    Idle,

    /// The transport closed cleanly
    Closed,

    /// The transport failed
    Failed { message: String },
}

impl AccumulatorStatus {
    /// True for every state except `Running`
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AccumulatorStatus::Running)
    }
}

/// Accumulates raw session output into a shared text buffer
///
/// Consumed by [`start`](Self::start); each instance drives one session.
/// Only the read capability of the transport is needed: the accumulator
/// never writes.
pub struct ResponseAccumulator {
    config: AccumulatorConfig,
    id: String,
}

impl ResponseAccumulator {
    /// Create an accumulator with the given configuration
    pub fn new(config: AccumulatorConfig) -> Self {
        Self {
            config,
            id: Uuid::new_v4().to_string(),
        }
    }

    /// Identifier used in this session's log lines
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Start pumping and aggregating the transport source
    ///
    /// # Errors
    /// Returns the validation error if the configuration is rejected.
    pub fn start<R: TransportReader>(self, reader: R) -> Result<AccumulatorHandle> {
        self.config.validate()?;

        let (chunk_tx, chunk_rx) = mpsc::channel::<Result<Vec<u8>>>(self.config.queue_depth);
        let (status_tx, status_rx) = watch::channel(AccumulatorStatus::Running);
        let buffer = Arc::new(RwLock::new(String::new()));

        info!(
            "Accumulator {}: started (chunk {} bytes, queue {} slots, quiet period {:?})",
            self.id, self.config.read_chunk_bytes, self.config.queue_depth, self.config.quiet_period
        );

        tokio::spawn(reader_pump(
            self.id.clone(),
            reader,
            self.config.read_chunk_bytes,
            chunk_tx,
        ));
        tokio::spawn(aggregator(
            self.id.clone(),
            self.config,
            chunk_rx,
            Arc::clone(&buffer),
            status_tx,
        ));

        Ok(AccumulatorHandle {
            buffer,
            status: status_rx,
            started_at: Utc::now(),
            id: self.id,
        })
    }
}

/// Live view over one accumulator session
#[derive(Debug, Clone)]
pub struct AccumulatorHandle {
    buffer: Arc<RwLock<String>>,
    status: watch::Receiver<AccumulatorStatus>,
    started_at: DateTime<Utc>,
    id: String,
}

impl AccumulatorHandle {
    /// Copy of the accumulated text so far
    pub async fn snapshot(&self) -> String {
        self.buffer.read().await.clone()
    }

    /// Current session status
    pub fn status(&self) -> AccumulatorStatus {
        self.status.borrow().clone()
    }

    /// True once aggregation has ended for any reason
    pub fn is_done(&self) -> bool {
        self.status.borrow().is_terminal()
    }

    /// Wait until aggregation ends, returning the terminal status
    pub async fn wait_done(&mut self) -> AccumulatorStatus {
        while !self.status.borrow_and_update().is_terminal() {
            if self.status.changed().await.is_err() {
                break;
            }
        }
        self.status.borrow().clone()
    }

    /// When the session was started
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Identifier used in this session's log lines
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Owns the transport source; forwards chunks until EOF or failure
async fn reader_pump<R: TransportReader>(
    id: String,
    mut reader: R,
    chunk_bytes: usize,
    chunks: mpsc::Sender<Result<Vec<u8>>>,
) {
    let mut chunk = vec![0u8; chunk_bytes];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => {
                debug!("Accumulator {}: transport EOF, reader pump exiting", id);
                break;
            }
            Ok(n) => {
                if chunks.send(Ok(chunk[..n].to_vec())).await.is_err() {
                    debug!("Accumulator {}: aggregator gone, reader pump exiting", id);
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                debug!("Accumulator {}: read interrupted, retrying", id);
            }
            Err(e) => {
                warn!("Accumulator {}: read failed: {}", id, e);
                let _ = chunks.send(Err(Error::Io(e))).await;
                break;
            }
        }
    }
}

/// Drains the chunk queue into the shared buffer under the quiet policy
async fn aggregator(
    id: String,
    config: AccumulatorConfig,
    mut chunks: mpsc::Receiver<Result<Vec<u8>>>,
    buffer: Arc<RwLock<String>>,
    status: watch::Sender<AccumulatorStatus>,
) {
    // Bytes held back because they end midway through a UTF-8 character.
    let mut pending: Vec<u8> = Vec::new();
    let mut idle_streak = 0u32;

    let end = loop {
        match timeout(config.quiet_period, chunks.recv()).await {
            Ok(Some(Ok(chunk))) => {
                idle_streak = 0;
                append_lossy(&buffer, &mut pending, &chunk).await;
            }
            Ok(Some(Err(cause))) => {
                break AccumulatorStatus::Failed {
                    message: cause.to_string(),
                };
            }
            Ok(None) => {
                debug!("Accumulator {}: chunk queue closed", id);
                break AccumulatorStatus::Closed;
            }
            Err(_) => match config.policy {
                QuietPolicy::StopAfterIdle { periods } => {
                    idle_streak += 1;
                    debug!("Accumulator {}: quiet period {}/{}", id, idle_streak, periods);
                    if idle_streak >= periods {
                        break AccumulatorStatus::Idle;
                    }
                }
                QuietPolicy::RunUntilClose => {}
            },
        }
    };

    // Whatever was held back is final now; decode it as-is.
    if !pending.is_empty() {
        let mut text = buffer.write().await;
        text.push_str(&String::from_utf8_lossy(&pending));
    }

    info!("Accumulator {}: aggregation finished ({:?})", id, end);
    let _ = status.send(end);
}

/// Append a chunk to the buffer, holding back a trailing split character
async fn append_lossy(buffer: &Arc<RwLock<String>>, pending: &mut Vec<u8>, chunk: &[u8]) {
    pending.extend_from_slice(chunk);
    let keep = utf8_boundary(pending);
    if keep == 0 {
        return;
    }
    let ready: Vec<u8> = pending.drain(..keep).collect();
    let mut text = buffer.write().await;
    text.push_str(&String::from_utf8_lossy(&ready));
}

/// Index of the last safe split point in `bytes`
///
/// Bytes past the returned index may be the head of a UTF-8 character whose
/// remainder has not arrived yet. Walks back from the end, at most the width
/// of one character; anything older than that cannot be a split in progress
/// and is passed through for the lossy decode to deal with.
fn utf8_boundary(bytes: &[u8]) -> usize {
    let mut i = bytes.len();
    while i > 0 && i > bytes.len().saturating_sub(4) {
        let b = bytes[i - 1];
        if b & 0x80 == 0 {
            // ASCII is always complete.
            return i;
        }
        if b & 0xC0 == 0x80 {
            // Continuation byte; keep walking back to its lead.
            i -= 1;
            continue;
        }
        let width = if b & 0xF8 == 0xF0 {
            4
        } else if b & 0xF0 == 0xE0 {
            3
        } else if b & 0xE0 == 0xC0 {
            2
        } else {
            // Invalid lead byte; nothing to wait for.
            return i;
        };
        let start = i - 1;
        return if bytes.len() - start >= width {
            start + width
        } else {
            start
        };
    }
    bytes.len()
}
