//! Shell Multiplexer
//!
//! Turns a raw duplex byte stream attached to an interactive shell into a
//! command-in / block-out exchange. Commands go down one channel; completed
//! output blocks come back on another, framed by a prompt matcher. Exactly
//! one command is in flight at a time: the write driver holds the next
//! command until the read driver has seen the prompt that closes the
//! previous one, so blocks always come back in submission order.
//!
//! ## Task layout
//!
//! `start` spawns two tasks. The write driver owns the transport sink and
//! consumes turn tokens; the read driver owns the transport source, the
//! frame buffer, and the in-flight flag, and releases one turn per answered
//! command. They share nothing else; every hand-off is a bounded channel.
//!
//! ```text
//! CommandSender --commands--> [write driver] --bytes--> transport sink
//! [read driver] --turn token--> [write driver]
//! [write driver] --in-flight notice / write fault--> [read driver]
//! transport source --bytes--> [read driver] --blocks, terminal cause--> OutputBlocks
//! ```
//!
//! A session that prints a banner and prompt before the first command (a
//! login shell greeting) produces a leading block with no matching command;
//! callers scripting such a shell read and discard it.

use std::fmt;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::MuxConfig;
use crate::error::{Error, Result};
use crate::models::OutputBlock;
use crate::sentinel::{PromptMatcher, SuffixMatcher};
use crate::transport::{TransportReader, TransportWriter};

/// Multiplexes one interactive shell session into commands and blocks
///
/// Construction picks the configuration and prompt matcher; [`start`]
/// validates them, spawns the two driver tasks, and hands back the channel
/// endpoints. The multiplexer itself is consumed: each instance drives
/// exactly one session.
///
/// [`start`]: ShellMultiplexer::start
pub struct ShellMultiplexer {
    config: MuxConfig,
    matcher: Box<dyn PromptMatcher>,
    id: String,
}

impl ShellMultiplexer {
    /// Create a multiplexer with the default `"$ "` prompt suffix
    pub fn new(config: MuxConfig) -> Self {
        Self::with_matcher(config, SuffixMatcher::default())
    }

    /// Create a multiplexer with a specific prompt matcher
    pub fn with_matcher(config: MuxConfig, matcher: impl PromptMatcher + 'static) -> Self {
        Self {
            config,
            matcher: Box::new(matcher),
            id: Uuid::new_v4().to_string(),
        }
    }

    /// Identifier used in this session's log lines
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Start driving a transport given as separate halves
    ///
    /// Returns the command and block endpoints. The drivers run until the
    /// transport closes, a read or write fails, a frame overflows, or a
    /// command goes unanswered past the response timeout; the terminal
    /// cause arrives as the final item of the block sequence.
    ///
    /// # Errors
    /// Returns the validation error if the configuration is rejected.
    pub fn start<R, W>(self, reader: R, writer: W) -> Result<(CommandSender, OutputBlocks)>
    where
        R: TransportReader,
        W: TransportWriter,
    {
        self.config.validate()?;

        let (command_tx, command_rx) = mpsc::channel::<String>(1);
        let (block_tx, block_rx) =
            mpsc::channel::<Result<OutputBlock>>(self.config.block_queue_depth);
        let (dispatch_tx, dispatch_rx) = mpsc::channel::<()>(1);
        let (fault_tx, fault_rx) = mpsc::channel::<Error>(1);

        // Turn tokens gate command writes. Seed one so the first command
        // goes out immediately; the shell starts at a prompt.
        let (turn_tx, turn_rx) = mpsc::channel::<()>(1);
        let _ = turn_tx.try_send(());

        info!(
            "Multiplexer {}: session started (frame ceiling {} bytes, response timeout {:?})",
            self.id, self.config.max_frame_bytes, self.config.response_timeout
        );

        tokio::spawn(write_driver(
            self.id.clone(),
            writer,
            command_rx,
            turn_rx,
            dispatch_tx,
            fault_tx,
        ));
        tokio::spawn(read_driver(
            self.id,
            reader,
            self.config,
            self.matcher,
            block_tx,
            turn_tx,
            dispatch_rx,
            fault_rx,
        ));

        Ok((
            CommandSender {
                commands: command_tx,
            },
            OutputBlocks { blocks: block_rx },
        ))
    }

    /// Start driving a combined duplex stream, splitting it internally
    pub fn attach<T>(self, stream: T) -> Result<(CommandSender, OutputBlocks)>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        self.start(reader, writer)
    }
}

impl fmt::Debug for ShellMultiplexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellMultiplexer")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Submits commands to a running multiplexer
///
/// Clonable; all clones share the same single-slot pending queue, so the
/// one-command-in-flight protocol holds across clones.
#[derive(Debug, Clone)]
pub struct CommandSender {
    commands: mpsc::Sender<String>,
}

impl CommandSender {
    /// Queue one command line; the trailing newline is appended here
    ///
    /// Waits while the pending slot is occupied.
    ///
    /// # Errors
    /// Returns [`Error::SessionClosed`] once the session is terminal.
    pub async fn submit(&self, command: impl AsRef<str>) -> Result<()> {
        let line = format!("{}\n", command.as_ref());
        self.commands
            .send(line)
            .await
            .map_err(|_| Error::SessionClosed)
    }

    /// Queue one command line without waiting
    ///
    /// # Errors
    /// Returns [`Error::Busy`] while the pending slot is occupied, or
    /// [`Error::SessionClosed`] once the session is terminal.
    pub fn try_submit(&self, command: impl AsRef<str>) -> Result<()> {
        let line = format!("{}\n", command.as_ref());
        match self.commands.try_send(line) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(Error::Busy),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(Error::SessionClosed),
        }
    }

    /// True once the session no longer accepts commands
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Receives completed output blocks from a running multiplexer
///
/// The sequence ends with `None`. A session that failed delivers its typed
/// cause as a final `Some(Err(_))` item first; a session that closed
/// cleanly just ends. Also usable as a [`futures::Stream`].
#[derive(Debug)]
pub struct OutputBlocks {
    blocks: mpsc::Receiver<Result<OutputBlock>>,
}

impl OutputBlocks {
    /// Next completed block, or the terminal cause, or `None` at the end
    pub async fn recv(&mut self) -> Option<Result<OutputBlock>> {
        self.blocks.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv)
    ///
    /// Unlike [`recv`](Self::recv), the end of the sequence is an error
    /// here, so a poller can tell a quiet session (`Ok(None)`) from a
    /// finished one.
    ///
    /// # Errors
    /// The typed terminal cause while it is pending, then
    /// [`Error::SessionClosed`] once the sequence is over and drained.
    pub fn try_recv(&mut self) -> Result<Option<OutputBlock>> {
        match self.blocks.try_recv() {
            Ok(Ok(block)) => Ok(Some(block)),
            Ok(Err(cause)) => Err(cause),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(Error::SessionClosed),
        }
    }
}

impl Stream for OutputBlocks {
    type Item = Result<OutputBlock>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.blocks.poll_recv(cx)
    }
}

/// Owns the transport sink; writes one command per turn token
async fn write_driver<W: TransportWriter>(
    id: String,
    mut writer: W,
    mut commands: mpsc::Receiver<String>,
    mut turns: mpsc::Receiver<()>,
    dispatched: mpsc::Sender<()>,
    faults: mpsc::Sender<Error>,
) {
    loop {
        // A closed turn channel means the read driver is gone.
        if turns.recv().await.is_none() {
            debug!("Multiplexer {}: turn channel closed, write driver stopping", id);
            break;
        }
        let line = tokio::select! {
            line = commands.recv() => match line {
                Some(line) => line,
                // All command senders dropped: nothing more will ever arrive.
                None => {
                    debug!("Multiplexer {}: command channel closed, write driver stopping", id);
                    break;
                }
            },
            // The read driver dropped its notice receiver; the session is
            // over and no further command could ever be answered.
            _ = dispatched.closed() => {
                debug!("Multiplexer {}: read driver gone, write driver stopping", id);
                break;
            }
        };
        // Arm the read driver before any byte hits the wire so the response
        // cannot race the notice.
        if dispatched.send(()).await.is_err() {
            debug!("Multiplexer {}: read driver gone, write driver stopping", id);
            break;
        }
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            error!("Multiplexer {}: write failed: {}", id, e);
            let _ = faults.send(Error::Io(e)).await;
            break;
        }
        if let Err(e) = writer.flush().await {
            error!("Multiplexer {}: flush failed: {}", id, e);
            let _ = faults.send(Error::Io(e)).await;
            break;
        }
        debug!("Multiplexer {}: command dispatched ({} bytes)", id, line.len());
    }

    // Close capability: the remote side sees EOF on its input.
    if let Err(e) = writer.shutdown().await {
        debug!("Multiplexer {}: sink shutdown failed: {}", id, e);
    }
    debug!("Multiplexer {}: write driver exiting", id);
}

/// Owns the transport source and the frame buffer; emits completed blocks
#[allow(clippy::too_many_arguments)]
async fn read_driver<R: TransportReader>(
    id: String,
    mut reader: R,
    config: MuxConfig,
    matcher: Box<dyn PromptMatcher>,
    blocks: mpsc::Sender<Result<OutputBlock>>,
    turns: mpsc::Sender<()>,
    mut dispatched: mpsc::Receiver<()>,
    mut faults: mpsc::Receiver<Error>,
) {
    let mut frame: Vec<u8> = Vec::with_capacity(config.read_chunk_bytes);
    let mut chunk = vec![0u8; config.read_chunk_bytes];
    let mut in_flight = false;
    let mut deadline: Option<Instant> = None;
    let mut writer_alive = true;

    let cause: Option<Error> = loop {
        // Pending forever while no command is awaiting its prompt.
        let at = deadline;
        let prompt_deadline = async move {
            match at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;

            fault = faults.recv(), if writer_alive => {
                match fault {
                    Some(cause) => break Some(cause),
                    // Write driver exited normally; keep draining output.
                    None => writer_alive = false,
                }
            }

            notice = dispatched.recv(), if writer_alive => {
                if notice.is_some() {
                    in_flight = true;
                    deadline = Some(Instant::now() + config.response_timeout);
                }
            }

            _ = prompt_deadline => {
                warn!(
                    "Multiplexer {}: no prompt within {:?}, closing session",
                    id, config.response_timeout
                );
                break Some(Error::PromptTimeout {
                    limit: config.response_timeout,
                });
            }

            result = reader.read(&mut chunk) => match result {
                Ok(0) => {
                    debug!("Multiplexer {}: transport EOF", id);
                    break None;
                }
                Ok(n) => {
                    frame.extend_from_slice(&chunk[..n]);
                    if matcher.matches(&frame) {
                        let block = OutputBlock::new(mem::take(&mut frame));
                        debug!("Multiplexer {}: block complete ({} bytes)", id, block.len());
                        if blocks.send(Ok(block)).await.is_err() {
                            debug!(
                                "Multiplexer {}: block receiver dropped, read driver stopping",
                                id
                            );
                            break None;
                        }
                        if in_flight {
                            in_flight = false;
                            deadline = None;
                            let _ = turns.try_send(());
                        }
                    } else if frame.len() > config.max_frame_bytes {
                        warn!(
                            "Multiplexer {}: {} bytes buffered without a prompt (limit {})",
                            id,
                            frame.len(),
                            config.max_frame_bytes
                        );
                        break Some(Error::FrameOverflow {
                            buffered: frame.len(),
                            limit: config.max_frame_bytes,
                        });
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                    debug!("Multiplexer {}: read interrupted, retrying", id);
                }
                Err(e) => {
                    warn!("Multiplexer {}: read failed: {}", id, e);
                    break Some(Error::Io(e));
                }
            }
        }
    };

    if !frame.is_empty() {
        debug!(
            "Multiplexer {}: discarding {} unframed bytes at close",
            id,
            frame.len()
        );
    }
    if let Some(cause) = cause {
        let _ = blocks.send(Err(cause)).await;
    }
    info!("Multiplexer {}: session closed", id);
}
