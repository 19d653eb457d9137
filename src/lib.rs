//! ShellMux - session multiplexing over raw byte transports
//!
//! This library turns any duplex byte transport attached to an interactive
//! shell-like session into a structured exchange: commands go down the write
//! half, and the read half is cut into per-command response blocks by
//! watching for the session's prompt.
//!
//! ## Features
//!
//! - **Sentinel framing:** Output is grouped into blocks ending at a prompt
//! - **Single-flight dispatch:** One command on the wire at a time, so
//!   blocks always pair with commands in submission order
//! - **Pluggable matchers:** Suffix and regex prompt detection, or any
//!   closure over the frame buffer
//! - **Typed close causes:** Transport failures, frame overflows, and
//!   response timeouts arrive as the final item of the block sequence
//! - **Quiet-period fallback:** A prompt-free accumulator for sessions with
//!   no recognizable sentinel
//!
//! ## Module Organization
//!
//! - [`mux`] - Shell multiplexer: command/block exchange over a transport
//! - [`accumulator`] - Response accumulator: quiet-period text aggregation
//! - [`sentinel`] - Prompt matchers that delimit response frames
//! - [`config`] - Component configuration and validation
//! - [`models`] - Data structures (OutputBlock)
//! - [`transport`] - Capability traits required of transport halves
//! - [`mod@error`] - Error types and Result alias
//!
//! ## Quick Start
//!
//! ```no_run
//! use shellmux::{MuxConfig, ShellMultiplexer};
//!
//! # #[tokio::main]
//! # async fn main() -> shellmux::Result<()> {
//! // Any transport with independent read and write halves works; a local
//! // duplex pipe stands in for a real session here.
//! let (session, _peer) = tokio::io::duplex(4096);
//!
//! let mux = ShellMultiplexer::new(MuxConfig::default());
//! let (commands, mut blocks) = mux.attach(session)?;
//!
//! commands.submit("ls").await?;
//! if let Some(block) = blocks.recv().await {
//!     println!("{}", block?.text());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Each component spawns two tokio tasks around the transport:
//!
//! - **Write driver:** Owns the transport sink, writes one command per turn
//! - **Read driver:** Owns the transport source, frames output into blocks
//!
//! The accumulator pairs a reader pump with an aggregator the same way.
//! Tasks share nothing; every hand-off is a bounded `tokio::mpsc` channel,
//! so a slow consumer backpressures the transport instead of growing a
//! queue without limit.
//!
//! ## Safety and Reliability
//!
//! - **No panics:** All fallible operations return `Result`
//! - **Bounded buffers:** Frame and queue ceilings are enforced, never grown
//! - **Typed failures:** Every close has a cause a caller can match on

#![allow(unexpected_cfgs)]

#[macro_use]
extern crate tracing;

pub mod config;
pub mod error;

// Core modules
pub mod accumulator;
pub mod mux;
pub mod sentinel;
pub mod transport;

// Model modules
pub mod models;

// Re-exports for core functionality
pub use accumulator::{AccumulatorHandle, AccumulatorStatus, ResponseAccumulator};
pub use config::{AccumulatorConfig, ConfigError, MuxConfig, QuietPolicy};
pub use error::{Error, Result};
pub use mux::{CommandSender, OutputBlocks, ShellMultiplexer};

// Convenience re-exports for common types
pub use models::OutputBlock;
pub use sentinel::{PromptMatcher, RegexMatcher, SuffixMatcher};

// Version information
/// The current version of ShellMux from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The library name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// The library description from Cargo.toml
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
