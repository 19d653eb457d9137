//! Component Configuration
//!
//! Tunable settings for the shell multiplexer and the response accumulator.
//! Both components take their configuration at construction time and validate
//! it before any task is spawned; the transport itself carries no
//! configuration here.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the shell multiplexer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuxConfig {
    /// Ceiling on bytes buffered while waiting for a prompt match
    pub max_frame_bytes: usize,

    /// Size of each read from the transport source
    pub read_chunk_bytes: usize,

    /// Time budget for a submitted command to reach its prompt
    pub response_timeout: Duration,

    /// Completed blocks buffered before the read driver backpressures
    pub block_queue_depth: usize,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: 64 * 1024,
            read_chunk_bytes: 4096,
            response_timeout: Duration::from_secs(30),
            block_queue_depth: 32,
        }
    }
}

impl MuxConfig {
    /// Validate the multiplexer configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_chunk_bytes == 0 {
            return Err(ConfigError::InvalidChunkSize(self.read_chunk_bytes));
        }
        if self.max_frame_bytes < self.read_chunk_bytes {
            return Err(ConfigError::InvalidFrameCeiling(
                self.max_frame_bytes,
                self.read_chunk_bytes,
            ));
        }
        if self.block_queue_depth == 0 {
            return Err(ConfigError::InvalidQueueDepth(self.block_queue_depth));
        }
        if self.response_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("response_timeout"));
        }
        Ok(())
    }
}

/// Configuration for the response accumulator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccumulatorConfig {
    /// Size of each read from the transport source
    pub read_chunk_bytes: usize,

    /// Chunk queue slots between the reader pump and the aggregator
    pub queue_depth: usize,

    /// Interval with no chunks after which the quiet policy applies
    pub quiet_period: Duration,

    /// What to do when a full quiet period passes without data
    pub policy: QuietPolicy,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            read_chunk_bytes: 1024,
            queue_depth: 1024,
            quiet_period: Duration::from_secs(1),
            policy: QuietPolicy::default(),
        }
    }
}

impl AccumulatorConfig {
    /// Validate the accumulator configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_chunk_bytes == 0 {
            return Err(ConfigError::InvalidChunkSize(self.read_chunk_bytes));
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::InvalidQueueDepth(self.queue_depth));
        }
        if self.quiet_period.is_zero() {
            return Err(ConfigError::ZeroDuration("quiet_period"));
        }
        if let QuietPolicy::StopAfterIdle { periods: 0 } = self.policy {
            return Err(ConfigError::InvalidIdlePeriods(0));
        }
        Ok(())
    }
}

/// Aggregator behavior when a quiet period elapses with no new chunks
///
/// The accumulator must end somehow even though the byte stream it watches
/// has no framing. `StopAfterIdle` treats sustained silence as the end of
/// the interesting output; `RunUntilClose` treats silence as a slow session
/// and keeps the buffer open until the transport itself closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuietPolicy {
    /// Stop aggregating after this many consecutive quiet periods
    StopAfterIdle { periods: u32 },

    /// Never stop on silence; only a transport close ends aggregation
    RunUntilClose,
}

impl Default for QuietPolicy {
    fn default() -> Self {
        QuietPolicy::StopAfterIdle { periods: 1 }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid read chunk size: {0} (must be at least 1 byte)")]
    InvalidChunkSize(usize),

    #[error("Invalid frame ceiling: {0} (must be at least the read chunk size, {1})")]
    InvalidFrameCeiling(usize, usize),

    #[error("Invalid queue depth: {0} (must be at least 1 slot)")]
    InvalidQueueDepth(usize),

    #[error("Invalid {0}: duration must be non-zero")]
    ZeroDuration(&'static str),

    #[error("Invalid idle period count: {0} (must be at least 1)")]
    InvalidIdlePeriods(u32),
}
