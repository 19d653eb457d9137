//! Error types and Result aliases for shellmux

use std::fmt;
use std::time::Duration;

use crate::config::ConfigError;

/// Result type alias for shellmux operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for shellmux
#[derive(Debug)]
pub enum Error {
    // === Framing errors ===
    /// Accumulated output grew past the frame ceiling without a prompt match
    FrameOverflow {
        buffered: usize,
        limit: usize,
    },

    /// No prompt matched within the response time budget
    PromptTimeout {
        limit: Duration,
    },

    // === Protocol errors ===
    /// The single pending-command slot is occupied
    Busy,

    /// The session has reached its terminal state
    SessionClosed,

    // === Configuration errors ===
    /// Component configuration failed validation
    Config(ConfigError),

    // === Matcher errors ===
    /// Regex compilation errors
    Regex(regex::Error),

    // === I/O errors ===
    /// Transport read or write failure
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Framing errors
            Error::FrameOverflow { buffered, limit } => {
                write!(
                    f,
                    "Frame buffer full before a prompt matched ({} bytes buffered, limit {})",
                    buffered, limit
                )
            }
            Error::PromptTimeout { limit } => {
                write!(f, "No prompt matched within {:?}", limit)
            }

            // Protocol errors
            Error::Busy => {
                write!(f, "A command is already pending")
            }
            Error::SessionClosed => {
                write!(f, "Session is closed")
            }

            // Configuration errors
            Error::Config(err) => write!(f, "Invalid configuration: {}", err),

            // Matcher errors
            Error::Regex(err) => write!(f, "Regex compilation error: {}", err),

            // I/O errors
            Error::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Regex(err)
    }
}
