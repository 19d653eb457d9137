//! Output Block Model
//!
//! One unit of session output: everything the shell produced between two
//! consecutive prompt matches, closing prompt included. Raw bytes are kept
//! exactly as received; text accessors are lossy views on top, so binary
//! output cannot corrupt the block itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// One completed block of session output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputBlock {
    /// Raw bytes as read from the transport, closing prompt included
    pub data: Vec<u8>,

    /// When the closing prompt was matched
    pub received_at: DateTime<Utc>,
}

impl OutputBlock {
    /// Create a block from the bytes of one completed frame
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            received_at: Utc::now(),
        }
    }

    /// Lossy text view of the block
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Consume the block into owned text
    pub fn into_text(self) -> String {
        match String::from_utf8(self.data) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }
    }

    /// Number of raw bytes in the block
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the block carries no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
