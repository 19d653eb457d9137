//! Transport Capability Bounds
//!
//! The multiplexer and accumulator never open a connection themselves; a
//! session driver hands them an already-live duplex byte stream (for an
//! interactive shell, typically a pty attached to a remote process). This
//! module pins down the two halves of that stream as trait bounds so any
//! reader/writer pair qualifies: network streams, pty masters, or in-memory
//! duplex pipes in tests.

use tokio::io::{AsyncRead, AsyncWrite};

/// Read capability of a session transport
///
/// Blanket-implemented for every async reader that can move onto the read
/// driver task. The drivers never assume a chunk size or arrival cadence
/// from it.
pub trait TransportReader: AsyncRead + Unpin + Send + 'static {}

impl<T> TransportReader for T where T: AsyncRead + Unpin + Send + 'static {}

/// Write-and-close capability of a session transport
///
/// Shutdown is the close half of the capability: the write driver shuts the
/// sink down when the session ends so the remote side sees EOF on its input.
pub trait TransportWriter: AsyncWrite + Unpin + Send + 'static {}

impl<T> TransportWriter for T where T: AsyncWrite + Unpin + Send + 'static {}
