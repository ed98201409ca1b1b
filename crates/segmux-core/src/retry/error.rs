//! Fetch error type for retry decisions.

use std::fmt;

use crate::transport::TransportError;

/// Error returned by a single chunk (or single-stream) fetch attempt.
#[derive(Debug)]
pub enum ChunkError {
    /// Connection, curl or body read failure.
    Transport(TransportError),
    /// Anything other than 206 Partial Content.
    Status(u32),
    /// Body ended with the wrong number of bytes (e.g. server closed early).
    LengthMismatch { expected: u64, received: u64 },
    /// Writing fetched bytes to disk failed. Never retried.
    Storage(std::io::Error),
    /// The item or session was cancelled. Never retried.
    Cancelled,
}

impl ChunkError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ChunkError::Cancelled | ChunkError::Storage(_))
    }
}

impl From<TransportError> for ChunkError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Aborted => ChunkError::Cancelled,
            other => ChunkError::Transport(other),
        }
    }
}

impl fmt::Display for ChunkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkError::Transport(e) => write!(f, "{}", e),
            ChunkError::Status(code) => write!(f, "HTTP {} (expected 206)", code),
            ChunkError::LengthMismatch { expected, received } => {
                write!(f, "length mismatch: expected {} bytes, got {}", expected, received)
            }
            ChunkError::Storage(e) => write!(f, "storage: {}", e),
            ChunkError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for ChunkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChunkError::Transport(e) => Some(e),
            ChunkError::Storage(e) => Some(e),
            ChunkError::Status(_) | ChunkError::LengthMismatch { .. } | ChunkError::Cancelled => {
                None
            }
        }
    }
}
