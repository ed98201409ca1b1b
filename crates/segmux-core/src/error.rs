//! Item- and session-level error taxonomy.
//!
//! Chunk-level failures (`ChunkError`) are retried inside the worker pool and
//! only surface here once retries are exhausted. Cancellation has its own
//! variant so callers can tell a user stop apart from a failure.

use std::io;

use crate::merge::MergeError;
use crate::retry::ChunkError;
use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The 1-byte probe could not be sent or its response could not be read.
    #[error("range probe for {url} failed: {source}")]
    Probe {
        url: String,
        #[source]
        source: TransportError,
    },
    /// The probe was answered, but not with a usable partial-content response.
    #[error("server does not support range requests for {url}: {reason}")]
    RangeUnsupported { url: String, reason: String },
    /// A chunk still failed after all retries.
    #[error("chunk {index} (bytes {begin}-{end}) failed: {source}")]
    Chunk {
        index: usize,
        begin: u64,
        end: u64,
        #[source]
        source: ChunkError,
    },
    /// The single-stream fetch failed after all retries.
    #[error("stream from offset {offset} failed: {source}")]
    Stream {
        offset: u64,
        #[source]
        source: ChunkError,
    },
    /// Disk write/seek/sync/rename failure. Never retried.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    /// The caller-supplied size disagrees with the probed total.
    #[error("expected {expected} bytes but server reports {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("session has no download items")]
    NoItems,
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error("download cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

impl DownloadError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        DownloadError::Io {
            context: context.into(),
            source,
        }
    }

    /// True when the session was stopped on purpose rather than by a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            DownloadError::Cancelled | DownloadError::Merge(MergeError::Cancelled)
        )
    }
}

impl From<tokio::task::JoinError> for DownloadError {
    fn from(e: tokio::task::JoinError) -> Self {
        DownloadError::Internal(format!("task join: {}", e))
    }
}
