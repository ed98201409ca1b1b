//! HTTP transport seam used by the probe, the worker pool and the
//! single-stream path.
//!
//! A transport sends one ranged GET and hands back the response head plus a
//! lazily streamed body. The production implementation drives libcurl on a
//! dedicated thread; tests plug in in-memory transports.

mod body;
mod easy;
#[cfg(test)]
pub(crate) mod memory;

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use tokio_util::sync::CancellationToken;
use url::Url;

pub use easy::CurlTransport;

/// Byte range of a request, always rendered as `Range: bytes=...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// Inclusive `begin..=end`.
    Span { begin: u64, end: u64 },
    /// From `begin` to the end of the resource.
    From(u64),
}

impl ByteRange {
    /// HTTP Range header value, e.g. `bytes=0-0` or `bytes=1024-`.
    pub fn header_value(&self) -> String {
        format!("bytes={}", self.spec())
    }

    /// Range without the unit prefix; curl expects `start-end`, not `bytes=start-end`.
    pub(crate) fn spec(&self) -> String {
        match *self {
            ByteRange::Span { begin, end } => format!("{}-{}", begin, end),
            ByteRange::From(begin) => format!("{}-", begin),
        }
    }
}

/// A ranged GET against a resolved download URL.
#[derive(Debug, Clone)]
pub struct RangeRequest {
    pub url: Url,
    pub headers: HashMap<String, String>,
    pub range: ByteRange,
}

/// Response head plus streaming body. Dropping the body aborts the transfer.
pub struct Response {
    pub status: u32,
    pub headers: Vec<(String, String)>,
    pub body: Box<dyn Read + Send>,
}

impl Response {
    /// First header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("curl: {0}")]
    Curl(#[from] curl::Error),
    #[error("body read: {0}")]
    Io(#[from] std::io::Error),
    /// The transfer stopped because the cancellation token fired.
    #[error("transfer aborted")]
    Aborted,
    #[error("{0}")]
    Other(String),
}

/// Blocking HTTP transport. Implementations must return promptly once
/// `cancel` fires, both from `open` and from reads on the returned body.
pub trait Transport: Send + Sync {
    fn open(
        &self,
        request: &RangeRequest,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError>;
}
