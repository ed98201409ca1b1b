//! One ranged GET for one chunk, buffered in memory.

use std::collections::HashMap;
use std::io::Read;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::chunker::Chunk;
use crate::retry::ChunkError;
use crate::transport::{RangeRequest, Transport, TransportError};

/// Fetches `chunk` and returns exactly `chunk.len()` bytes.
///
/// Blocking; workers call it from `spawn_blocking`.
pub(super) fn fetch_chunk(
    transport: &dyn Transport,
    url: &Url,
    headers: &HashMap<String, String>,
    chunk: &Chunk,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, ChunkError> {
    let request = RangeRequest {
        url: url.clone(),
        headers: headers.clone(),
        range: chunk.range(),
    };
    let mut response = transport.open(&request, cancel)?;
    if response.status != 206 {
        return Err(ChunkError::Status(response.status));
    }

    let expected = chunk.len();
    let mut payload = Vec::with_capacity(expected as usize);
    // One extra byte detects an oversized body.
    if let Err(e) = response.body.by_ref().take(expected + 1).read_to_end(&mut payload) {
        if cancel.is_cancelled() {
            return Err(ChunkError::Cancelled);
        }
        return Err(ChunkError::Transport(TransportError::Io(e)));
    }
    let received = payload.len() as u64;
    if received != expected {
        return Err(ChunkError::LengthMismatch { expected, received });
    }
    Ok(payload)
}
