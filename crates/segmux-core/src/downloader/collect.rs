//! Ordered commit of chunk payloads to the partial file.

use std::io;
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;

use crate::chunker::Chunk;
use crate::progress::ProgressReporter;
use crate::storage::PartialFile;

/// A fetched chunk on its way to the collector. Failures never travel this
/// way; they go to the pool's failure slot and close the worker's queue.
#[derive(Debug)]
pub(super) struct ChunkResult {
    pub chunk: Chunk,
    /// Exactly `chunk.len()` bytes.
    pub payload: Vec<u8>,
}

#[derive(Debug)]
pub(super) enum CollectError {
    /// A worker queue closed before its chunk arrived (failure or cancellation).
    Interrupted,
    Write(io::Error),
}

/// Reads results strictly in chunk-index order (chunk `i` from queue `i % n`)
/// and appends each payload to `file`. Blocking.
///
/// On a write error the item token is cancelled so the workers stop.
pub(super) fn collect_in_order(
    mut file: PartialFile,
    chunk_count: usize,
    mut result_rxs: Vec<Receiver<ChunkResult>>,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<PartialFile, CollectError> {
    let n = result_rxs.len();
    for index in 0..chunk_count {
        let result = match result_rxs[index % n].blocking_recv() {
            Some(r) => r,
            None => return Err(CollectError::Interrupted),
        };
        if result.chunk.index != index {
            // Dispatch is round-robin, so a worker can only deliver its own chunks.
            tracing::error!(expected = index, got = result.chunk.index, "chunk delivered out of order");
            cancel.cancel();
            return Err(CollectError::Interrupted);
        }
        if let Err(e) = file.write_all(&result.payload) {
            cancel.cancel();
            return Err(CollectError::Write(e));
        }
        reporter.advance(result.payload.len() as u64);
    }
    Ok(file)
}
