//! Bounded worker pool: round-robin dispatch, per-worker capacity-1 queues,
//! and an ordered collector on a blocking thread.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::collect::{collect_in_order, ChunkResult, CollectError};
use super::fetch::fetch_chunk;
use super::{report_retry, FetchContext};
use crate::chunker::Chunk;
use crate::error::DownloadError;
use crate::progress::ProgressReporter;
use crate::retry::{retry_with_backoff, ChunkError, RetryPolicy};
use crate::session::DownloadItem;
use crate::storage::PartialFile;
use crate::transport::{Transport, TransportError};

/// First permanent failure of the pool. Later failures (including the
/// cancellations it triggers) never overwrite it.
type FailureSlot = Arc<Mutex<Option<DownloadError>>>;

/// Everything a worker needs to fetch chunks of one item.
struct WorkerShared {
    transport: Arc<dyn Transport>,
    url: Url,
    headers: HashMap<String, String>,
    policy: RetryPolicy,
    reporter: Arc<ProgressReporter>,
    cancel: CancellationToken,
    failure: FailureSlot,
}

/// Downloads `chunks` into `file` and returns the file with every chunk written.
pub(super) async fn run_pool(
    ctx: &FetchContext,
    item: &DownloadItem,
    file: PartialFile,
    chunks: Vec<Chunk>,
) -> Result<PartialFile, DownloadError> {
    if chunks.is_empty() {
        return Ok(file);
    }
    let worker_count = ctx.config.workers.clamp(1, chunks.len());
    let item_cancel = ctx.cancel.child_token();
    let failure: FailureSlot = Arc::new(Mutex::new(None));
    let shared = Arc::new(WorkerShared {
        transport: Arc::clone(&ctx.transport),
        url: item.url.clone(),
        headers: item.headers.clone(),
        policy: ctx.config.retry_policy(),
        reporter: Arc::clone(&ctx.reporter),
        cancel: item_cancel.clone(),
        failure: Arc::clone(&failure),
    });

    let mut chunk_txs = Vec::with_capacity(worker_count);
    let mut result_rxs = Vec::with_capacity(worker_count);
    let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(worker_count + 1);
    for id in 0..worker_count {
        let (chunk_tx, chunk_rx) = mpsc::channel::<Chunk>(1);
        let (result_tx, result_rx) = mpsc::channel::<ChunkResult>(1);
        chunk_txs.push(chunk_tx);
        result_rxs.push(result_rx);
        handles.push(tokio::spawn(worker(id, Arc::clone(&shared), chunk_rx, result_tx)));
    }
    let chunk_count = chunks.len();
    handles.push(tokio::spawn(dispatch(chunks, chunk_txs, item_cancel.clone())));

    let reporter = Arc::clone(&ctx.reporter);
    let collector_cancel = item_cancel.clone();
    let collected = tokio::task::spawn_blocking(move || {
        collect_in_order(file, chunk_count, result_rxs, &reporter, &collector_cancel)
    })
    .await;

    // Success or not, nothing else should run for this item.
    item_cancel.cancel();
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "chunk worker task failed");
        }
    }

    match collected? {
        Ok(file) => Ok(file),
        Err(CollectError::Write(source)) => Err(DownloadError::Io {
            context: "write partial file".to_string(),
            source,
        }),
        Err(CollectError::Interrupted) => {
            if ctx.cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            let root = failure
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            Err(root.unwrap_or_else(|| {
                DownloadError::Internal("worker pool stopped without an error".to_string())
            }))
        }
    }
}

/// Hands chunks out round-robin: chunk `i` goes to worker `i % n`.
async fn dispatch(
    chunks: Vec<Chunk>,
    chunk_txs: Vec<mpsc::Sender<Chunk>>,
    cancel: CancellationToken,
) {
    let n = chunk_txs.len();
    for chunk in chunks {
        let tx = &chunk_txs[chunk.index % n];
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            sent = tx.send(chunk) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}

async fn worker(
    id: usize,
    shared: Arc<WorkerShared>,
    mut chunk_rx: mpsc::Receiver<Chunk>,
    result_tx: mpsc::Sender<ChunkResult>,
) {
    loop {
        let chunk = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return,
            next = chunk_rx.recv() => match next {
                Some(chunk) => chunk,
                None => return,
            },
        };
        tracing::debug!(worker = id, index = chunk.index, begin = chunk.begin, end = chunk.end, "fetching chunk");

        let outcome = fetch_with_retry(&shared, chunk).await;
        let payload = match outcome {
            Ok(payload) => payload,
            Err(ChunkError::Cancelled) => return,
            Err(source) => {
                tracing::error!(worker = id, index = chunk.index, error = %source, "chunk failed permanently");
                let mut slot = shared.failure.lock().unwrap_or_else(PoisonError::into_inner);
                if slot.is_none() {
                    *slot = Some(DownloadError::Chunk {
                        index: chunk.index,
                        begin: chunk.begin,
                        end: chunk.end,
                        source,
                    });
                }
                drop(slot);
                shared.cancel.cancel();
                return;
            }
        };

        tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return,
            sent = result_tx.send(ChunkResult { chunk, payload }) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}

async fn fetch_with_retry(shared: &Arc<WorkerShared>, chunk: Chunk) -> Result<Vec<u8>, ChunkError> {
    let what = format!("chunk {} (bytes {}-{})", chunk.index, chunk.begin, chunk.end);
    retry_with_backoff(
        &shared.policy,
        &shared.cancel,
        |_attempt| {
            let shared = Arc::clone(shared);
            async move {
                tokio::task::spawn_blocking(move || {
                    fetch_chunk(
                        &*shared.transport,
                        &shared.url,
                        &shared.headers,
                        &chunk,
                        &shared.cancel,
                    )
                })
                .await
                .unwrap_or_else(|e| {
                    Err(ChunkError::Transport(TransportError::Other(format!(
                        "fetch task: {}",
                        e
                    ))))
                })
            }
        },
        |attempt, err, delay| report_retry(&shared.reporter, &what, attempt, err, delay),
    )
    .await
}
