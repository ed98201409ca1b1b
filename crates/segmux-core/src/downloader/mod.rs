//! Per-item fetch engine.
//!
//! For each item: check what is already on disk, probe range support, then
//! fetch the remaining bytes either through one streaming request (small
//! remainders) or through the chunked worker pool, and finally rename the
//! partial file into place.

mod collect;
mod fetch;
mod pool;
mod single;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::chunker::plan_chunks;
use crate::config::SegmuxConfig;
use crate::error::DownloadError;
use crate::probe::{self, ProbeResult};
use crate::progress::ProgressReporter;
use crate::retry::ChunkError;
use crate::session::DownloadItem;
use crate::storage::{self, PartialFile, ResumeState};
use crate::transport::Transport;

/// Shared state for fetching the items of one session.
pub(crate) struct FetchContext {
    pub transport: Arc<dyn Transport>,
    pub reporter: Arc<ProgressReporter>,
    pub config: Arc<SegmuxConfig>,
    /// Session token; pools derive a child token per item.
    pub cancel: CancellationToken,
}

/// Probes an item on a blocking thread.
pub(crate) async fn probe_item(
    ctx: &FetchContext,
    item: &DownloadItem,
) -> Result<ProbeResult, DownloadError> {
    let transport = Arc::clone(&ctx.transport);
    let url = item.url.clone();
    let headers = item.headers.clone();
    let cancel = ctx.cancel.clone();
    tokio::task::spawn_blocking(move || probe::probe(&*transport, &url, &headers, &cancel))
        .await?
}

/// Fetches one item to `final_path` and returns that path.
///
/// `known` is a probe already made for this item (size resolution); it is
/// reused instead of probing again.
pub(crate) async fn fetch_item(
    ctx: &FetchContext,
    item: &DownloadItem,
    known: Option<ProbeResult>,
    final_path: &Path,
) -> Result<PathBuf, DownloadError> {
    let mut known = known;
    let size = match (item.expected_size, known) {
        (Some(size), _) => size,
        (None, Some(p)) => p.total_size,
        (None, None) => {
            let p = probe_item(ctx, item).await?;
            known = Some(p);
            p.total_size
        }
    };

    let path = final_path.to_path_buf();
    let state = tokio::task::spawn_blocking(move || storage::stat_expected_size(&path, size))
        .await?
        .map_err(|e| DownloadError::io(format!("stat {}", final_path.display()), e))?;

    match state {
        ResumeState::Complete => {
            tracing::info!(path = %final_path.display(), size, "already downloaded, skipping");
            ctx.reporter.skip(size);
            return Ok(final_path.to_path_buf());
        }
        ResumeState::PartialComplete => {
            tracing::info!(path = %final_path.display(), size, "partial file complete, finalizing");
            ctx.reporter.skip(size);
            let path = final_path.to_path_buf();
            return tokio::task::spawn_blocking(move || storage::finalize_partial(&path))
                .await?
                .map_err(|e| DownloadError::io(format!("finalize {}", final_path.display()), e));
        }
        ResumeState::Resume(_) | ResumeState::Fresh => {}
    }

    let probed = match known {
        Some(p) => p,
        None => probe_item(ctx, item).await?,
    };
    if probed.total_size != size {
        return Err(DownloadError::SizeMismatch {
            expected: size,
            actual: probed.total_size,
        });
    }

    let resume = match state {
        ResumeState::Resume(k) => k,
        _ => 0,
    };
    if resume > 0 {
        tracing::info!(path = %final_path.display(), resume, size, "resuming partial download");
    }
    ctx.reporter.skip(resume);
    ctx.reporter.begin_item();

    let path = final_path.to_path_buf();
    let file = tokio::task::spawn_blocking(move || PartialFile::open(&path, resume))
        .await?
        .map_err(|e| {
            DownloadError::io(
                format!("open {}", storage::partial_path(final_path).display()),
                e,
            )
        })?;

    let remaining = size - resume;
    let file = if remaining <= ctx.config.single_stream_threshold {
        tracing::debug!(url = %item.url, remaining, "single-stream fetch");
        single::run_single(ctx, item, file, size).await?
    } else {
        let chunks = plan_chunks(resume, size, ctx.config.chunk_size);
        tracing::debug!(url = %item.url, remaining, chunks = chunks.len(), "chunked fetch");
        pool::run_pool(ctx, item, file, chunks).await?
    };

    let finalized = tokio::task::spawn_blocking(move || file.finalize())
        .await?
        .map_err(|e| DownloadError::io(format!("finalize {}", final_path.display()), e))?;
    tracing::info!(path = %finalized.display(), size, "item complete");
    Ok(finalized)
}

/// Logs a retry and forwards it to the observer as a message.
fn report_retry(
    reporter: &ProgressReporter,
    what: &str,
    attempt: u32,
    err: &ChunkError,
    delay: Duration,
) {
    tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "{} failed, retrying", what);
    reporter.message(&format!(
        "{} failed ({}), retry {} in {:.1}s",
        what,
        err,
        attempt,
        delay.as_secs_f64()
    ));
}
