//! One session from start to finish: size resolution, per-item fetch, merge
//! and cleanup, bracketed by the observer's running-state events.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::layout::SessionLayout;
use super::SessionRequest;
use crate::config::SegmuxConfig;
use crate::downloader::{self, FetchContext};
use crate::error::DownloadError;
use crate::merge::{ContainerKind, MergePipeline, SegmentFile};
use crate::observer::Observer;
use crate::probe::ProbeResult;
use crate::progress::ProgressReporter;
use crate::transport::Transport;

pub(super) struct SessionParts {
    pub transport: Arc<dyn Transport>,
    pub observer: Arc<dyn Observer>,
    pub config: Arc<SegmuxConfig>,
    pub cancel: CancellationToken,
}

/// Runs the session and reports its outcome. Cancellation is logged but
/// never reported through `on_error`.
pub(super) async fn run_session(
    parts: SessionParts,
    request: SessionRequest,
) -> Result<PathBuf, DownloadError> {
    let observer = Arc::clone(&parts.observer);
    observer.on_running_state_changed(true);
    tracing::info!(name = %request.name, items = request.items.len(), "session started");

    let result = execute(parts, request).await;
    match &result {
        Ok(path) => {
            tracing::info!(output = %path.display(), "session finished");
            observer.on_finished(path);
        }
        Err(e) if e.is_cancelled() => tracing::info!("session cancelled"),
        Err(e) => {
            tracing::error!(error = %e, "session failed");
            observer.on_error(&e.to_string());
        }
    }
    observer.on_running_state_changed(false);
    result
}

async fn execute(parts: SessionParts, request: SessionRequest) -> Result<PathBuf, DownloadError> {
    let items = request.items;
    if items.is_empty() {
        return Err(DownloadError::NoItems);
    }
    let layout = SessionLayout::new(&request.destination_dir, &request.name, items.len());
    let segment_dir = layout.segment_dir();
    tokio::task::spawn_blocking({
        let dir = segment_dir.clone();
        move || fs::create_dir_all(dir)
    })
    .await?
    .map_err(|e| DownloadError::io(format!("create {}", segment_dir.display()), e))?;

    let reporter = Arc::new(ProgressReporter::new(Arc::clone(&parts.observer), 0));
    let ctx = FetchContext {
        transport: parts.transport,
        reporter: Arc::clone(&reporter),
        config: Arc::clone(&parts.config),
        cancel: parts.cancel.clone(),
    };

    // Every size must be known before progress can be reported as a fraction.
    let count = items.len();
    let mut known: Vec<Option<ProbeResult>> = Vec::with_capacity(count);
    let mut sizes = Vec::with_capacity(count);
    for (i, item) in items.iter().enumerate() {
        match item.expected_size {
            Some(size) => {
                sizes.push(size);
                known.push(None);
            }
            None => {
                reporter.message(&format!("Probing item {}/{}", i + 1, count));
                let probed = downloader::probe_item(&ctx, item).await?;
                tracing::debug!(index = i, size = probed.total_size, "resolved item size");
                sizes.push(probed.total_size);
                known.push(Some(probed));
            }
        }
    }
    reporter.set_total(sizes.iter().sum());

    let mut segments = Vec::with_capacity(count);
    for (i, (item, probed)) in items.iter().zip(known).enumerate() {
        if ctx.cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        reporter.message(&format!("Downloading item {}/{}", i + 1, count));
        let path = layout.segment_path(i, item.container);
        let path = downloader::fetch_item(&ctx, item, probed, &path).await?;
        segments.push(SegmentFile {
            path,
            container: item.container,
            size: sizes[i],
        });
    }

    let containers: Vec<ContainerKind> = segments.iter().map(|s| s.container).collect();
    if !layout.needs_merge(&containers) {
        return Ok(segments.remove(0).path);
    }

    reporter.message("Merging segments");
    reporter.set_fraction(0.0);
    let output = layout.merged_path();
    let pipeline = MergePipeline::new(parts.config.merge_block_size);
    let merge_cancel = parts.cancel.child_token();
    let summary = tokio::task::spawn_blocking({
        let reporter = Arc::clone(&reporter);
        let output = output.clone();
        let segments = segments.clone();
        move || {
            pipeline.run(
                &segments,
                &output,
                &mut |fraction| reporter.set_fraction(fraction),
                &merge_cancel,
            )
        }
    })
    .await??;
    for path in &summary.truncated_segments {
        let name = path.file_name().unwrap_or(path.as_os_str()).to_string_lossy();
        reporter.message(&format!("Segment {} ends with a truncated tag; its tail was dropped", name));
    }
    tracing::info!(
        output = %output.display(),
        video = summary.video_samples,
        audio = summary.audio_samples,
        "segments merged"
    );

    if !parts.config.keep_segments {
        let work_dir = layout.work_dir();
        tokio::task::spawn_blocking(move || remove_segments(work_dir.as_deref(), &segments))
            .await?;
    }
    Ok(output)
}

/// Best-effort removal of intermediate files; failures are only logged.
fn remove_segments(work_dir: Option<&Path>, segments: &[SegmentFile]) {
    match work_dir {
        Some(dir) => {
            if let Err(e) = fs::remove_dir_all(dir) {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to remove work directory");
                return;
            }
            // Only succeeds when no other session left files there.
            if let Some(parent) = dir.parent() {
                let _ = fs::remove_dir(parent);
            }
        }
        None => {
            for segment in segments {
                if let Err(e) = fs::remove_file(&segment.path) {
                    tracing::warn!(path = %segment.path.display(), error = %e, "failed to remove segment");
                }
            }
        }
    }
}
