//! `segmux merge` – remux segment files already on disk.

use anyhow::{Context, Result};
use segmux_core::config::SegmuxConfig;
use segmux_core::{MergePipeline, SegmentFile};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

pub async fn run_merge(cfg: &SegmuxConfig, output: &Path, inputs: &[PathBuf]) -> Result<()> {
    let segments = inputs
        .iter()
        .map(|p| SegmentFile::from_path(p))
        .collect::<Result<Vec<_>, _>>()?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let pipeline = MergePipeline::new(cfg.merge_block_size);
    let out = output.to_path_buf();
    let summary = tokio::task::spawn_blocking(move || {
        let mut last_pct = None;
        pipeline.run(
            &segments,
            &out,
            &mut |fraction| {
                let pct = (fraction * 100.0) as u32;
                if last_pct != Some(pct) {
                    last_pct = Some(pct);
                    eprint!("\r  merging {:>3}%", pct);
                    let _ = std::io::stderr().flush();
                }
            },
            &cancel,
        )
    })
    .await?;
    watcher.abort();
    eprintln!();

    let summary = summary.with_context(|| format!("merge into {} failed", output.display()))?;
    for path in &summary.truncated_segments {
        eprintln!("warning: {} ends with a truncated tag; its tail was dropped", path.display());
    }
    println!(
        "merged {} segment(s) into {} ({} video / {} audio samples)",
        inputs.len(),
        output.display(),
        summary.video_samples,
        summary.audio_samples
    );
    Ok(())
}
