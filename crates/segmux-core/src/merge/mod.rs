//! Remux completed segments into a single MP4 file.
//!
//! Streaming segments (FLV) are read in fixed-size blocks and pushed through
//! [`FlvDemuxer`]; indexed segments (MP4) are pulled packet by packet through
//! [`IndexedDemuxer`]. Every frame goes to one [`Mp4Muxer`] holding exactly
//! one H264 and one AAC track. Timestamps are forwarded as-is.

mod error;
mod flv;
mod frame;
mod indexed;
mod muxer;
mod sps;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::MergeError;
pub use flv::FlvDemuxer;
pub use frame::{AacConfig, AvcConfig, CodecConfig, CodecId, DemuxEvent, Frame, TrackKind};
pub use indexed::{IndexedDemuxer, Packet};
pub use muxer::{Mp4Muxer, MuxSummary, OUTPUT_TIMESCALE};
pub use sps::{parse_sps, SpsInfo};

use std::fmt;
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

/// Container of a downloaded segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Streaming container, demuxed by pushing byte blocks.
    Flv,
    /// Indexed container, demuxed by pulling packets.
    Mp4,
}

impl ContainerKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerKind::Flv => "flv",
            ContainerKind::Mp4 => "mp4",
        }
    }

    /// Kind from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ContainerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flv" => Ok(ContainerKind::Flv),
            "mp4" => Ok(ContainerKind::Mp4),
            other => Err(format!("unknown container {:?} (expected flv or mp4)", other)),
        }
    }
}

/// A completed segment on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFile {
    pub path: PathBuf,
    pub container: ContainerKind,
    pub size: u64,
}

impl SegmentFile {
    pub fn new(path: &Path, container: ContainerKind) -> Result<Self, MergeError> {
        let size = fs::metadata(path)
            .map_err(|e| MergeError::io(format!("stat {}", path.display()), e))?
            .len();
        Ok(Self {
            path: path.to_path_buf(),
            container,
            size,
        })
    }

    /// Segment whose container is inferred from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, MergeError> {
        let container =
            ContainerKind::from_path(path).ok_or_else(|| MergeError::UnsupportedFormat {
                path: path.display().to_string(),
                reason: "expected a .flv or .mp4 file".to_string(),
            })?;
        Self::new(path, container)
    }
}

/// Demux → mux driver. Blocking; run it on a blocking thread.
#[derive(Debug, Clone, Copy)]
pub struct MergePipeline {
    block_size: usize,
}

impl MergePipeline {
    /// `block_size` is the read size for streaming segments.
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
        }
    }

    /// Merges `segments` in order into `output`.
    ///
    /// `progress` receives consumed input bytes over total input bytes, after
    /// every block (streaming) or every segment (indexed). On error the
    /// partial output is left in place.
    pub fn run(
        &self,
        segments: &[SegmentFile],
        output: &Path,
        progress: &mut dyn FnMut(f64),
        cancel: &CancellationToken,
    ) -> Result<MuxSummary, MergeError> {
        if segments.is_empty() {
            return Err(MergeError::UnsupportedFormat {
                path: output.display().to_string(),
                reason: "no input segments".to_string(),
            });
        }
        let total: u64 = segments.iter().map(|s| s.size).sum();
        let fraction = |consumed: u64| {
            if total == 0 {
                1.0
            } else {
                (consumed as f64 / total as f64).min(1.0)
            }
        };

        let mut muxer = Mp4Muxer::create(output)?;
        let mut consumed = 0u64;
        let mut truncated = Vec::new();
        for (index, segment) in segments.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(MergeError::Cancelled);
            }
            tracing::debug!(index, path = %segment.path.display(), container = %segment.container, "merging segment");
            match segment.container {
                ContainerKind::Flv => {
                    let dropped = self.merge_streaming(segment, &mut muxer, cancel, &mut |n| {
                        consumed += n;
                        progress(fraction(consumed));
                    })?;
                    if dropped > 0 {
                        truncated.push(segment.path.clone());
                    }
                }
                ContainerKind::Mp4 => {
                    merge_indexed(segment, &mut muxer, cancel)?;
                    consumed += segment.size;
                    progress(fraction(consumed));
                }
            }
        }
        if cancel.is_cancelled() {
            return Err(MergeError::Cancelled);
        }
        let mut summary = muxer.finish()?;
        summary.truncated_segments = truncated;
        tracing::info!(
            output = %output.display(),
            segments = segments.len(),
            video = summary.video_samples,
            audio = summary.audio_samples,
            truncated = summary.truncated_segments.len(),
            "merge complete"
        );
        Ok(summary)
    }

    /// Returns the number of trailing bytes dropped as a truncated tag.
    fn merge_streaming(
        &self,
        segment: &SegmentFile,
        muxer: &mut Mp4Muxer,
        cancel: &CancellationToken,
        on_block: &mut dyn FnMut(u64),
    ) -> Result<usize, MergeError> {
        let path = &segment.path;
        let mut file =
            File::open(path).map_err(|e| MergeError::io(format!("open {}", path.display()), e))?;
        let mut demuxer = FlvDemuxer::new();
        let mut buf = vec![0u8; self.block_size];
        loop {
            if cancel.is_cancelled() {
                return Err(MergeError::Cancelled);
            }
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(MergeError::io(format!("read {}", path.display()), e)),
            };
            demuxer.input(&buf[..n], &mut |event| apply(muxer, event))?;
            on_block(n as u64);
        }
        demuxer.finish()
    }
}

fn merge_indexed(
    segment: &SegmentFile,
    muxer: &mut Mp4Muxer,
    cancel: &CancellationToken,
) -> Result<(), MergeError> {
    let mut demuxer = IndexedDemuxer::open(&segment.path)?;
    loop {
        if cancel.is_cancelled() {
            return Err(MergeError::Cancelled);
        }
        let Some(packet) = demuxer.read_packet()? else {
            return Ok(());
        };
        if let Some(config) = packet.config {
            muxer.configure(&config)?;
        }
        muxer.write(packet.frame)?;
    }
}

fn apply(muxer: &mut Mp4Muxer, event: DemuxEvent) -> Result<(), MergeError> {
    match event {
        DemuxEvent::Config(config) => muxer.configure(&config),
        DemuxEvent::Frame(frame) => muxer.write(frame),
    }
}
