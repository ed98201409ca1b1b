//! MP4 muxer with exactly one H264 and one AAC track, timescale 1000.
//!
//! Sample durations are not known until the next sample of the same track
//! arrives, so each track holds one frame back.

use mp4::{MediaConfig, Mp4Config, Mp4Sample, Mp4Writer, TrackConfig, TrackType};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::error::MergeError;
use super::frame::{CodecConfig, Frame, TrackKind};

/// All timestamps are milliseconds.
pub const OUTPUT_TIMESCALE: u32 = 1000;

/// Duration used for a track whose first sample has no successor yet.
fn default_duration(kind: TrackKind) -> u32 {
    match kind {
        TrackKind::Video => 33,
        TrackKind::Audio => 23,
    }
}

struct TrackState {
    id: u32,
    pending: Option<Frame>,
    last_duration: u32,
    samples: u64,
}

/// Sample counts of a finished output file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MuxSummary {
    pub video_samples: u64,
    pub audio_samples: u64,
    /// Inputs whose last tag was cut short and dropped.
    pub truncated_segments: Vec<PathBuf>,
}

pub struct Mp4Muxer {
    writer: Mp4Writer<BufWriter<File>>,
    path: PathBuf,
    video: Option<TrackState>,
    audio: Option<TrackState>,
    tracks_added: u32,
}

impl Mp4Muxer {
    /// Creates (truncates) `path` and writes the file header.
    pub fn create(path: &Path) -> Result<Self, MergeError> {
        let file = File::create(path)
            .map_err(|e| MergeError::io(format!("create {}", path.display()), e))?;
        let config = Mp4Config {
            major_brand: "isom".parse()?,
            minor_version: 512,
            compatible_brands: vec![
                "isom".parse()?,
                "iso2".parse()?,
                "avc1".parse()?,
                "mp41".parse()?,
            ],
            timescale: OUTPUT_TIMESCALE,
        };
        let writer = Mp4Writer::write_start(BufWriter::new(file), &config)?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            video: None,
            audio: None,
            tracks_added: 0,
        })
    }

    /// Opens the track for `config`'s kind. The first configuration of a kind
    /// wins; later ones (one per input segment) are ignored.
    pub fn configure(&mut self, config: &CodecConfig) -> Result<(), MergeError> {
        let kind = config.kind();
        let slot = match kind {
            TrackKind::Video => &mut self.video,
            TrackKind::Audio => &mut self.audio,
        };
        if slot.is_some() {
            return Ok(());
        }
        let (track_type, media_conf) = match config {
            CodecConfig::Video(c) => (TrackType::Video, MediaConfig::AvcConfig(c.clone())),
            CodecConfig::Audio(c) => (TrackType::Audio, MediaConfig::AacConfig(c.clone())),
        };
        self.writer.add_track(&TrackConfig {
            track_type,
            timescale: OUTPUT_TIMESCALE,
            language: "und".to_string(),
            media_conf,
        })?;
        // Track ids are assigned in the order tracks are added, starting at 1.
        self.tracks_added += 1;
        tracing::debug!(track = self.tracks_added, %kind, "opened output track");
        *slot = Some(TrackState {
            id: self.tracks_added,
            pending: None,
            last_duration: default_duration(kind),
            samples: 0,
        });
        Ok(())
    }

    /// Queues `frame` on its track and writes the previous frame of that track.
    pub fn write(&mut self, frame: Frame) -> Result<(), MergeError> {
        let kind = frame
            .codec
            .track_kind()
            .ok_or_else(|| MergeError::UnknownCodec(format!("{:?}", frame.codec)))?;
        let track = match kind {
            TrackKind::Video => self.video.as_mut(),
            TrackKind::Audio => self.audio.as_mut(),
        }
        .ok_or(MergeError::MissingConfig(kind))?;

        if let Some(prev) = track.pending.take() {
            let delta = frame.dts - prev.dts;
            // A reset (segment boundary) keeps the previous cadence.
            let duration = if delta > 0 {
                delta.min(u32::MAX as i64) as u32
            } else {
                track.last_duration
            };
            track.last_duration = duration;
            write_sample(&mut self.writer, track.id, prev, duration)?;
            track.samples += 1;
        }
        track.pending = Some(frame);
        Ok(())
    }

    /// Flushes held-back frames, writes the trailer and fsyncs the file.
    pub fn finish(self) -> Result<MuxSummary, MergeError> {
        let Mp4Muxer {
            mut writer,
            path,
            video,
            audio,
            ..
        } = self;
        let mut video = video.ok_or(MergeError::MissingTrack(TrackKind::Video))?;
        let mut audio = audio.ok_or(MergeError::MissingTrack(TrackKind::Audio))?;
        for track in [&mut video, &mut audio] {
            if let Some(frame) = track.pending.take() {
                write_sample(&mut writer, track.id, frame, track.last_duration)?;
                track.samples += 1;
            }
        }
        writer.write_end()?;

        let io_err = |e: std::io::Error| MergeError::io(format!("flush {}", path.display()), e);
        let mut out = writer.into_writer();
        out.flush().map_err(io_err)?;
        let file = out.into_inner().map_err(|e| io_err(e.into_error()))?;
        file.sync_all().map_err(io_err)?;
        Ok(MuxSummary {
            video_samples: video.samples,
            audio_samples: audio.samples,
            truncated_segments: Vec::new(),
        })
    }
}

fn write_sample(
    writer: &mut Mp4Writer<BufWriter<File>>,
    track_id: u32,
    frame: Frame,
    duration: u32,
) -> Result<(), MergeError> {
    let offset = (frame.pts - frame.dts).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    writer.write_sample(
        track_id,
        &Mp4Sample {
            start_time: frame.dts.max(0) as u64,
            duration,
            rendering_offset: offset,
            is_sync: frame.keyframe,
            bytes: frame.payload,
        },
    )?;
    Ok(())
}
