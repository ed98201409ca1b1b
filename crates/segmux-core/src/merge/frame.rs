//! Demuxed frames and codec configurations.

use bytes::Bytes;
use std::fmt;

pub use mp4::{AacConfig, AvcConfig};

/// Output track a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Video => f.write_str("video"),
            TrackKind::Audio => f.write_str("audio"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecId {
    H264,
    Aac,
    /// Anything else, with a description for the error message.
    Unsupported(String),
}

impl CodecId {
    pub fn track_kind(&self) -> Option<TrackKind> {
        match self {
            CodecId::H264 => Some(TrackKind::Video),
            CodecId::Aac => Some(TrackKind::Audio),
            CodecId::Unsupported(_) => None,
        }
    }
}

/// Decoder configuration a track needs before its first sample.
#[derive(Debug, Clone)]
pub enum CodecConfig {
    Video(AvcConfig),
    Audio(AacConfig),
}

impl CodecConfig {
    pub fn kind(&self) -> TrackKind {
        match self {
            CodecConfig::Video(_) => TrackKind::Video,
            CodecConfig::Audio(_) => TrackKind::Audio,
        }
    }
}

/// One access unit. Timestamps are milliseconds.
#[derive(Debug, Clone)]
pub struct Frame {
    pub codec: CodecId,
    /// H264: 4-byte length-prefixed NAL units. AAC: one raw frame.
    pub payload: Bytes,
    pub pts: i64,
    pub dts: i64,
    pub keyframe: bool,
}

/// Output of a demuxer, in the order it must reach the muxer.
#[derive(Debug, Clone)]
pub enum DemuxEvent {
    Config(CodecConfig),
    Frame(Frame),
}
