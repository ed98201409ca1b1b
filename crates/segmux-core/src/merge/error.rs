use std::io;

use super::frame::TrackKind;

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("mp4: {0}")]
    Mp4(#[from] mp4::Error),
    #[error("invalid FLV data: {0}")]
    InvalidFlv(String),
    #[error("invalid H264 SPS: {0}")]
    InvalidSps(String),
    /// A codec other than H264 video or AAC audio. Fatal for the whole merge.
    #[error("unknown codec: {0}")]
    UnknownCodec(String),
    #[error("{0} frame arrived before its codec configuration")]
    MissingConfig(TrackKind),
    #[error("output has no {0} track")]
    MissingTrack(TrackKind),
    #[error("unsupported input {path}: {reason}")]
    UnsupportedFormat { path: String, reason: String },
    #[error("merge cancelled")]
    Cancelled,
}

impl MergeError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        MergeError::Io {
            context: context.into(),
            source,
        }
    }
}
