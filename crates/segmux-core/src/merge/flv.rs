//! Push-based FLV demuxer.
//!
//! Bytes are fed in arbitrary blocks; each complete tag is turned into zero or
//! more events delivered synchronously to the caller's callback. Incomplete
//! data is buffered until the next `input`.

use bytes::Bytes;
use mp4::{AacConfig, AudioObjectType, AvcConfig, ChannelConfig, SampleFreqIndex};

use super::error::MergeError;
use super::frame::{CodecConfig, CodecId, DemuxEvent, Frame};
use super::sps;

const FLV_HEADER_LEN: usize = 9;
const TAG_HEADER_LEN: usize = 11;
const PREV_TAG_SIZE_LEN: usize = 4;

const TAG_AUDIO: u8 = 8;
const TAG_VIDEO: u8 = 9;
const TAG_SCRIPT: u8 = 18;

const SOUND_FORMAT_AAC: u8 = 10;
const VIDEO_CODEC_AVC: u8 = 7;
const VIDEO_FRAME_KEY: u8 = 1;
const VIDEO_FRAME_INFO: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    /// Skip the rest of an extended header (`data_offset > 9`).
    SkipHeader(usize),
    PrevTagSize,
    Tag,
}

#[derive(Debug)]
pub struct FlvDemuxer {
    buf: Vec<u8>,
    state: State,
    tags: u64,
}

impl Default for FlvDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl FlvDemuxer {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            state: State::Header,
            tags: 0,
        }
    }

    /// Number of complete tags parsed so far.
    pub fn tag_count(&self) -> u64 {
        self.tags
    }

    /// Feeds the next block of the file.
    pub fn input(
        &mut self,
        data: &[u8],
        on_event: &mut dyn FnMut(DemuxEvent) -> Result<(), MergeError>,
    ) -> Result<(), MergeError> {
        let mut buf = std::mem::take(&mut self.buf);
        buf.extend_from_slice(data);
        let result = self.consume(&buf, on_event);
        let used = *result.as_ref().unwrap_or(&0);
        buf.drain(..used);
        self.buf = buf;
        result.map(|_| ())
    }

    /// Signals end of input. Returns the number of bytes of a truncated
    /// trailing tag that were dropped.
    pub fn finish(&self) -> Result<usize, MergeError> {
        if self.state == State::Header {
            return Err(MergeError::InvalidFlv("missing FLV header".to_string()));
        }
        if !self.buf.is_empty() {
            tracing::warn!(bytes = self.buf.len(), "ignoring truncated trailing FLV tag");
        }
        Ok(self.buf.len())
    }

    /// Parses as much of `buf` as possible; returns the number of bytes used.
    fn consume(
        &mut self,
        buf: &[u8],
        on_event: &mut dyn FnMut(DemuxEvent) -> Result<(), MergeError>,
    ) -> Result<usize, MergeError> {
        let mut pos = 0;
        loop {
            let avail = &buf[pos..];
            match self.state {
                State::Header => {
                    if avail.len() < FLV_HEADER_LEN {
                        break;
                    }
                    if &avail[..3] != b"FLV" {
                        return Err(MergeError::InvalidFlv("bad signature".to_string()));
                    }
                    let data_offset = u32::from_be_bytes([avail[5], avail[6], avail[7], avail[8]]) as usize;
                    if data_offset < FLV_HEADER_LEN {
                        return Err(MergeError::InvalidFlv(format!("data offset {}", data_offset)));
                    }
                    pos += FLV_HEADER_LEN;
                    self.state = State::SkipHeader(data_offset - FLV_HEADER_LEN);
                }
                State::SkipHeader(n) => {
                    let step = n.min(avail.len());
                    pos += step;
                    if step < n {
                        self.state = State::SkipHeader(n - step);
                        break;
                    }
                    self.state = State::PrevTagSize;
                }
                State::PrevTagSize => {
                    if avail.len() < PREV_TAG_SIZE_LEN {
                        break;
                    }
                    pos += PREV_TAG_SIZE_LEN;
                    self.state = State::Tag;
                }
                State::Tag => {
                    if avail.len() < TAG_HEADER_LEN {
                        break;
                    }
                    let size = u24(&avail[1..4]) as usize;
                    if avail.len() < TAG_HEADER_LEN + size {
                        break;
                    }
                    let tag_type = avail[0] & 0x1f;
                    let timestamp = (u24(&avail[4..7]) | (avail[7] as u32) << 24) as i64;
                    let body = &avail[TAG_HEADER_LEN..TAG_HEADER_LEN + size];
                    self.handle_tag(tag_type, timestamp, body, on_event)?;
                    self.tags += 1;
                    pos += TAG_HEADER_LEN + size;
                    self.state = State::PrevTagSize;
                }
            }
        }
        Ok(pos)
    }

    fn handle_tag(
        &mut self,
        tag_type: u8,
        timestamp: i64,
        body: &[u8],
        on_event: &mut dyn FnMut(DemuxEvent) -> Result<(), MergeError>,
    ) -> Result<(), MergeError> {
        match tag_type {
            TAG_AUDIO => audio_tag(timestamp, body, on_event),
            TAG_VIDEO => video_tag(timestamp, body, on_event),
            TAG_SCRIPT => Ok(()),
            other => {
                tracing::debug!(tag_type = other, "skipping unknown FLV tag");
                Ok(())
            }
        }
    }
}

fn audio_tag(
    timestamp: i64,
    body: &[u8],
    on_event: &mut dyn FnMut(DemuxEvent) -> Result<(), MergeError>,
) -> Result<(), MergeError> {
    let Some(&flags) = body.first() else {
        return Ok(());
    };
    let format = flags >> 4;
    if format != SOUND_FORMAT_AAC {
        return Err(MergeError::UnknownCodec(format!("FLV sound format {}", format)));
    }
    if body.len() < 2 {
        return Err(MergeError::InvalidFlv("short AAC tag".to_string()));
    }
    match body[1] {
        0 => on_event(DemuxEvent::Config(CodecConfig::Audio(parse_audio_specific_config(
            &body[2..],
        )?))),
        _ if body.len() > 2 => on_event(DemuxEvent::Frame(Frame {
            codec: CodecId::Aac,
            payload: Bytes::copy_from_slice(&body[2..]),
            pts: timestamp,
            dts: timestamp,
            keyframe: true,
        })),
        _ => Ok(()),
    }
}

fn video_tag(
    timestamp: i64,
    body: &[u8],
    on_event: &mut dyn FnMut(DemuxEvent) -> Result<(), MergeError>,
) -> Result<(), MergeError> {
    let Some(&flags) = body.first() else {
        return Ok(());
    };
    let frame_type = flags >> 4;
    let codec = flags & 0x0f;
    if frame_type == VIDEO_FRAME_INFO {
        return Ok(());
    }
    if codec != VIDEO_CODEC_AVC {
        return Err(MergeError::UnknownCodec(format!("FLV video codec {}", codec)));
    }
    if body.len() < 5 {
        return Err(MergeError::InvalidFlv("short AVC tag".to_string()));
    }
    let composition_time = i24(&body[2..5]);
    let data = &body[5..];
    match body[1] {
        0 => on_event(DemuxEvent::Config(CodecConfig::Video(parse_avc_config(data)?))),
        1 if !data.is_empty() => on_event(DemuxEvent::Frame(Frame {
            codec: CodecId::H264,
            payload: Bytes::copy_from_slice(data),
            pts: timestamp + composition_time,
            dts: timestamp,
            keyframe: frame_type == VIDEO_FRAME_KEY,
        })),
        // End of sequence, or an empty NALU packet.
        _ => Ok(()),
    }
}

/// Object type (5 bits), frequency index (4 bits), channel configuration (4 bits).
pub(crate) fn parse_audio_specific_config(data: &[u8]) -> Result<AacConfig, MergeError> {
    if data.len() < 2 {
        return Err(MergeError::InvalidFlv("short AudioSpecificConfig".to_string()));
    }
    let object_type = data[0] >> 3;
    let freq_index = ((data[0] & 0x07) << 1) | (data[1] >> 7);
    let channels = (data[1] >> 3) & 0x0f;
    let bad = |e: mp4::Error| MergeError::InvalidFlv(format!("AudioSpecificConfig: {}", e));
    Ok(AacConfig {
        bitrate: 0,
        profile: AudioObjectType::try_from(object_type).map_err(bad)?,
        freq_index: SampleFreqIndex::try_from(freq_index).map_err(bad)?,
        chan_conf: ChannelConfig::try_from(channels).map_err(bad)?,
    })
}

/// Parses an AVCDecoderConfigurationRecord. Only 4-byte NAL lengths are
/// accepted since samples are copied into the MP4 unchanged.
pub(crate) fn parse_avc_config(data: &[u8]) -> Result<AvcConfig, MergeError> {
    let short = || MergeError::InvalidFlv("truncated AVC decoder configuration".to_string());
    if data.len() < 6 {
        return Err(short());
    }
    let nal_length_size = (data[4] & 0x03) + 1;
    if nal_length_size != 4 {
        return Err(MergeError::InvalidFlv(format!(
            "NAL length size {} not supported",
            nal_length_size
        )));
    }
    let mut pos = 5;
    let read_sets = |count: usize, pos: &mut usize| -> Result<Option<Vec<u8>>, MergeError> {
        let mut first = None;
        for _ in 0..count {
            let len_bytes = data.get(*pos..*pos + 2).ok_or_else(short)?;
            let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
            let set = data.get(*pos + 2..*pos + 2 + len).ok_or_else(short)?;
            *pos += 2 + len;
            if first.is_none() {
                first = Some(set.to_vec());
            }
        }
        Ok(first)
    };
    let sps_count = (data[pos] & 0x1f) as usize;
    pos += 1;
    let sps = read_sets(sps_count, &mut pos)?
        .ok_or_else(|| MergeError::InvalidFlv("AVC configuration without SPS".to_string()))?;
    let pps_count = *data.get(pos).ok_or_else(short)? as usize;
    pos += 1;
    let pps = read_sets(pps_count, &mut pos)?
        .ok_or_else(|| MergeError::InvalidFlv("AVC configuration without PPS".to_string()))?;

    let info = sps::parse_sps(&sps)?;
    let (width, height) = match (u16::try_from(info.width), u16::try_from(info.height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(MergeError::InvalidFlv(format!(
                "picture size {}x{} exceeds the MP4 limit",
                info.width, info.height
            )))
        }
    };
    Ok(AvcConfig {
        width,
        height,
        seq_param_set: sps,
        pic_param_set: pps,
    })
}

fn u24(b: &[u8]) -> u32 {
    (b[0] as u32) << 16 | (b[1] as u32) << 8 | b[2] as u32
}

/// Signed 24-bit big-endian (composition time offset).
fn i24(b: &[u8]) -> i64 {
    let v = u24(b) as i32;
    ((v << 8) >> 8) as i64
}
