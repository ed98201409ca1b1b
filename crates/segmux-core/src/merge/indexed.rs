//! Pull-based demuxer for indexed (MP4) segments.
//!
//! The header is read up front; packets are then pulled one at a time,
//! interleaved across tracks by decode time.

use mp4::{MediaType, Mp4Reader, Mp4Sample, Mp4Track};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::error::MergeError;
use super::frame::{AacConfig, AvcConfig, CodecConfig, CodecId, Frame};

/// One demuxed sample. The first packet of each track carries its config.
#[derive(Debug)]
pub struct Packet {
    pub config: Option<CodecConfig>,
    pub frame: Frame,
}

struct TrackCursor {
    id: u32,
    timescale: u32,
    codec: CodecId,
    config: Option<CodecConfig>,
    sample_count: u32,
    /// Next sample id to read (sample ids are 1-based).
    next_sample: u32,
    /// Read-ahead sample, used to pick the track with the lowest decode time.
    pending: Option<Mp4Sample>,
}

pub struct IndexedDemuxer {
    reader: Mp4Reader<BufReader<File>>,
    tracks: Vec<TrackCursor>,
}

impl IndexedDemuxer {
    pub fn open(path: &Path) -> Result<Self, MergeError> {
        let file =
            File::open(path).map_err(|e| MergeError::io(format!("open {}", path.display()), e))?;
        let size = file
            .metadata()
            .map_err(|e| MergeError::io(format!("stat {}", path.display()), e))?
            .len();
        let reader = Mp4Reader::read_header(BufReader::new(file), size)?;

        let mut ids: Vec<u32> = reader.tracks().keys().copied().collect();
        ids.sort_unstable();
        let tracks = ids
            .into_iter()
            .filter_map(|id| reader.tracks().get(&id).map(|t| (id, t)))
            .map(|(id, track)| {
                let (codec, config) = describe(track);
                TrackCursor {
                    id,
                    timescale: track.timescale(),
                    codec,
                    config,
                    sample_count: track.sample_count(),
                    next_sample: 1,
                    pending: None,
                }
            })
            .collect();

        let mut demuxer = Self { reader, tracks };
        for i in 0..demuxer.tracks.len() {
            demuxer.refill(i)?;
        }
        Ok(demuxer)
    }

    /// Next packet in decode-time order, or `None` at end of stream.
    pub fn read_packet(&mut self) -> Result<Option<Packet>, MergeError> {
        let next = self
            .tracks
            .iter()
            .enumerate()
            .filter_map(|(i, t)| {
                t.pending
                    .as_ref()
                    .map(|s| (to_ms(s.start_time as i64, t.timescale), i))
            })
            .min()
            .map(|(_, i)| i);
        let Some(i) = next else {
            return Ok(None);
        };

        let track = &mut self.tracks[i];
        if let CodecId::Unsupported(name) = &track.codec {
            return Err(MergeError::UnknownCodec(format!("track {}: {}", track.id, name)));
        }
        let Some(sample) = track.pending.take() else {
            return Ok(None);
        };
        let dts = to_ms(sample.start_time as i64, track.timescale);
        let pts = dts + to_ms(sample.rendering_offset as i64, track.timescale);
        let packet = Packet {
            config: track.config.take(),
            frame: Frame {
                codec: track.codec.clone(),
                payload: sample.bytes,
                pts,
                dts,
                keyframe: sample.is_sync,
            },
        };
        self.refill(i)?;
        Ok(Some(packet))
    }

    fn refill(&mut self, i: usize) -> Result<(), MergeError> {
        let track = &mut self.tracks[i];
        while track.pending.is_none() && track.next_sample <= track.sample_count {
            let sample_id = track.next_sample;
            track.next_sample += 1;
            track.pending = self.reader.read_sample(track.id, sample_id)?;
        }
        Ok(())
    }
}

/// Codec and decoder configuration of a track.
fn describe(track: &Mp4Track) -> (CodecId, Option<CodecConfig>) {
    match track.media_type() {
        Ok(MediaType::H264) => {
            match (track.sequence_parameter_set(), track.picture_parameter_set()) {
                (Ok(sps), Ok(pps)) => (
                    CodecId::H264,
                    Some(CodecConfig::Video(AvcConfig {
                        width: track.width(),
                        height: track.height(),
                        seq_param_set: sps.to_vec(),
                        pic_param_set: pps.to_vec(),
                    })),
                ),
                _ => (CodecId::Unsupported("H264 without avcC".to_string()), None),
            }
        }
        Ok(MediaType::AAC) => {
            match (
                track.audio_profile(),
                track.sample_freq_index(),
                track.channel_config(),
            ) {
                (Ok(profile), Ok(freq_index), Ok(chan_conf)) => (
                    CodecId::Aac,
                    Some(CodecConfig::Audio(AacConfig {
                        bitrate: track.bitrate(),
                        profile,
                        freq_index,
                        chan_conf,
                    })),
                ),
                _ => (CodecId::Unsupported("AAC without esds".to_string()), None),
            }
        }
        Ok(other) => (CodecId::Unsupported(format!("{:?}", other)), None),
        Err(e) => (CodecId::Unsupported(e.to_string()), None),
    }
}

/// Track time units to milliseconds.
fn to_ms(t: i64, timescale: u32) -> i64 {
    if timescale == 0 || timescale == 1000 {
        return t;
    }
    ((t as i128 * 1000) / timescale as i128) as i64
}
