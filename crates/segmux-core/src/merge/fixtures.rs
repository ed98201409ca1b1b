//! Builders for small FLV and MP4 inputs used by the merge tests.

use bytes::Bytes;
use mp4::{
    AacConfig, AudioObjectType, AvcConfig, ChannelConfig, MediaConfig, Mp4Config, Mp4Sample,
    Mp4Writer, SampleFreqIndex, TrackConfig, TrackType,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::merge::sps::tests::baseline_sps;

pub(crate) const PPS: [u8; 4] = [0x68, 0xce, 0x38, 0x80];

pub(crate) struct FlvBuilder {
    out: Vec<u8>,
}

impl FlvBuilder {
    pub(crate) fn new() -> Self {
        let mut out = b"FLV\x01\x05".to_vec();
        out.extend_from_slice(&9u32.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());
        Self { out }
    }

    pub(crate) fn tag(mut self, tag_type: u8, timestamp: u32, body: &[u8]) -> Self {
        let size = body.len() as u32;
        self.out.push(tag_type);
        self.out.extend_from_slice(&size.to_be_bytes()[1..]);
        self.out.extend_from_slice(&timestamp.to_be_bytes()[1..]);
        self.out.push((timestamp >> 24) as u8);
        self.out.extend_from_slice(&[0, 0, 0]);
        self.out.extend_from_slice(body);
        self.out.extend_from_slice(&(size + 11).to_be_bytes());
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        self.out
    }
}

/// AVCDecoderConfigurationRecord for a 320x240 baseline stream.
pub(crate) fn avc_decoder_config() -> Vec<u8> {
    let sps = baseline_sps(20, 15);
    let mut record = vec![1, 66, 0xc0, 30, 0xff, 0xe1];
    record.extend_from_slice(&(sps.len() as u16).to_be_bytes());
    record.extend_from_slice(&sps);
    record.push(1);
    record.extend_from_slice(&(PPS.len() as u16).to_be_bytes());
    record.extend_from_slice(&PPS);
    record
}

/// FLV audio tag body carrying an AAC LC 44.1 kHz stereo config.
pub(crate) fn aac_sequence_header() -> Vec<u8> {
    vec![0xaf, 0x00, 0x12, 0x10]
}

pub(crate) fn avc_sequence_header() -> Vec<u8> {
    let mut body = vec![0x17, 0, 0, 0, 0];
    body.extend_from_slice(&avc_decoder_config());
    body
}

pub(crate) fn video_payload(i: u32) -> Vec<u8> {
    let nal_type = if i == 0 { 0x65 } else { 0x41 };
    vec![0, 0, 0, 2, nal_type, i as u8]
}

pub(crate) fn audio_payload(i: u32) -> Vec<u8> {
    vec![0x21, 0x10, i as u8]
}

/// FLV with both sequence headers and `frames` video+audio pairs, 40 ms apart,
/// starting at `base_ms`. Video frames carry a 40 ms composition offset.
pub(crate) fn sample_flv(frames: u32, base_ms: u32) -> Vec<u8> {
    let mut b = FlvBuilder::new()
        .tag(9, base_ms, &avc_sequence_header())
        .tag(8, base_ms, &aac_sequence_header());
    for i in 0..frames {
        let ts = base_ms + i * 40;
        let mut video = vec![if i == 0 { 0x17 } else { 0x27 }, 1, 0, 0, 40];
        video.extend_from_slice(&video_payload(i));
        let mut audio = vec![0xaf, 1];
        audio.extend_from_slice(&audio_payload(i));
        b = b.tag(9, ts, &video).tag(8, ts, &audio);
    }
    b.build()
}

pub(crate) fn avc_config() -> AvcConfig {
    AvcConfig {
        width: 320,
        height: 240,
        seq_param_set: baseline_sps(20, 15),
        pic_param_set: PPS.to_vec(),
    }
}

pub(crate) fn aac_config() -> AacConfig {
    AacConfig {
        bitrate: 0,
        profile: AudioObjectType::AacLowComplexity,
        freq_index: SampleFreqIndex::Freq44100,
        chan_conf: ChannelConfig::Stereo,
    }
}

/// Writes an MP4 with a video track (id 1) and an audio track (id 2), each
/// holding `frames` samples of 40 ms, using the given track timescale.
pub(crate) fn write_sample_mp4(path: &Path, frames: u32, timescale: u32) {
    let file = BufWriter::new(File::create(path).unwrap());
    let config = Mp4Config {
        major_brand: "isom".parse().unwrap(),
        minor_version: 512,
        compatible_brands: vec!["isom".parse().unwrap(), "avc1".parse().unwrap()],
        timescale: 1000,
    };
    let mut writer = Mp4Writer::write_start(file, &config).unwrap();
    writer
        .add_track(&TrackConfig {
            track_type: TrackType::Video,
            timescale,
            language: "und".to_string(),
            media_conf: MediaConfig::AvcConfig(avc_config()),
        })
        .unwrap();
    writer
        .add_track(&TrackConfig {
            track_type: TrackType::Audio,
            timescale,
            language: "und".to_string(),
            media_conf: MediaConfig::AacConfig(aac_config()),
        })
        .unwrap();
    let step = (40 * timescale / 1000) as u64;
    for i in 0..frames {
        writer
            .write_sample(
                1,
                &Mp4Sample {
                    start_time: i as u64 * step,
                    duration: step as u32,
                    rendering_offset: 0,
                    is_sync: i == 0,
                    bytes: Bytes::from(video_payload(i)),
                },
            )
            .unwrap();
        writer
            .write_sample(
                2,
                &Mp4Sample {
                    start_time: i as u64 * step,
                    duration: step as u32,
                    rendering_offset: 0,
                    is_sync: true,
                    bytes: Bytes::from(audio_payload(i)),
                },
            )
            .unwrap();
    }
    writer.write_end().unwrap();
    writer.into_writer().flush().unwrap();
}
