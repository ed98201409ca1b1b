//! Small FLV and MP4 inputs for merge and session tests.

use bytes::Bytes;
use mp4::{
    AacConfig, AudioObjectType, AvcConfig, ChannelConfig, MediaConfig, Mp4Config, Mp4Reader,
    Mp4Sample, Mp4Writer, SampleFreqIndex, TrackConfig, TrackType,
};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Baseline profile SPS for 320x240.
pub const SPS: [u8; 8] = [0x67, 0x42, 0xc0, 0x1e, 0xda, 0x05, 0x07, 0xe4];
pub const PPS: [u8; 4] = [0x68, 0xce, 0x38, 0x80];

fn flv_tag(out: &mut Vec<u8>, tag_type: u8, timestamp: u32, body: &[u8]) {
    let size = body.len() as u32;
    out.push(tag_type);
    out.extend_from_slice(&size.to_be_bytes()[1..]);
    out.extend_from_slice(&timestamp.to_be_bytes()[1..]);
    out.push((timestamp >> 24) as u8);
    out.extend_from_slice(&[0, 0, 0]);
    out.extend_from_slice(body);
    out.extend_from_slice(&(size + 11).to_be_bytes());
}

/// FLV with H264 and AAC sequence headers followed by `frames` video+audio
/// pairs 40 ms apart, starting at `base_ms`.
pub fn flv(frames: u32, base_ms: u32) -> Vec<u8> {
    let mut out = b"FLV\x01\x05".to_vec();
    out.extend_from_slice(&9u32.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());

    let mut avc = vec![0x17, 0, 0, 0, 0, 1, 66, 0xc0, 30, 0xff, 0xe1];
    avc.extend_from_slice(&(SPS.len() as u16).to_be_bytes());
    avc.extend_from_slice(&SPS);
    avc.push(1);
    avc.extend_from_slice(&(PPS.len() as u16).to_be_bytes());
    avc.extend_from_slice(&PPS);
    flv_tag(&mut out, 9, base_ms, &avc);
    flv_tag(&mut out, 8, base_ms, &[0xaf, 0x00, 0x12, 0x10]);

    for i in 0..frames {
        let ts = base_ms + i * 40;
        let key = if i == 0 { 0x17 } else { 0x27 };
        let mut video = vec![key, 1, 0, 0, 0];
        video.extend_from_slice(&video_payload(i));
        flv_tag(&mut out, 9, ts, &video);
        flv_tag(&mut out, 8, ts, &[0xaf, 1, 0x21, 0x10, i as u8]);
    }
    out
}

fn video_payload(i: u32) -> Vec<u8> {
    let nal_type = if i == 0 { 0x65 } else { 0x41 };
    vec![0, 0, 0, 2, nal_type, i as u8]
}

/// MP4 with an H264 track and an AAC track of `frames` 40 ms samples each.
pub fn write_mp4(path: &Path, frames: u32) {
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
            timescale: 1000,
            language: "und".to_string(),
            media_conf: MediaConfig::AvcConfig(AvcConfig {
                width: 320,
                height: 240,
                seq_param_set: SPS.to_vec(),
                pic_param_set: PPS.to_vec(),
            }),
        })
        .unwrap();
    writer
        .add_track(&TrackConfig {
            track_type: TrackType::Audio,
            timescale: 1000,
            language: "und".to_string(),
            media_conf: MediaConfig::AacConfig(AacConfig {
                bitrate: 0,
                profile: AudioObjectType::AacLowComplexity,
                freq_index: SampleFreqIndex::Freq44100,
                chan_conf: ChannelConfig::Stereo,
            }),
        })
        .unwrap();
    for i in 0..frames {
        let start_time = i as u64 * 40;
        writer
            .write_sample(
                1,
                &Mp4Sample {
                    start_time,
                    duration: 40,
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
                    start_time,
                    duration: 40,
                    rendering_offset: 0,
                    is_sync: true,
                    bytes: Bytes::from(vec![0x21, 0x10, i as u8]),
                },
            )
            .unwrap();
    }
    writer.write_end().unwrap();
    writer.into_writer().flush().unwrap();
}

/// Opens an MP4 file for inspection.
pub fn read_mp4(path: &Path) -> Mp4Reader<BufReader<File>> {
    let file = File::open(path).unwrap();
    let size = file.metadata().unwrap().len();
    Mp4Reader::read_header(BufReader::new(file), size).unwrap()
}

/// `(video samples, audio samples)` of an MP4 file.
pub fn sample_counts(path: &Path) -> (u32, u32) {
    let reader = read_mp4(path);
    let mut video = 0;
    let mut audio = 0;
    for track in reader.tracks().values() {
        match track.track_type().unwrap() {
            TrackType::Video => video += track.sample_count(),
            TrackType::Audio => audio += track.sample_count(),
            _ => {}
        }
    }
    (video, audio)
}
