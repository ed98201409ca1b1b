//! Integration test: multi-item sessions end to end, from ranged download
//! through remux into one MP4, with observer events checked.

mod common;

use common::media;
use common::range_server;
use segmux_core::config::SegmuxConfig;
use segmux_core::{ContainerKind, CurlTransport, DownloadItem, Downloader, Observer, SessionRequest};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use url::Url;

#[derive(Default)]
struct Events {
    log: Mutex<Vec<String>>,
    progress: Mutex<Vec<f64>>,
}

impl Observer for Events {
    fn on_error(&self, message: &str) {
        self.log.lock().unwrap().push(format!("error: {}", message));
    }
    fn on_progress_update(&self, fraction: f64) {
        self.progress.lock().unwrap().push(fraction);
    }
    fn on_running_state_changed(&self, running: bool) {
        self.log.lock().unwrap().push(format!("running: {}", running));
    }
    fn on_finished(&self, output: &Path) {
        self.log.lock().unwrap().push(format!("finished: {}", output.display()));
    }
}

fn config() -> SegmuxConfig {
    SegmuxConfig {
        chunk_size: 256,
        workers: 3,
        single_stream_threshold: 0,
        merge_block_size: 100,
        ..SegmuxConfig::default()
    }
}

async fn run(items: Vec<DownloadItem>, dest: &Path, events: Arc<Events>) -> PathBuf {
    let downloader = Downloader::new(Arc::new(CurlTransport::default()), events, config());
    downloader
        .start_session(SessionRequest {
            name: "Episode: 1".to_string(),
            items,
            destination_dir: dest.to_path_buf(),
        })
        .await;
    downloader.wait().await.unwrap().unwrap()
}

#[tokio::test]
async fn flv_segments_download_and_merge() {
    let first = range_server::start(media::flv(10, 0));
    let second = range_server::start(media::flv(5, 400));
    let dest = tempdir().unwrap();
    let events = Arc::new(Events::default());
    let items = vec![
        DownloadItem::new(Url::parse(&first.url).unwrap(), ContainerKind::Flv),
        DownloadItem::new(Url::parse(&second.url).unwrap(), ContainerKind::Flv),
    ];

    let output = run(items, dest.path(), events.clone()).await;

    assert_eq!(output, dest.path().join("Episode 1.mp4"));
    assert_eq!(media::sample_counts(&output), (15, 15));
    assert!(!dest.path().join("download").exists());
    assert_eq!(
        *events.log.lock().unwrap(),
        vec![
            "running: true".to_string(),
            format!("finished: {}", output.display()),
            "running: false".to_string(),
        ]
    );
    let progress = events.progress.lock().unwrap();
    assert!(progress.iter().all(|f| (0.0..=1.0).contains(f)));
    assert_eq!(progress.last().copied(), Some(1.0));
}

#[tokio::test]
async fn mp4_and_flv_segments_merge() {
    let scratch = tempdir().unwrap();
    let mp4_path = scratch.path().join("src.mp4");
    media::write_mp4(&mp4_path, 6);
    let first = range_server::start(std::fs::read(&mp4_path).unwrap());
    let second = range_server::start(media::flv(4, 240));
    let dest = tempdir().unwrap();
    let items = vec![
        DownloadItem::new(Url::parse(&first.url).unwrap(), ContainerKind::Mp4),
        DownloadItem::new(Url::parse(&second.url).unwrap(), ContainerKind::Flv),
    ];

    let output = run(items, dest.path(), Arc::new(Events::default())).await;

    assert_eq!(media::sample_counts(&output), (10, 10));
}

#[tokio::test]
async fn single_flv_is_remuxed_and_removed() {
    let server = range_server::start(media::flv(3, 0));
    let dest = tempdir().unwrap();
    let items = vec![DownloadItem::new(Url::parse(&server.url).unwrap(), ContainerKind::Flv)];

    let output = run(items, dest.path(), Arc::new(Events::default())).await;

    assert_eq!(output, dest.path().join("Episode 1.mp4"));
    assert!(!dest.path().join("Episode 1.flv").exists());
    assert_eq!(media::sample_counts(&output), (3, 3));
}
