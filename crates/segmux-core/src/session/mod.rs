//! Session control: at most one download-and-merge session per
//! [`Downloader`], replaced (cancel, then await teardown) on every start.

mod layout;
mod run;

pub use layout::sanitize_name;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::SegmuxConfig;
use crate::error::DownloadError;
use crate::merge::ContainerKind;
use crate::observer::Observer;
use crate::transport::Transport;

/// One resolved resource to fetch.
#[derive(Debug, Clone)]
pub struct DownloadItem {
    pub url: Url,
    /// Extra request headers (referer, user agent, cookies).
    pub headers: HashMap<String, String>,
    /// Size in bytes; probed before the session starts fetching when absent.
    pub expected_size: Option<u64>,
    pub container: ContainerKind,
}

impl DownloadItem {
    pub fn new(url: Url, container: ContainerKind) -> Self {
        Self {
            url,
            headers: HashMap::new(),
            expected_size: None,
            container,
        }
    }
}

/// Everything a session needs: ordered items, an output name and where to put it.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Output name before sanitising.
    pub name: String,
    pub items: Vec<DownloadItem>,
    pub destination_dir: PathBuf,
}

struct ActiveSession {
    cancel: CancellationToken,
    /// Cancelled when the session task exits, even by panic.
    finished: CancellationToken,
    /// Taken by the first `wait`.
    handle: Option<JoinHandle<Result<PathBuf, DownloadError>>>,
}

/// Owns the current session slot.
pub struct Downloader {
    transport: Arc<dyn Transport>,
    observer: Arc<dyn Observer>,
    config: Arc<SegmuxConfig>,
    current: Mutex<Option<ActiveSession>>,
}

impl Downloader {
    pub fn new(
        transport: Arc<dyn Transport>,
        observer: Arc<dyn Observer>,
        config: SegmuxConfig,
    ) -> Self {
        Self {
            transport,
            observer,
            config: Arc::new(config),
            current: Mutex::new(None),
        }
    }

    /// Starts a session, first cancelling the current one and waiting until
    /// it has fully stopped.
    pub async fn start_session(&self, request: SessionRequest) {
        let mut slot = self.current.lock().await;
        if let Some(previous) = slot.take() {
            tracing::info!("replacing running session");
            previous.cancel.cancel();
            previous.finished.cancelled().await;
        }

        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();
        let parts = run::SessionParts {
            transport: Arc::clone(&self.transport),
            observer: Arc::clone(&self.observer),
            config: Arc::clone(&self.config),
            cancel: cancel.clone(),
        };
        let guard = finished.clone().drop_guard();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            run::run_session(parts, request).await
        });
        *slot = Some(ActiveSession {
            cancel,
            finished,
            handle: Some(handle),
        });
    }

    /// Requests cooperative cancellation of the current session.
    pub async fn cancel_session(&self) {
        if let Some(session) = self.current.lock().await.as_ref() {
            tracing::info!("cancelling session");
            session.cancel.cancel();
        }
    }

    /// Waits for the current session and returns its outcome. `None` when no
    /// session was started or its result was already taken.
    pub async fn wait(&self) -> Option<Result<PathBuf, DownloadError>> {
        let handle = self.current.lock().await.as_mut()?.handle.take()?;
        Some(handle.await.unwrap_or_else(|e| Err(e.into())))
    }
}
