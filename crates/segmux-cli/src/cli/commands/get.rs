//! `segmux get` – download segments and merge them.

use anyhow::{anyhow, bail, Context, Result};
use segmux_core::config::SegmuxConfig;
use segmux_core::{
    ContainerKind, CurlTransport, DownloadItem, Downloader, SessionRequest,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

use crate::cli::console::ConsoleObserver;

#[derive(Debug)]
pub struct GetArgs {
    pub urls: Vec<String>,
    pub name: Option<String>,
    pub container: Option<ContainerKind>,
    pub headers: HashMap<String, String>,
    pub sizes: Vec<u64>,
    pub dest: PathBuf,
}

pub async fn run_get(cfg: SegmuxConfig, args: GetArgs) -> Result<()> {
    let request = build_request(args)?;
    let transport = Arc::new(CurlTransport::new(cfg.connect_timeout()));
    let downloader = Downloader::new(transport, Arc::new(ConsoleObserver::new()), cfg);
    downloader.start_session(request).await;

    let wait = downloader.wait();
    tokio::pin!(wait);
    let result = tokio::select! {
        r = &mut wait => r,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\ninterrupted, stopping (partial files are kept for resume)");
            downloader.cancel_session().await;
            wait.await
        }
    };

    match result {
        Some(Ok(path)) => {
            println!("saved {}", path.display());
            Ok(())
        }
        Some(Err(e)) if e.is_cancelled() => bail!("download cancelled"),
        Some(Err(e)) => Err(anyhow!(e)).context("download failed"),
        None => bail!("session did not start"),
    }
}

/// Turns command-line arguments into a session request.
pub(crate) fn build_request(args: GetArgs) -> Result<SessionRequest> {
    if !args.sizes.is_empty() && args.sizes.len() != args.urls.len() {
        bail!(
            "--size given {} time(s) for {} URL(s); give it once per URL or not at all",
            args.sizes.len(),
            args.urls.len()
        );
    }

    let mut items = Vec::with_capacity(args.urls.len());
    for (i, raw) in args.urls.iter().enumerate() {
        let url = Url::parse(raw).with_context(|| format!("invalid URL {:?}", raw))?;
        let container = match args.container {
            Some(c) => c,
            None => ContainerKind::from_path(Path::new(url.path())).with_context(|| {
                format!("cannot infer container from {}; pass --container flv|mp4", url)
            })?,
        };
        items.push(DownloadItem {
            headers: args.headers.clone(),
            expected_size: args.sizes.get(i).copied(),
            ..DownloadItem::new(url, container)
        });
    }

    let name = match args.name {
        Some(n) => n,
        None => items
            .first()
            .and_then(|item| {
                Path::new(item.url.path())
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
            })
            .unwrap_or_default(),
    };

    Ok(SessionRequest {
        name,
        items,
        destination_dir: args.dest,
    })
}
