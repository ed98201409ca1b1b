//! `segmux probe` – check range support and print the total size.

use anyhow::{Context, Result};
use segmux_core::config::SegmuxConfig;
use segmux_core::{probe, CurlTransport};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use url::Url;

pub async fn run_probe(cfg: &SegmuxConfig, url: &str, headers: HashMap<String, String>) -> Result<()> {
    let url = Url::parse(url).with_context(|| format!("invalid URL {:?}", url))?;
    let transport = CurlTransport::new(cfg.connect_timeout());
    let target = url.clone();
    let result = tokio::task::spawn_blocking(move || {
        probe::probe(&transport, &target, &headers, &CancellationToken::new())
    })
    .await??;
    println!(
        "{}\n  total size: {} bytes\n  range requests: {}",
        url,
        result.total_size,
        if result.supports_range_requests { "yes" } else { "no" }
    );
    Ok(())
}
