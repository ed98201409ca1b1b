use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Chunk size used by the worker pool (512 KiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 512 * 1024;

/// Number of concurrent chunk fetchers per item.
pub const DEFAULT_WORKERS: usize = 8;

/// Block size used when pushing a streaming segment into the demuxer (2 MiB).
pub const DEFAULT_MERGE_BLOCK_SIZE: usize = 2 * 1024 * 1024;

/// Retry parameters for chunk fetches (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Backoff grows linearly: `backoff_step_ms * attempt`.
    pub backoff_step_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_step_ms: 1000,
        }
    }
}

/// Global configuration loaded from `~/.config/segmux/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmuxConfig {
    /// Size of one ranged request in the worker pool.
    pub chunk_size: u64,
    /// Number of concurrent fetch workers per item.
    pub workers: usize,
    /// Items whose remaining byte count is at or below this use a single
    /// streaming request instead of the worker pool.
    pub single_stream_threshold: u64,
    /// Read block size for streaming (FLV) segments during merge.
    pub merge_block_size: usize,
    /// Keep downloaded segment files after a successful merge.
    #[serde(default)]
    pub keep_segments: bool,
    /// libcurl connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for SegmuxConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: DEFAULT_WORKERS,
            single_stream_threshold: 2 * DEFAULT_CHUNK_SIZE,
            merge_block_size: DEFAULT_MERGE_BLOCK_SIZE,
            keep_segments: false,
            connect_timeout_secs: 30,
            retry: None,
        }
    }
}

impl SegmuxConfig {
    /// Retry policy from the `[retry]` section, or the built-in default.
    pub fn retry_policy(&self) -> RetryPolicy {
        match &self.retry {
            Some(r) => RetryPolicy {
                max_retries: r.max_retries,
                backoff_step: Duration::from_millis(r.backoff_step_ms),
            },
            None => RetryPolicy::default(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("segmux")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SegmuxConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SegmuxConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: SegmuxConfig = toml::from_str(&data)?;
    Ok(cfg)
}
