//! CLI for segmux.

mod commands;
mod console;

use anyhow::Result;
use clap::{Parser, Subcommand};
use segmux_core::config;
use segmux_core::ContainerKind;
use std::path::PathBuf;

use commands::{run_get, run_merge, run_probe, GetArgs};

/// Top-level CLI for segmux.
#[derive(Debug, Parser)]
#[command(name = "segmux")]
#[command(about = "segmux: resumable ranged downloader and FLV/MP4 segment merger", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one or more segments and merge them into one MP4.
    Get {
        /// Resolved segment URLs, in playback order.
        #[arg(required = true)]
        urls: Vec<String>,
        /// Output name (without extension). Defaults to the first URL's file stem.
        #[arg(long)]
        name: Option<String>,
        /// Segment container. Inferred from the URL extension when omitted.
        #[arg(long, value_name = "flv|mp4")]
        container: Option<ContainerKind>,
        /// Extra request header, e.g. `--header 'Referer: https://example.com/'`.
        #[arg(long = "header", value_name = "K: V", value_parser = parse_header)]
        headers: Vec<(String, String)>,
        /// Known segment size in bytes; give once per URL to skip size probes.
        #[arg(long = "size", value_name = "BYTES")]
        sizes: Vec<u64>,
        /// Destination directory (default: current directory).
        #[arg(long)]
        dest: Option<PathBuf>,
    },

    /// Merge segment files already on disk into one MP4.
    Merge {
        /// Output MP4 path.
        output: PathBuf,
        /// Input .flv / .mp4 segments, in playback order.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Check range support and print the total size of a URL.
    Probe {
        url: String,
        #[arg(long = "header", value_name = "K: V", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },
}

/// Parses `Name: value`.
fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got {:?}", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in {:?}", s));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                urls,
                name,
                container,
                headers,
                sizes,
                dest,
            } => {
                let dest = match dest {
                    Some(d) => d,
                    None => std::env::current_dir()?,
                };
                let args = GetArgs {
                    urls,
                    name,
                    container,
                    headers: headers.into_iter().collect(),
                    sizes,
                    dest,
                };
                run_get(cfg, args).await?;
            }
            CliCommand::Merge { output, inputs } => run_merge(&cfg, &output, &inputs).await?,
            CliCommand::Probe { url, headers } => {
                run_probe(&cfg, &url, headers.into_iter().collect()).await?
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
