//! Range-support probe.
//!
//! Sends a 1-byte `Range: bytes=0-0` request and requires a 206 answer with
//! `Content-Range: bytes 0-0/<total>`. Anything else fails the item; there is
//! no fallback to an unranged download.

mod parse;

use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::DownloadError;
use crate::transport::{ByteRange, RangeRequest, Transport, TransportError};

pub(crate) use parse::parse_probe_content_range;

/// Outcome of a successful probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub total_size: u64,
    /// Always true for a returned result; a server without range support is an error.
    pub supports_range_requests: bool,
}

/// Probes `url` for range support and total size.
///
/// Blocking; call from `spawn_blocking` when used from async code.
pub fn probe(
    transport: &dyn Transport,
    url: &Url,
    headers: &HashMap<String, String>,
    cancel: &CancellationToken,
) -> Result<ProbeResult, DownloadError> {
    let request = RangeRequest {
        url: url.clone(),
        headers: headers.clone(),
        range: ByteRange::Span { begin: 0, end: 0 },
    };
    let response = match transport.open(&request, cancel) {
        Ok(r) => r,
        Err(TransportError::Aborted) => return Err(DownloadError::Cancelled),
        Err(source) => {
            return Err(DownloadError::Probe {
                url: url.to_string(),
                source,
            })
        }
    };
    if response.status != 206 {
        return Err(DownloadError::RangeUnsupported {
            url: url.to_string(),
            reason: format!("probe returned HTTP {}", response.status),
        });
    }
    let total_size = response
        .header("Content-Range")
        .ok_or_else(|| DownloadError::RangeUnsupported {
            url: url.to_string(),
            reason: "missing Content-Range header".to_string(),
        })
        .and_then(|value| {
            parse_probe_content_range(value).ok_or_else(|| DownloadError::RangeUnsupported {
                url: url.to_string(),
                reason: format!("malformed Content-Range {:?}", value),
            })
        })?;
    tracing::debug!(%url, total_size, "range probe ok");
    Ok(ProbeResult {
        total_size,
        supports_range_requests: true,
    })
}
