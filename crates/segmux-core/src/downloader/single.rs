//! Single streaming request (`Range: bytes=<k>-`) for small remainders.
//!
//! A retry continues from the bytes already written, so a dropped connection
//! never re-downloads what is on disk.

use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{report_retry, FetchContext};
use crate::error::DownloadError;
use crate::progress::{ProgressReader, ProgressReporter};
use crate::retry::{retry_with_backoff, ChunkError};
use crate::session::DownloadItem;
use crate::storage::PartialFile;
use crate::transport::{ByteRange, RangeRequest, Transport, TransportError};

const STREAM_BUF_SIZE: usize = 64 * 1024;

pub(super) async fn run_single(
    ctx: &FetchContext,
    item: &DownloadItem,
    file: PartialFile,
    total: u64,
) -> Result<PartialFile, DownloadError> {
    let file = Arc::new(Mutex::new(file));
    let what = format!("stream {}", item.url);
    let outcome = retry_with_backoff(
        &ctx.config.retry_policy(),
        &ctx.cancel,
        |_attempt| {
            let file = Arc::clone(&file);
            let transport = Arc::clone(&ctx.transport);
            let reporter = Arc::clone(&ctx.reporter);
            let url = item.url.clone();
            let headers = item.headers.clone();
            let cancel = ctx.cancel.clone();
            async move {
                tokio::task::spawn_blocking(move || {
                    let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
                    stream_into(&*transport, &url, &headers, &mut file, total, reporter, &cancel)
                })
                .await
                .unwrap_or_else(|e| {
                    Err(ChunkError::Transport(TransportError::Other(format!(
                        "stream task: {}",
                        e
                    ))))
                })
            }
        },
        |attempt, err, delay| report_retry(&ctx.reporter, &what, attempt, err, delay),
    )
    .await;

    let file = Arc::try_unwrap(file)
        .map_err(|_| DownloadError::Internal("stream file still shared".to_string()))?
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    match outcome {
        Ok(()) => Ok(file),
        Err(ChunkError::Cancelled) => Err(DownloadError::Cancelled),
        Err(ChunkError::Storage(source)) => Err(DownloadError::Io {
            context: format!("write {}", file.partial_path().display()),
            source,
        }),
        Err(source) => Err(DownloadError::Stream {
            offset: file.position(),
            source,
        }),
    }
}

/// One attempt: request from the current file position to the end and copy
/// the body into `file`. Blocking.
fn stream_into(
    transport: &dyn Transport,
    url: &Url,
    headers: &HashMap<String, String>,
    file: &mut PartialFile,
    total: u64,
    reporter: Arc<ProgressReporter>,
    cancel: &CancellationToken,
) -> Result<(), ChunkError> {
    let start = file.position();
    if start >= total {
        return Ok(());
    }
    let request = RangeRequest {
        url: url.clone(),
        headers: headers.clone(),
        range: ByteRange::From(start),
    };
    let response = transport.open(&request, cancel)?;
    if response.status != 206 {
        return Err(ChunkError::Status(response.status));
    }

    let expected = total - start;
    let mut reader = ProgressReader::new(response.body.take(expected), reporter);
    let mut buf = vec![0u8; STREAM_BUF_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) if cancel.is_cancelled() => return Err(ChunkError::Cancelled),
            Err(e) => return Err(ChunkError::Transport(TransportError::Io(e))),
        };
        file.write_all(&buf[..n]).map_err(ChunkError::Storage)?;
    }
    let received = file.position() - start;
    if received != expected {
        return Err(ChunkError::LengthMismatch { expected, received });
    }
    Ok(())
}
