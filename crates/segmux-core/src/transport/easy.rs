//! libcurl-backed transport. Each request runs on its own thread and streams
//! its body back over a bounded channel.

use std::cell::{Cell, RefCell};
use std::sync::mpsc::{self, SyncSender};
use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::body::{ChannelBody, Event};
use super::{RangeRequest, Response, Transport, TransportError};

/// Buffered curl write callbacks per transfer (each at most CURL_MAX_WRITE_SIZE).
const BODY_CHANNEL_DEPTH: usize = 16;

#[derive(Debug, Clone)]
pub struct CurlTransport {
    connect_timeout: Duration,
}

impl CurlTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Transport for CurlTransport {
    fn open(
        &self,
        request: &RangeRequest,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError> {
        let (tx, rx) = mpsc::sync_channel(BODY_CHANNEL_DEPTH);
        let request = request.clone();
        let cancel = cancel.clone();
        let connect_timeout = self.connect_timeout;
        thread::Builder::new()
            .name("segmux-curl".to_string())
            .spawn(move || {
                if let Err(e) = perform(&request, &cancel, connect_timeout, &tx) {
                    let _ = tx.send(Event::Failed(e));
                }
            })?;

        match rx.recv() {
            Ok(Event::Head { status, headers }) => Ok(Response {
                status,
                headers,
                body: Box::new(ChannelBody::new(rx)),
            }),
            Ok(Event::Failed(e)) => Err(e),
            Ok(Event::Data(_)) => Err(TransportError::Other(
                "response body arrived before headers".to_string(),
            )),
            Err(_) => Err(TransportError::Other(
                "transfer thread exited without a response".to_string(),
            )),
        }
    }
}

/// Runs one transfer to completion. The response head is sent before the
/// first body block (or after the transfer for empty bodies).
fn perform(
    request: &RangeRequest,
    cancel: &CancellationToken,
    connect_timeout: Duration,
    tx: &SyncSender<Event>,
) -> Result<(), TransportError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(request.url.as_str())?;
    easy.follow_location(true)?;
    easy.connect_timeout(connect_timeout)?;
    easy.range(&request.range.spec())?;
    easy.progress(true)?;

    if !request.headers.is_empty() {
        let mut list = curl::easy::List::new();
        for (k, v) in &request.headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        easy.http_headers(list)?;
    }

    let lines: RefCell<Vec<String>> = RefCell::new(Vec::new());
    let head_sent = Cell::new(false);
    let reader_gone = Cell::new(false);

    let send_head = || {
        head_sent.set(true);
        let (status, headers) = parse_head(&lines.borrow());
        if tx.send(Event::Head { status, headers }).is_err() {
            reader_gone.set(true);
        }
    };

    let result = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(line) = std::str::from_utf8(data) {
                let line = line.trim_end();
                // A new status line starts a new response (redirects, 100-continue).
                if line.starts_with("HTTP/") {
                    lines.borrow_mut().clear();
                }
                if !line.is_empty() {
                    lines.borrow_mut().push(line.to_string());
                }
            }
            true
        })?;
        transfer.progress_function(|_, _, _, _| !cancel.is_cancelled())?;
        transfer.write_function(|data| {
            if !head_sent.get() {
                send_head();
            }
            if reader_gone.get() || tx.send(Event::Data(data.to_vec())).is_err() {
                reader_gone.set(true);
                return Ok(0);
            }
            Ok(data.len())
        })?;
        transfer.perform()
    };

    match result {
        Ok(()) => {
            if !head_sent.get() {
                send_head();
            }
            Ok(())
        }
        Err(_) if cancel.is_cancelled() => Err(TransportError::Aborted),
        // Reader dropped the body on purpose; nobody is left to report to.
        Err(e) if e.is_write_error() && reader_gone.get() => Ok(()),
        Err(e) => Err(TransportError::Curl(e)),
    }
}

/// Status code and headers of the last response in the header stream.
fn parse_head(lines: &[String]) -> (u32, Vec<(String, String)>) {
    let mut status = 0;
    let mut headers = Vec::new();
    for line in lines {
        if line.starts_with("HTTP/") {
            status = line
                .split_whitespace()
                .nth(1)
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
        } else if let Some((k, v)) = line.split_once(':') {
            headers.push((k.trim().to_string(), v.trim().to_string()));
        }
    }
    (status, headers)
}
