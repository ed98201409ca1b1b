//! In-memory transport for unit tests: serves one byte buffer with range
//! semantics and optional injected failures.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{ByteRange, RangeRequest, Response, Transport, TransportError};

#[derive(Default)]
pub(crate) struct MemoryTransport {
    data: Vec<u8>,
    /// Remaining injected 503s per range start offset.
    failures: Mutex<HashMap<u64, usize>>,
    /// Answer every request with a 200 and the whole body.
    pub(crate) ignore_ranges: bool,
    /// Per-request delay keyed by range start; lets tests complete chunks out of order.
    pub(crate) delays: HashMap<u64, Duration>,
    requests: Mutex<Vec<ByteRange>>,
    opened: AtomicUsize,
}

impl MemoryTransport {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub(crate) fn fail_first(self, begin: u64, times: usize) -> Self {
        self.failures.lock().unwrap().insert(begin, times);
        self
    }

    pub(crate) fn request_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<ByteRange> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for MemoryTransport {
    fn open(
        &self,
        request: &RangeRequest,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.range);
        let (begin, end) = match request.range {
            ByteRange::Span { begin, end } => (begin, end),
            ByteRange::From(begin) => (begin, (self.data.len() as u64).saturating_sub(1)),
        };
        if let Some(delay) = self.delays.get(&begin) {
            std::thread::sleep(*delay);
        }
        if cancel.is_cancelled() {
            return Err(TransportError::Aborted);
        }
        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(left) = failures.get_mut(&begin) {
                if *left > 0 {
                    *left -= 1;
                    return Ok(Response {
                        status: 503,
                        headers: Vec::new(),
                        body: Box::new(std::io::empty()),
                    });
                }
            }
        }
        let total = self.data.len() as u64;
        if self.ignore_ranges {
            return Ok(Response {
                status: 200,
                headers: vec![("Content-Length".to_string(), total.to_string())],
                body: Box::new(Cursor::new(self.data.clone())),
            });
        }
        if begin >= total {
            return Ok(Response {
                status: 416,
                headers: vec![("Content-Range".to_string(), format!("bytes */{}", total))],
                body: Box::new(std::io::empty()),
            });
        }
        let end = end.min(total - 1);
        let body = self.data[begin as usize..=end as usize].to_vec();
        Ok(Response {
            status: 206,
            headers: vec![(
                "Content-Range".to_string(),
                format!("bytes {}-{}/{}", begin, end, total),
            )],
            body: Box::new(Cursor::new(body)),
        })
    }
}

/// Deterministic non-repeating-ish test payload.
pub(crate) fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 256) as u8).collect()
}
