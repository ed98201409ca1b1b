//! Pass-through reader that reports progress for the single-stream path.

use std::io::{self, Read};
use std::sync::Arc;

use super::ProgressReporter;

pub struct ProgressReader<R> {
    inner: R,
    reporter: Arc<ProgressReporter>,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, reporter: Arc<ProgressReporter>) -> Self {
        Self { inner, reporter }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.reporter.advance(n as u64);
        }
        Ok(n)
    }
}
