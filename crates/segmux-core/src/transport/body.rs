//! Blocking `Read` over the events produced by a curl transfer thread.

use std::io::{self, Read};
use std::sync::mpsc::Receiver;

use super::TransportError;

/// Messages sent from the transfer thread to the reader.
pub(super) enum Event {
    Head {
        status: u32,
        headers: Vec<(String, String)>,
    },
    Data(Vec<u8>),
    Failed(TransportError),
}

/// Response body fed by the transfer thread. Dropping it closes the channel,
/// which makes the next curl write callback abort the transfer.
pub(super) struct ChannelBody {
    rx: Receiver<Event>,
    pending: Vec<u8>,
    pos: usize,
    done: bool,
}

impl ChannelBody {
    pub(super) fn new(rx: Receiver<Event>) -> Self {
        Self {
            rx,
            pending: Vec::new(),
            pos: 0,
            done: false,
        }
    }
}

impl Read for ChannelBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.pending.len() {
            if self.done {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(Event::Data(data)) => {
                    self.pending = data;
                    self.pos = 0;
                }
                Ok(Event::Failed(e)) => {
                    self.done = true;
                    return Err(io::Error::new(io::ErrorKind::Other, e));
                }
                Ok(Event::Head { .. }) => {}
                // Sender dropped: transfer finished cleanly.
                Err(_) => {
                    self.done = true;
                    return Ok(0);
                }
            }
        }
        let available = &self.pending[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}
