//! Chunk type and range planning for the worker pool.

use crate::transport::ByteRange;

/// A single chunk: inclusive byte range `[begin, end]` of the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the plan; the collector commits chunks in this order.
    pub index: usize,
    pub begin: u64,
    /// Inclusive end offset.
    pub end: u64,
}

impl Chunk {
    /// Length of this chunk in bytes.
    pub fn len(&self) -> u64 {
        self.end - self.begin + 1
    }

    pub fn range(&self) -> ByteRange {
        ByteRange::Span {
            begin: self.begin,
            end: self.end,
        }
    }
}

/// Partitions `[resume_offset, total_size)` into `chunk_size` pieces.
///
/// The last chunk is truncated to `total_size - 1`. Returns an empty plan when
/// nothing remains or `chunk_size` is 0.
pub fn plan_chunks(resume_offset: u64, total_size: u64, chunk_size: u64) -> Vec<Chunk> {
    if chunk_size == 0 || resume_offset >= total_size {
        return Vec::new();
    }
    let count = (total_size - resume_offset).div_ceil(chunk_size) as usize;
    let mut out = Vec::with_capacity(count);
    let mut begin = resume_offset;
    while begin < total_size {
        let end = begin.saturating_add(chunk_size - 1).min(total_size - 1);
        out.push(Chunk {
            index: out.len(),
            begin,
            end,
        });
        begin = end + 1;
    }
    out
}
