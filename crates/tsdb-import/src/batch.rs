//! Batch assembly
//!
//! Lines from one file are grouped into batches of `batch_size` and rendered as a
//! JSON array: `[`, newline, the lines joined by `,` and newline, newline, `]`.
//! Line bytes are copied verbatim, each line is expected to be a JSON object already.

use std::num::NonZeroUsize;

/// A rendered payload ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 1-based position of this batch within its file
    pub sequence: u64,
    pub lines: usize,
    pub payload: Vec<u8>,
}

/// Accumulates the lines of one file into [`Batch`]es
#[derive(Debug)]
pub struct BatchAssembler {
    batch_size: NonZeroUsize,
    line_no: u64,
    batches: u64,
    buf: Vec<u8>,
}

impl BatchAssembler {
    pub fn new(batch_size: NonZeroUsize) -> Self {
        Self {
            batch_size,
            line_no: 0,
            batches: 0,
            buf: Vec::new(),
        }
    }

    /// Lines pushed so far
    pub fn line_count(&self) -> u64 {
        self.line_no
    }

    fn position_in_batch(&self) -> usize {
        ((self.line_no - 1) % self.batch_size.get() as u64) as usize + 1
    }

    /// Append a line, returning the batch it completed, if any
    pub fn push_line(&mut self, line: &[u8]) -> Option<Batch> {
        self.line_no += 1;
        let position = self.position_in_batch();

        if position == 1 {
            self.buf.extend_from_slice(b"[\n");
        } else {
            self.buf.extend_from_slice(b",\n");
        }
        self.buf.extend_from_slice(line);

        if position == self.batch_size.get() {
            Some(self.seal(position))
        } else {
            None
        }
    }

    /// Close the partial batch at end of stream
    pub fn finish(mut self) -> Option<Batch> {
        if self.buf.is_empty() {
            return None;
        }
        let lines = self.position_in_batch();
        Some(self.seal(lines))
    }

    fn seal(&mut self, lines: usize) -> Batch {
        self.buf.extend_from_slice(b"\n]");
        self.batches += 1;
        Batch {
            sequence: self.batches,
            lines,
            payload: std::mem::take(&mut self.buf),
        }
    }
}
