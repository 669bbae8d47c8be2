//! Reverse record scanner.
//!
//! Reads a file tail-to-head in fixed-size blocks, splitting its content into
//! delimiter-separated records. Consuming a file backwards lets already-scanned
//! trailing bytes be truncated away without disturbing the unread prefix.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::mem;
use std::sync::Arc;

use crate::segment::SegmentTracker;

/// Iterator over a file's records from its tail toward its head.
///
/// Content is split with separator semantics: empty content is exactly one empty
/// record, and a trailing delimiter produces a trailing empty record. The scan never
/// consumes bytes before the BOM prefix. After each block is parsed into memory the
/// source's [`SegmentTracker`] is advanced to the block start, which makes everything
/// at or beyond that offset safe to truncate.
pub struct ReverseRecordScanner {
    file: fs::File,
    delimiter: Vec<u8>,
    /// Offset of the first content byte (the BOM prefix length).
    content_start: u64,
    /// Exclusive end of the unread region.
    pos: u64,
    block_size: usize,
    /// Scratch for one block plus the carried fragment, reused across blocks.
    buf: Vec<u8>,
    /// Head fragment of the record still being assembled, carried between blocks.
    carry: Vec<u8>,
    /// Records parsed from the current block, tail-most first.
    parsed: VecDeque<Vec<u8>>,
    tracker: Arc<SegmentTracker>,
    done: bool,
}

impl ReverseRecordScanner {
    /// Creates a scanner over `file` whose content spans `[bom_len, length)`.
    ///
    /// `block_size` is the read buffer size assigned to this source; records larger
    /// than a block are assembled across blocks. The delimiter must be non-empty.
    pub fn new(
        file: fs::File,
        length: u64,
        bom_len: u64,
        delimiter: Vec<u8>,
        block_size: usize,
        tracker: Arc<SegmentTracker>,
    ) -> Self {
        debug_assert!(!delimiter.is_empty());
        debug_assert!(bom_len <= length);

        ReverseRecordScanner {
            file,
            delimiter,
            content_start: bom_len,
            pos: length,
            block_size: block_size.max(1),
            buf: Vec::new(),
            carry: Vec::new(),
            parsed: VecDeque::new(),
            tracker,
            done: false,
        }
    }

    /// Reads the next block backwards, appends the carried fragment after it and
    /// splits the combined bytes on the delimiter. Searching the combined buffer as a
    /// whole catches delimiters straddling a block edge.
    fn fill_block(&mut self) -> io::Result<()> {
        let block_start = self
            .pos
            .saturating_sub(self.block_size as u64)
            .max(self.content_start);
        let block_len = (self.pos - block_start) as usize;

        let carry = mem::take(&mut self.carry);
        self.buf.clear();
        self.buf.resize(block_len, 0);
        self.file.seek(io::SeekFrom::Start(block_start))?;
        self.file.read_exact(&mut self.buf)?;
        self.buf.extend_from_slice(&carry);

        let mut end = self.buf.len();
        while let Some(at) = rfind(&self.buf[..end], &self.delimiter) {
            self.parsed.push_back(self.buf[at + self.delimiter.len()..end].to_vec());
            end = at;
        }
        self.carry = self.buf[..end].to_vec();

        self.pos = block_start;
        self.tracker.set(block_start);
        Ok(())
    }
}

impl Iterator for ReverseRecordScanner {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.parsed.pop_front() {
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }
            if self.pos == self.content_start {
                // head reached; the carried fragment is the head-most record
                self.done = true;
                return Some(Ok(mem::take(&mut self.carry)));
            }
            if let Err(err) = self.fill_block() {
                self.done = true;
                return Some(Err(err));
            }
        }
    }
}

/// Rightmost occurrence of `needle` fully contained in `haystack`.
fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|window| window == needle)
}
