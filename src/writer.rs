//! Buffered target writer.

use std::fs;
use std::io;
use std::io::prelude::*;

/// Serializes a merged record stream into the target file through one fixed-size
/// write buffer.
///
/// The output is byte-exact `BOM + r1 + sep + r2 + … + sep + rn`: exactly one
/// separator between consecutive records, none before the first, none after the last.
/// Zero-length records contribute no bytes of their own but are still framed.
pub struct TargetWriter {
    target: fs::File,
    buf: Vec<u8>,
    capacity: usize,
    separator: Vec<u8>,
    bom: Vec<u8>,
    started: bool,
}

impl TargetWriter {
    /// Creates a writer over `target` with a buffer of exactly `capacity` bytes.
    /// `bom` (possibly empty) is written straight to the target before the first
    /// record, bypassing the buffer.
    pub fn new(target: fs::File, capacity: usize, separator: Vec<u8>, bom: Vec<u8>) -> Self {
        debug_assert!(capacity > 0);

        TargetWriter {
            target,
            buf: Vec::with_capacity(capacity),
            capacity,
            separator,
            bom,
            started: false,
        }
    }

    /// Appends one record, preceded by the separator for every record but the first.
    pub fn push(&mut self, record: &[u8]) -> io::Result<()> {
        if self.started {
            buffer_bytes(&mut self.target, &mut self.buf, self.capacity, &self.separator)?;
        } else {
            self.started = true;
            if !self.bom.is_empty() {
                self.target.write_all(&self.bom)?;
            }
        }

        buffer_bytes(&mut self.target, &mut self.buf, self.capacity, record)
    }

    /// Flushes the remaining buffered bytes (at most once) and hands the target back.
    pub fn finish(mut self) -> io::Result<fs::File> {
        if !self.buf.is_empty() {
            self.target.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(self.target)
    }
}

/// Copies `bytes` into the buffer, flushing to the target each time the buffer fills.
/// `bytes` may cross the capacity boundary any number of times.
fn buffer_bytes(target: &mut fs::File, buf: &mut Vec<u8>, capacity: usize, mut bytes: &[u8]) -> io::Result<()> {
    while !bytes.is_empty() {
        let take = (capacity - buf.len()).min(bytes.len());
        buf.extend_from_slice(&bytes[..take]);
        bytes = &bytes[take..];

        if buf.len() == capacity {
            target.write_all(buf)?;
            buf.clear();
        }
    }
    Ok(())
}
