//! Per-source segment boundary tracking.

use std::sync::atomic::{AtomicU64, Ordering};

/// Exclusive upper bound of the still-unconsumed prefix of one source file, in bytes
/// from file start. Written by that source's reverse scanner (single writer), read by
/// the disk reclamation step. Monotonically non-increasing.
#[derive(Debug)]
pub struct SegmentTracker {
    boundary: AtomicU64,
}

impl SegmentTracker {
    /// Creates a tracker starting at the source's current byte length.
    pub fn new(length: u64) -> Self {
        SegmentTracker {
            boundary: AtomicU64::new(length),
        }
    }

    /// Records a new boundary. Everything at or beyond `offset` has been parsed into
    /// records that are already delivered or buffered for delivery.
    pub fn set(&self, offset: u64) {
        debug_assert!(offset <= self.boundary.load(Ordering::Relaxed));
        self.boundary.store(offset, Ordering::Release);
    }

    /// Current boundary.
    pub fn get(&self) -> u64 {
        self.boundary.load(Ordering::Acquire)
    }
}
