//! `ext-merge` is an external k-way merge of pre-sorted, line-delimited byte files.
//!
//! It merges any number of already-sorted files into a single sorted output under a
//! fixed, caller-specified memory budget. Each source is consumed from its tail
//! toward its head by an independent producer thread, which allows already-scanned
//! trailing bytes to be truncated off continuously: with disk reclamation enabled,
//! storage is handed back while the merge runs instead of only at the end, so large
//! files can be merged under tight disk quotas.
//!
//! # Overview
//!
//! `ext-merge` supports the following features:
//!
//! * **Memory budget:**
//!   a total byte allowance is split into one write buffer and per-source read
//!   buffers proportional to each source's size, or explicit per-buffer sizes can be
//!   supplied instead.
//! * **Custom record order:**
//!   the merge is driven by a caller-supplied total order over raw record bytes;
//!   string comparators can be adapted with [`compare_with`].
//! * **Incremental disk reclamation:**
//!   sources are truncated as they are consumed and deleted once drained.
//! * **Reverse output order:**
//!   the reverse consumption direction means the merged output comes out in reverse;
//!   [`invert`] is the separate pass restoring direct order.
//!
//! # Example
//!
//! ```no_run
//! use std::fs;
//!
//! use ext_merge::{BufferPlan, FileMergerBuilder};
//!
//! fn main() {
//!     // both sources are stored ascending, so their tail-to-head record streams
//!     // are descending and the merge runs under a descending comparator
//!     let sources = ["part-1.txt", "part-2.txt"];
//!     let target = fs::File::create("merged.txt").unwrap();
//!
//!     let merger = FileMergerBuilder::new()
//!         .with_buffer_plan(BufferPlan::Budget {
//!             total_bytes: 8 * 1024 * 1024,
//!             write_ratio: 0.5,
//!         })
//!         .with_disk_reclamation(true)
//!         .build()
//!         .unwrap();
//!
//!     merger
//!         .merge_by(&sources, target, |a: &[u8], b: &[u8]| b.cmp(a))
//!         .unwrap();
//!
//!     // restore ascending order with the forward-rewrite pass
//!     let final_target = fs::File::create("sorted.txt").unwrap();
//!     ext_merge::invert("merged.txt", final_target, b"\n", b"").unwrap();
//! }
//! ```

pub mod budget;
pub mod invert;
pub mod merge;
pub mod merger;
pub mod scanner;
pub mod segment;
pub mod text;
pub mod writer;

pub use budget::{BufferBudget, BufferPlan};
pub use invert::invert;
pub use merge::{FileMerger, FileMergerBuilder, MergeError};
pub use merger::RecordMerger;
pub use scanner::ReverseRecordScanner;
pub use segment::SegmentTracker;
pub use text::{compare_with, detect_bom, UTF8_BOM};
pub use writer::TargetWriter;
