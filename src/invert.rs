//! Forward-rewrite pass.
//!
//! A merge produces its output in the reverse of the conventional direct order; that
//! asymmetry is what lets the merge truncate its sources as it goes. This pass
//! rewrites a completed output file with its records in the opposite order.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::scanner::ReverseRecordScanner;
use crate::segment::SegmentTracker;
use crate::text;
use crate::writer::TargetWriter;

/// Read and write buffer size of the rewrite pass.
const BUFFER_SIZE: usize = 64 * 1024;

/// Rewrites `source` into `target` with its record order reversed, keeping the BOM
/// prefix (if any) at the front. The target handle is consumed and closed.
pub fn invert<P>(source: P, target: fs::File, delimiter: &[u8], bom: &[u8]) -> io::Result<()>
where
    P: AsRef<Path>,
{
    let mut file = fs::File::open(source)?;
    let length = file.metadata()?.len();
    let bom_len = text::detect_bom(&mut file, bom)?;

    let tracker = Arc::new(SegmentTracker::new(length));
    let scanner = ReverseRecordScanner::new(file, length, bom_len, delimiter.to_vec(), BUFFER_SIZE, tracker);
    let mut writer = TargetWriter::new(target, BUFFER_SIZE, delimiter.to_vec(), bom.to_vec());

    for record in scanner {
        writer.push(&record?)?;
    }
    writer.finish()?;

    Ok(())
}
