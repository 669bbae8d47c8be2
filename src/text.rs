//! Text helpers: BOM detection and comparator adaptation.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::str;

/// UTF-8 byte-order mark.
pub const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Returns the length of `bom` if the file starts with it, 0 otherwise.
/// The file cursor position is not restored; callers seek explicitly.
pub fn detect_bom(file: &mut fs::File, bom: &[u8]) -> io::Result<u64> {
    if bom.is_empty() {
        return Ok(0);
    }

    let mut prefix = vec![0u8; bom.len()];
    file.seek(io::SeekFrom::Start(0))?;

    let mut filled = 0;
    while filled < prefix.len() {
        match file.read(&mut prefix[filled..])? {
            0 => return Ok(0), // file shorter than the BOM
            n => filled += n,
        }
    }

    if prefix == bom {
        Ok(bom.len() as u64)
    } else {
        Ok(0)
    }
}

/// Adapts a string comparator into a raw-byte comparator. Records are compared as
/// UTF-8; records that are not valid UTF-8 fall back to raw byte order.
pub fn compare_with<F>(compare: F) -> impl Fn(&[u8], &[u8]) -> Ordering + Copy
where
    F: Fn(&str, &str) -> Ordering + Copy,
{
    move |a: &[u8], b: &[u8]| match (str::from_utf8(a), str::from_utf8(b)) {
        (Ok(a_str), Ok(b_str)) => compare(a_str, b_str),
        _ => a.cmp(b),
    }
}
