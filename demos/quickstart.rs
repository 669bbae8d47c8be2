use std::fs;

use env_logger;
use log;

use ext_merge::{invert, BufferPlan, FileMergerBuilder};

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    // part-1.txt and part-2.txt are each sorted ascending, one record per line;
    // their tail-to-head streams are therefore descending
    let sources = ["part-1.txt", "part-2.txt"];

    let merger = FileMergerBuilder::new()
        .with_buffer_plan(BufferPlan::Budget {
            total_bytes: 8 * 1024 * 1024,
            write_ratio: 0.5,
        })
        .with_disk_reclamation(true)
        .build()
        .unwrap();

    let merged = fs::File::create("merged.rev").unwrap();
    merger
        .merge_by(&sources, merged, |a: &[u8], b: &[u8]| b.cmp(a))
        .unwrap();

    // merged.rev is sorted descending; the rewrite pass restores ascending order
    let output = fs::File::create("output.txt").unwrap();
    invert("merged.rev", output, b"\n", b"").unwrap();
    fs::remove_file("merged.rev").unwrap();
}
