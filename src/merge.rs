//! External k-way file merger.

use log;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver};

use crate::budget::{BudgetError, BufferBudget, BufferPlan};
use crate::merger::RecordMerger;
use crate::scanner::ReverseRecordScanner;
use crate::segment::SegmentTracker;
use crate::text;
use crate::writer::TargetWriter;

/// Default bound of each producer's record queue.
const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Merging error.
#[derive(Debug)]
pub enum MergeError {
    /// Invalid merge configuration (fewer than two sources, bad split ratio, ...).
    /// Raised before any source byte is read.
    InvalidConfiguration(String),
    /// A read or write buffer is beneath its minimum size.
    /// Raised before any source byte is read.
    BufferTooSmall { size: usize, min: usize },
    /// Producer thread creation error.
    ThreadSpawn(io::Error),
    /// Common I/O error.
    IO(io::Error),
    /// A source's reverse scan failed.
    SourceScan(ScanError),
    /// A fully drained source did not shrink to its BOM prefix length; indicates a
    /// boundary bookkeeping defect, not an environmental fault.
    ReclamationInvariant {
        source: PathBuf,
        expected: u64,
        actual: u64,
    },
}

impl Error for MergeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MergeError::ThreadSpawn(err) => Some(err),
            MergeError::IO(err) => Some(err),
            MergeError::SourceScan(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeError::InvalidConfiguration(reason) => write!(f, "invalid configuration: {}", reason),
            MergeError::BufferTooSmall { size, min } => {
                write!(f, "buffer of {} bytes is beneath the {} byte minimum", size, min)
            }
            MergeError::ThreadSpawn(err) => write!(f, "producer thread creation failed: {}", err),
            MergeError::IO(err) => write!(f, "I/O operation failed: {}", err),
            MergeError::SourceScan(err) => write!(f, "source scan failed: {}", err),
            MergeError::ReclamationInvariant {
                source,
                expected,
                actual,
            } => write!(
                f,
                "drained source {} is {} bytes, expected {}",
                source.display(),
                actual,
                expected
            ),
        }
    }
}

impl From<BudgetError> for MergeError {
    fn from(err: BudgetError) -> Self {
        match err {
            BudgetError::BufferTooSmall { size, min } => MergeError::BufferTooSmall { size, min },
            other => MergeError::InvalidConfiguration(other.to_string()),
        }
    }
}

/// I/O failure of one source's reverse scan, tagged with the source path.
#[derive(Debug)]
pub struct ScanError {
    path: PathBuf,
    error: io::Error,
}

impl Error for ScanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

impl Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

/// File merger builder. Provides methods for [`FileMerger`] initialization.
#[derive(Debug, Clone)]
pub struct FileMergerBuilder {
    /// Record separator bytes.
    delimiter: Vec<u8>,
    /// BOM prefix bytes; empty disables BOM handling.
    bom: Vec<u8>,
    /// Buffer sizing strategy.
    plan: BufferPlan,
    /// Whether to truncate and finally delete sources as they are consumed.
    reclaim: bool,
    /// Bound of each producer's record queue.
    queue_capacity: usize,
}

impl FileMergerBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        FileMergerBuilder::default()
    }

    /// Sets the record separator (`\n` by default). Must be non-empty.
    pub fn with_delimiter(mut self, delimiter: &[u8]) -> FileMergerBuilder {
        self.delimiter = delimiter.to_vec();
        self
    }

    /// Sets the BOM byte prefix (none by default). Sources starting with it are
    /// scanned from after it; the target gets it written once up front.
    pub fn with_bom(mut self, bom: &[u8]) -> FileMergerBuilder {
        self.bom = bom.to_vec();
        self
    }

    /// Sets the buffer sizing strategy.
    pub fn with_buffer_plan(mut self, plan: BufferPlan) -> FileMergerBuilder {
        self.plan = plan;
        self
    }

    /// Enables or disables incremental disk reclamation.
    pub fn with_disk_reclamation(mut self, reclaim: bool) -> FileMergerBuilder {
        self.reclaim = reclaim;
        self
    }

    /// Sets the bound of each producer's record queue.
    pub fn with_queue_capacity(mut self, capacity: usize) -> FileMergerBuilder {
        self.queue_capacity = capacity;
        self
    }

    /// Builds a [`FileMerger`] instance using provided configuration.
    pub fn build(self) -> Result<FileMerger, MergeError> {
        if self.delimiter.is_empty() {
            return Err(MergeError::InvalidConfiguration("delimiter must be non-empty".into()));
        }
        if self.queue_capacity == 0 {
            return Err(MergeError::InvalidConfiguration(
                "queue capacity must be at least 1".into(),
            ));
        }

        Ok(FileMerger {
            delimiter: self.delimiter,
            bom: self.bom,
            plan: self.plan,
            reclaim: self.reclaim,
            queue_capacity: self.queue_capacity,
        })
    }
}

impl Default for FileMergerBuilder {
    fn default() -> Self {
        FileMergerBuilder {
            delimiter: b"\n".to_vec(),
            bom: Vec::new(),
            plan: BufferPlan::default(),
            reclaim: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// One open source and its bookkeeping.
struct SourceInput {
    path: PathBuf,
    file: fs::File,
    length: u64,
    bom_len: u64,
    tracker: Arc<SegmentTracker>,
    /// Length the file was last truncated to; avoids redundant `set_len` calls.
    truncated_to: u64,
}

/// Iterator over one producer's queue. Ends when the producer hangs up.
struct SourceRecords {
    records: Receiver<Result<Vec<u8>, ScanError>>,
}

impl Iterator for SourceRecords {
    type Item = Result<Vec<u8>, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.recv().ok()
    }
}

/// External k-way merger of pre-sorted, line-delimited files.
///
/// Each source is consumed tail-to-head by its own producer thread, so every source
/// must be stored sorted under the *reverse* of the merge comparator. The merged
/// output therefore comes out in the comparator's order, which is the reverse of the
/// sources' physical order; [`crate::invert`] is the separate pass restoring direct
/// order. The reverse consumption direction is what makes incremental truncation of
/// the sources safe.
pub struct FileMerger {
    delimiter: Vec<u8>,
    bom: Vec<u8>,
    plan: BufferPlan,
    reclaim: bool,
    queue_capacity: usize,
}

impl FileMerger {
    /// Merges `sources` into `target` under ascending raw-byte order.
    /// Every source must be stored sorted descending (byte-wise).
    ///
    /// The target handle is consumed and closed on every exit path. Partial output
    /// already flushed before a failure is not rolled back.
    pub fn merge<P>(&self, sources: &[P], target: fs::File) -> Result<(), MergeError>
    where
        P: AsRef<Path>,
    {
        self.merge_by(sources, target, |a: &[u8], b: &[u8]| a.cmp(b))
    }

    /// Merges `sources` into `target` under a custom total order over record bytes.
    /// Every source's tail-to-head record stream must be ordered ascending under
    /// `compare`, i.e. each source file is stored sorted under the reverse order.
    ///
    /// # Arguments
    /// * `sources` - Paths of at least two distinct pre-sorted files
    /// * `target` - Output file; create/truncate semantics are owned by the caller
    /// * `compare` - Total order the merged stream is produced under
    pub fn merge_by<P, F>(&self, sources: &[P], target: fs::File, compare: F) -> Result<(), MergeError>
    where
        P: AsRef<Path>,
        F: Fn(&[u8], &[u8]) -> Ordering + Copy,
    {
        if sources.len() < 2 {
            return Err(MergeError::InvalidConfiguration(format!(
                "at least 2 sources required, got {}",
                sources.len()
            )));
        }
        self.plan.validate()?;
        if let BufferPlan::Explicit { read_buffer_sizes, .. } = &self.plan {
            if read_buffer_sizes.len() != sources.len() {
                return Err(BudgetError::SourceCountMismatch {
                    buffers: read_buffer_sizes.len(),
                    sources: sources.len(),
                }
                .into());
            }
        }

        let mut inputs = Vec::with_capacity(sources.len());
        for path in sources {
            inputs.push(self.open_source(path.as_ref())?);
        }

        let sizes = Vec::from_iter(inputs.iter().map(|input| input.length));
        let budget = self.plan.resolve(&sizes)?;
        log::debug!(
            "merging {} sources (write buffer: {} bytes, reclaim: {})",
            inputs.len(),
            budget.write_buffer_size,
            self.reclaim
        );

        let (producers, receivers) = self.spawn_producers(&inputs, &budget)?;

        // receivers are consumed (and on failure dropped) by the merge loop, which
        // unblocks every producer still sending; join before surfacing the result
        let result = self.run(inputs, receivers, target, budget.write_buffer_size, compare);
        for producer in producers {
            let _ = producer.join();
        }

        result
    }

    fn open_source(&self, path: &Path) -> Result<SourceInput, MergeError> {
        let mut file = fs::OpenOptions::new()
            .read(true)
            .write(self.reclaim)
            .open(path)
            .map_err(MergeError::IO)?;
        let length = file.metadata().map_err(MergeError::IO)?.len();
        let bom_len = text::detect_bom(&mut file, &self.bom).map_err(MergeError::IO)?;

        Ok(SourceInput {
            path: path.to_path_buf(),
            file,
            length,
            bom_len,
            tracker: Arc::new(SegmentTracker::new(length)),
            truncated_to: length,
        })
    }

    /// Spawns one scanning thread per source, each feeding a bounded queue.
    /// On failure the queues created so far are dropped and the spawned threads
    /// joined before the error is returned.
    fn spawn_producers(
        &self,
        inputs: &[SourceInput],
        budget: &BufferBudget,
    ) -> Result<(Vec<thread::JoinHandle<()>>, Vec<SourceRecords>), MergeError> {
        let mut producers = Vec::with_capacity(inputs.len());
        let mut receivers = Vec::with_capacity(inputs.len());

        for (idx, input) in inputs.iter().enumerate() {
            let spawned = self.spawn_producer(idx, input, budget.read_buffer_sizes[idx]);
            match spawned {
                Ok((producer, records)) => {
                    producers.push(producer);
                    receivers.push(records);
                }
                Err(err) => {
                    drop(receivers);
                    for producer in producers {
                        let _ = producer.join();
                    }
                    return Err(err);
                }
            }
        }

        Ok((producers, receivers))
    }

    fn spawn_producer(
        &self,
        idx: usize,
        input: &SourceInput,
        read_buffer_size: usize,
    ) -> Result<(thread::JoinHandle<()>, SourceRecords), MergeError> {
        let reader = input.file.try_clone().map_err(MergeError::IO)?;
        let scanner = ReverseRecordScanner::new(
            reader,
            input.length,
            input.bom_len,
            self.delimiter.clone(),
            read_buffer_size,
            Arc::clone(&input.tracker),
        );

        let path = input.path.clone();
        let (sender, receiver) = bounded(self.queue_capacity);
        let producer = thread::Builder::new()
            .name(format!("merge-source-{}", idx))
            .spawn(move || {
                for record in scanner {
                    match record {
                        Ok(record) => {
                            // a send error means the merge loop hung up; stop quietly
                            if sender.send(Ok(record)).is_err() {
                                break;
                            }
                        }
                        Err(error) => {
                            let _ = sender.send(Err(ScanError {
                                path: path.clone(),
                                error,
                            }));
                            break;
                        }
                    }
                }
            })
            .map_err(MergeError::ThreadSpawn)?;

        Ok((producer, SourceRecords { records: receiver }))
    }

    fn run<F>(
        &self,
        mut inputs: Vec<SourceInput>,
        receivers: Vec<SourceRecords>,
        target: fs::File,
        write_buffer_size: usize,
        compare: F,
    ) -> Result<(), MergeError>
    where
        F: Fn(&[u8], &[u8]) -> Ordering + Copy,
    {
        let merger = RecordMerger::new(receivers, move |a: &Vec<u8>, b: &Vec<u8>| {
            compare(a.as_slice(), b.as_slice())
        });
        let mut writer = TargetWriter::new(target, write_buffer_size, self.delimiter.clone(), self.bom.clone());

        let mut records = 0u64;
        for record in merger {
            let record = record.map_err(MergeError::SourceScan)?;
            writer.push(&record).map_err(MergeError::IO)?;
            records += 1;

            if self.reclaim {
                reclaim_step(&mut inputs)?;
            }
        }

        writer.finish().map_err(MergeError::IO)?;
        log::debug!("merged {} records", records);

        if self.reclaim {
            finish_reclamation(inputs)?;
        }

        Ok(())
    }
}

/// Shrinks every source whose segment boundary dropped since the last truncation.
/// Safe because all bytes at or beyond the boundary are already delivered or queued.
fn reclaim_step(inputs: &mut [SourceInput]) -> Result<(), MergeError> {
    for input in inputs {
        let boundary = input.tracker.get();
        if boundary < input.truncated_to {
            input.file.set_len(boundary).map_err(MergeError::IO)?;
            input.truncated_to = boundary;
        }
    }
    Ok(())
}

/// Final reclamation: truncate to the last boundary, verify each source shrank to
/// exactly its BOM prefix and delete it.
fn finish_reclamation(mut inputs: Vec<SourceInput>) -> Result<(), MergeError> {
    reclaim_step(&mut inputs)?;

    for input in inputs {
        let actual = input.file.metadata().map_err(MergeError::IO)?.len();
        if actual != input.bom_len {
            return Err(MergeError::ReclamationInvariant {
                source: input.path,
                expected: input.bom_len,
                actual,
            });
        }

        drop(input.file);
        fs::remove_file(&input.path).map_err(MergeError::IO)?;
        log::debug!("reclaimed drained source {}", input.path.display());
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    use rand::prelude::*;
    use rstest::*;

    use crate::budget::{BufferPlan, MIN_READ_BUFFER_SIZE, MIN_WRITE_BUFFER_SIZE};
    use crate::text::UTF8_BOM;

    use super::{FileMerger, FileMergerBuilder, MergeError};

    fn descending(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
        b.cmp(a)
    }

    fn write_source(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn merge_to_string(merger: &FileMerger, sources: &[PathBuf], dir: &Path) -> String {
        let target_path = dir.join("target");
        let target = fs::File::create(&target_path).unwrap();
        merger.merge_by(sources, target, descending).unwrap();
        fs::read_to_string(&target_path).unwrap()
    }

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[rstest]
    fn test_merge_two_sources_descending(tmp_dir: tempfile::TempDir) {
        let sources = vec![
            write_source(tmp_dir.path(), "first", b"b\nd\nf"),
            write_source(tmp_dir.path(), "second", b"a\nc\ne"),
        ];

        let merger = FileMergerBuilder::new().build().unwrap();
        let content = merge_to_string(&merger, &sources, tmp_dir.path());

        assert_eq!(content, "f\ne\nd\nc\nb\na");
    }

    #[rstest]
    fn test_merge_default_byte_order(tmp_dir: tempfile::TempDir) {
        // ascending merge: sources are stored descending, scanned tail-to-head
        let sources = vec![
            write_source(tmp_dir.path(), "first", b"f\nd\nb"),
            write_source(tmp_dir.path(), "second", b"e\nc\na"),
        ];

        let target_path = tmp_dir.path().join("target");
        let target = fs::File::create(&target_path).unwrap();
        let merger = FileMergerBuilder::new().build().unwrap();
        merger.merge(&sources, target).unwrap();

        assert_eq!(fs::read_to_string(&target_path).unwrap(), "a\nb\nc\nd\ne\nf");
    }

    #[rstest]
    fn test_subset_prefix_sources_sum_record_counts(tmp_dir: tempfile::TempDir) {
        let sources = vec![
            write_source(tmp_dir.path(), "first", b"a\nb\nc"),
            write_source(tmp_dir.path(), "second", b"a\nb"),
        ];

        let merger = FileMergerBuilder::new().build().unwrap();
        let content = merge_to_string(&merger, &sources, tmp_dir.path());

        assert_eq!(content.split('\n').count(), 5);
        assert_eq!(content, "c\nb\nb\na\na");
    }

    #[rstest]
    fn test_empty_record_framed_by_separators(tmp_dir: tempfile::TempDir) {
        let sources = vec![
            write_source(tmp_dir.path(), "first", b"\nx"),
            write_source(tmp_dir.path(), "second", b"a"),
        ];

        let merger = FileMergerBuilder::new().build().unwrap();
        let content = merge_to_string(&merger, &sources, tmp_dir.path());

        assert_eq!(content, "x\na\n");
    }

    #[rstest]
    fn test_merge_is_multiset_union(tmp_dir: tempfile::TempDir) {
        let mut records = Vec::from_iter((0..500u32).map(|_| format!("{:08}", rand::thread_rng().gen::<u32>())));

        let mut sources = Vec::new();
        for (idx, part) in records.chunks(173).enumerate() {
            let mut part = part.to_vec();
            part.sort();
            sources.push(write_source(
                tmp_dir.path(),
                &format!("part-{}", idx),
                part.join("\n").as_bytes(),
            ));
        }

        let merger = FileMergerBuilder::new().build().unwrap();
        let content = merge_to_string(&merger, &sources, tmp_dir.path());

        let mut merged = Vec::from_iter(content.split('\n').map(str::to_owned));
        assert!(merged.windows(2).all(|pair| pair[0] >= pair[1]));

        merged.sort();
        records.sort();
        assert_eq!(merged, records);
    }

    #[rstest]
    fn test_disk_reclamation_deletes_sources(tmp_dir: tempfile::TempDir) {
        let sources = vec![
            write_source(tmp_dir.path(), "first", b"b\nd\nf"),
            write_source(tmp_dir.path(), "second", b"a\nc\ne"),
        ];

        let merger = FileMergerBuilder::new().with_disk_reclamation(true).build().unwrap();
        let content = merge_to_string(&merger, &sources, tmp_dir.path());

        assert_eq!(content, "f\ne\nd\nc\nb\na");
        for source in sources {
            assert!(!source.exists(), "source {} not deleted", source.display());
        }
    }

    #[rstest]
    fn test_reclamation_source_lengths_never_grow(tmp_dir: tempfile::TempDir) {
        let mut rng = rand::thread_rng();

        // enough records, some far larger than the read buffers, to force many
        // blocks, flushes and truncation steps per source
        let mut all_records = Vec::new();
        let mut sources = Vec::new();
        for idx in 0..2 {
            let mut records: Vec<String> = (0..2000)
                .map(|_| {
                    let len = rng.gen_range(1..512);
                    (0..len).map(|_| char::from(rng.gen_range(b'a'..=b'z'))).collect()
                })
                .collect();
            records.sort();
            all_records.extend(records.iter().cloned());
            sources.push(write_source(
                tmp_dir.path(),
                &format!("part-{}", idx),
                records.join("\n").as_bytes(),
            ));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let watcher = {
            let stop = Arc::clone(&stop);
            let paths = sources.clone();
            thread::spawn(move || {
                let mut last = vec![u64::MAX; paths.len()];
                let mut grew = false;
                while !stop.load(Ordering::Relaxed) {
                    for (idx, path) in paths.iter().enumerate() {
                        if let Ok(metadata) = fs::metadata(path) {
                            if metadata.len() > last[idx] {
                                grew = true;
                            }
                            last[idx] = metadata.len();
                        }
                    }
                    thread::yield_now();
                }
                grew
            })
        };

        let merger = FileMergerBuilder::new()
            .with_buffer_plan(BufferPlan::Explicit {
                write_buffer_size: MIN_WRITE_BUFFER_SIZE,
                read_buffer_sizes: vec![MIN_READ_BUFFER_SIZE; 2],
            })
            .with_disk_reclamation(true)
            .build()
            .unwrap();
        let content = merge_to_string(&merger, &sources, tmp_dir.path());

        stop.store(true, Ordering::Relaxed);
        let grew = watcher.join().unwrap();
        assert!(!grew, "a source's on-disk length increased during the merge");

        for source in &sources {
            assert!(!source.exists(), "source {} not deleted", source.display());
        }

        let mut merged = Vec::from_iter(content.split('\n').map(str::to_owned));
        assert!(merged.windows(2).all(|pair| pair[0] >= pair[1]));
        merged.sort();
        all_records.sort();
        assert_eq!(merged, all_records);
    }

    #[cfg(unix)]
    #[rstest]
    fn test_source_scan_failure_aborts_merge(tmp_dir: tempfile::TempDir) {
        // every record of "small" compares below every record of "large", so the
        // merge drains "large" first while small's producer sits blocked on its
        // capacity-1 queue with only the tail block of the file read
        let small_records = Vec::from_iter((0..8_000).map(|n| format!("a{:06}", n)));
        let large_records = Vec::from_iter((0..10_000).map(|n| format!("b{:06}", n)));
        let sources = vec![
            write_source(tmp_dir.path(), "small", small_records.join("\n").as_bytes()),
            write_source(tmp_dir.path(), "large", large_records.join("\n").as_bytes()),
        ];

        // once the first write-buffer flush is observable the merge is underway and
        // small's scanner position is still near the file tail; cutting the file off
        // far below it makes the next block read fail
        let truncated = sources[0].clone();
        let target_path = tmp_dir.path().join("target");
        let observed_path = target_path.clone();
        let saboteur = thread::spawn(move || {
            while fs::metadata(&observed_path).map(|m| m.len() == 0).unwrap_or(true) {
                thread::yield_now();
            }
            fs::OpenOptions::new()
                .write(true)
                .open(&truncated)
                .unwrap()
                .set_len(1024)
                .unwrap();
        });

        let target = fs::File::create(&target_path).unwrap();
        let merger = FileMergerBuilder::new()
            .with_buffer_plan(BufferPlan::Explicit {
                write_buffer_size: MIN_WRITE_BUFFER_SIZE,
                read_buffer_sizes: vec![MIN_READ_BUFFER_SIZE; 2],
            })
            .with_queue_capacity(1)
            .build()
            .unwrap();

        let result = merger.merge_by(&sources, target, descending);
        saboteur.join().unwrap();

        assert!(matches!(result, Err(MergeError::SourceScan(_))));
        // partial output is kept, sources are not deleted
        assert!(sources.iter().all(|source| source.exists()));
    }

    #[rstest]
    fn test_bom_sources_and_target(tmp_dir: tempfile::TempDir) {
        let sources = vec![
            write_source(tmp_dir.path(), "first", b"\xEF\xBB\xBFb\nd"),
            write_source(tmp_dir.path(), "second", b"\xEF\xBB\xBFa\nc"),
        ];

        let target_path = tmp_dir.path().join("target");
        let target = fs::File::create(&target_path).unwrap();
        let merger = FileMergerBuilder::new()
            .with_bom(UTF8_BOM)
            .with_disk_reclamation(true)
            .build()
            .unwrap();
        merger.merge_by(&sources, target, descending).unwrap();

        assert_eq!(fs::read(&target_path).unwrap(), b"\xEF\xBB\xBFd\nc\nb\na");
        for source in sources {
            assert!(!source.exists());
        }
    }

    #[rstest]
    fn test_too_few_sources_rejected(tmp_dir: tempfile::TempDir) {
        let sources = vec![write_source(tmp_dir.path(), "only", b"a\nb")];

        let target = fs::File::create(tmp_dir.path().join("target")).unwrap();
        let merger = FileMergerBuilder::new().build().unwrap();
        let result = merger.merge(&sources, target);

        assert!(matches!(result, Err(MergeError::InvalidConfiguration(_))));
    }

    #[rstest]
    fn test_undersized_buffer_rejected_before_io(tmp_dir: tempfile::TempDir) {
        let sources = vec![
            write_source(tmp_dir.path(), "first", b"b\nd\nf"),
            write_source(tmp_dir.path(), "second", b"a\nc\ne"),
        ];

        let target_path = tmp_dir.path().join("target");
        let target = fs::File::create(&target_path).unwrap();
        let merger = FileMergerBuilder::new()
            .with_buffer_plan(BufferPlan::Explicit {
                write_buffer_size: MIN_WRITE_BUFFER_SIZE - 1,
                read_buffer_sizes: vec![MIN_READ_BUFFER_SIZE; 2],
            })
            .build()
            .unwrap();

        let result = merger.merge(&sources, target);
        assert!(matches!(result, Err(MergeError::BufferTooSmall { .. })));

        // nothing was read or written
        assert_eq!(fs::metadata(&target_path).unwrap().len(), 0);
        assert_eq!(fs::read(&sources[0]).unwrap(), b"b\nd\nf");
    }

    #[test]
    fn test_empty_delimiter_rejected() {
        let result = FileMergerBuilder::new().with_delimiter(b"").build();
        assert!(matches!(result, Err(MergeError::InvalidConfiguration(_))));
    }
}
