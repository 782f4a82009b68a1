//! Results must not depend on pool size, scheduling or chunk parallelism.

use dupescan::duplicates::{DuplicateFinder, DuplicateGroups, FinderConfig, FinderError};
use dupescan::progress::ProgressCallback;
use dupescan::scanner::Hasher;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn scan_with(root: &Path, threads: usize) -> DuplicateGroups {
    let report = DuplicateFinder::new(FinderConfig::default().with_io_threads(threads))
        .find_duplicates(root)
        .unwrap();
    assert!(report.errors.is_empty());
    assert_eq!(report.summary.io_threads, threads);
    report.groups
}

#[test]
fn test_thousands_of_identical_files_any_pool_size() {
    let dir = TempDir::new().unwrap();
    for d in 0..40 {
        let sub = dir.path().join(format!("d{d:02}"));
        fs::create_dir(&sub).unwrap();
        for f in 0..50 {
            fs::write(sub.join(format!("f{f:02}")), b"identical payload").unwrap();
        }
    }

    for threads in [1, 4, 64] {
        let groups = scan_with(dir.path(), threads);
        assert_eq!(groups.len(), 1, "pool size {threads}");
        let group = groups.iter().next().unwrap();
        assert_eq!(group.len(), 2000);
        assert!(group.paths.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn test_mixed_tree_identical_across_pool_sizes() {
    let dir = TempDir::new().unwrap();
    for i in 0..600 {
        let sub = dir.path().join(format!("l1-{}", i % 7)).join(format!("l2-{}", i % 3));
        fs::create_dir_all(&sub).unwrap();
        let content = vec![(i % 37) as u8; (i % 37) * 100];
        fs::write(sub.join(format!("file{i}")), content).unwrap();
    }

    let baseline = scan_with(dir.path(), 1);
    assert_eq!(baseline.len(), 37);
    assert_eq!(baseline.file_count(), 600);
    for threads in [2, 4, 16, 64] {
        assert_eq!(scan_with(dir.path(), threads), baseline, "pool size {threads}");
    }
}

#[test]
fn test_parallel_chunk_hashing_matches_sequential() {
    let dir = TempDir::new().unwrap();
    let content: Vec<u8> = (0..700_000u32).map(|i| (i * 31 % 251) as u8).collect();
    let path = dir.path().join("big.bin");
    fs::write(&path, &content).unwrap();

    let sequential = Hasher::new()
        .with_chunk_size(1024)
        .with_parallel_threshold(None)
        .compute_fingerprint(&path)
        .unwrap();
    let parallel = Hasher::new()
        .with_chunk_size(1024)
        .with_parallel_threshold(Some(0))
        .compute_fingerprint(&path)
        .unwrap();
    assert_eq!(sequential, parallel);

    fs::write(dir.path().join("copy.bin"), &content).unwrap();
    let report = DuplicateFinder::new(
        FinderConfig::default()
            .with_chunk_size(1024)
            .with_parallel_threshold(Some(1)),
    )
    .find_duplicates(dir.path())
    .unwrap();
    assert_eq!(report.groups.get(&sequential).unwrap().len(), 2);
}

#[test]
fn test_open_files_never_exceed_pool_size_with_chunk_parallelism() {
    let dir = TempDir::new().unwrap();
    let content: Vec<u8> = (0..400_000u32).map(|i| (i * 7 % 253) as u8).collect();
    for d in 0..64 {
        let sub = dir.path().join(format!("d{d:02}"));
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("big.bin"), &content).unwrap();
    }

    let mut baseline = None;
    for threads in [2, 4, 8] {
        for _ in 0..3 {
            let report = DuplicateFinder::new(
                FinderConfig::default()
                    .with_io_threads(threads)
                    .with_chunk_size(64)
                    .with_parallel_threshold(Some(0)),
            )
            .find_duplicates(dir.path())
            .unwrap();

            assert_eq!(report.summary.files_hashed, 64);
            assert!(
                report.summary.peak_open_files <= threads,
                "{} files open with {threads} workers",
                report.summary.peak_open_files
            );
            let groups: &DuplicateGroups = baseline.get_or_insert_with(|| report.groups.clone());
            assert_eq!(&report.groups, groups, "pool size {threads}");
        }
    }
}

#[derive(Default)]
struct Counting {
    starts: AtomicUsize,
    ends: AtomicUsize,
    files: AtomicUsize,
    bytes: AtomicU64,
}

impl ProgressCallback for Counting {
    fn on_phase_start(&self, _phase: &str, _total: usize) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_progress(&self, _current: usize, _path: &str) {
        self.files.fetch_add(1, Ordering::SeqCst);
    }

    fn on_item_completed(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::SeqCst);
    }

    fn on_phase_end(&self, _phase: &str) {
        self.ends.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_progress_reported_once_per_file() {
    let dir = TempDir::new().unwrap();
    for i in 0..100 {
        fs::write(dir.path().join(format!("f{i}")), vec![1u8; i]).unwrap();
    }
    let counting = Arc::new(Counting::default());

    let report = DuplicateFinder::new(
        FinderConfig::default()
            .with_io_threads(8)
            .with_progress_callback(counting.clone()),
    )
    .find_duplicates(dir.path())
    .unwrap();

    assert_eq!(counting.starts.load(Ordering::SeqCst), 1);
    assert_eq!(counting.ends.load(Ordering::SeqCst), 1);
    assert_eq!(counting.files.load(Ordering::SeqCst), 100);
    assert_eq!(counting.bytes.load(Ordering::SeqCst), (0..100u64).sum::<u64>());
    assert_eq!(report.summary.bytes_hashed, (0..100u64).sum::<u64>());
}

/// Raises the shutdown flag after a few files have been hashed.
struct StopAfter {
    limit: usize,
    flag: Arc<AtomicBool>,
}

impl ProgressCallback for StopAfter {
    fn on_phase_start(&self, _phase: &str, _total: usize) {}

    fn on_progress(&self, current: usize, _path: &str) {
        if current >= self.limit {
            self.flag.store(true, Ordering::SeqCst);
        }
    }

    fn on_phase_end(&self, _phase: &str) {}
}

#[test]
fn test_shutdown_during_scan_is_interrupted() {
    let dir = TempDir::new().unwrap();
    for d in 0..10 {
        let sub = dir.path().join(format!("d{d}"));
        fs::create_dir(&sub).unwrap();
        for f in 0..30 {
            fs::write(sub.join(format!("f{f}")), [d as u8, f as u8]).unwrap();
        }
    }
    let flag = Arc::new(AtomicBool::new(false));
    let config = FinderConfig::default()
        .with_io_threads(2)
        .with_shutdown_flag(flag.clone())
        .with_progress_callback(Arc::new(StopAfter {
            limit: 5,
            flag: flag.clone(),
        }));

    let result = DuplicateFinder::new(config).find_duplicates(dir.path());
    assert!(matches!(result, Err(FinderError::Interrupted)));
}
