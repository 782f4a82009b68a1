//! Duplicate finder: runs a traversal on a bounded pool and applies the error policy.
//!
//! # Overview
//!
//! [`DuplicateFinder::find_duplicates`] is the library entry point:
//! 1. **Validate** - the root must exist, be a directory and be listable
//! 2. **Walk** - a [`Walker`] runs inside a rayon pool of `io_threads` workers,
//!    with at most `io_threads` files open at once
//! 3. **Report** - groups, sorted path errors and a [`ScanSummary`]
//!
//! Path-level failures do not stop the run unless strict mode is enabled,
//! in which case the first failure cancels outstanding work and is returned.
//!
//! # Example
//!
//! ```no_run
//! use dupescan::duplicates::{DuplicateFinder, FinderConfig, ScanOutcome};
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::new(FinderConfig::default().with_io_threads(8));
//! let report = finder.find_duplicates(Path::new(".")).unwrap();
//!
//! for group in report.groups.duplicates() {
//!     println!("{} x{}", group.fingerprint, group.len());
//! }
//! if let ScanOutcome::Partial { errors } = report.outcome() {
//!     eprintln!("{errors} paths could not be processed");
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytesize::ByteSize;

use super::DuplicateGroups;
use crate::progress::ProgressCallback;
use crate::scanner::{
    build_chunk_pool, Hasher, OpenFileLimit, ScanError, Walker, WalkerConfig, DEFAULT_CHUNK_SIZE,
    DEFAULT_PARALLEL_THRESHOLD,
};

/// Configuration for the duplicate finder.
#[derive(Clone)]
pub struct FinderConfig {
    /// Number of worker threads for traversal and hashing.
    /// Bounds concurrently open files. Default is 4.
    pub io_threads: usize,
    /// Fail-fast on the first path error.
    pub strict: bool,
    /// Chunk size used for fingerprints.
    pub chunk_size: usize,
    /// Files at least this large hash their chunks in parallel.
    pub parallel_threshold: Option<u64>,
    /// Walker configuration for directory traversal.
    pub walker_config: WalkerConfig,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback for reporting.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("io_threads", &self.io_threads)
            .field("strict", &self.strict)
            .field("chunk_size", &self.chunk_size)
            .field("parallel_threshold", &self.parallel_threshold)
            .field("walker_config", &self.walker_config)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            io_threads: 4,
            strict: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallel_threshold: Some(DEFAULT_PARALLEL_THRESHOLD),
            walker_config: WalkerConfig::default(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FinderConfig {
    /// Set the worker thread count (minimum 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set fail-fast on the first error.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the fingerprint chunk size, clamped to `1..=MAX_CHUNK_SIZE`.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, crate::scanner::MAX_CHUNK_SIZE);
        self
    }

    /// Set the parallel chunk hashing threshold.
    #[must_use]
    pub fn with_parallel_threshold(mut self, threshold: Option<u64>) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Summary statistics from a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Directories successfully listed
    pub directories_scanned: usize,
    /// Files successfully hashed
    pub files_hashed: usize,
    /// Bytes hashed
    pub bytes_hashed: u64,
    /// Distinct fingerprints
    pub unique_fingerprints: usize,
    /// Groups with two or more files
    pub duplicate_groups: usize,
    /// Redundant copies (excluding one original per group)
    pub duplicate_files: usize,
    /// Space reclaimable by removing redundant copies
    pub reclaimable_space: u64,
    /// Path-level errors recorded
    pub error_count: usize,
    /// Worker threads used
    pub io_threads: usize,
    /// Most files held open at the same time
    pub peak_open_files: usize,
    /// Duration of the entire scan
    pub scan_duration: Duration,
}

impl ScanSummary {
    /// Format reclaimable space as a human-readable string.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        ByteSize(self.reclaimable_space).to_string()
    }

    /// Format hashed bytes as a human-readable string.
    #[must_use]
    pub fn bytes_hashed_display(&self) -> String {
        ByteSize(self.bytes_hashed).to_string()
    }
}

/// How completely a scan covered the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every discovered path was processed.
    Complete,
    /// Some paths failed; their errors are in [`ScanReport::errors`].
    Partial {
        /// Number of path-level errors
        errors: usize,
    },
}

/// Result of a completed scan.
#[derive(Debug)]
pub struct ScanReport {
    /// Every hashed file, grouped by fingerprint
    pub groups: DuplicateGroups,
    /// Path-level errors, sorted by path
    pub errors: Vec<ScanError>,
    /// Summary statistics
    pub summary: ScanSummary,
}

impl ScanReport {
    /// Whether the scan was complete or partial.
    #[must_use]
    pub fn outcome(&self) -> ScanOutcome {
        if self.errors.is_empty() {
            ScanOutcome::Complete
        } else {
            ScanOutcome::Partial {
                errors: self.errors.len(),
            }
        }
    }

    /// Whether at least one group has two or more files.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        self.groups.duplicates().next().is_some()
    }
}

/// Errors that end a scan without a report.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The provided path does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The provided path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The root directory exists but cannot be read.
    #[error("Cannot read root directory {path}: {source}")]
    RootUnreadable {
        /// Root path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The worker pool could not be created.
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A path error in strict mode.
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Duplicate finder that runs one traversal per call.
///
/// # Example
///
/// ```no_run
/// use dupescan::duplicates::DuplicateFinder;
/// use std::path::Path;
///
/// let finder = DuplicateFinder::with_defaults();
/// match finder.find_duplicates(Path::new(".")) {
///     Ok(report) => println!("{} duplicate groups", report.summary.duplicate_groups),
///     Err(e) => eprintln!("Scan failed: {}", e),
/// }
/// ```
pub struct DuplicateFinder {
    config: FinderConfig,
    hasher: Arc<Hasher>,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let mut hasher = Hasher::new()
            .with_chunk_size(config.chunk_size)
            .with_parallel_threshold(config.parallel_threshold);
        if let Some(ref flag) = config.shutdown_flag {
            hasher = hasher.with_shutdown_flag(flag.clone());
        }
        Self {
            config,
            hasher: Arc::new(hasher),
        }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// The configuration this finder runs with.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Hasher settings shared by every run.
    ///
    /// Each run adds its own chunk pool and open-file limit.
    #[must_use]
    pub fn hasher(&self) -> &Hasher {
        &self.hasher
    }

    /// Scan a directory tree and group its files by content.
    ///
    /// # Errors
    ///
    /// Returns `FinderError` if:
    /// - The path does not exist, is not a directory, or cannot be listed
    /// - The worker pool cannot be started
    /// - The scan is interrupted by the shutdown flag
    /// - Strict mode is enabled and any path fails
    pub fn find_duplicates(&self, path: &Path) -> Result<ScanReport, FinderError> {
        let start_time = Instant::now();
        self.validate_root(path)?;

        if self.config.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }

        log::info!(
            "Starting duplicate scan of {} with {} worker threads",
            path.display(),
            self.config.io_threads
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads.max(1))
            .thread_name(|i| format!("dupescan-io-{i}"))
            .build()?;

        let open_files = Arc::new(OpenFileLimit::new(self.config.io_threads));
        let mut hasher = self.hasher.as_ref().clone().with_open_file_limit(open_files.clone());
        if self.config.parallel_threshold.is_some() {
            hasher = hasher.with_chunk_pool(Arc::new(build_chunk_pool()?));
        }

        let mut walker = Walker::new(path, self.config.walker_config.clone(), Arc::new(hasher))
            .with_fail_fast(self.config.strict);
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(flag.clone());
        }
        if let Some(ref callback) = self.config.progress_callback {
            walker = walker.with_progress_callback(callback.clone());
        }

        let output = pool.install(|| walker.walk());

        if self.config.is_shutdown_requested() {
            log::info!("Scan interrupted after {} files", output.stats.files);
            return Err(FinderError::Interrupted);
        }

        let mut errors = output.errors;
        if self.config.strict && !errors.is_empty() {
            return Err(FinderError::Scan(errors.swap_remove(0)));
        }
        errors.sort_by(|a, b| a.path().cmp(b.path()).then(a.kind().cmp(&b.kind())));

        let groups = output.groups;
        let summary = ScanSummary {
            directories_scanned: output.stats.directories,
            files_hashed: output.stats.files,
            bytes_hashed: output.stats.bytes,
            unique_fingerprints: groups.len(),
            duplicate_groups: groups.duplicate_group_count(),
            duplicate_files: groups.duplicate_file_count(),
            reclaimable_space: groups.wasted_space(),
            error_count: errors.len(),
            io_threads: self.config.io_threads,
            peak_open_files: open_files.peak(),
            scan_duration: start_time.elapsed(),
        };

        log::info!(
            "Scan complete: {} files ({}) in {} directories, {} duplicate groups, {} reclaimable, {} errors",
            summary.files_hashed,
            summary.bytes_hashed_display(),
            summary.directories_scanned,
            summary.duplicate_groups,
            summary.reclaimable_display(),
            summary.error_count
        );

        Ok(ScanReport {
            groups,
            errors,
            summary,
        })
    }

    fn validate_root(&self, path: &Path) -> Result<(), FinderError> {
        let metadata = std::fs::metadata(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                FinderError::PathNotFound(path.to_path_buf())
            } else {
                FinderError::RootUnreadable {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        if !metadata.is_dir() {
            return Err(FinderError::NotADirectory(path.to_path_buf()));
        }
        std::fs::read_dir(path).map_err(|source| FinderError::RootUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}
