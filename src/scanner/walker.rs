//! Concurrent directory traversal with inline fingerprinting.
//!
//! # Overview
//!
//! [`Walker::walk`] lists the root directory and dispatches its entries:
//! every subdirectory becomes a new task in a `rayon::scope`, every regular
//! file is hashed by the task that found it and recorded in a
//! [`GroupCollector`]. The scope returns only after every task spawned from
//! it, directly or transitively, has finished; that is the barrier after
//! which the collector and the error channel are read.
//!
//! Concurrency is bounded by the rayon pool the walk runs in. The
//! [`DuplicateFinder`](crate::duplicates::DuplicateFinder) installs a
//! dedicated pool sized by `io_threads` before calling `walk`.
//!
//! # Example
//!
//! ```no_run
//! use dupescan::scanner::{Hasher, Walker, WalkerConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let walker = Walker::new(Path::new("."), WalkerConfig::default(), Arc::new(Hasher::new()));
//! let output = walker.walk();
//! for group in output.groups.duplicates() {
//!     println!("{}: {:?}", group.fingerprint, group.paths);
//! }
//! for err in &output.errors {
//!     eprintln!("Warning: {}", err);
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use super::{EntryKind, FileEntry, Hasher, ScanError, WalkerConfig};
use crate::duplicates::{DuplicateGroups, GroupCollector};
use crate::progress::ProgressCallback;

/// Phase name reported to progress callbacks.
pub const SCAN_PHASE: &str = "scanning";

/// Counters gathered during a walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Directories successfully listed (including the root)
    pub directories: usize,
    /// Files successfully hashed
    pub files: usize,
    /// Bytes hashed
    pub bytes: u64,
}

/// Everything a walk produced.
#[derive(Debug)]
pub struct WalkOutput {
    /// Files grouped by fingerprint
    pub groups: DuplicateGroups,
    /// Path-level errors in the order they were reported
    pub errors: Vec<ScanError>,
    /// Counters
    pub stats: WalkStats,
    /// Whether work was abandoned because of shutdown or fail-fast
    pub aborted: bool,
}

/// Directory walker that fingerprints every regular file it finds.
pub struct Walker {
    root: PathBuf,
    config: WalkerConfig,
    hasher: Arc<Hasher>,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
    fail_fast: bool,
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("hasher", &self.hasher)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .field("fail_fast", &self.fail_fast)
            .finish()
    }
}

impl Walker {
    /// Create a new walker for the given root.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig, hasher: Arc<Hasher>) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            hasher,
            shutdown_flag: None,
            progress_callback: None,
            fail_fast: false,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// Checked before each directory listing and each file hash.
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

    /// Stop dispatching new work after the first path error.
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Root directory of this walker.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build gitignore matcher from config patterns and the root's .gitignore.
    fn build_gitignore(&self) -> Option<Gitignore> {
        let mut builder = GitignoreBuilder::new(&self.root);

        let gitignore_path = self.root.join(".gitignore");
        if gitignore_path.is_file() {
            if let Some(e) = builder.add(&gitignore_path) {
                log::warn!(
                    "Failed to load .gitignore from {}: {}",
                    gitignore_path.display(),
                    e
                );
            } else {
                log::debug!("Loaded .gitignore from {}", gitignore_path.display());
            }
        }

        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if gitignore.is_empty() => None,
            Ok(gitignore) => Some(gitignore),
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    /// Walk the tree and group every regular file by fingerprint.
    ///
    /// Runs on the current rayon pool. Never fails as a whole: every
    /// problem is reported in [`WalkOutput::errors`], including a root
    /// that cannot be listed.
    pub fn walk(&self) -> WalkOutput {
        log::debug!("Walking {}", self.root.display());
        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(SCAN_PHASE, 0);
        }

        let (errors_tx, errors_rx) = mpsc::channel();
        let run = WalkRun {
            walker: self,
            gitignore: self.build_gitignore(),
            collector: GroupCollector::new(),
            errors: errors_tx,
            abort: AtomicBool::new(false),
            visited: Mutex::new(HashSet::new()),
            directories: AtomicUsize::new(0),
            files: AtomicUsize::new(0),
            bytes: AtomicU64::new(0),
        };

        if self.config.follow_symlinks {
            run.mark_visited(&self.root);
        }

        rayon::scope(|scope| run.visit_dir(scope, self.root.clone()));

        let WalkRun {
            collector,
            errors,
            abort,
            directories,
            files,
            bytes,
            ..
        } = run;
        drop(errors);

        let output = WalkOutput {
            groups: collector.into_groups(),
            errors: errors_rx.into_iter().collect(),
            stats: WalkStats {
                directories: directories.into_inner(),
                files: files.into_inner(),
                bytes: bytes.into_inner(),
            },
            aborted: abort.into_inner() || self.is_shutdown_requested(),
        };

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(SCAN_PHASE);
        }
        output
    }
}

/// State shared by all tasks of one walk.
struct WalkRun<'w> {
    walker: &'w Walker,
    gitignore: Option<Gitignore>,
    collector: GroupCollector,
    errors: Sender<ScanError>,
    abort: AtomicBool,
    visited: Mutex<HashSet<PathBuf>>,
    directories: AtomicUsize,
    files: AtomicUsize,
    bytes: AtomicU64,
}

impl<'w> WalkRun<'w> {
    fn is_cancelled(&self) -> bool {
        self.abort.load(Ordering::SeqCst) || self.walker.is_shutdown_requested()
    }

    fn report(&self, err: ScanError) {
        if err.is_cancelled() {
            return;
        }
        log::warn!("{}", err);
        if self.walker.fail_fast {
            self.abort.store(true, Ordering::SeqCst);
        }
        // The receiver lives until after the scope ends.
        let _ = self.errors.send(err);
    }

    /// Returns false if the directory was already visited through another link.
    fn mark_visited(&self, dir: &Path) -> bool {
        let key = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key)
    }

    fn visit_dir<'s>(&'s self, scope: &rayon::Scope<'s>, dir: PathBuf) {
        if self.is_cancelled() {
            return;
        }

        let entries = match self.list_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                self.report(err);
                return;
            }
        };
        self.directories.fetch_add(1, Ordering::Relaxed);
        log::trace!("Listed {} ({} entries)", dir.display(), entries.len());

        for entry in entries {
            match entry.kind {
                EntryKind::Directory => {
                    if self.walker.config.follow_symlinks && !self.mark_visited(&entry.path) {
                        log::debug!("Skipping already visited directory {}", entry.path.display());
                        continue;
                    }
                    scope.spawn(move |scope| self.visit_dir(scope, entry.path));
                }
                EntryKind::File => self.visit_file(entry.path),
            }
        }
    }

    /// List a directory completely, closing its handle before dispatch.
    fn list_dir(&self, dir: &Path) -> Result<Vec<FileEntry>, ScanError> {
        let read_dir = fs::read_dir(dir).map_err(|source| ScanError::List {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    self.report(ScanError::List {
                        path: dir.to_path_buf(),
                        source,
                    });
                    continue;
                }
            };

            let path = entry.path();
            if self.walker.config.skip_hidden && is_hidden(&entry.file_name()) {
                log::trace!("Skipping hidden entry {}", path.display());
                continue;
            }

            let kind = match self.classify(&entry, &path) {
                Ok(Some(kind)) => kind,
                Ok(None) => continue,
                Err(err) => {
                    self.report(err);
                    continue;
                }
            };

            if self.should_ignore(&path, kind == EntryKind::Directory) {
                log::trace!("Ignoring {}", path.display());
                continue;
            }

            entries.push(FileEntry::new(path, kind));
        }
        Ok(entries)
    }

    /// Decide whether an entry is a directory, a regular file, or skipped.
    fn classify(&self, entry: &fs::DirEntry, path: &Path) -> Result<Option<EntryKind>, ScanError> {
        let stat_error = |source| ScanError::Stat {
            path: path.to_path_buf(),
            source,
        };

        let file_type = entry.file_type().map_err(stat_error)?;
        if file_type.is_symlink() {
            if !self.walker.config.follow_symlinks {
                log::trace!("Skipping symlink {}", path.display());
                return Ok(None);
            }
            let target = fs::metadata(path).map_err(stat_error)?;
            return Ok(kind_of(target.file_type()));
        }

        let kind = kind_of(file_type);
        if kind.is_none() {
            log::trace!("Skipping special file {}", path.display());
        }
        Ok(kind)
    }

    fn should_ignore(&self, path: &Path, is_dir: bool) -> bool {
        let Some(ref gi) = self.gitignore else {
            return false;
        };
        let relative = path.strip_prefix(&self.walker.root).unwrap_or(path);
        gi.matched(relative, is_dir).is_ignore()
    }

    fn visit_file(&self, path: PathBuf) {
        if self.is_cancelled() {
            return;
        }

        let config = &self.walker.config;
        if config.has_size_filter() {
            match fs::metadata(&path) {
                Ok(meta) if !config.passes_size_filter(meta.len()) => {
                    log::trace!("Skipping {} ({} bytes, outside size filter)", path.display(), meta.len());
                    return;
                }
                Ok(_) => {}
                Err(source) => {
                    self.report(ScanError::Stat { path, source });
                    return;
                }
            }
        }

        match self.walker.hasher.hash_file(&path) {
            Ok(digest) => {
                let current = self.files.fetch_add(1, Ordering::Relaxed) + 1;
                self.bytes.fetch_add(digest.size, Ordering::Relaxed);
                if let Some(ref callback) = self.walker.progress_callback {
                    callback.on_item_completed(digest.size);
                    callback.on_progress(current, path.to_string_lossy().as_ref());
                }
                self.collector.insert(digest.fingerprint, digest.size, path);
            }
            Err(err) => self.report(err),
        }
    }
}

fn kind_of(file_type: fs::FileType) -> Option<EntryKind> {
    if file_type.is_dir() {
        Some(EntryKind::Directory)
    } else if file_type.is_file() {
        Some(EntryKind::File)
    } else {
        None
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}
