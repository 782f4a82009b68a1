//! Scanner module for directory traversal and file fingerprinting.
//!
//! This module provides functionality for:
//! - Concurrent directory walking on a bounded rayon pool
//! - Chunked content fingerprinting with BLAKE3
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal, dispatch and aggregation
//! - [`hasher`]: Chunked BLAKE3 fingerprints
//!
//! # Example
//!
//! ```no_run
//! use dupescan::scanner::Hasher;
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let fingerprint = hasher.compute_fingerprint(Path::new("Cargo.toml")).unwrap();
//! println!("{fingerprint}");
//! ```

pub mod hasher;
pub mod walker;

use std::path::{Path, PathBuf};

// Re-export main types
pub use hasher::{
    build_chunk_pool, FileDigest, Fingerprint, Hasher, OpenFileLimit, DEFAULT_CHUNK_SIZE,
    DEFAULT_PARALLEL_THRESHOLD, MAX_CHUNK_SIZE,
};
pub use walker::{WalkOutput, WalkStats, Walker};

/// Kind of a discovered directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A directory that will be listed by its own traversal task.
    Directory,
    /// A regular file that will be fingerprinted.
    File,
}

/// A discovered filesystem path, tagged with its kind.
///
/// Only exists while a directory is being dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path to the entry (root-relative if the root was relative)
    pub path: PathBuf,
    /// Directory or regular file
    pub kind: EntryKind,
}

impl FileEntry {
    /// Create a new FileEntry.
    #[must_use]
    pub fn new(path: PathBuf, kind: EntryKind) -> Self {
        Self { path, kind }
    }

    /// Whether this entry is a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Configuration for directory walking.
///
/// Controls filtering and symlink handling.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    /// Directory cycles are detected through canonical paths.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Minimum file size to include (in bytes).
    pub min_size: Option<u64>,

    /// Maximum file size to include (in bytes).
    pub max_size: Option<u64>,

    /// Glob patterns to ignore (gitignore-style).
    /// These are applied in addition to the root's .gitignore file.
    pub ignore_patterns: Vec<String>,
}

impl WalkerConfig {
    /// Whether any size filter is configured.
    #[must_use]
    pub fn has_size_filter(&self) -> bool {
        self.min_size.is_some() || self.max_size.is_some()
    }

    /// Check if a file size passes the configured filters.
    #[must_use]
    pub fn passes_size_filter(&self, size: u64) -> bool {
        if self.min_size.is_some_and(|min| size < min) {
            return false;
        }
        if self.max_size.is_some_and(|max| size > max) {
            return false;
        }
        true
    }
}

/// Category of a path-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// The file could not be opened.
    Open,
    /// File metadata could not be read.
    Stat,
    /// Reading file content failed or the file changed underneath us.
    Read,
    /// A directory could not be listed.
    List,
    /// Work was abandoned because the run was cancelled.
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Stat => "stat",
            Self::Read => "read",
            Self::List => "list",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Errors tied to a single path during scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The file could not be opened (missing, unreadable, permission denied).
    #[error("Cannot open {path}: {source}")]
    Open {
        /// Path that failed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Metadata could not be read.
    #[error("Cannot stat {path}: {source}")]
    Stat {
        /// Path that failed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Reading content failed before the expected end of the file.
    #[error("Cannot read {path}: {source}")]
    Read {
        /// Path that failed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A directory could not be listed.
    #[error("Cannot list directory {path}: {source}")]
    List {
        /// Directory that failed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Hashing stopped because shutdown was requested.
    #[error("Cancelled while processing {0}")]
    Cancelled(PathBuf),
}

impl ScanError {
    /// The path this error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Open { path, .. }
            | Self::Stat { path, .. }
            | Self::Read { path, .. }
            | Self::List { path, .. }
            | Self::Cancelled(path) => path,
        }
    }

    /// The category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Open { .. } => ErrorKind::Open,
            Self::Stat { .. } => ErrorKind::Stat,
            Self::Read { .. } => ErrorKind::Read,
            Self::List { .. } => ErrorKind::List,
            Self::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    /// Whether this error is a consequence of cancellation rather than a path failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}
