//! Chunked BLAKE3 file fingerprinting.
//!
//! # Overview
//!
//! A file is split into fixed-size chunks. Each chunk gets its own BLAKE3
//! digest computed from a fresh hasher state, and the digests are folded in
//! file-offset order into a finalizing BLAKE3 state that also covers the file
//! length. The result is a 32-byte [`Fingerprint`].
//!
//! Content is read sequentially through a single handle in windows of
//! [`WINDOW_CHUNKS`] chunks. Large files hash the chunks of each window in
//! parallel; digests are collected by index, so the fingerprint never depends
//! on which chunk finished first.
//!
//! When a hasher runs inside a traversal pool it is given a separate chunk
//! pool and an [`OpenFileLimit`]. The calling worker then waits for chunk
//! digests on a channel instead of joining the chunk jobs, so it cannot pick
//! up another file while its own handle is still open.
//!
//! # Example
//!
//! ```no_run
//! use dupescan::scanner::Hasher;
//! use std::path::Path;
//!
//! let hasher = Hasher::new().with_chunk_size(64 * 1024);
//! let digest = hasher.hash_file(Path::new("/tmp/data.bin")).unwrap();
//! println!("{} ({} bytes)", digest.fingerprint, digest.size);
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex, PoisonError};

use rayon::prelude::*;
use serde::{Serialize, Serializer};

use super::ScanError;

/// Default chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Files at least this large hash their chunks in parallel.
pub const DEFAULT_PARALLEL_THRESHOLD: u64 = 8 * 1024 * 1024;

/// Largest accepted chunk size (16 MiB).
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Number of chunks read into memory per window.
pub const WINDOW_CHUNKS: usize = 256;

/// Build the pool that hashes the chunks of large files.
///
/// # Errors
///
/// Returns an error if the operating system refuses to spawn the threads.
pub fn build_chunk_pool() -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("dupescan-chunk-{i}"))
        .build()
}

/// Deterministic content fingerprint (32 bytes, BLAKE3).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Wrap raw fingerprint bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw fingerprint bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hexadecimal representation (64 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        blake3::Hash::from_bytes(self.0).to_hex().to_string()
    }

    /// Parse a 64-character hexadecimal string.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        blake3::Hash::from_hex(hex)
            .ok()
            .map(|hash| Self(*hash.as_bytes()))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = InvalidFingerprint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s).ok_or_else(|| InvalidFingerprint(s.to_string()))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A string that is not a valid hex fingerprint.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid fingerprint: {0:?}")]
pub struct InvalidFingerprint(String);

/// Result of hashing a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileDigest {
    /// Content fingerprint
    pub fingerprint: Fingerprint,
    /// Number of bytes hashed
    pub size: u64,
}

/// Counting limit on files held open by concurrent hashes.
#[derive(Debug)]
pub struct OpenFileLimit {
    max: usize,
    state: Mutex<OpenFiles>,
    released: Condvar,
}

#[derive(Debug, Default)]
struct OpenFiles {
    open: usize,
    peak: usize,
}

impl OpenFileLimit {
    /// Allow at most `max` open files (minimum 1).
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self {
            max: max.max(1),
            state: Mutex::new(OpenFiles::default()),
            released: Condvar::new(),
        }
    }

    /// Configured maximum.
    #[must_use]
    pub fn max(&self) -> usize {
        self.max
    }

    /// Highest number of files that were open at the same time.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.lock().peak
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, OpenFiles> {
        // Counters are updated in one step; a poisoned guard is still valid.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a permit is free.
    fn acquire(&self) -> OpenFilePermit<'_> {
        let mut state = self.lock();
        while state.open >= self.max {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.open += 1;
        state.peak = state.peak.max(state.open);
        OpenFilePermit { limit: self }
    }
}

struct OpenFilePermit<'a> {
    limit: &'a OpenFileLimit,
}

impl Drop for OpenFilePermit<'_> {
    fn drop(&mut self) {
        self.limit.lock().open -= 1;
        self.limit.released.notify_one();
    }
}

/// File hasher producing chunked BLAKE3 fingerprints.
///
/// Cheap to clone and safe to share across threads; every call to
/// [`Hasher::hash_file`] uses its own hashing state.
#[derive(Debug, Clone)]
pub struct Hasher {
    chunk_size: usize,
    parallel_threshold: Option<u64>,
    shutdown_flag: Option<Arc<AtomicBool>>,
    chunk_pool: Option<Arc<rayon::ThreadPool>>,
    open_files: Option<Arc<OpenFileLimit>>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default chunk size and parallel threshold.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallel_threshold: Some(DEFAULT_PARALLEL_THRESHOLD),
            shutdown_flag: None,
            chunk_pool: None,
            open_files: None,
        }
    }

    /// Set the chunk size in bytes, clamped to `1..=MAX_CHUNK_SIZE`.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    /// Set the size from which chunks are hashed in parallel.
    ///
    /// `None` always hashes sequentially; `Some(0)` always hashes in parallel.
    #[must_use]
    pub fn with_parallel_threshold(mut self, threshold: Option<u64>) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Set the shutdown flag checked between windows.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Hash the chunks of large files on `pool` instead of the caller's pool.
    ///
    /// Required when [`with_open_file_limit`](Self::with_open_file_limit) is
    /// used from inside a rayon pool: a worker joining chunk jobs on its own
    /// pool may run another file hash and wait on the limit it already holds.
    #[must_use]
    pub fn with_chunk_pool(mut self, pool: Arc<rayon::ThreadPool>) -> Self {
        self.chunk_pool = Some(pool);
        self
    }

    /// Take a permit from `limit` for every file opened.
    #[must_use]
    pub fn with_open_file_limit(mut self, limit: Arc<OpenFileLimit>) -> Self {
        self.open_files = Some(limit);
        self
    }

    /// The open-file limit, if one is set.
    #[must_use]
    pub fn open_file_limit(&self) -> Option<&OpenFileLimit> {
        self.open_files.as_deref()
    }

    /// Configured chunk size in bytes.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Configured parallel threshold.
    #[must_use]
    pub fn parallel_threshold(&self) -> Option<u64> {
        self.parallel_threshold
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Compute the fingerprint of a file.
    ///
    /// # Errors
    ///
    /// See [`Hasher::hash_file`].
    pub fn compute_fingerprint(&self, path: &Path) -> Result<Fingerprint, ScanError> {
        self.hash_file(path).map(|digest| digest.fingerprint)
    }

    /// Hash a file, returning its fingerprint and the number of bytes hashed.
    ///
    /// # Errors
    ///
    /// - [`ScanError::Open`] if the file cannot be opened
    /// - [`ScanError::Stat`] if its metadata cannot be read
    /// - [`ScanError::Read`] if a read fails, or the file is shorter or
    ///   longer than the size observed when it was opened
    /// - [`ScanError::Cancelled`] if shutdown was requested mid-file
    pub fn hash_file(&self, path: &Path) -> Result<FileDigest, ScanError> {
        let _permit = self.open_files.as_deref().map(OpenFileLimit::acquire);
        let mut file = File::open(path).map_err(|source| ScanError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let size = file
            .metadata()
            .map_err(|source| ScanError::Stat {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        let read_error = |source: io::Error| ScanError::Read {
            path: path.to_path_buf(),
            source,
        };

        let parallel = self.parallel_threshold.is_some_and(|t| size >= t);
        let window_len = self.chunk_size.saturating_mul(WINDOW_CHUNKS);
        let buffer_len = usize::try_from(size).map_or(window_len, |s| s.min(window_len));
        let mut window = vec![0u8; buffer_len];

        let mut combiner = blake3::Hasher::new();
        combiner.update(&size.to_le_bytes());

        let mut remaining = size;
        while remaining > 0 {
            if self.is_shutdown_requested() {
                return Err(ScanError::Cancelled(path.to_path_buf()));
            }

            // Window length is a multiple of the chunk size, so chunk
            // boundaries stay aligned to file offsets across windows.
            let take = usize::try_from(remaining).map_or(window.len(), |r| r.min(window.len()));
            file.read_exact(&mut window[..take]).map_err(read_error)?;

            match (&self.chunk_pool, parallel) {
                (Some(pool), true) => {
                    let (buf, digests) =
                        digests_on_pool(pool, std::mem::take(&mut window), take, self.chunk_size)
                            .map_err(read_error)?;
                    window = buf;
                    for digest in &digests {
                        combiner.update(digest.as_bytes());
                    }
                }
                (None, true) => {
                    let digests: Vec<blake3::Hash> = window[..take]
                        .par_chunks(self.chunk_size)
                        .map(blake3::hash)
                        .collect();
                    for digest in &digests {
                        combiner.update(digest.as_bytes());
                    }
                }
                (_, false) => {
                    for chunk in window[..take].chunks(self.chunk_size) {
                        combiner.update(blake3::hash(chunk).as_bytes());
                    }
                }
            }

            remaining -= take as u64;
        }

        // End of stream must line up with the size we started from.
        let mut tail = [0u8; 1];
        match file.read(&mut tail) {
            Ok(0) => {}
            Ok(_) => {
                return Err(read_error(io::Error::other(
                    "file grew while it was being hashed",
                )))
            }
            Err(source) => return Err(read_error(source)),
        }

        log::trace!(
            "Hashed {} ({} bytes, {})",
            path.display(),
            size,
            if parallel { "parallel" } else { "sequential" }
        );

        Ok(FileDigest {
            fingerprint: Fingerprint(*combiner.finalize().as_bytes()),
            size,
        })
    }
}

/// Digest the first `len` bytes of `window` on `pool` and hand the buffer back.
///
/// The caller blocks on a channel rather than a rayon join, so it never runs
/// unrelated pool work while waiting.
fn digests_on_pool(
    pool: &rayon::ThreadPool,
    window: Vec<u8>,
    len: usize,
    chunk_size: usize,
) -> io::Result<(Vec<u8>, Vec<blake3::Hash>)> {
    let (tx, rx) = mpsc::sync_channel(1);
    pool.spawn(move || {
        let digests: Vec<blake3::Hash> = window[..len]
            .par_chunks(chunk_size)
            .map(blake3::hash)
            .collect();
        let _ = tx.send((window, digests));
    });
    rx.recv()
        .map_err(|_| io::Error::other("chunk hashing worker stopped"))
}
