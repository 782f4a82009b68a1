//! Progress reporting utilities using indicatif.
//!
//! The [`Walker`](crate::scanner::Walker) reports through the
//! [`ProgressCallback`] trait; [`Progress`] renders those callbacks as a
//! spinner on stderr for interactive runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytesize::ByteSize;
use indicatif::{ProgressBar, ProgressStyle};

/// Progress callback for scan phases.
///
/// Implementations must be cheap: callbacks run on worker threads in the
/// middle of traversal.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase (e.g., "scanning")
    /// * `total` - Total number of items, or 0 if unknown
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each file processed.
    ///
    /// # Arguments
    ///
    /// * `current` - Number of files processed so far (1-based)
    /// * `path` - Path being processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called when a file has been hashed, providing its size.
    fn on_item_completed(&self, _bytes: u64) {}

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);

    /// Called to update the progress message.
    fn on_message(&self, _message: &str) {}
}

/// Spinner-based progress reporter.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    bytes: AtomicU64,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is drawn.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupescan::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            bytes: AtomicU64::new(0),
            quiet,
        }
    }

    /// Total bytes reported through [`ProgressCallback::on_item_completed`].
    #[must_use]
    pub fn bytes_processed(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {prefix} [{elapsed_precise}] {pos} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Some(ref pb) = *self.bar.lock().unwrap_or_else(PoisonError::into_inner) {
            f(pb);
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, _total: usize) {
        self.bytes.store(0, Ordering::Relaxed);
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(Self::style());
        pb.set_prefix(phase.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        *self.bar.lock().unwrap_or_else(PoisonError::into_inner) = Some(pb);
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }
        let bytes = ByteSize(self.bytes_processed());
        self.with_bar(|pb| {
            pb.set_position(current as u64);
            pb.set_message(format!("({bytes}) {}", truncate_path(path, 40)));
        });
    }

    fn on_item_completed(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }
        if let Some(pb) = self.bar.lock().unwrap_or_else(PoisonError::into_inner).take() {
            pb.finish_and_clear();
        }
        log::debug!("Phase {} finished", phase);
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.with_bar(|pb| pb.set_message(message.to_string()));
    }
}

/// Truncate a path for display, keeping its file name.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name
            .chars()
            .skip(name_len.saturating_sub(max_len.saturating_sub(3)))
            .collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
