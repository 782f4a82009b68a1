//! Ctrl+C handling for graceful shutdown.
//!
//! A [`ShutdownHandler`] owns an `Arc<AtomicBool>` that the hasher, walker
//! and finder poll between units of work. Installing the handler wires the
//! flag to SIGINT/SIGTERM through `ctrlc`.
//!
//! ```rust,no_run
//! use dupescan::duplicates::FinderConfig;
//! use dupescan::signal::install_handler;
//!
//! let handler = install_handler().expect("signal handler");
//! let config = FinderConfig::default().with_shutdown_flag(handler.flag());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested and no signal hook.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether Ctrl+C was received or [`request_shutdown`](Self::request_shutdown) was called.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request shutdown without a signal.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag to hand to scan components.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear a previous shutdown request.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// The Ctrl+C handler could not be registered.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler.
///
/// `ctrlc` allows a single registration per process. Later calls return
/// the already installed handler with its flag cleared, so repeated runs
/// in one process (as in tests) each start un-interrupted.
///
/// # Errors
///
/// Returns [`SignalError::InstallFailed`] if the OS refuses the handler
/// for a reason other than one already being registered.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.flag();
    let result = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "\nInterrupted. Finishing in-flight work...");
        let _ = stderr.flush();
        log::info!("Shutdown signal received");
    });

    match result {
        Ok(()) => Ok(GLOBAL_HANDLER.get_or_init(|| handler).clone()),
        Err(ctrlc::Error::MultipleHandlers) => {
            log::debug!("Ctrl+C handler already registered, using an unhooked flag");
            let existing = GLOBAL_HANDLER.get_or_init(ShutdownHandler::new);
            existing.reset();
            Ok(existing.clone())
        }
        Err(e) => Err(SignalError::from(e)),
    }
}
