//! Report formatters for scan and hash results.
//!
//! - [`text`] for people reading a terminal
//! - [`json`] for scripts
//!
//! # Example
//!
//! ```no_run
//! use dupescan::duplicates::DuplicateFinder;
//! use dupescan::output::json::JsonOutput;
//! use dupescan::error::ExitCode;
//! use std::path::Path;
//!
//! let report = DuplicateFinder::with_defaults()
//!     .find_duplicates(Path::new("."))
//!     .unwrap();
//!
//! let output = JsonOutput::new(&report, false, ExitCode::Success);
//! println!("{}", output.to_json_pretty().unwrap());
//! ```

pub mod json;
pub mod text;

pub use json::JsonOutput;
pub use text::TextOutput;

/// Error writing a report.
#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    /// Writing to the destination failed.
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    /// The report could not be serialized.
    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}
