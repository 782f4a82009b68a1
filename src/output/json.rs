//! JSON report for scripting and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "outcome": "partial",
//!   "groups": [
//!     {
//!       "fingerprint": "af1349b9...",
//!       "size": 1024,
//!       "paths": ["/data/a.bin", "/data/b.bin"]
//!     }
//!   ],
//!   "errors": [
//!     { "kind": "list", "path": "/data/locked", "message": "Cannot list directory ..." }
//!   ],
//!   "summary": {
//!     "files_hashed": 3,
//!     "duplicate_groups": 1,
//!     "reclaimable_space": 1024,
//!     "scan_duration_ms": 12,
//!     "exit_code": 3,
//!     "exit_code_name": "DS003"
//!   }
//! }
//! ```

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use super::OutputError;
use crate::duplicates::{DuplicateGroup, ScanOutcome, ScanReport, ScanSummary};
use crate::error::ExitCode;
use crate::scanner::{ErrorKind, FileDigest, ScanError};

/// A single fingerprint group.
#[derive(Debug, Clone, Serialize)]
pub struct JsonGroup {
    /// Fingerprint as 64 hex characters
    pub fingerprint: String,
    /// Size of each file in bytes
    pub size: u64,
    /// Paths in lexicographic order
    pub paths: Vec<String>,
}

impl From<&DuplicateGroup> for JsonGroup {
    fn from(group: &DuplicateGroup) -> Self {
        Self {
            fingerprint: group.fingerprint.to_hex(),
            size: group.size,
            paths: group.paths.iter().map(|p| path_string(p)).collect(),
        }
    }
}

/// A path that could not be processed.
#[derive(Debug, Clone, Serialize)]
pub struct JsonError {
    /// Failure category
    pub kind: ErrorKind,
    /// Path that failed
    pub path: String,
    /// Human-readable description
    pub message: String,
}

impl From<&ScanError> for JsonError {
    fn from(err: &ScanError) -> Self {
        Self {
            kind: err.kind(),
            path: path_string(err.path()),
            message: err.to_string(),
        }
    }
}

/// Summary statistics.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Directories listed
    pub directories_scanned: usize,
    /// Files hashed
    pub files_hashed: usize,
    /// Bytes hashed
    pub bytes_hashed: u64,
    /// Distinct fingerprints
    pub unique_fingerprints: usize,
    /// Groups with two or more files
    pub duplicate_groups: usize,
    /// Redundant copies
    pub duplicate_files: usize,
    /// Bytes reclaimable by removing redundant copies
    pub reclaimable_space: u64,
    /// Paths that failed
    pub error_count: usize,
    /// Worker threads used
    pub io_threads: usize,
    /// Most files held open at the same time
    pub peak_open_files: usize,
    /// Duration of the scan in milliseconds
    pub scan_duration_ms: u64,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DS000")
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Build from a [`ScanSummary`] and the exit code of this run.
    #[must_use]
    pub fn from_scan_summary(summary: &ScanSummary, exit_code: ExitCode) -> Self {
        Self {
            directories_scanned: summary.directories_scanned,
            files_hashed: summary.files_hashed,
            bytes_hashed: summary.bytes_hashed,
            unique_fingerprints: summary.unique_fingerprints,
            duplicate_groups: summary.duplicate_groups,
            duplicate_files: summary.duplicate_files,
            reclaimable_space: summary.reclaimable_space,
            error_count: summary.error_count,
            io_threads: summary.io_threads,
            peak_open_files: summary.peak_open_files,
            scan_duration_ms: u64::try_from(summary.scan_duration.as_millis()).unwrap_or(u64::MAX),
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Complete JSON document for a scan.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// `"complete"` or `"partial"`
    pub outcome: &'static str,
    /// Groups, duplicates only unless all files were requested
    pub groups: Vec<JsonGroup>,
    /// Path errors sorted by path
    pub errors: Vec<JsonError>,
    /// Scan summary statistics
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Build the document for `report`.
    ///
    /// # Example
    ///
    /// ```
    /// use dupescan::duplicates::{DuplicateGroups, ScanReport, ScanSummary};
    /// use dupescan::error::ExitCode;
    /// use dupescan::output::json::JsonOutput;
    ///
    /// let report = ScanReport {
    ///     groups: DuplicateGroups::default(),
    ///     errors: Vec::new(),
    ///     summary: ScanSummary::default(),
    /// };
    /// let output = JsonOutput::new(&report, false, ExitCode::NoDuplicates);
    /// assert_eq!(output.outcome, "complete");
    /// assert!(output.groups.is_empty());
    /// ```
    #[must_use]
    pub fn new(report: &ScanReport, show_all: bool, exit_code: ExitCode) -> Self {
        let outcome = match report.outcome() {
            ScanOutcome::Complete => "complete",
            ScanOutcome::Partial { .. } => "partial",
        };
        Self {
            outcome,
            groups: report
                .groups
                .iter()
                .filter(|g| show_all || g.is_duplicate())
                .map(JsonGroup::from)
                .collect(),
            errors: report.errors.iter().map(JsonError::from).collect(),
            summary: JsonSummary::from_scan_summary(&report.summary, exit_code),
        }
    }

    /// Serialize to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to indented JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the document followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), OutputError> {
        if pretty {
            serde_json::to_writer_pretty(&mut *writer, self)?;
        } else {
            serde_json::to_writer(&mut *writer, self)?;
        }
        writeln!(writer)?;
        Ok(())
    }
}

/// One entry of `hash` subcommand output.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDigest {
    /// File that was hashed
    pub path: String,
    /// Fingerprint as 64 hex characters, absent on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// File size in bytes, absent on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JsonDigest {
    /// Build an entry from a hashing result.
    #[must_use]
    pub fn new(path: &Path, result: &Result<FileDigest, ScanError>) -> Self {
        match result {
            Ok(digest) => Self {
                path: path_string(path),
                fingerprint: Some(digest.fingerprint.to_hex()),
                size: Some(digest.size),
                error: None,
            },
            Err(e) => Self {
                path: path_string(path),
                fingerprint: None,
                size: None,
                error: Some(e.to_string()),
            },
        }
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
