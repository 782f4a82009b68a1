//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Concurrent aggregation of fingerprints into groups
//! - The scan orchestrator with its error policy and summary

pub mod finder;
pub mod groups;

pub use finder::{DuplicateFinder, FinderConfig, FinderError, ScanOutcome, ScanReport, ScanSummary};
pub use groups::{DuplicateGroup, DuplicateGroups, GroupCollector};
