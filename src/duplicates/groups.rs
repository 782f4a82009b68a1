//! Duplicate groups and their concurrent collector.
//!
//! # Overview
//!
//! During a run, traversal tasks insert `(fingerprint, size, path)` triples
//! into a [`GroupCollector`]. Insertion is serialized by a mutex. Once every
//! task has finished, the collector is consumed by value into an immutable
//! [`DuplicateGroups`] whose groups are ordered by fingerprint and whose
//! paths are sorted, so the result does not depend on scheduling.
//!
//! # Example
//!
//! ```
//! use dupescan::duplicates::GroupCollector;
//! use dupescan::scanner::Fingerprint;
//! use std::path::PathBuf;
//!
//! let collector = GroupCollector::new();
//! let fp = Fingerprint::from_bytes([7; 32]);
//! collector.insert(fp, 3, PathBuf::from("/b.txt"));
//! collector.insert(fp, 3, PathBuf::from("/a.txt"));
//!
//! let groups = collector.into_groups();
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups.get(&fp).unwrap().paths, vec![PathBuf::from("/a.txt"), PathBuf::from("/b.txt")]);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::scanner::Fingerprint;

/// All files sharing one fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// Content fingerprint shared by all files in this group
    pub fingerprint: Fingerprint,
    /// Size in bytes of each file
    pub size: u64,
    /// Paths with this content, sorted
    pub paths: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// Create a new group. Paths are sorted.
    #[must_use]
    pub fn new(fingerprint: Fingerprint, size: u64, mut paths: Vec<PathBuf>) -> Self {
        paths.sort();
        Self {
            fingerprint,
            size,
            paths,
        }
    }

    /// Number of files in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the group has no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Whether more than one file shares this content.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        self.paths.len() > 1
    }

    /// Number of redundant copies (all files but one).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.paths.len().saturating_sub(1)
    }

    /// Bytes that removing the redundant copies would free.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.duplicate_count() as u64
    }
}

/// Final mapping from fingerprint to the files sharing it.
///
/// Every regular file hashed in a run appears in exactly one group,
/// including files whose content is unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateGroups {
    groups: BTreeMap<Fingerprint, DuplicateGroup>,
}

impl DuplicateGroups {
    /// Number of distinct fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no file was grouped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Look up the group for a fingerprint.
    #[must_use]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&DuplicateGroup> {
        self.groups.get(fingerprint)
    }

    /// Iterate over all groups in fingerprint order.
    pub fn iter(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.values()
    }

    /// Iterate over groups with two or more files.
    pub fn duplicates(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.values().filter(|group| group.is_duplicate())
    }

    /// Total number of files across all groups.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.groups.values().map(DuplicateGroup::len).sum()
    }

    /// Number of groups with two or more files.
    #[must_use]
    pub fn duplicate_group_count(&self) -> usize {
        self.duplicates().count()
    }

    /// Number of redundant copies across all groups.
    #[must_use]
    pub fn duplicate_file_count(&self) -> usize {
        self.groups.values().map(DuplicateGroup::duplicate_count).sum()
    }

    /// Bytes reclaimable by removing every redundant copy.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.groups.values().map(DuplicateGroup::wasted_space).sum()
    }
}

impl FromIterator<DuplicateGroup> for DuplicateGroups {
    fn from_iter<I: IntoIterator<Item = DuplicateGroup>>(iter: I) -> Self {
        let mut groups: BTreeMap<Fingerprint, DuplicateGroup> = BTreeMap::new();
        for group in iter {
            match groups.get_mut(&group.fingerprint) {
                Some(existing) => {
                    existing.paths.extend(group.paths);
                    existing.paths.sort();
                }
                None => {
                    groups.insert(group.fingerprint, group);
                }
            }
        }
        Self { groups }
    }
}

impl<'a> IntoIterator for &'a DuplicateGroups {
    type Item = &'a DuplicateGroup;
    type IntoIter = std::collections::btree_map::Values<'a, Fingerprint, DuplicateGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.values()
    }
}

#[derive(Debug, Default)]
struct PendingGroup {
    size: u64,
    paths: Vec<PathBuf>,
}

/// Concurrent aggregator filled by traversal tasks.
///
/// `insert` may be called from any number of threads. The only way to read
/// the result is [`GroupCollector::into_groups`], which takes the collector
/// by value and therefore cannot run while any task still borrows it.
#[derive(Debug, Default)]
pub struct GroupCollector {
    inner: Mutex<HashMap<Fingerprint, PendingGroup>>,
}

impl GroupCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hashed file.
    pub fn insert(&self, fingerprint: Fingerprint, size: u64, path: PathBuf) {
        // Each insert is a single push; a poisoned map is still consistent.
        let mut groups = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let group = groups.entry(fingerprint).or_insert_with(|| PendingGroup {
            size,
            paths: Vec::new(),
        });
        if group.size != size {
            log::warn!(
                "Fingerprint {} seen with sizes {} and {} ({})",
                fingerprint,
                group.size,
                size,
                path.display()
            );
        }
        group.paths.push(path);
    }

    /// Freeze the collector into the final, sorted mapping.
    #[must_use]
    pub fn into_groups(self) -> DuplicateGroups {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .map(|(fingerprint, pending)| DuplicateGroup::new(fingerprint, pending.size, pending.paths))
            .collect()
    }
}
