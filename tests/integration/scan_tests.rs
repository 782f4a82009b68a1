//! End-to-end grouping behavior of the duplicate finder.

use dupescan::duplicates::{DuplicateFinder, DuplicateGroup, DuplicateGroups, FinderConfig, ScanOutcome};
use dupescan::scanner::{Hasher, WalkerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn group_of<'a>(groups: &'a DuplicateGroups, path: &Path) -> Option<&'a DuplicateGroup> {
    groups.iter().find(|group| group.paths.iter().any(|p| p == path))
}

fn scan(root: &Path) -> dupescan::duplicates::ScanReport {
    DuplicateFinder::with_defaults().find_duplicates(root).unwrap()
}

#[test]
fn test_empty_tree() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("a/b/c")).unwrap();

    let report = scan(dir.path());

    assert!(report.groups.is_empty());
    assert!(report.errors.is_empty());
    assert_eq!(report.outcome(), ScanOutcome::Complete);
    assert_eq!(report.summary.directories_scanned, 4);
    assert_eq!(report.summary.files_hashed, 0);
}

#[test]
fn test_zero_byte_and_large_file_are_separate() {
    let dir = TempDir::new().unwrap();
    let empty = write(dir.path(), "empty", b"");
    let big = write(dir.path(), "big", &vec![0u8; 10_000]);

    let report = scan(dir.path());

    assert_eq!(report.groups.len(), 2);
    assert!(!report.has_duplicates());
    let empty_group = group_of(&report.groups, &empty).unwrap();
    let big_group = group_of(&report.groups, &big).unwrap();
    assert_eq!(empty_group.size, 0);
    assert_eq!(big_group.size, 10_000);
    assert_ne!(empty_group.fingerprint, big_group.fingerprint);
}

#[test]
fn test_identical_files_at_different_depths() {
    let dir = TempDir::new().unwrap();
    let content = b"the same bytes everywhere";
    let a = write(dir.path(), "a.txt", content);
    let b = write(dir.path(), "x/y/b.txt", content);
    let c = write(dir.path(), "x/y/z/w/c.txt", content);
    write(dir.path(), "x/other.txt", b"something else");

    let report = scan(dir.path());

    let dups: Vec<_> = report.groups.duplicates().collect();
    assert_eq!(dups.len(), 1);
    assert_eq!(dups[0].paths, vec![a, b, c]);
    assert_eq!(report.summary.duplicate_files, 2);
    assert_eq!(report.summary.reclaimable_space, 2 * content.len() as u64);
}

#[test]
fn test_empty_files_group_together() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "one", b"");
    write(dir.path(), "sub/two", b"");

    let report = scan(dir.path());

    let dups: Vec<_> = report.groups.duplicates().collect();
    assert_eq!(dups.len(), 1);
    assert_eq!(dups[0].size, 0);
    assert_eq!(dups[0].len(), 2);
}

#[test]
fn test_same_size_different_content() {
    let dir = TempDir::new().unwrap();
    let mut first = vec![7u8; 9000];
    let mut second = first.clone();
    first[8999] = 1;
    second[8999] = 2;
    write(dir.path(), "first", &first);
    write(dir.path(), "second", &second);

    let report = scan(dir.path());
    assert_eq!(report.groups.len(), 2);
    assert!(!report.has_duplicates());
}

#[test]
fn test_fingerprints_match_direct_hashing() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "f", &vec![3u8; 12_345]);

    let report = scan(dir.path());
    let expected = Hasher::new().compute_fingerprint(&path).unwrap();

    assert!(report.groups.get(&expected).is_some());
}

#[test]
fn test_rescan_is_identical() {
    let dir = TempDir::new().unwrap();
    for i in 0..30 {
        write(dir.path(), &format!("d{}/f{i}", i % 4), format!("{}", i % 6).as_bytes());
    }

    let first = scan(dir.path());
    let second = scan(dir.path());

    assert_eq!(first.groups, second.groups);
    assert_eq!(first.summary.files_hashed, 30);
    assert_eq!(first.summary.unique_fingerprints, 6);
}

#[test]
fn test_root_gitignore_is_honored() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".gitignore", b"*.log\nbuild/\n");
    write(dir.path(), "a.log", b"dup");
    write(dir.path(), "b.log", b"dup");
    write(dir.path(), "build/c.txt", b"dup");
    write(dir.path(), "d.txt", b"dup");

    let report = scan(dir.path());

    assert!(!report.has_duplicates());
    assert!(group_of(&report.groups, &dir.path().join("d.txt")).is_some());
    assert!(group_of(&report.groups, &dir.path().join("a.log")).is_none());
}

#[test]
fn test_walker_options_through_finder() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".hidden/a", b"payload");
    write(dir.path(), "visible/a", b"payload");
    write(dir.path(), "visible/b", b"payload");
    write(dir.path(), "visible/tiny", b"p");

    let config = FinderConfig::default().with_walker_config(WalkerConfig {
        skip_hidden: true,
        min_size: Some(2),
        ..Default::default()
    });
    let report = DuplicateFinder::new(config).find_duplicates(dir.path()).unwrap();

    let dups: Vec<_> = report.groups.duplicates().collect();
    assert_eq!(dups.len(), 1);
    assert_eq!(dups[0].len(), 2);
    assert_eq!(report.summary.files_hashed, 2);
}

#[test]
fn test_chunk_size_does_not_change_grouping() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a", &vec![9u8; 50_000]);
    write(dir.path(), "b", &vec![9u8; 50_000]);

    for chunk in [1, 7, 4096, 65_536] {
        let report = DuplicateFinder::new(FinderConfig::default().with_chunk_size(chunk))
            .find_duplicates(dir.path())
            .unwrap();
        assert_eq!(report.summary.duplicate_groups, 1, "chunk size {chunk}");
    }
}
