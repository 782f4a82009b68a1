//! Path-level failures are recorded without stopping the scan, unless strict.

use dupescan::duplicates::{DuplicateFinder, FinderConfig, FinderError, ScanOutcome};
use dupescan::scanner::{ErrorKind, ScanError, WalkerConfig};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_missing_root_is_total_failure() {
    let dir = TempDir::new().unwrap();
    let result = DuplicateFinder::with_defaults().find_duplicates(&dir.path().join("gone"));
    assert!(matches!(result, Err(FinderError::PathNotFound(_))));
}

#[test]
fn test_file_root_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("f");
    fs::write(&file, b"x").unwrap();

    let err = DuplicateFinder::with_defaults().find_duplicates(&file).unwrap_err();
    assert!(err.to_string().contains("Not a directory"));
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::fs::{symlink, PermissionsExt};
    use std::path::Path;

    /// Returns false when permissions are not enforced (running as root).
    fn lock(path: &Path) -> bool {
        fs::set_permissions(path, fs::Permissions::from_mode(0o000)).unwrap();
        let enforced = if path.is_dir() {
            fs::read_dir(path).is_err()
        } else {
            fs::File::open(path).is_err()
        };
        if !enforced {
            unlock(path);
        }
        enforced
    }

    fn unlock(path: &Path) {
        let mode = if path.is_dir() { 0o755 } else { 0o644 };
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    fn test_unlistable_directory_is_reported_and_scan_continues() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a"), b"dup").unwrap();
        fs::write(dir.path().join("b"), b"dup").unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("c"), b"dup").unwrap();

        if !lock(&locked) {
            return;
        }
        let report = DuplicateFinder::with_defaults().find_duplicates(dir.path());
        unlock(&locked);
        let report = report.unwrap();

        assert_eq!(report.outcome(), ScanOutcome::Partial { errors: 1 });
        assert_eq!(report.errors[0].kind(), ErrorKind::List);
        assert_eq!(report.errors[0].path(), locked);

        let dups: Vec<_> = report.groups.duplicates().collect();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].len(), 2);
    }

    #[test]
    fn test_unreadable_file_is_open_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ok"), b"fine").unwrap();
        let secret = dir.path().join("secret");
        fs::write(&secret, b"hidden").unwrap();

        if !lock(&secret) {
            return;
        }
        let report = DuplicateFinder::with_defaults().find_duplicates(dir.path());
        unlock(&secret);
        let report = report.unwrap();

        assert_eq!(report.errors.len(), 1);
        assert!(matches!(&report.errors[0], ScanError::Open { path, .. } if *path == secret));
        assert_eq!(report.summary.files_hashed, 1);
    }

    #[test]
    fn test_unreadable_root_is_total_failure() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();

        if !lock(&root) {
            return;
        }
        let result = DuplicateFinder::with_defaults().find_duplicates(&root);
        unlock(&root);

        assert!(matches!(result, Err(FinderError::RootUnreadable { .. })));
    }

    #[test]
    fn test_errors_are_sorted_by_path() {
        let dir = TempDir::new().unwrap();
        for name in ["zeta", "alpha", "mid"] {
            symlink(dir.path().join(format!("{name}-missing")), dir.path().join(name)).unwrap();
        }
        let config = FinderConfig::default()
            .with_io_threads(8)
            .with_walker_config(WalkerConfig {
                follow_symlinks: true,
                ..Default::default()
            });

        let report = DuplicateFinder::new(config).find_duplicates(dir.path()).unwrap();

        let paths: Vec<_> = report.errors.iter().map(|e| e.path().to_path_buf()).collect();
        assert_eq!(
            paths,
            vec![dir.path().join("alpha"), dir.path().join("mid"), dir.path().join("zeta")]
        );
        assert!(report.errors.iter().all(|e| e.kind() == ErrorKind::Stat));
    }

    #[test]
    fn test_dangling_symlink_ignored_without_follow() {
        let dir = TempDir::new().unwrap();
        symlink(dir.path().join("nowhere"), dir.path().join("link")).unwrap();

        let report = DuplicateFinder::with_defaults().find_duplicates(dir.path()).unwrap();
        assert_eq!(report.outcome(), ScanOutcome::Complete);
    }

    #[test]
    fn test_strict_mode_fails_on_first_error() {
        let dir = TempDir::new().unwrap();
        for i in 0..20 {
            fs::write(dir.path().join(format!("f{i}")), b"same").unwrap();
        }
        symlink(dir.path().join("nowhere"), dir.path().join("broken")).unwrap();
        let config = FinderConfig::default()
            .with_strict(true)
            .with_walker_config(WalkerConfig {
                follow_symlinks: true,
                ..Default::default()
            });

        let err = DuplicateFinder::new(config).find_duplicates(dir.path()).unwrap_err();
        match err {
            FinderError::Scan(scan_err) => {
                assert_eq!(scan_err.kind(), ErrorKind::Stat);
                assert_eq!(scan_err.path(), dir.path().join("broken"));
            }
            other => panic!("expected a path error, got {other}"),
        }
    }
}
