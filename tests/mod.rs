//! Main test module for treesync
//!
//! This module includes all test suites:
//! - Integration tests for complete syncs on a real directory
//! - Property-based tests for the reconciliation invariants
//! - Edge cases around file names and directory shapes

pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::treesync::*;
    use std::fs;
    use tempfile::TempDir;

    fn state(content: &str) -> FileState {
        FileState::new(content.as_bytes().to_vec(), 0o644)
    }

    #[test]
    fn test_empty_root_and_empty_expected() {
        let temp_dir = TempDir::new().unwrap();

        let report = ensure_tree_state(temp_dir.path(), ["*"], &ExpectedTree::new()).unwrap();

        assert!(report.is_empty());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_special_filenames() {
        let temp_dir = TempDir::new().unwrap();

        // Glob metacharacters in names are plain characters on disk
        let special_names = vec![
            "file with spaces.snap",
            "file-with-dashes.snap",
            "file.with.dots.snap",
            "file[with]brackets.snap",
            "file{with}braces.snap",
            "file*star.snap",
            ".hidden.snap",
        ];

        let mut expected = ExpectedTree::new();
        for name in &special_names {
            expected.insert("dir", name, state(name));
        }

        let report = match ensure_tree_state(temp_dir.path(), ["*.snap"], &expected) {
            Ok(report) => report,
            // Skip if the OS rejects one of the names
            Err(SyncError::Io { .. }) => return,
            Err(e) => panic!("unexpected error: {}", e),
        };
        assert_eq!(report.changed.len(), special_names.len());

        for name in &special_names {
            let content = fs::read_to_string(temp_dir.path().join("dir").join(name)).unwrap();
            assert_eq!(&content, name);
        }

        // Second run sees every file as converged
        let report = ensure_tree_state(temp_dir.path(), ["*.snap"], &expected).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_unicode_filenames() {
        let temp_dir = TempDir::new().unwrap();

        let unicode_names = vec!["файл.snap", "文件.snap", "ファイル.snap", "αρχείο.snap", "🚀.snap"];

        let mut created = Vec::new();
        for name in &unicode_names {
            if fs::write(temp_dir.path().join(name), name).is_ok() {
                created.push(*name);
            }
        }
        if created.is_empty() {
            // No unicode support on this system
            return;
        }

        let mut expected = ExpectedTree::new();
        expected.insert("", created[0], state(created[0]));

        let report = ensure_tree_state(temp_dir.path(), ["*.snap"], &expected).unwrap();

        let mut removed: Vec<String> = created[1..].iter().map(|s| s.to_string()).collect();
        removed.sort();
        assert_eq!(report.removed, removed);
        assert!(temp_dir.path().join(created[0]).exists());
    }

    #[test]
    fn test_directory_matching_glob_is_not_removed() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("looks-like.snap")).unwrap();
        fs::write(temp_dir.path().join("looks-like.snap").join("inner.snap"), "x").unwrap();

        let report = ensure_tree_state(temp_dir.path(), ["*.snap"], &ExpectedTree::new()).unwrap();

        // The directory itself is never governed, but files inside it are
        assert_eq!(report.removed, vec!["looks-like.snap/inner.snap"]);
        assert!(temp_dir.path().join("looks-like.snap").is_dir());
    }

    #[test]
    fn test_root_is_created_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("not").join("yet");

        let mut expected = ExpectedTree::new();
        expected.insert("", "top.snap", state("top"));
        expected.insert("sub", "nested.snap", state("nested"));

        let report = ensure_tree_state(&root, ["*.snap"], &expected).unwrap();

        assert_eq!(report.changed, vec!["sub/nested.snap", "top.snap"]);
        assert_eq!(fs::read_to_string(root.join("top.snap")).unwrap(), "top");
    }

    #[test]
    fn test_invalid_glob_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.snap"), "a").unwrap();

        let err = ensure_tree_state(temp_dir.path(), ["*.snap", "[oops"], &ExpectedTree::new())
            .unwrap_err();

        assert!(err.is_configuration());
        assert!(temp_dir.path().join("a.snap").exists());
    }

    #[test]
    fn test_brace_pattern_matches_literally() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["a.snap", "b.snap", "{a,b}.snap"] {
            if fs::write(temp_dir.path().join(name), name).is_err() {
                // Braces rejected by this filesystem
                return;
            }
        }

        let report = ensure_tree_state(temp_dir.path(), ["{a,b}.snap"], &ExpectedTree::new()).unwrap();

        assert_eq!(report.removed, vec!["{a,b}.snap"]);
        assert!(temp_dir.path().join("a.snap").exists());
        assert!(temp_dir.path().join("b.snap").exists());
    }

    #[test]
    fn test_class_pattern_governs_undeclared_files() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["a.snap", "c.snap", "[ab].snap"] {
            if fs::write(temp_dir.path().join(name), name).is_err() {
                return;
            }
        }

        let report = ensure_tree_state(temp_dir.path(), ["[ab].snap"], &ExpectedTree::new()).unwrap();

        // The class matches one character; the bracketed name is not governed
        assert_eq!(report.removed, vec!["a.snap"]);
        assert!(temp_dir.path().join("c.snap").exists());
        assert!(temp_dir.path().join("[ab].snap").exists());
    }

    #[test]
    fn test_metacharacter_names_are_removed_when_governed() {
        let temp_dir = TempDir::new().unwrap();
        let names = [
            "file*star.snap",
            "file[with]brackets.snap",
            "file{with,comma}.snap",
            "keep[1].txt",
        ];
        for name in names {
            if fs::write(temp_dir.path().join(name), name).is_err() {
                return;
            }
        }

        let report = ensure_tree_state(temp_dir.path(), ["*.snap"], &ExpectedTree::new()).unwrap();

        assert_eq!(
            report.removed,
            vec!["file*star.snap", "file[with]brackets.snap", "file{with,comma}.snap"]
        );
        assert!(temp_dir.path().join("keep[1].txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_declared_dangling_symlink_is_replaced() {
        let temp_dir = TempDir::new().unwrap();
        let link = temp_dir.path().join("x.snap");
        std::os::unix::fs::symlink(temp_dir.path().join("missing-target"), &link).unwrap();

        let mut expected = ExpectedTree::new();
        expected.insert("", "x.snap", state("x"));
        let report = ensure_tree_state(temp_dir.path(), ["*.snap"], &expected).unwrap();

        assert_eq!(report.changed, vec!["x.snap"]);
        let metadata = fs::symlink_metadata(&link).unwrap();
        assert!(metadata.file_type().is_file());
        assert_eq!(fs::read_to_string(&link).unwrap(), "x");
        assert!(!temp_dir.path().join("missing-target").exists());

        let report = ensure_tree_state(temp_dir.path(), ["*.snap"], &expected).unwrap();
        assert!(report.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_undeclared_dangling_symlink_is_removed() {
        let temp_dir = TempDir::new().unwrap();
        let link = temp_dir.path().join("stale.snap");
        std::os::unix::fs::symlink(temp_dir.path().join("missing-target"), &link).unwrap();

        let report = ensure_tree_state(temp_dir.path(), ["*.snap"], &ExpectedTree::new()).unwrap();

        assert_eq!(report.removed, vec!["stale.snap"]);
        assert!(fs::symlink_metadata(&link).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_fifo_entries_are_never_read() {
        let temp_dir = TempDir::new().unwrap();
        let declared = temp_dir.path().join("pipe.snap");
        let stale = temp_dir.path().join("other.snap");
        for path in [&declared, &stale] {
            let created = std::process::Command::new("mkfifo")
                .arg(path)
                .status()
                .map(|status| status.success())
                .unwrap_or(false);
            if !created {
                // mkfifo unavailable
                return;
            }
        }

        let mut expected = ExpectedTree::new();
        expected.insert("", "pipe.snap", FileState::new(Vec::new(), 0o644));
        let report = ensure_tree_state(temp_dir.path(), ["*.snap"], &expected).unwrap();

        assert_eq!(report.changed, vec!["pipe.snap"]);
        assert_eq!(report.removed, vec!["other.snap"]);
        assert!(fs::symlink_metadata(&declared).unwrap().file_type().is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_is_not_followed() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("precious.snap"), "keep").unwrap();
        std::os::unix::fs::symlink(outside.path(), temp_dir.path().join("link")).unwrap();

        let report = ensure_tree_state(temp_dir.path(), ["*.snap"], &ExpectedTree::new()).unwrap();

        assert!(report.is_empty());
        assert!(outside.path().join("precious.snap").exists());
    }
}
