//! Property-based testing for treesync
//!
//! Uses proptest to check convergence, removal, non-interference and report
//! invariants over randomly generated starting trees and expectations.

#![cfg(unix)]

use super::integration::{set_mode, snapshot};
use ::treesync::*;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const GLOBS: [&str; 1] = ["*.snap"];

/// A file to create before the sync
#[derive(Debug, Clone)]
struct Seed {
    dir: &'static str,
    name: String,
    content: Vec<u8>,
    mode: u32,
}

fn dir_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(""), Just("a"), Just("b"), Just("a/c")]
}

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-c]{1,2}\\.(snap|txt)"
}

fn mode_strategy() -> impl Strategy<Value = u32> {
    prop_oneof![Just(0o600u32), Just(0o644u32), Just(0o640u32)]
}

fn seed_strategy() -> impl Strategy<Value = Seed> {
    (
        dir_strategy(),
        name_strategy(),
        prop::collection::vec(any::<u8>(), 0..64),
        mode_strategy(),
    )
        .prop_map(|(dir, name, content, mode)| Seed { dir, name, content, mode })
}

fn rel(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

fn seed_tree(root: &Path, seeds: &[Seed]) {
    for seed in seeds {
        let dir = root.join(seed.dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(&seed.name);
        fs::write(&path, &seed.content).unwrap();
        set_mode(&path, seed.mode);
    }
}

/// Declared files only use `.snap` names so `.txt` files stay unrelated
fn expected_from(entries: &[Seed], empty_dirs: &[&'static str]) -> ExpectedTree {
    let mut expected = ExpectedTree::new();
    for dir in empty_dirs {
        expected.dir(*dir);
    }
    for entry in entries {
        if entry.name.ends_with(".snap") {
            expected.insert(
                entry.dir,
                entry.name.as_str(),
                FileState::new(entry.content.clone(), entry.mode),
            );
        }
    }
    expected
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// After a sync the tree holds exactly the declared governed files plus
    /// the untouched unrelated ones
    #[test]
    fn sync_converges(
        seeds in prop::collection::vec(seed_strategy(), 0..12),
        entries in prop::collection::vec(seed_strategy(), 0..12),
        empty_dirs in prop::collection::vec(dir_strategy(), 0..3),
    ) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        seed_tree(root, &seeds);
        let before = snapshot(root);
        let expected = expected_from(&entries, &empty_dirs);

        let report = ensure_tree_state(root, GLOBS, &expected).unwrap();
        let after = snapshot(root);

        // Convergence
        let mut declared = BTreeSet::new();
        for (dir, name, state) in expected.iter() {
            let path = rel(dir, name);
            let (content, mode) = after.get(&path).expect("declared file exists");
            prop_assert_eq!(content.as_slice(), state.content());
            prop_assert_eq!(*mode, state.mode());
            declared.insert(path);
        }

        // Removal: no undeclared governed file survives
        for path in after.keys() {
            if path.ends_with(".snap") {
                prop_assert!(declared.contains(path), "stale {} survived", path);
            }
        }

        // Non-interference: unrelated files are untouched
        for (path, state) in &before {
            if path.ends_with(".txt") {
                prop_assert_eq!(after.get(path), Some(state));
            }
        }

        // Changed is exactly the declared paths whose prior state differed
        let mut expected_changed: Vec<String> = expected
            .iter()
            .filter_map(|(dir, name, state)| {
                let path = rel(dir, name);
                let unchanged = before
                    .get(&path)
                    .is_some_and(|(c, m)| c.as_slice() == state.content() && *m == state.mode());
                (!unchanged).then_some(path)
            })
            .collect();
        expected_changed.sort();
        prop_assert_eq!(&report.changed, &expected_changed);

        let expected_removed: Vec<String> = before
            .keys()
            .filter(|path| path.ends_with(".snap") && !declared.contains(*path))
            .cloned()
            .collect();
        prop_assert_eq!(&report.removed, &expected_removed);

        // Reports are sorted and disjoint
        prop_assert!(report.changed.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(report.removed.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(report.changed.iter().all(|p| !report.removed.contains(p)));
    }

    /// A second sync with the same input reports and changes nothing
    #[test]
    fn sync_is_idempotent(
        seeds in prop::collection::vec(seed_strategy(), 0..12),
        entries in prop::collection::vec(seed_strategy(), 0..12),
    ) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        seed_tree(root, &seeds);
        let expected = expected_from(&entries, &[]);

        ensure_tree_state(root, GLOBS, &expected).unwrap();
        let first = snapshot(root);

        let report = ensure_tree_state(root, GLOBS, &expected).unwrap();
        prop_assert!(report.is_empty(), "second sync reported {:?}", report);
        prop_assert_eq!(snapshot(root), first);
    }

    /// Planning never touches the tree and predicts what apply reports
    #[test]
    fn plan_matches_apply(
        seeds in prop::collection::vec(seed_strategy(), 0..12),
        entries in prop::collection::vec(seed_strategy(), 0..12),
    ) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        seed_tree(root, &seeds);
        let before = snapshot(root);
        let expected = expected_from(&entries, &[]);
        let engine = TreeSync::new(GLOBS).unwrap();

        let plan = engine.plan(root, &expected).unwrap();
        prop_assert_eq!(snapshot(root), before);

        let predicted = plan.to_report();
        let report = engine.apply(root, &plan).unwrap();
        prop_assert_eq!(predicted, report);
    }
}

/// Sync results must not depend on the order files were declared in
#[test]
fn declaration_order_is_irrelevant() {
    let files: BTreeMap<&str, &str> = [("a.snap", "1"), ("b.snap", "2"), ("c.snap", "3")]
        .into_iter()
        .collect();

    let forward: ExpectedTree = files
        .iter()
        .map(|(name, content)| ("d", *name, FileState::new(content.as_bytes().to_vec(), 0o644)))
        .collect();
    let backward: ExpectedTree = files
        .iter()
        .rev()
        .map(|(name, content)| ("d", *name, FileState::new(content.as_bytes().to_vec(), 0o644)))
        .collect();

    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    let r1 = ensure_tree_state(left.path(), GLOBS, &forward).unwrap();
    let r2 = ensure_tree_state(right.path(), GLOBS, &backward).unwrap();

    assert_eq!(r1, r2);
    assert_eq!(snapshot(left.path()), snapshot(right.path()));
}
