//! Core data types used throughout the treesync library
//!
//! ## Overview
//!
//! The types in this module represent:
//! - **Desired state**: `FileState`, `ExpectedTree` - what the tree must contain
//! - **Planned work**: `SyncPlan`, `PlannedWrite`, `PlannedRemoval` - the diff
//!   between the tree on disk and the desired state
//! - **Results**: `SyncReport` - what a sync actually changed
//!
//! ## Examples
//!
//! ```rust
//! use treesync::{ExpectedTree, FileState};
//!
//! let mut expected = ExpectedTree::new();
//! expected.insert("foo", "a.snap", FileState::new(b"content".to_vec(), 0o600));
//! expected.dir("bar"); // "bar" must not contain any governed file
//!
//! assert_eq!(expected.len(), 1);
//! assert!(expected.get("foo", "a.snap").is_some());
//! ```

use crate::error::{Result, SyncError};
use crate::utils;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path};

/// Desired content and permission bits of a single file
///
/// Only the permission bits (`0o7777`) of `mode` are kept; file type bits
/// are stripped on construction.
#[derive(Clone, PartialEq, Eq)]
pub struct FileState {
    content: Vec<u8>,
    mode: u32,
}

impl FileState {
    /// Create a state from in-memory content
    pub fn new(content: impl Into<Vec<u8>>, mode: u32) -> Self {
        Self {
            content: content.into(),
            mode: mode & utils::PERMISSION_BITS,
        }
    }

    /// Snapshot the content and permissions of an existing file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read(path).map_err(|e| SyncError::io("read", path, e))?;
        let metadata = std::fs::metadata(path).map_err(|e| SyncError::io("stat", path, e))?;
        Ok(Self::new(content, utils::get_permissions(&metadata)))
    }

    /// Snapshot the content of an existing file, overriding its permissions
    pub fn from_file_with_mode(path: &Path, mode: u32) -> Result<Self> {
        let content = std::fs::read(path).map_err(|e| SyncError::io("read", path, e))?;
        Ok(Self::new(content, mode))
    }

    /// Expected bytes
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Expected permission bits
    pub fn mode(&self) -> u32 {
        self.mode
    }
}

impl fmt::Debug for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileState")
            .field("size", &self.content.len())
            .field("mode", &format_args!("{:o}", self.mode))
            .finish()
    }
}

/// Mapping of relative directories to the files they must contain
///
/// Directory keys are relative paths separated by `/`. Both `""` and `"."`
/// denote the root and are stored under the same key. A declared directory
/// with no files means every governed file in it is extraneous; an
/// undeclared directory carries no expectations at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedTree {
    dirs: BTreeMap<String, BTreeMap<String, FileState>>,
}

impl ExpectedTree {
    /// Create an empty expected tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a directory, without adding any file to it
    pub fn dir(&mut self, dir: &str) -> &mut Self {
        self.dirs.entry(normalize_dir(dir)).or_default();
        self
    }

    /// Declare a file, replacing any previous declaration of the same path
    pub fn insert(&mut self, dir: &str, name: &str, state: FileState) -> Option<FileState> {
        self.dirs
            .entry(normalize_dir(dir))
            .or_default()
            .insert(name.to_string(), state)
    }

    /// Look up a declared file
    pub fn get(&self, dir: &str, name: &str) -> Option<&FileState> {
        self.dirs.get(&normalize_dir(dir))?.get(name)
    }

    /// Files declared in `dir`, or `None` if the directory is not declared
    pub fn files(&self, dir: &str) -> Option<&BTreeMap<String, FileState>> {
        self.dirs.get(&normalize_dir(dir))
    }

    /// Files declared in `dir` together with the stored directory key
    pub(crate) fn dir_entry(&self, dir: &str) -> Option<(&str, &BTreeMap<String, FileState>)> {
        self.dirs
            .get_key_value(&normalize_dir(dir))
            .map(|(key, files)| (key.as_str(), files))
    }

    /// Declared directory keys, in order (the root is `""`)
    pub fn dirs(&self) -> impl Iterator<Item = &str> {
        self.dirs.keys().map(String::as_str)
    }

    /// Iterate over every declared `(dir, name, state)`
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &FileState)> {
        self.dirs.iter().flat_map(|(dir, files)| {
            files
                .iter()
                .map(move |(name, state)| (dir.as_str(), name.as_str(), state))
        })
    }

    /// Number of declared files
    pub fn len(&self) -> usize {
        self.dirs.values().map(BTreeMap::len).sum()
    }

    /// True if no file is declared (directories may still be)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that every directory key is a clean relative path and every
    /// file name is a bare name.
    pub fn validate(&self) -> Result<()> {
        for (dir, files) in &self.dirs {
            validate_dir(dir)?;
            for name in files.keys() {
                validate_name(dir, name)?;
            }
        }
        Ok(())
    }
}

impl<D, N> FromIterator<(D, N, FileState)> for ExpectedTree
where
    D: AsRef<str>,
    N: AsRef<str>,
{
    fn from_iter<I: IntoIterator<Item = (D, N, FileState)>>(iter: I) -> Self {
        let mut tree = ExpectedTree::new();
        for (dir, name, state) in iter {
            tree.insert(dir.as_ref(), name.as_ref(), state);
        }
        tree
    }
}

fn normalize_dir(dir: &str) -> String {
    if dir == "." {
        String::new()
    } else {
        dir.to_string()
    }
}

fn validate_dir(dir: &str) -> Result<()> {
    let invalid = |reason| {
        Err(SyncError::InvalidDirectory {
            dir: dir.to_string(),
            reason,
        })
    };

    if dir.is_empty() {
        return Ok(());
    }
    if dir.starts_with('/') || dir.starts_with('\\') || Path::new(dir).has_root() {
        return invalid("must be relative");
    }
    if dir.contains('\\') {
        return invalid("must use '/' as separator");
    }
    for part in dir.split('/') {
        match part {
            "" => return invalid("must not contain empty components"),
            "." => return invalid("must not contain '.' components"),
            ".." => return invalid("must not escape the root"),
            _ => {}
        }
    }
    if Path::new(dir)
        .components()
        .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
    {
        return invalid("must be relative");
    }
    Ok(())
}

fn validate_name(dir: &str, name: &str) -> Result<()> {
    let invalid = |reason| {
        Err(SyncError::InvalidFileName {
            dir: dir.to_string(),
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return invalid("must not be empty");
    }
    if name.contains('/') || name.contains('\\') {
        return invalid("must not contain a path separator");
    }
    if name == "." || name == ".." {
        return invalid("must name a file");
    }
    Ok(())
}

/// Join a directory key and a file name into a report path
pub(crate) fn join_rel(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Why a declared file has to be written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteReason {
    /// The file does not exist
    Create,
    /// The file exists with different content
    Content,
    /// The content matches but the permission bits differ
    Mode,
}

impl fmt::Display for WriteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteReason::Create => write!(f, "create"),
            WriteReason::Content => write!(f, "content"),
            WriteReason::Mode => write!(f, "mode"),
        }
    }
}

/// A declared file that must be (re)written
#[derive(Debug, Clone)]
pub struct PlannedWrite<'a> {
    /// Report path (`dir/name`)
    pub path: String,
    /// Directory key the file belongs to
    pub dir: &'a str,
    /// File name
    pub name: &'a str,
    /// Desired state
    pub state: &'a FileState,
    /// What differs on disk
    pub reason: WriteReason,
}

/// A governed, undeclared file that must be removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRemoval {
    /// Report path (`dir/name`)
    pub path: String,
    /// Directory the file was found in
    pub dir: String,
    /// File name
    pub name: String,
}

/// Diff between the tree on disk and an expected tree
///
/// Produced by [`TreeSync::plan`](crate::TreeSync::plan) without mutating
/// anything. Both lists are sorted by report path.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan<'a> {
    /// Files to create or overwrite
    pub writes: Vec<PlannedWrite<'a>>,
    /// Files to delete
    pub removals: Vec<PlannedRemoval>,
}

impl SyncPlan<'_> {
    /// True if the tree already matches the expected state
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.removals.is_empty()
    }

    /// The report this plan produces once applied
    pub fn to_report(&self) -> SyncReport {
        SyncReport {
            changed: self.writes.iter().map(|w| w.path.clone()).collect(),
            removed: self.removals.iter().map(|r| r.path.clone()).collect(),
        }
    }
}

/// Result of a sync
///
/// Paths are relative to the sync root, `/`-separated, and sorted
/// lexicographically. A path never appears in both lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Files created or overwritten
    pub changed: Vec<String>,
    /// Files deleted
    pub removed: Vec<String>,
}

impl SyncReport {
    /// True if nothing was changed or removed
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }

    /// Number of touched files
    pub fn total(&self) -> usize {
        self.changed.len() + self.removed.len()
    }
}
