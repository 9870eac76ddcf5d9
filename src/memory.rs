//! In-memory [`Filesystem`] implementation
//!
//! `MemoryFilesystem` keeps files and directories in ordered maps behind a
//! `parking_lot::RwLock`. It behaves like a strict POSIX filesystem for the
//! operations the engine uses: writing into a missing directory fails,
//! removing a missing file fails and listing a missing directory is empty.
//!
//! Faults can be injected per path and operation to exercise error
//! propagation without a real disk:
//!
//! ```rust
//! use std::path::Path;
//! use treesync::{Filesystem, MemoryFilesystem, memory::FaultOp};
//!
//! let fs = MemoryFilesystem::new();
//! fs.add_file(Path::new("/root/foo/a.snap"), b"a".to_vec(), 0o644);
//! fs.inject_fault(Path::new("/root/foo/a.snap"), FaultOp::Remove);
//!
//! assert!(fs.remove(Path::new("/root/foo/a.snap")).is_err());
//! ```

use crate::error::{Result, SyncError};
use crate::filesystem::{FileStat, Filesystem};
use crate::utils;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Operation a fault can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FaultOp {
    /// `list_dirs` / `list_files`
    List,
    /// `stat`
    Stat,
    /// `read`
    Read,
    /// `create_dir_all`
    CreateDir,
    /// `write`
    Write,
    /// `remove`
    Remove,
}

#[derive(Debug, Clone)]
struct MemoryFile {
    content: Vec<u8>,
    mode: u32,
}

#[derive(Debug, Default)]
struct State {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, MemoryFile>,
    faults: BTreeSet<(PathBuf, FaultOp)>,
    writes: usize,
    removals: usize,
}

impl State {
    fn check(&self, path: &Path, op: FaultOp, name: &'static str) -> Result<()> {
        if self.faults.contains(&(path.to_path_buf(), op)) {
            return Err(SyncError::io(
                name,
                path,
                IoError::new(ErrorKind::PermissionDenied, "injected fault"),
            ));
        }
        Ok(())
    }

    fn add_dir_all(&mut self, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(ancestor.to_path_buf());
        }
    }
}

fn not_found(op: &'static str, path: &Path) -> SyncError {
    SyncError::io(op, path, IoError::new(ErrorKind::NotFound, "no such file or directory"))
}

/// Shared, cloneable in-memory filesystem
///
/// Clones share the same underlying tree, so a test can hand one clone to
/// the engine and inspect the result through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilesystem {
    state: Arc<RwLock<State>>,
}

impl MemoryFilesystem {
    /// Create an empty filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory and its parents
    pub fn add_dir(&self, path: &Path) {
        self.state.write().add_dir_all(path);
    }

    /// Create or replace a file, creating its parent directories
    pub fn add_file(&self, path: &Path, content: impl Into<Vec<u8>>, mode: u32) {
        let mut state = self.state.write();
        if let Some(parent) = path.parent() {
            state.add_dir_all(parent);
        }
        state.files.insert(
            path.to_path_buf(),
            MemoryFile {
                content: content.into(),
                mode: mode & utils::PERMISSION_BITS,
            },
        );
    }

    /// Content and permission bits of a file, if it exists
    pub fn file(&self, path: &Path) -> Option<(Vec<u8>, u32)> {
        self.state
            .read()
            .files
            .get(path)
            .map(|file| (file.content.clone(), file.mode))
    }

    /// True if a directory exists at `path`
    pub fn is_dir(&self, path: &Path) -> bool {
        self.state.read().dirs.contains(path)
    }

    /// Every file path, in order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.state.read().files.keys().cloned().collect()
    }

    /// Make the next and all later `op` calls on `path` fail
    pub fn inject_fault(&self, path: &Path, op: FaultOp) {
        self.state.write().faults.insert((path.to_path_buf(), op));
    }

    /// Remove all injected faults
    pub fn clear_faults(&self) {
        self.state.write().faults.clear();
    }

    /// Number of successful `write` calls so far
    pub fn write_count(&self) -> usize {
        self.state.read().writes
    }

    /// Number of successful `remove` calls so far
    pub fn remove_count(&self) -> usize {
        self.state.read().removals
    }
}

impl Filesystem for MemoryFilesystem {
    fn list_dirs(&self, root: &Path, max_depth: Option<usize>) -> Result<Vec<String>> {
        let state = self.state.read();
        state.check(root, FaultOp::List, "list")?;

        if !state.dirs.contains(root) {
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for dir in state.dirs.iter() {
            let Ok(relative) = dir.strip_prefix(root) else {
                continue;
            };
            if max_depth.is_some_and(|depth| relative.components().count() > depth) {
                continue;
            }
            if let Some(key) = utils::dir_key(relative) {
                dirs.push(key);
            }
        }
        Ok(dirs)
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<String>> {
        let state = self.state.read();
        state.check(dir, FaultOp::List, "list")?;

        let names = state
            .files
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .filter_map(|path| path.file_name()?.to_str().map(str::to_string))
            .collect();
        Ok(names)
    }

    fn stat(&self, path: &Path) -> Result<FileStat> {
        let state = self.state.read();
        state.check(path, FaultOp::Stat, "stat")?;

        let file = state.files.get(path).ok_or_else(|| not_found("stat", path))?;
        Ok(FileStat {
            size: file.content.len() as u64,
            mode: file.mode,
            is_file: true,
        })
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let state = self.state.read();
        state.check(path, FaultOp::Read, "read")?;

        state
            .files
            .get(path)
            .map(|file| file.content.clone())
            .ok_or_else(|| not_found("read", path))
    }

    fn create_dir_all(&self, path: &Path, _mode: u32) -> Result<()> {
        let mut state = self.state.write();
        state.check(path, FaultOp::CreateDir, "create directory")?;

        if state.files.contains_key(path) {
            return Err(SyncError::io(
                "create directory",
                path,
                IoError::new(ErrorKind::AlreadyExists, "file exists"),
            ));
        }
        state.add_dir_all(path);
        Ok(())
    }

    fn write(&self, path: &Path, content: &[u8], mode: u32) -> Result<()> {
        let mut state = self.state.write();
        state.check(path, FaultOp::Write, "write")?;

        let parent_exists = path
            .parent()
            .is_some_and(|parent| state.dirs.contains(parent));
        if !parent_exists {
            return Err(not_found("write", path));
        }
        if state.dirs.contains(path) {
            return Err(SyncError::io(
                "write",
                path,
                IoError::new(ErrorKind::Other, "is a directory"),
            ));
        }

        state.files.insert(
            path.to_path_buf(),
            MemoryFile {
                content: content.to_vec(),
                mode: mode & utils::PERMISSION_BITS,
            },
        );
        state.writes += 1;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let mut state = self.state.write();
        state.check(path, FaultOp::Remove, "remove")?;

        state
            .files
            .remove(path)
            .ok_or_else(|| not_found("remove", path))?;
        state.removals += 1;
        Ok(())
    }
}
