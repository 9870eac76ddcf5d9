//! Filesystem capability used by the sync engine
//!
//! The engine never calls `std::fs` directly: every listing, read, write and
//! removal goes through the [`Filesystem`] trait. [`OsFilesystem`] is the real
//! implementation; [`MemoryFilesystem`](crate::MemoryFilesystem) is an
//! in-memory fake for tests and dry runs.
//!
//! All paths handed to a `Filesystem` are full paths (the sync root joined
//! with the relative directory and file name). Implementations open and
//! release handles within a single call and never keep them across calls.

use crate::error::{Result, SyncError};
use crate::utils;
use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Size and permission bits of an existing file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Size in bytes
    pub size: u64,
    /// Permission bits (`0o7777` mask)
    pub mode: u32,
    /// False for FIFOs, sockets and devices, whose content cannot be compared
    pub is_file: bool,
}

/// Synchronous filesystem operations needed by the engine
pub trait Filesystem: Debug + Send + Sync {
    /// List directories under `root` as `/`-separated keys relative to it
    ///
    /// The root itself is included as `""`. `max_depth` bounds how deep
    /// discovery descends (`Some(0)` lists only the root). A missing root
    /// yields an empty list. Symlinked directories are not followed.
    fn list_dirs(&self, root: &Path, max_depth: Option<usize>) -> Result<Vec<String>>;

    /// Names of the non-directory entries in `dir`, empty if it does not exist
    fn list_files(&self, dir: &Path) -> Result<Vec<String>>;

    /// Size, permission bits and type of a file, following symlinks
    ///
    /// A dangling symlink fails with a `NotFound` I/O error.
    fn stat(&self, path: &Path) -> Result<FileStat>;

    /// Full content of a file
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create a directory and any missing parents
    fn create_dir_all(&self, path: &Path, mode: u32) -> Result<()>;

    /// Replace a file's content and permission bits as one logical step
    fn write(&self, path: &Path, content: &[u8], mode: u32) -> Result<()>;

    /// Delete a file
    fn remove(&self, path: &Path) -> Result<()>;
}

/// The real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFilesystem;

impl Filesystem for OsFilesystem {
    fn list_dirs(&self, root: &Path, max_depth: Option<usize>) -> Result<Vec<String>> {
        if !root.is_dir() {
            trace!("Sync root {:?} does not exist yet", root);
            return Ok(Vec::new());
        }

        let mut walker = WalkDir::new(root).follow_links(false);
        if let Some(depth) = max_depth {
            walker = walker.max_depth(depth);
        }

        let mut dirs = Vec::new();
        for entry in walker
            .into_iter()
            .filter_entry(|entry| entry.file_type().is_dir())
        {
            let entry = entry?;
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            match utils::dir_key(relative) {
                Some(key) => dirs.push(key),
                None => debug!("Skipping directory with non UTF-8 name: {:?}", entry.path()),
            }
        }
        Ok(dirs)
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<String>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SyncError::io("list", dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SyncError::io("list", dir, e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| SyncError::io("stat", entry.path(), e))?;
            if file_type.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => debug!("Skipping file with non UTF-8 name: {:?}", raw),
            }
        }
        Ok(names)
    }

    fn stat(&self, path: &Path) -> Result<FileStat> {
        let metadata = fs::metadata(path).map_err(|e| SyncError::io("stat", path, e))?;
        Ok(FileStat {
            size: metadata.len(),
            mode: utils::get_permissions(&metadata),
            is_file: metadata.is_file(),
        })
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| SyncError::io("read", path, e))
    }

    fn create_dir_all(&self, path: &Path, mode: u32) -> Result<()> {
        utils::create_dir_all(path, mode)
    }

    fn write(&self, path: &Path, content: &[u8], mode: u32) -> Result<()> {
        utils::atomic_write(path, content, mode)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| SyncError::io("remove", path, e))
    }
}
