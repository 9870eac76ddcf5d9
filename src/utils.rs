//! Utility functions for treesync
//!
//! Cross-platform permission handling, atomic per-file writes and the
//! conversion between on-disk relative paths and `/`-separated directory
//! keys.
//!
//! ## Permissions
//!
//! - **Unix**: native permission bits, masked to [`PERMISSION_BITS`]
//! - **Windows**: the read-only attribute maps to `0o444`, everything else
//!   to `0o644`; writing a mode only toggles the read-only attribute
//!
//! ## Atomic writes
//!
//! [`atomic_write`] writes into a temporary file next to the target, applies
//! the permissions and renames it into place, so a reader never observes a
//! file with the new content and the old mode (or a truncated file).

use crate::error::{Result, SyncError};
use std::fs;
use std::io::Write;
use std::path::{Component, Path};
use tempfile::NamedTempFile;
use tracing::trace;

/// Permission bits compared and written by the engine (rwx + setuid/setgid/sticky)
pub const PERMISSION_BITS: u32 = 0o7777;

/// Get permission bits from metadata
#[cfg(unix)]
pub fn get_permissions(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & PERMISSION_BITS
}

/// Get permissions from metadata (Windows implementation)
#[cfg(windows)]
pub fn get_permissions(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Reduce a mode to the bits this platform can represent
///
/// Identity on Unix. On Windows only the owner write bit survives, so modes
/// are folded onto `0o644` / `0o444` before comparison.
#[cfg(unix)]
pub fn comparable_mode(mode: u32) -> u32 {
    mode & PERMISSION_BITS
}

/// Reduce a mode to the bits this platform can represent (Windows implementation)
#[cfg(windows)]
pub fn comparable_mode(mode: u32) -> u32 {
    if mode & 0o200 == 0 {
        0o444
    } else {
        0o644
    }
}

#[cfg(unix)]
fn permissions_for(_current: fs::Permissions, mode: u32) -> fs::Permissions {
    use std::os::unix::fs::PermissionsExt;
    fs::Permissions::from_mode(mode & PERMISSION_BITS)
}

#[cfg(windows)]
fn permissions_for(mut current: fs::Permissions, mode: u32) -> fs::Permissions {
    // Only the owner write bit can be expressed
    current.set_readonly(mode & 0o200 == 0);
    current
}

/// Create a directory and its parents with the given mode
///
/// The mode only applies to directories created by this call; existing
/// directories are left alone.
pub fn create_dir_all(path: &Path, mode: u32) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode & PERMISSION_BITS);
    }
    #[cfg(not(unix))]
    let _ = mode;

    builder
        .create(path)
        .map_err(|e| SyncError::io("create directory", path, e))?;
    trace!("Created directory {:?}", path);
    Ok(())
}

/// Atomic file write with permissions (temp file, chmod, rename)
///
/// The temporary file lives in the target's directory so the final rename
/// never crosses filesystems. On any failure the temporary file is removed
/// when the handle drops.
pub fn atomic_write(path: &Path, content: &[u8], mode: u32) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|e| SyncError::io("create temporary file in", dir, e))?;
    temp.write_all(content)
        .map_err(|e| SyncError::io("write", temp.path().to_path_buf(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| SyncError::io("flush", temp.path().to_path_buf(), e))?;

    let current = temp
        .as_file()
        .metadata()
        .map_err(|e| SyncError::io("stat", temp.path().to_path_buf(), e))?
        .permissions();
    temp.as_file()
        .set_permissions(permissions_for(current, mode))
        .map_err(|e| SyncError::io("set permissions on", temp.path().to_path_buf(), e))?;

    temp.persist(path)
        .map_err(|e| SyncError::io("rename into place", path, e.error))?;
    Ok(())
}

/// Convert a path relative to the sync root into a directory key
///
/// Returns `None` for paths that are not plain relative paths or contain
/// components that are not valid UTF-8. The root itself maps to `""`.
pub fn dir_key(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Resolve a directory key against the sync root
pub fn dir_path(root: &Path, dir: &str) -> std::path::PathBuf {
    if dir.is_empty() {
        root.to_path_buf()
    } else {
        dir.split('/').fold(root.to_path_buf(), |path, part| path.join(part))
    }
}
