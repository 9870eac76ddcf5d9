//! # treesync - Converge directory trees toward a declared state
//!
//! A library that reconciles the files under a directory against an
//! expected state: which files must exist in which directories, with which
//! bytes and which permission bits.
//!
//! ## Overview
//!
//! treesync lets you:
//! - Create or rewrite declared files whose content or mode differs
//! - Delete files that match a set of glob patterns but are not declared
//! - Leave every other file untouched
//! - Preview the work as a [`SyncPlan`] before applying it
//! - Get a deterministic, sorted [`SyncReport`] of what changed
//!
//! ## Architecture
//!
//! - **Engine** ([`TreeSync`]): discovery, diff and apply phases composed into
//!   one idempotent operation
//! - **Filesystem capability** ([`Filesystem`]): every I/O goes through a
//!   trait, with [`OsFilesystem`] for disk and [`MemoryFilesystem`] for tests
//! - **Patterns** ([`Patterns`]): shell-style globs matched against file names
//!   only; they bound what the engine may delete, not what it may declare
//! - **Manifests** ([`Manifest`]): a JSON description of a whole sync, used
//!   by the `treesync` binary
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use treesync::{ensure_tree_state, ExpectedTree, FileState};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut expected = ExpectedTree::new();
//! expected.insert("foo", "app.snap", FileState::new(b"payload".to_vec(), 0o600));
//! expected.dir("bar"); // no governed file may remain in bar/
//!
//! let report = ensure_tree_state(Path::new("./state"), ["*.snap"], &expected)?;
//! println!("changed: {:?}", report.changed);
//! println!("removed: {:?}", report.removed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! ### Governed files
//!
//! A file is governed when its name matches at least one glob. Governed files
//! that are not declared are removed. Files that are not governed are never
//! read, written or removed, unless they are declared: declared files are
//! always managed, whatever their name.
//!
//! ### Candidate directories
//!
//! The engine looks at every declared directory and at every directory that
//! already exists under the root (optionally bounded with
//! [`TreeSyncBuilder::max_depth`]). Directories are created when a file has
//! to be written into them and are never removed.
//!
//! ### Idempotence
//!
//! Once a sync succeeds, running it again reports nothing and touches
//! nothing. After a failed sync the tree may be partially updated; running
//! the sync again is the recovery path.
//!
//! ## Concurrency
//!
//! Syncs are synchronous and single-threaded. No locks are taken on the
//! target tree: callers must not run overlapping syncs against the same root.
//!
//! ## Error Handling
//!
//! All operations return `Result<T, SyncError>`. Configuration errors
//! (malformed globs, invalid directory keys or file names) are reported
//! before anything is touched; I/O errors abort the sync at once and carry
//! the failing path.
//!
//! ## Module Organization
//!
//! - [`sync`]: the engine and its builder
//! - [`types`]: expected state, plans and reports
//! - [`filesystem`]: the filesystem trait and the disk implementation
//! - [`memory`]: in-memory filesystem
//! - [`pattern`]: glob pattern sets
//! - [`manifest`]: JSON manifests
//! - [`error`]: error types

pub mod error;
pub mod filesystem;
pub mod manifest;
pub mod memory;
pub mod pattern;
pub mod sync;
pub mod types;

mod utils;

pub use error::{Result, SyncError};
pub use filesystem::{FileStat, Filesystem, OsFilesystem};
pub use manifest::{Manifest, ManifestFile};
pub use memory::MemoryFilesystem;
pub use pattern::Patterns;
pub use sync::{ensure_dir_state, ensure_tree_state, TreeSync, TreeSyncBuilder};
pub use types::*;
