//! The reconciliation engine
//!
//! [`TreeSync`] converges a directory tree toward an [`ExpectedTree`] in
//! three phases:
//!
//! 1. **Discovery**: candidate directories are the declared ones plus every
//!    directory that already exists under the root. Each is listed once.
//! 2. **Diff**: declared files are compared against disk (size, then bytes,
//!    then permission bits); listed files that are governed by the glob
//!    patterns but not declared are marked for removal.
//! 3. **Apply**: writes first, then removals. Any filesystem error aborts
//!    immediately. Directories are created on demand but never removed.
//!
//! Discovery and diff are available on their own through [`TreeSync::plan`],
//! which never mutates anything.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use treesync::{ExpectedTree, FileState, TreeSync};
//!
//! # fn main() -> treesync::Result<()> {
//! let mut expected = ExpectedTree::new();
//! expected.insert("foo", "a.snap", FileState::new(b"a".to_vec(), 0o644));
//!
//! let engine = TreeSync::builder().glob("*.snap").build()?;
//! let report = engine.sync(Path::new("/var/lib/example"), &expected)?;
//! for path in &report.removed {
//!     println!("removed {}", path);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::filesystem::{Filesystem, OsFilesystem};
use crate::pattern::Patterns;
use crate::types::{
    join_rel, ExpectedTree, FileState, PlannedRemoval, PlannedWrite, SyncPlan, SyncReport,
    WriteReason,
};
use crate::utils;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};

/// Default mode for directories created on demand
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Reconciliation engine
///
/// Holds only immutable configuration; every call to [`sync`](Self::sync)
/// is independent. Calls against overlapping roots must not run
/// concurrently.
#[derive(Debug, Clone)]
pub struct TreeSync {
    patterns: Patterns,
    max_depth: Option<usize>,
    dir_mode: u32,
    filesystem: Arc<dyn Filesystem>,
}

impl TreeSync {
    /// Create an engine on the real filesystem with default settings
    pub fn new<I, S>(globs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TreeSyncBuilder::new().globs(globs).build()
    }

    /// Start configuring an engine
    pub fn builder() -> TreeSyncBuilder {
        TreeSyncBuilder::new()
    }

    /// Glob patterns deciding which files are governed
    pub fn patterns(&self) -> &Patterns {
        &self.patterns
    }

    /// Compute what a sync would do, without touching the tree
    ///
    /// # Errors
    ///
    /// - [`SyncError::InvalidDirectory`](crate::SyncError::InvalidDirectory) /
    ///   [`SyncError::InvalidFileName`](crate::SyncError::InvalidFileName) if
    ///   `expected` is malformed
    /// - I/O errors from listing, stat or read
    pub fn plan<'a>(&self, root: &Path, expected: &'a ExpectedTree) -> Result<SyncPlan<'a>> {
        expected.validate()?;

        let mut dirs: BTreeSet<String> = self
            .filesystem
            .list_dirs(root, self.max_depth)?
            .into_iter()
            .collect();
        trace!("Discovered {} existing directories under {:?}", dirs.len(), root);
        dirs.extend(expected.dirs().map(str::to_string));

        let mut plan = SyncPlan::default();
        for dir in &dirs {
            self.plan_dir(root, dir, expected, &mut plan)?;
        }

        plan.writes.sort_by(|a, b| a.path.cmp(&b.path));
        plan.removals.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(plan)
    }

    fn plan_dir<'a>(
        &self,
        root: &Path,
        dir: &str,
        expected: &'a ExpectedTree,
        plan: &mut SyncPlan<'a>,
    ) -> Result<()> {
        let dir_path = utils::dir_path(root, dir);
        let declared = expected.dir_entry(dir);
        let mut seen = BTreeSet::new();

        for name in self.filesystem.list_files(&dir_path)? {
            let entry = declared.and_then(|(key, files)| {
                files
                    .get_key_value(&name)
                    .map(|(name, state)| (key, name.as_str(), state))
            });

            match entry {
                Some((key, name, state)) => {
                    seen.insert(name);
                    if let Some(reason) = self.diff_file(&dir_path.join(name), state)? {
                        plan.writes.push(PlannedWrite {
                            path: join_rel(key, name),
                            dir: key,
                            name,
                            state,
                            reason,
                        });
                    }
                }
                None if self.patterns.matches(&name) => {
                    plan.removals.push(PlannedRemoval {
                        path: join_rel(dir, &name),
                        dir: dir.to_string(),
                        name,
                    });
                }
                None => trace!("Ignoring ungoverned file {:?} in {:?}", name, dir_path),
            }
        }

        if let Some((key, files)) = declared {
            for (name, state) in files {
                if seen.contains(name.as_str()) {
                    continue;
                }
                plan.writes.push(PlannedWrite {
                    path: join_rel(key, name),
                    dir: key,
                    name: name.as_str(),
                    state,
                    reason: WriteReason::Create,
                });
            }
        }

        Ok(())
    }

    /// Compare one existing file against its declared state
    ///
    /// Entries that cannot be read as regular files (dangling symlinks,
    /// FIFOs, devices) always differ; the write replaces them.
    fn diff_file(&self, path: &Path, state: &FileState) -> Result<Option<WriteReason>> {
        let stat = match self.filesystem.stat(path) {
            Ok(stat) => stat,
            Err(e) if e.is_not_found() => {
                trace!("{:?} is listed but cannot be resolved", path);
                return Ok(Some(WriteReason::Content));
            }
            Err(e) => return Err(e),
        };
        if !stat.is_file || stat.size != state.content().len() as u64 {
            return Ok(Some(WriteReason::Content));
        }
        if self.filesystem.read(path)? != state.content() {
            return Ok(Some(WriteReason::Content));
        }
        if utils::comparable_mode(stat.mode) != utils::comparable_mode(state.mode()) {
            return Ok(Some(WriteReason::Mode));
        }
        Ok(None)
    }

    /// Execute a plan produced by [`plan`](Self::plan) for the same root
    ///
    /// Writes are applied before removals. The first failure aborts and is
    /// returned; whatever was applied before it stays on disk.
    pub fn apply(&self, root: &Path, plan: &SyncPlan<'_>) -> Result<SyncReport> {
        let mut changed = Vec::with_capacity(plan.writes.len());
        let mut removed = Vec::with_capacity(plan.removals.len());

        for write in &plan.writes {
            let dir_path = utils::dir_path(root, write.dir);
            if write.reason == WriteReason::Create {
                self.filesystem.create_dir_all(&dir_path, self.dir_mode)?;
            }
            self.filesystem.write(
                &dir_path.join(write.name),
                write.state.content(),
                write.state.mode(),
            )?;
            debug!("Wrote {} ({})", write.path, write.reason);
            changed.push(write.path.clone());
        }

        for removal in &plan.removals {
            let path = utils::dir_path(root, &removal.dir).join(&removal.name);
            self.filesystem.remove(&path)?;
            debug!("Removed {}", removal.path);
            removed.push(removal.path.clone());
        }

        changed.sort();
        removed.sort();
        Ok(SyncReport { changed, removed })
    }

    /// Converge `root` toward `expected`
    ///
    /// Returns the sorted relative paths of files written and removed. On
    /// error the tree may be partially updated; running the sync again is
    /// safe and converges it.
    pub fn sync(&self, root: &Path, expected: &ExpectedTree) -> Result<SyncReport> {
        let start = Instant::now();
        let plan = self.plan(root, expected)?;
        if plan.is_empty() {
            debug!("{:?} already matches the expected state", root);
            return Ok(SyncReport::default());
        }

        let report = self.apply(root, &plan)?;
        info!(
            "Synced {:?} in {}ms ({} files changed, {} removed)",
            root,
            start.elapsed().as_millis(),
            report.changed.len(),
            report.removed.len()
        );
        Ok(report)
    }
}

/// Builder for [`TreeSync`]
///
/// # Default Values
///
/// - `globs`: none (at least one is required)
/// - `max_depth`: unbounded discovery of existing directories
/// - `dir_mode`: `0o755`
/// - `filesystem`: [`OsFilesystem`]
#[derive(Debug)]
pub struct TreeSyncBuilder {
    globs: Vec<String>,
    max_depth: Option<usize>,
    dir_mode: u32,
    filesystem: Arc<dyn Filesystem>,
}

impl TreeSyncBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            globs: Vec::new(),
            max_depth: None,
            dir_mode: DEFAULT_DIR_MODE,
            filesystem: Arc::new(OsFilesystem),
        }
    }

    /// Add one glob pattern
    pub fn glob(mut self, pattern: impl Into<String>) -> Self {
        self.globs.push(pattern.into());
        self
    }

    /// Add several glob patterns, keeping their order
    pub fn globs<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.globs.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Bound discovery of existing directories
    ///
    /// `0` scans only the root, `1` the root and its direct children, and so
    /// on. Declared directories are always scanned, whatever their depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Mode for directories created to hold new files
    pub fn dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode & utils::PERMISSION_BITS;
        self
    }

    /// Use a different filesystem implementation
    pub fn filesystem(mut self, filesystem: impl Filesystem + 'static) -> Self {
        self.filesystem = Arc::new(filesystem);
        self
    }

    /// Compile the patterns and build the engine
    ///
    /// # Errors
    ///
    /// - [`SyncError::NoPatterns`](crate::SyncError::NoPatterns) if no glob was given
    /// - [`SyncError::InvalidPattern`](crate::SyncError::InvalidPattern) for a malformed glob
    pub fn build(self) -> Result<TreeSync> {
        Ok(TreeSync {
            patterns: Patterns::new(self.globs)?,
            max_depth: self.max_depth,
            dir_mode: self.dir_mode,
            filesystem: self.filesystem,
        })
    }
}

impl Default for TreeSyncBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Converge `root` toward `expected`, governing files that match `globs`
///
/// One-shot form of [`TreeSync::sync`] on the real filesystem.
pub fn ensure_tree_state<I, S>(root: &Path, globs: I, expected: &ExpectedTree) -> Result<SyncReport>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    TreeSync::new(globs)?.sync(root, expected)
}

/// Converge a single directory toward `files`, without looking at subdirectories
///
/// Report paths are bare file names. An empty `files` removes every governed
/// file in `dir`.
pub fn ensure_dir_state<I, S, F, N>(dir: &Path, globs: I, files: F) -> Result<SyncReport>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    F: IntoIterator<Item = (N, FileState)>,
    N: AsRef<str>,
{
    let mut expected = ExpectedTree::new();
    expected.dir("");
    for (name, state) in files {
        expected.insert("", name.as_ref(), state);
    }

    TreeSync::builder()
        .globs(globs)
        .max_depth(0)
        .build()?
        .sync(dir, &expected)
}
