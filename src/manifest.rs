//! JSON manifests describing an expected tree
//!
//! A manifest bundles the glob patterns, engine settings and declared files
//! in one document, which is what the `treesync` binary consumes:
//!
//! ```json
//! {
//!   "globs": ["*.snap"],
//!   "max_depth": 1,
//!   "dir_mode": "0755",
//!   "dirs": {
//!     "foo": {
//!       "inline.snap": { "content": "hello\n", "mode": "0600" },
//!       "copied.snap": { "source": "payload/copied.snap" }
//!     },
//!     "bar": {}
//!   }
//! }
//! ```
//!
//! Each file takes exactly one of `content` (inline UTF-8 text) or `source`
//! (a file whose bytes are used, relative to the manifest's directory).
//! `mode` is an octal string; it defaults to `0644` for inline content and
//! to the source file's own permissions for `source`.

use crate::error::{Result, SyncError};
use crate::sync::TreeSyncBuilder;
use crate::types::{ExpectedTree, FileState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Mode used for inline content without an explicit `mode`
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Top-level manifest document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Glob patterns of governed files
    pub globs: Vec<String>,
    /// Depth bound for discovery of existing directories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// Octal mode of directories created on demand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir_mode: Option<String>,
    /// Declared files per directory
    #[serde(default)]
    pub dirs: BTreeMap<String, BTreeMap<String, ManifestFile>>,
}

/// One declared file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestFile {
    /// Inline content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// File to take the content from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Octal permission bits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl Manifest {
    /// Parse a manifest from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).map_err(|e| SyncError::io("read manifest", path, e))?;
        Self::from_json(&text)
    }

    /// Engine builder configured from the manifest settings
    pub fn builder(&self) -> Result<TreeSyncBuilder> {
        let mut builder = TreeSyncBuilder::new().globs(self.globs.iter().cloned());
        if let Some(depth) = self.max_depth {
            builder = builder.max_depth(depth);
        }
        if let Some(mode) = &self.dir_mode {
            builder = builder.dir_mode(parse_mode(mode)?);
        }
        Ok(builder)
    }

    /// Resolve every declared file into an [`ExpectedTree`]
    ///
    /// `base_dir` anchors relative `source` paths, normally the directory
    /// containing the manifest.
    pub fn expected_tree(&self, base_dir: &Path) -> Result<ExpectedTree> {
        let mut tree = ExpectedTree::new();
        for (dir, files) in &self.dirs {
            tree.dir(dir);
            for (name, file) in files {
                let state = file.resolve(base_dir).map_err(|e| match e {
                    SyncError::Manifest(msg) => {
                        SyncError::manifest(format!("{}: {}", join_display(dir, name), msg))
                    }
                    other => other,
                })?;
                tree.insert(dir, name, state);
            }
        }
        Ok(tree)
    }
}

impl ManifestFile {
    fn resolve(&self, base_dir: &Path) -> Result<FileState> {
        let mode = self.mode.as_deref().map(parse_mode).transpose()?;
        match (&self.content, &self.source) {
            (Some(content), None) => Ok(FileState::new(
                content.as_bytes().to_vec(),
                mode.unwrap_or(DEFAULT_FILE_MODE),
            )),
            (None, Some(source)) => {
                let path = base_dir.join(source);
                match mode {
                    Some(mode) => FileState::from_file_with_mode(&path, mode),
                    None => FileState::from_file(&path),
                }
            }
            (Some(_), Some(_)) => Err(SyncError::manifest(
                "'content' and 'source' are mutually exclusive",
            )),
            (None, None) => Err(SyncError::manifest("one of 'content' or 'source' is required")),
        }
    }
}

fn join_display(dir: &str, name: &str) -> String {
    if dir.is_empty() || dir == "." {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Parse an octal permission string such as `"0644"`, `"644"` or `"0o644"`
pub fn parse_mode(text: &str) -> Result<u32> {
    let digits = text.strip_prefix("0o").unwrap_or(text);
    let mode = u32::from_str_radix(digits, 8)
        .map_err(|_| SyncError::manifest(format!("invalid octal mode {:?}", text)))?;
    if mode > 0o7777 {
        return Err(SyncError::manifest(format!(
            "mode {:?} has bits outside 0o7777",
            text
        )));
    }
    Ok(mode)
}
