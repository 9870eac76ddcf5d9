//! Glob patterns deciding which files the engine governs
//!
//! Patterns use shell syntax (`*`, `?`, `[abc]`, `[!abc]`) and are matched
//! against a single file name, never against a directory path. A file whose
//! name matches none of the patterns is invisible to removal scanning.
//!
//! Braces and commas have no special meaning: `{a,b}.snap` matches only a
//! file literally named `{a,b}.snap`.

use crate::error::{Result, SyncError};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Compiled, ordered set of glob patterns
#[derive(Debug, Clone)]
pub struct Patterns {
    sources: Vec<String>,
    set: GlobSet,
}

impl Patterns {
    /// Compile patterns, failing on the first malformed one
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sources: Vec<String> = patterns.into_iter().map(Into::into).collect();
        if sources.is_empty() {
            return Err(SyncError::NoPatterns);
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in &sources {
            let glob = GlobBuilder::new(&escape_alternates(pattern))
                .literal_separator(true)
                .backslash_escape(true)
                .build()
                .map_err(|source| SyncError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
            builder.add(glob);
        }

        // Individual globs compiled, so only the combined automaton can fail here
        let set = builder.build().map_err(|source| SyncError::InvalidPattern {
            pattern: sources.join(" "),
            source,
        })?;

        Ok(Self { sources, set })
    }

    /// Check a bare file name against the set
    pub fn matches(&self, name: &str) -> bool {
        self.set.is_match(name)
    }

    /// Patterns as given, in order
    pub fn as_slice(&self) -> &[String] {
        &self.sources
    }
}

/// Escape `{`, `}` and `,` outside character classes so globset matches
/// them literally
///
/// Existing backslash escapes are copied untouched. Inside `[...]` globset
/// does not interpret backslashes, and braces are already literal there.
fn escape_alternates(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                escaped.push(c);
                if let Some(next) = chars.next() {
                    escaped.push(next);
                }
            }
            '[' => {
                escaped.push(c);
                // Negation and a leading ']' belong to the class
                if let Some(&bang) = chars.peek() {
                    if bang == '!' || bang == '^' {
                        escaped.push(bang);
                        chars.next();
                    }
                }
                if chars.peek() == Some(&']') {
                    escaped.push(']');
                    chars.next();
                }
                for inner in chars.by_ref() {
                    escaped.push(inner);
                    if inner == ']' {
                        break;
                    }
                }
            }
            '{' | '}' | ',' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}
