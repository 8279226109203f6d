//! Hidden-path entries and the path arithmetic used by containment tests.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, VeilError};

/// Longest path accepted from a caller, including the terminating NUL.
pub const PATH_MAX: usize = 4096;

/// An absolute path to hide, with its parent-directory length precomputed.
///
/// `dir_len` is the byte offset of the last `/`, so `path[..dir_len]` is the
/// parent directory ("" for entries directly under the root).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HiddenPath {
    path: String,
    dir_len: usize,
}

impl HiddenPath {
    /// Build an entry from a caller-supplied path.
    ///
    /// Trailing slashes are dropped. Empty, relative, and root-only paths
    /// are `InvalidArgument`, as is any path with an empty, `.` or `..`
    /// component. A failed copy is `OutOfMemory`.
    pub fn new(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(VeilError::InvalidArgument("empty path".into()));
        }
        if !path.starts_with('/') {
            return Err(VeilError::InvalidArgument(format!("relative path: {path}")));
        }

        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(VeilError::InvalidArgument("cannot hide the root".into()));
        }
        if trimmed[1..]
            .split('/')
            .any(|c| c.is_empty() || c == "." || c == "..")
        {
            return Err(VeilError::InvalidArgument(format!(
                "path is not canonical: {path}"
            )));
        }

        let mut owned = String::new();
        owned
            .try_reserve_exact(trimmed.len())
            .map_err(|e| VeilError::OutOfMemory(e.to_string()))?;
        owned.push_str(trimmed);

        let dir_len = parent_len(&owned);
        Ok(Self {
            path: owned,
            dir_len,
        })
    }

    /// The full path.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Length of the parent-directory prefix.
    pub fn dir_len(&self) -> usize {
        self.dir_len
    }

    /// The parent directory, `/` for top-level entries.
    pub fn parent(&self) -> &str {
        if self.dir_len == 0 {
            "/"
        } else {
            &self.path[..self.dir_len]
        }
    }

    /// The final path component.
    pub fn name(&self) -> &str {
        &self.path[self.dir_len + 1..]
    }

    /// Whether `dir` is exactly this entry's parent directory.
    ///
    /// Compares the whole parent prefix, so `/usr/bi` and `/usr` never match
    /// an entry under `/usr/bin`.
    pub fn is_child_of(&self, dir: &str) -> bool {
        let dir = normalize_dir(dir);
        if dir == "/" {
            return self.dir_len == 0;
        }
        self.dir_len == dir.len() && self.path.as_bytes()[..self.dir_len] == *dir.as_bytes()
    }
}

impl fmt::Debug for HiddenPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HiddenPath({})", self.path)
    }
}

impl fmt::Display for HiddenPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl TryFrom<String> for HiddenPath {
    type Error = VeilError;

    fn try_from(path: String) -> Result<Self> {
        Self::new(&path)
    }
}

impl From<HiddenPath> for String {
    fn from(entry: HiddenPath) -> Self {
        entry.path
    }
}

impl AsRef<str> for HiddenPath {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

/// Byte offset of the last `/` in `path`, or 0 if there is none.
pub fn parent_len(path: &str) -> usize {
    path.rfind('/').unwrap_or(0)
}

/// Strip trailing slashes from a directory path, keeping a lone `/`.
pub fn normalize_dir(dir: &str) -> &str {
    let trimmed = dir.trim_end_matches('/');
    if trimmed.is_empty() && dir.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Join a directory and an entry name with exactly one separator.
pub fn join(dir: &str, name: &str) -> String {
    let dir = normalize_dir(dir);
    let mut out = String::with_capacity(dir.len() + 1 + name.len());
    out.push_str(dir);
    if !dir.ends_with('/') {
        out.push('/');
    }
    out.push_str(name);
    out
}
