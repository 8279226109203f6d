//! Hidden-path table.
//!
//! Entries live in an ordered index keyed by the full path. A fixed set of
//! built-in entries sits in front of the index and is consulted first,
//! without taking the lock.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;
use tracing::debug;

use veil_core::{normalize_dir, HiddenPath, Result, VeilError};

/// Paths hidden regardless of the dynamic table.
pub const DEFAULT_BUILTIN_HIDDEN: &[&str] = &["/proc/veil"];

/// Thread-safe table of hidden paths.
pub struct HiddenTable {
    builtins: Vec<HiddenPath>,
    entries: RwLock<BTreeMap<String, HiddenPath>>,
    limit: usize,
}

impl HiddenTable {
    /// Create an empty table in front of the given built-ins.
    pub fn new(builtins: Vec<HiddenPath>, limit: usize) -> Self {
        Self {
            builtins,
            entries: RwLock::new(BTreeMap::new()),
            limit,
        }
    }

    /// Whether `path` itself is hidden.
    pub fn check_exact(&self, path: &str) -> bool {
        if self.builtins.iter().any(|b| b.as_str() == path) {
            return true;
        }

        self.entries.read().contains_key(path)
    }

    /// Whether `dir` is the parent directory of some hidden entry.
    ///
    /// Only the immediate parent matches: with `/usr/bin/su` hidden,
    /// `/usr/bin` matches and `/usr` does not.
    pub fn check_prefix(&self, dir: &str) -> bool {
        let dir = normalize_dir(dir);
        if self.builtins.iter().any(|b| b.is_child_of(dir)) {
            return true;
        }

        let prefix = if dir == "/" {
            String::from("/")
        } else {
            format!("{dir}/")
        };

        let entries = self.entries.read();
        let found = entries
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix.as_str()))
            .any(|(_, entry)| entry.is_child_of(dir));
        found
    }

    /// Hide a path.
    pub fn add(&self, path: &str) -> Result<()> {
        let entry = HiddenPath::new(path)?;

        let mut entries = self.entries.write();
        if entries.contains_key(entry.as_str()) {
            return Err(VeilError::AlreadyExists(entry.to_string()));
        }
        if entries.len() >= self.limit {
            return Err(VeilError::OutOfMemory(format!(
                "hidden table full ({} entries)",
                self.limit
            )));
        }

        debug!(path = entry.as_str(), "hidden path added");
        entries.insert(entry.as_str().to_owned(), entry);
        Ok(())
    }

    /// Stop hiding a path.
    pub fn remove(&self, path: &str) -> Result<()> {
        let key = HiddenPath::new(path)?;

        let mut entries = self.entries.write();
        if entries.remove(key.as_str()).is_none() {
            return Err(VeilError::NotFound(key.to_string()));
        }

        debug!(path = key.as_str(), "hidden path removed");
        Ok(())
    }

    /// The built-in entries.
    pub fn builtins(&self) -> &[HiddenPath] {
        &self.builtins
    }

    /// Visit every dynamic entry in index order under the read lock.
    pub fn for_each(&self, mut f: impl FnMut(&HiddenPath)) {
        for entry in self.entries.read().values() {
            f(entry);
        }
    }

    /// Snapshot of the dynamic entries in index order.
    pub fn paths(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every dynamic entry. Built-ins stay.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        let dropped = entries.len();
        entries.clear();
        debug!(dropped, "hidden table cleared");
    }
}
