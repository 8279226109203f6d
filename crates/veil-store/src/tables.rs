//! Policy tables: the hidden-path table and the exempt-identity table.
//!
//! The two tables are locked independently. There is no cross-table
//! atomicity; `flush` empties one and then the other.

use serde::{Deserialize, Serialize};
use tracing::info;

use veil_core::{HiddenPath, Identity, Result};

use crate::hidden::{HiddenTable, DEFAULT_BUILTIN_HIDDEN};
use crate::identity::IdentityTable;
use crate::traits::PolicyLookup;

/// Capacity limits for each table.
///
/// Inserting past a limit fails with `OutOfMemory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableLimits {
    pub max_hidden_paths: usize,
    pub max_identities: usize,
    pub max_tokens: usize,
}

impl Default for TableLimits {
    fn default() -> Self {
        Self {
            max_hidden_paths: 4096,
            max_identities: 1024,
            max_tokens: 64,
        }
    }
}

/// Both policy tables.
pub struct PolicyTables {
    pub hidden: HiddenTable,
    pub identities: IdentityTable,
}

impl PolicyTables {
    pub fn new(builtins: Vec<HiddenPath>, limits: TableLimits) -> Self {
        Self {
            hidden: HiddenTable::new(builtins, limits.max_hidden_paths),
            identities: IdentityTable::new(limits.max_identities),
        }
    }

    pub fn check_exact(&self, path: &str) -> bool {
        self.hidden.check_exact(path)
    }

    pub fn check_prefix(&self, dir: &str) -> bool {
        self.hidden.check_prefix(dir)
    }

    pub fn add_hidden(&self, path: &str) -> Result<()> {
        self.hidden.add(path)
    }

    pub fn remove_hidden(&self, path: &str) -> Result<()> {
        self.hidden.remove(path)
    }

    pub fn check_identity(&self, id: Identity) -> bool {
        self.identities.check(id)
    }

    pub fn add_identity(&self, id: Identity) -> Result<()> {
        self.identities.add(id)
    }

    pub fn remove_identity(&self, id: Identity) -> Result<()> {
        self.identities.remove(id)
    }

    /// Empty both tables, each under its own write lock.
    pub fn flush(&self) {
        self.hidden.clear();
        self.identities.clear();
        info!("policy tables flushed");
    }
}

impl Default for PolicyTables {
    fn default() -> Self {
        let builtins = DEFAULT_BUILTIN_HIDDEN
            .iter()
            .filter_map(|p| HiddenPath::new(p).ok())
            .collect();
        Self::new(builtins, TableLimits::default())
    }
}

impl PolicyLookup for PolicyTables {
    fn is_hidden(&self, path: &str) -> bool {
        self.check_exact(path)
    }

    fn has_hidden_children(&self, dir: &str) -> bool {
        self.check_prefix(dir)
    }

    fn is_exempt(&self, id: Identity) -> bool {
        self.check_identity(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_flush_empties_both() {
        let tables = PolicyTables::default();
        tables.add_hidden("/usr/bin/su").unwrap();
        tables.add_identity(Identity::ROOT).unwrap();

        tables.flush();

        assert!(!tables.check_exact("/usr/bin/su"));
        assert!(!tables.check_identity(Identity::ROOT));
        assert!(tables.check_exact("/proc/veil"));
    }

    #[test]
    fn test_limits_deserialize_with_defaults() {
        let limits: TableLimits = serde_json::from_str(r#"{"max_tokens": 2}"#).unwrap();
        assert_eq!(limits.max_tokens, 2);
        assert_eq!(limits.max_hidden_paths, 4096);
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let tables = Arc::new(PolicyTables::default());
        tables.add_hidden("/stable").unwrap();

        let writer = {
            let tables = Arc::clone(&tables);
            thread::spawn(move || {
                for i in 0..200 {
                    let path = format!("/churn/{i}");
                    tables.add_hidden(&path).unwrap();
                    tables.remove_hidden(&path).unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let tables = Arc::clone(&tables);
                thread::spawn(move || {
                    for _ in 0..500 {
                        assert!(tables.check_exact("/stable"));
                        assert!(!tables.check_exact("/other"));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(tables.hidden.len(), 1);
    }
}
