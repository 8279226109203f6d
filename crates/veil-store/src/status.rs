//! Human-readable listing of the policy tables.
//!
//! The text format is one entry per line and is not a stable contract.
//! Use [`TablesSnapshot`] for anything machine-readable.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use veil_core::Identity;

use crate::tables::PolicyTables;

/// Render both tables, each iterated under its own read lock.
pub fn render(tables: &PolicyTables) -> String {
    let mut out = String::new();

    out.push_str("global hidden files:\n");
    tables.hidden.for_each(|entry| {
        let _ = writeln!(out, "\t{}", entry);
    });
    out.push('\n');

    out.push_str("global whitelist uids:\n");
    tables.identities.for_each(|id| {
        let _ = writeln!(out, "\t{}", id);
    });
    out.push('\n');

    out
}

/// Point-in-time copy of the dynamic table contents.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TablesSnapshot {
    pub hidden_paths: Vec<String>,
    pub identities: Vec<Identity>,
}

impl TablesSnapshot {
    pub fn capture(tables: &PolicyTables) -> Self {
        Self {
            hidden_paths: tables.hidden.paths(),
            identities: tables.identities.identities(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_empty() {
        let tables = PolicyTables::default();
        assert_eq!(
            render(&tables),
            "global hidden files:\n\nglobal whitelist uids:\n\n"
        );
    }

    #[test]
    fn test_render_entries() {
        let tables = PolicyTables::default();
        tables.add_hidden("/usr/bin/su").unwrap();
        tables.add_hidden("/data/x").unwrap();
        tables.add_identity(Identity(1000)).unwrap();
        tables.add_identity(Identity(0)).unwrap();

        assert_eq!(
            render(&tables),
            "global hidden files:\n\t/data/x\n\t/usr/bin/su\n\n\
             global whitelist uids:\n\t0\n\t1000\n\n"
        );
    }

    #[test]
    fn test_snapshot() {
        let tables = PolicyTables::default();
        tables.add_hidden("/usr/bin/su").unwrap();
        tables.add_identity(Identity(7)).unwrap();

        let snap = TablesSnapshot::capture(&tables);
        assert_eq!(snap.hidden_paths, vec!["/usr/bin/su"]);
        assert_eq!(snap.identities, vec![Identity(7)]);

        let json = serde_json::to_string(&snap).unwrap();
        assert_eq!(json, r#"{"hidden_paths":["/usr/bin/su"],"identities":[7]}"#);
    }
}
