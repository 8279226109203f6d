//! # Veil Store
//!
//! In-memory policy state for Veil: the token store and the two policy
//! tables. Nothing here persists; all state is rebuilt through the control
//! channel after each load.
//!
//! ## Key Types
//!
//! - [`TokenStore`] - Credentials accepted on the control channel
//! - [`HiddenTable`] - Paths that appear nonexistent
//! - [`IdentityTable`] - Identities that bypass all hiding
//! - [`PolicyTables`] - Both tables together, plus `flush`
//! - [`PolicyLookup`] - The read-only view used by decision logic
//!
//! ## Usage
//!
//! ```rust
//! use veil_store::{PolicyTables, TokenStore};
//!
//! let tables = PolicyTables::default();
//! tables.add_hidden("/usr/bin/su").unwrap();
//!
//! assert!(tables.check_exact("/usr/bin/su"));
//! assert!(tables.check_prefix("/usr/bin"));
//! assert!(!tables.check_prefix("/usr"));
//!
//! let tokens = TokenStore::default();
//! assert!(tokens.verify(b"0f8fad5b-d9cb-469f-a165-70867728950e"));
//! ```
//!
//! ## Design Notes
//!
//! - **Independent locks**: each table and the token store has its own
//!   reader-writer lock; readers run concurrently.
//! - **Uniqueness**: adding an existing entry returns `AlreadyExists` and
//!   leaves exactly one entry.
//! - **Built-ins**: a fixed set of hidden paths is checked first, lock-free,
//!   and survives `flush`.

pub mod hidden;
pub mod identity;
pub mod status;
pub mod tables;
pub mod token;
pub mod traits;

pub use hidden::{HiddenTable, DEFAULT_BUILTIN_HIDDEN};
pub use identity::IdentityTable;
pub use status::{render, TablesSnapshot};
pub use tables::{PolicyTables, TableLimits};
pub use token::TokenStore;
pub use traits::PolicyLookup;
