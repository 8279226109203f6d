//! # Veil Policy
//!
//! The enablement flag and the visibility decision logic.
//!
//! ## Overview
//!
//! Every intercepted filesystem operation asks a [`Decider`] what to do:
//!
//! 1. If hiding is disabled, or the caller is an exempt identity, the
//!    operation proceeds untouched.
//! 2. If the target path is hidden, the operation fails with "not found".
//! 3. If a directory is opened for enumeration and one of its immediate
//!    children is hidden, the caller must install the enumeration filter.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use veil_core::Identity;
//! use veil_policy::{Decider, Enablement, Outcome};
//! use veil_store::PolicyTables;
//!
//! let tables = Arc::new(PolicyTables::default());
//! tables.add_hidden("/usr/bin/su").unwrap();
//!
//! let decider = Decider::new(tables, Arc::new(Enablement::new(true)));
//! let user = Identity::new(1000);
//!
//! assert_eq!(decider.decide_open(user, "/usr/bin/su", false), Outcome::Deny);
//! assert_eq!(decider.decide_open(user, "/usr/bin", true), Outcome::FilterEnumeration);
//! ```

pub mod decision;
pub mod enablement;

pub use decision::{Decider, Outcome};
pub use enablement::Enablement;
