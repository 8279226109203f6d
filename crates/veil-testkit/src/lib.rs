//! # Veil Testkit
//!
//! Testing utilities for Veil.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: A simulated host (directory tree, address space, and the
//!   open/readdir/close/stat/access/control paths) with an engine loaded
//! - **Generators**: Proptest strategies for paths, tokens, identities and
//!   control messages
//! - **Golden vectors**: Pinned encodings of every control operation
//!
//! ## Test Fixtures
//!
//! ```rust
//! use veil_testkit::fixtures::{TestFixture, USER};
//!
//! let fx = TestFixture::new();
//! assert_eq!(fx.hide("/usr/bin/su"), 0);
//! assert_eq!(fx.enable(), 0);
//!
//! let names = fx.host.list(USER, "/usr/bin").unwrap();
//! assert!(!names.contains(&"su".to_string()));
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use veil_testkit::generators::absolute_path;
//!
//! proptest! {
//!     #[test]
//!     fn add_then_remove(path in absolute_path(4)) {
//!         // ...
//!     }
//! }
//! ```
//!
//! ## Golden Vectors
//!
//! ```rust
//! use veil_testkit::vectors::verify_all_vectors;
//!
//! verify_all_vectors().unwrap();
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{default_tree, init_tracing, SimHost, SimTree, TestFixture, USER};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
