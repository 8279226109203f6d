//! # Veil
//!
//! The unified API for Veil: a dynamically toggleable filesystem-visibility
//! layer that hides chosen paths from ordinary callers, exempts chosen
//! identities, and is administered over an authenticated control channel.
//!
//! ## Overview
//!
//! A host delivers callbacks at five operation points through an
//! [`InterceptBackend`]:
//!
//! - **FileOpen**: hidden paths fail with "not found"; directories with
//!   hidden children get their enumeration filtered
//! - **FileRelease**: checks no interception record outlives its handle
//! - **InodeGetattr / InodePermission**: hidden paths fail with "not found"
//! - **Control**: calls carrying the control key go to the dispatcher
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use veil::{Inode, Invocation, Location, RegistryBackend, Veil, VeilConfig, HookResult};
//! use veil::core::Identity;
//!
//! let backend = Arc::new(RegistryBackend::new());
//! let veil = Veil::load(VeilConfig::default(), backend.clone()).unwrap();
//!
//! veil.tables().add_hidden("/usr/bin/su").unwrap();
//! veil.enablement().enable();
//!
//! let inode = Inode::new(Location::path("/usr/bin/su"));
//! let result = backend.invoke(&Invocation::InodeGetattr {
//!     caller: Identity::new(1000),
//!     inode: &inode,
//! });
//! assert_eq!(result, HookResult::Override(-2));
//!
//! veil.unload().unwrap();
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `veil::core` - Tokens, identities, paths, errors, wire format
//! - `veil::store` - Token store and policy tables
//! - `veil::policy` - Enablement and decision logic
//! - `veil::control` - Caller memory and the control dispatcher

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod file;
pub mod filter;
pub mod hooks;

// Re-export component crates
pub use veil_control as control;
pub use veil_core as core;
pub use veil_policy as policy;
pub use veil_store as store;

// Re-export main types for convenience
pub use backend::{Callback, HookResult, InterceptBackend, Invocation, OperationPoint, RegistryBackend};
pub use config::VeilConfig;
pub use engine::{StatusSnapshot, Veil};
pub use error::{EngineError, Result};
pub use file::{
    DirContext, DirEntry, Errno, FileOperations, FileResult, HandleId, Inode, Location, OpenFile,
    ResolveError,
};
pub use filter::EnumerationFilter;
pub use hooks::Hooks;
