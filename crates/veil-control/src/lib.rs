//! # Veil Control
//!
//! The authenticated administrative channel.
//!
//! ## Protocol
//!
//! A control call passes the address of an 80-byte control message in the
//! caller's memory. The [`Dispatcher`]:
//!
//! 1. Rejects a null address with `InvalidArgument`.
//! 2. Copies the message in; an unreadable address is `FaultyAddress`.
//! 3. Verifies the embedded token; failure is `AccessDenied`.
//! 4. Decodes the operation; an unknown code is `InvalidArgument`.
//! 5. Applies it, copying any path argument in with a bound of `PATH_MAX`.
//!
//! The result is relayed to the caller as zero or a negative errno.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use veil_control::{simulated::AddressSpace, DispatchConfig, Dispatcher};
//! use veil_core::{Command, ControlMessage};
//! use veil_policy::Enablement;
//! use veil_store::{PolicyTables, TokenStore};
//!
//! let dispatcher = Dispatcher::new(
//!     Arc::new(TokenStore::default()),
//!     Arc::new(PolicyTables::default()),
//!     Arc::new(Enablement::default()),
//!     DispatchConfig::default(),
//! );
//!
//! let memory = AddressSpace::new();
//! let path = memory.map_cstr("/usr/bin/su");
//! let token = *b"0f8fad5b-d9cb-469f-a165-70867728950e";
//! let message = ControlMessage::new(token, Command::HiddenAdd { path });
//! let addr = memory.map(&message.encode());
//!
//! assert_eq!(dispatcher.dispatch_code(&memory, addr), 0);
//! assert!(dispatcher.tables().check_exact("/usr/bin/su"));
//! ```

pub mod dispatcher;
pub mod memory;

pub use dispatcher::{DispatchConfig, Dispatcher};
pub use memory::{simulated, UserMemory};
