//! # Veil Core
//!
//! Pure primitives for Veil: tokens, identities, hidden-path entries, the
//! error taxonomy, and the control-message wire format.
//!
//! This crate contains no locks and no global state. It is pure computation
//! over the values the other crates store and exchange.
//!
//! ## Key Types
//!
//! - [`Token`] - A 128-bit administrative credential (textual UUID on the wire)
//! - [`Identity`] - A caller's effective user id
//! - [`HiddenPath`] - An absolute path to hide, with its parent length precomputed
//! - [`ControlMessage`] - The fixed-size administrative message
//! - [`VeilError`] - Errors shared by every component
//!
//! ## Wire Format
//!
//! Control messages are an 80-byte C-layout structure. See [`message`].

pub mod error;
pub mod message;
pub mod path;
pub mod types;

pub use error::{Result, VeilError};
pub use message::{
    Command, ControlMessage, OpCode, UserAddr, ARGS_OFFSET, CONTROL_KEY, MESSAGE_SIZE, OP_OFFSET,
};
pub use path::{join, normalize_dir, HiddenPath, PATH_MAX};
pub use types::{Identity, Token, TOKEN_LEN};
