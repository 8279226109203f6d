//! Control message dispatch.
//!
//! A control call carries the address of a [`ControlMessage`] in caller
//! memory. The dispatcher copies it in, authenticates it against the token
//! store, decodes the operation and applies it to the shared state.
//!
//! Ordering matters: the token is checked before the operation code is
//! interpreted, so an unauthenticated caller cannot discover which operations
//! exist. Path arguments are copied only after authentication.

use std::sync::Arc;

use tracing::{debug, info, warn};

use veil_core::{
    Command, ControlMessage, Result, UserAddr, VeilError, MESSAGE_SIZE, OP_OFFSET, PATH_MAX,
    TOKEN_LEN,
};
use veil_policy::Enablement;
use veil_store::{PolicyTables, TokenStore};

use crate::memory::UserMemory;

/// Configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Longest path argument accepted, terminator included.
    pub path_max: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { path_max: PATH_MAX }
    }
}

/// Authenticated entry point for every administrative mutation.
pub struct Dispatcher {
    tokens: Arc<TokenStore>,
    tables: Arc<PolicyTables>,
    enablement: Arc<Enablement>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(
        tokens: Arc<TokenStore>,
        tables: Arc<PolicyTables>,
        enablement: Arc<Enablement>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            tokens,
            tables,
            enablement,
            config,
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn tables(&self) -> &PolicyTables {
        &self.tables
    }

    pub fn enablement(&self) -> &Enablement {
        &self.enablement
    }

    /// Handle the control message at `message`.
    pub fn dispatch(&self, memory: &dyn UserMemory, message: UserAddr) -> Result<()> {
        if message.is_null() {
            return Err(VeilError::InvalidArgument("null control message".into()));
        }

        let mut raw = [0u8; MESSAGE_SIZE];
        memory.copy_from(message, &mut raw)?;

        // Raw op code, for logging only; never interpreted before auth.
        let op = u32::from_le_bytes([
            raw[OP_OFFSET],
            raw[OP_OFFSET + 1],
            raw[OP_OFFSET + 2],
            raw[OP_OFFSET + 3],
        ]);

        if !self.tokens.verify(&raw[..TOKEN_LEN]) {
            warn!(op, "control message rejected: bad token");
            return Err(VeilError::AccessDenied);
        }

        let decoded = ControlMessage::decode(&raw).map_err(|e| {
            warn!(op, "control message rejected: unknown operation");
            e
        })?;

        let name = decoded.command.op().name();
        match self.apply(memory, &decoded.command) {
            Ok(()) => {
                info!(op = name, "control operation applied");
                Ok(())
            }
            Err(e) => {
                warn!(op = name, err = e.errname(), "control operation failed");
                Err(e)
            }
        }
    }

    /// Handle the control message at `message` and return the result code
    /// reported to the caller: zero or a negative errno.
    pub fn dispatch_code(&self, memory: &dyn UserMemory, message: UserAddr) -> i32 {
        match self.dispatch(memory, message) {
            Ok(()) => 0,
            Err(e) => e.errno(),
        }
    }

    /// Apply an authenticated command.
    pub fn apply(&self, memory: &dyn UserMemory, command: &Command) -> Result<()> {
        match command {
            Command::Enable => {
                self.enablement.enable();
                Ok(())
            }
            Command::Disable => {
                self.enablement.disable();
                Ok(())
            }
            Command::Flush => {
                self.tables.flush();
                Ok(())
            }
            Command::HiddenAdd { path } => {
                let path = self.copy_path(memory, *path)?;
                self.tables.add_hidden(&path)
            }
            Command::HiddenRemove { path } => {
                let path = self.copy_path(memory, *path)?;
                self.tables.remove_hidden(&path)
            }
            Command::IdentityAdd(id) => self.tables.add_identity(*id),
            Command::IdentityRemove(id) => self.tables.remove_identity(*id),
            Command::TokenAdd(token) => self.tokens.add(token),
            Command::TokenRemove(token) => self.tokens.remove(token),
        }
    }

    fn copy_path(&self, memory: &dyn UserMemory, addr: UserAddr) -> Result<String> {
        if addr.is_null() {
            return Err(VeilError::FaultyAddress(addr.0));
        }
        let path = memory.copy_cstr(addr, self.config.path_max)?;
        debug!(len = path.len(), "path argument copied");
        Ok(path)
    }
}
