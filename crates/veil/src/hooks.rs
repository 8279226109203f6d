//! Callbacks installed at each operation point.
//!
//! Each callback answers with a result code: zero to let the operation
//! proceed, a negative errno to fail it. Hidden objects always fail with
//! `-ENOENT`.

use std::sync::Arc;

use tracing::debug;

use veil_control::{Dispatcher, UserMemory};
use veil_core::{Identity, UserAddr};
use veil_policy::{Decider, Outcome};
use veil_store::PolicyTables;

use crate::backend::{HookResult, Invocation};
use crate::file::{Inode, OpenFile, ResolveError};
use crate::filter::EnumerationFilter;

/// The engine's side of every operation point.
pub struct Hooks {
    decider: Decider<Arc<PolicyTables>>,
    filter: Arc<EnumerationFilter>,
    dispatcher: Dispatcher,
    control_key: u32,
    path_max: usize,
}

impl Hooks {
    pub fn new(
        decider: Decider<Arc<PolicyTables>>,
        filter: Arc<EnumerationFilter>,
        dispatcher: Dispatcher,
        control_key: u32,
        path_max: usize,
    ) -> Self {
        Self {
            decider,
            filter,
            dispatcher,
            control_key,
            path_max,
        }
    }

    pub fn decider(&self) -> &Decider<Arc<PolicyTables>> {
        &self.decider
    }

    pub fn filter(&self) -> &Arc<EnumerationFilter> {
        &self.filter
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Route an invocation to its callback.
    pub fn handle(&self, invocation: &Invocation<'_>) -> HookResult {
        let code = match *invocation {
            Invocation::FileOpen { caller, file } => self.on_file_open(caller, file),
            Invocation::FileRelease { file } => {
                self.on_file_release(file);
                0
            }
            Invocation::InodeGetattr { caller, inode } => self.on_getattr(caller, inode),
            Invocation::InodePermission { caller, inode } => self.on_permission(caller, inode),
            Invocation::Control {
                option,
                arg,
                memory,
            } => {
                return match self.on_control(option, arg, memory) {
                    Some(code) => HookResult::Override(code),
                    None => HookResult::Continue,
                };
            }
        };

        if code == 0 {
            HookResult::Continue
        } else {
            HookResult::Override(code)
        }
    }

    /// A file is being opened.
    ///
    /// Path resolution failures never fail the open; the handle just stays
    /// unfiltered.
    pub fn on_file_open(&self, caller: Identity, file: &OpenFile) -> i32 {
        if self.decider.should_bypass(caller) {
            return 0;
        }

        let path = match file.location().resolve(self.path_max) {
            Ok(path) => path,
            Err(e) => {
                debug!(handle = %file.id(), err = %e, "open unresolved, allowing");
                return 0;
            }
        };

        match self.decider.decide_open(caller, path, file.is_dir()) {
            Outcome::Deny => Outcome::Deny.errno(),
            Outcome::FilterEnumeration => {
                if let Err(e) = self.filter.wrap(file) {
                    debug!(handle = %file.id(), err = %e, "wrap failed, unfiltered");
                }
                0
            }
            Outcome::Allow => 0,
        }
    }

    /// A handle is being freed after its release ran.
    pub fn on_file_release(&self, file: &OpenFile) {
        self.filter.assert_released(file.id());
    }

    /// Attributes of `inode` are being queried.
    pub fn on_getattr(&self, caller: Identity, inode: &Inode) -> i32 {
        self.check_inode(caller, inode, |d, c, p| d.decide_attribute_query(c, p))
    }

    /// Access to `inode` is being checked.
    pub fn on_permission(&self, caller: Identity, inode: &Inode) -> i32 {
        self.check_inode(caller, inode, |d, c, p| d.decide_permission(c, p))
    }

    fn check_inode(
        &self,
        caller: Identity,
        inode: &Inode,
        decide: impl Fn(&Decider<Arc<PolicyTables>>, Identity, &str) -> Outcome,
    ) -> i32 {
        if inode.is_private() || self.decider.should_bypass(caller) {
            return 0;
        }

        match inode.location().resolve(self.path_max) {
            Ok(path) => decide(&self.decider, caller, path).errno(),
            // No alias, nothing to match against: not hidden.
            Err(ResolveError::NoAlias) => 0,
            Err(e) => e.errno(),
        }
    }

    /// A generic control call.
    ///
    /// Returns `None` if `option` is not the control key, leaving the call
    /// to the host. Otherwise returns the dispatcher's result code.
    pub fn on_control(&self, option: u32, arg: UserAddr, memory: &dyn UserMemory) -> Option<i32> {
        if option != self.control_key {
            return None;
        }
        Some(self.dispatcher.dispatch_code(memory, arg))
    }
}
