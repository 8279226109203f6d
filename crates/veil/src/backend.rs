//! Interception backend abstraction.
//!
//! However a host delivers filesystem-operation callbacks (a policy-hook
//! registry, a patched function body, an entry/return trampoline), the engine
//! sees the same contract: one synchronous callback per operation point,
//! invoked before the real operation, able to short-circuit it with a
//! result code.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use veil_control::UserMemory;
use veil_core::{Identity, UserAddr};

use crate::error::{EngineError, Result};
use crate::file::{Inode, OpenFile};

/// The operations the engine intercepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationPoint {
    FileOpen,
    FileRelease,
    InodeGetattr,
    InodePermission,
    Control,
}

impl OperationPoint {
    pub const ALL: [OperationPoint; 5] = [
        OperationPoint::FileOpen,
        OperationPoint::FileRelease,
        OperationPoint::InodeGetattr,
        OperationPoint::InodePermission,
        OperationPoint::Control,
    ];
}

/// Arguments captured at an operation point.
pub enum Invocation<'a> {
    FileOpen {
        caller: Identity,
        file: &'a OpenFile,
    },
    /// The handle is being freed; its release has already run.
    FileRelease { file: &'a OpenFile },
    InodeGetattr {
        caller: Identity,
        inode: &'a Inode,
    },
    InodePermission {
        caller: Identity,
        inode: &'a Inode,
    },
    /// A generic control call. `option` selects the subsystem.
    Control {
        option: u32,
        arg: UserAddr,
        memory: &'a dyn UserMemory,
    },
}

impl Invocation<'_> {
    pub fn point(&self) -> OperationPoint {
        match self {
            Invocation::FileOpen { .. } => OperationPoint::FileOpen,
            Invocation::FileRelease { .. } => OperationPoint::FileRelease,
            Invocation::InodeGetattr { .. } => OperationPoint::InodeGetattr,
            Invocation::InodePermission { .. } => OperationPoint::InodePermission,
            Invocation::Control { .. } => OperationPoint::Control,
        }
    }
}

/// What the real operation should do after the callback returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookResult {
    /// Run the real operation.
    Continue,
    /// Skip it and return this code.
    Override(i32),
}

/// A registered callback.
pub type Callback = Arc<dyn Fn(&Invocation<'_>) -> HookResult + Send + Sync>;

/// Installs and removes callbacks at operation points.
///
/// Implementations must be thread-safe (Send + Sync).
pub trait InterceptBackend: Send + Sync {
    /// Install `callback` at `point`. Fails if one is already installed.
    fn register(&self, point: OperationPoint, callback: Callback) -> Result<()>;

    /// Remove the callback at `point`. Fails if none is installed.
    fn unregister(&self, point: OperationPoint) -> Result<()>;
}

/// An in-process callback registry.
///
/// The host calls [`RegistryBackend::invoke`] at each operation point.
#[derive(Default)]
pub struct RegistryBackend {
    callbacks: RwLock<HashMap<OperationPoint, Callback>>,
}

impl RegistryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the callback for this invocation's point, if any.
    ///
    /// The callback runs outside the registry lock.
    pub fn invoke(&self, invocation: &Invocation<'_>) -> HookResult {
        let callback = self.callbacks.read().get(&invocation.point()).cloned();
        match callback {
            Some(callback) => callback(invocation),
            None => HookResult::Continue,
        }
    }

    pub fn is_registered(&self, point: OperationPoint) -> bool {
        self.callbacks.read().contains_key(&point)
    }

    /// Hooked points in a stable order.
    pub fn registered(&self) -> Vec<OperationPoint> {
        let mut points: Vec<_> = self.callbacks.read().keys().copied().collect();
        points.sort();
        points
    }
}

impl InterceptBackend for RegistryBackend {
    fn register(&self, point: OperationPoint, callback: Callback) -> Result<()> {
        let mut callbacks = self.callbacks.write();
        if callbacks.contains_key(&point) {
            return Err(EngineError::AlreadyHooked(point));
        }
        callbacks.insert(point, callback);
        info!(?point, "hook installed");
        Ok(())
    }

    fn unregister(&self, point: OperationPoint) -> Result<()> {
        if self.callbacks.write().remove(&point).is_none() {
            return Err(EngineError::NotHooked(point));
        }
        info!(?point, "hook removed");
        Ok(())
    }
}
