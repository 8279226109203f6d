//! Exempt-identity table.

use std::collections::BTreeSet;

use parking_lot::RwLock;
use tracing::debug;

use veil_core::{Identity, Result, VeilError};

/// Thread-safe set of identities that bypass all hiding.
pub struct IdentityTable {
    identities: RwLock<BTreeSet<Identity>>,
    limit: usize,
}

impl IdentityTable {
    pub fn new(limit: usize) -> Self {
        Self {
            identities: RwLock::new(BTreeSet::new()),
            limit,
        }
    }

    /// Whether `id` is exempt.
    pub fn check(&self, id: Identity) -> bool {
        self.identities.read().contains(&id)
    }

    pub fn add(&self, id: Identity) -> Result<()> {
        let mut identities = self.identities.write();
        if identities.contains(&id) {
            return Err(VeilError::AlreadyExists(format!("identity {id}")));
        }
        if identities.len() >= self.limit {
            return Err(VeilError::OutOfMemory(format!(
                "identity table full ({} entries)",
                self.limit
            )));
        }

        identities.insert(id);
        debug!(uid = id.as_u32(), "exempt identity added");
        Ok(())
    }

    pub fn remove(&self, id: Identity) -> Result<()> {
        if !self.identities.write().remove(&id) {
            return Err(VeilError::NotFound(format!("identity {id}")));
        }

        debug!(uid = id.as_u32(), "exempt identity removed");
        Ok(())
    }

    /// Visit every identity in numeric order under the read lock.
    pub fn for_each(&self, mut f: impl FnMut(Identity)) {
        for id in self.identities.read().iter() {
            f(*id);
        }
    }

    /// Snapshot in numeric order.
    pub fn identities(&self) -> Vec<Identity> {
        self.identities.read().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.identities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.read().is_empty()
    }

    pub fn clear(&self) {
        let mut identities = self.identities.write();
        let dropped = identities.len();
        identities.clear();
        debug!(dropped, "identity table cleared");
    }
}
