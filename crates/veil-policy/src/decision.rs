//! Visibility decisions.
//!
//! Given the enablement flag, the caller's identity and a target path, decide
//! whether an intercepted operation proceeds, fails as if the object did not
//! exist, or proceeds with directory filtering installed.
//!
//! The identity bypass is checked before any path lookup. Decisions never
//! fail: a denial is always "not found", never "permission denied".

use std::sync::Arc;

use tracing::trace;

use veil_core::error::errno;
use veil_core::Identity;
use veil_store::PolicyLookup;

use crate::enablement::Enablement;

/// Result of a visibility decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Proceed normally.
    Allow,
    /// Fail as if the object did not exist.
    Deny,
    /// Proceed, but filter hidden entries out of directory enumeration.
    FilterEnumeration,
}

impl Outcome {
    /// The value an interception callback returns for this outcome.
    pub fn errno(self) -> i32 {
        match self {
            Outcome::Deny => -errno::ENOENT,
            Outcome::Allow | Outcome::FilterEnumeration => 0,
        }
    }

    pub fn is_deny(self) -> bool {
        self == Outcome::Deny
    }
}

/// Decision logic over a policy lookup and the enablement flag.
pub struct Decider<P> {
    policy: P,
    enablement: Arc<Enablement>,
}

impl<P: PolicyLookup> Decider<P> {
    pub fn new(policy: P, enablement: Arc<Enablement>) -> Self {
        Self { policy, enablement }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn enablement(&self) -> &Enablement {
        &self.enablement
    }

    /// True iff hiding is disabled or `caller` is exempt.
    pub fn should_bypass(&self, caller: Identity) -> bool {
        !self.enablement.is_enabled() || self.policy.is_exempt(caller)
    }

    /// Decide an open.
    ///
    /// A hidden path is denied. A directory opened for enumeration whose
    /// immediate children include a hidden path gets filtering.
    pub fn decide_open(&self, caller: Identity, path: &str, is_directory_open: bool) -> Outcome {
        if self.should_bypass(caller) {
            return Outcome::Allow;
        }

        if self.policy.is_hidden(path) {
            trace!(path, uid = caller.as_u32(), "open denied");
            return Outcome::Deny;
        }

        if is_directory_open && self.policy.has_hidden_children(path) {
            trace!(path, uid = caller.as_u32(), "enumeration filtered");
            return Outcome::FilterEnumeration;
        }

        Outcome::Allow
    }

    /// Decide an attribute query.
    pub fn decide_attribute_query(&self, caller: Identity, path: &str) -> Outcome {
        self.decide_exact(caller, path)
    }

    /// Decide a permission check.
    pub fn decide_permission(&self, caller: Identity, path: &str) -> Outcome {
        self.decide_exact(caller, path)
    }

    fn decide_exact(&self, caller: Identity, path: &str) -> Outcome {
        if self.should_bypass(caller) {
            return Outcome::Allow;
        }

        if self.policy.is_hidden(path) {
            trace!(path, uid = caller.as_u32(), "lookup denied");
            Outcome::Deny
        } else {
            Outcome::Allow
        }
    }
}
