//! PolicyLookup trait: the read side of the policy tables.
//!
//! Decision logic and the enumeration filter only ever read policy. This
//! trait lets them be tested against fixed lookups as well as the real
//! [`PolicyTables`](crate::PolicyTables).

use veil_core::Identity;

/// Read-only predicates over hiding policy.
///
/// Implementations must be cheap and non-blocking beyond a read lock.
pub trait PolicyLookup: Send + Sync {
    /// Exact match against the hidden-path table.
    fn is_hidden(&self, path: &str) -> bool;

    /// Whether `dir` is the immediate parent of some hidden path.
    fn has_hidden_children(&self, dir: &str) -> bool;

    /// Whether `id` bypasses all hiding.
    fn is_exempt(&self, id: Identity) -> bool;
}

impl<T: PolicyLookup + ?Sized> PolicyLookup for std::sync::Arc<T> {
    fn is_hidden(&self, path: &str) -> bool {
        (**self).is_hidden(path)
    }

    fn has_hidden_children(&self, dir: &str) -> bool {
        (**self).has_hidden_children(dir)
    }

    fn is_exempt(&self, id: Identity) -> bool {
        (**self).is_exempt(id)
    }
}
