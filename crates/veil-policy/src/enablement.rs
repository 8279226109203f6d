//! Process-wide enablement flag.
//!
//! Read with acquire and written with release ordering, so a toggle made by
//! the control channel is visible to every later decision without a lock.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

/// Whether hiding is armed. While disarmed every decision is `Allow`.
#[derive(Debug, Default)]
pub struct Enablement {
    enabled: AtomicBool,
}

impl Enablement {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
        info!("hiding enabled");
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
        info!("hiding disabled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_default_disabled() {
        assert!(!Enablement::default().is_enabled());
    }

    #[test]
    fn test_toggle_visible_across_threads() {
        let flag = Arc::new(Enablement::new(false));

        let writer = Arc::clone(&flag);
        thread::spawn(move || writer.enable()).join().unwrap();
        assert!(flag.is_enabled());

        let writer = Arc::clone(&flag);
        thread::spawn(move || writer.disable()).join().unwrap();
        assert!(!flag.is_enabled());
    }
}
