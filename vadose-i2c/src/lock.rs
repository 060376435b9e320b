//! Per-bus mutual exclusion
//!
//! One lock per bus instance serializes callers; a transaction never
//! spans a release. The lock is intentionally not reentrant: a context
//! that acquires twice without releasing deadlocks, matching how the
//! surrounding drivers use the bus (acquire, transfer, release).

use core::hint;
use core::sync::atomic::{AtomicBool, Ordering};

/// Blocking lock for one bus instance.
pub struct BusLock {
    locked: AtomicBool,
}

impl BusLock {
    pub const fn new() -> Self {
        BusLock {
            locked: AtomicBool::new(false),
        }
    }

    /// Block until exclusive ownership is obtained.
    pub fn acquire(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            hint::spin_loop();
        }
    }

    /// Relinquish ownership, letting one spinning waiter in.
    pub fn release(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

impl Default for BusLock {
    fn default() -> Self {
        Self::new()
    }
}
