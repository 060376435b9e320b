//! Fault latch shared with the error interrupt
//!
//! The error interrupt runs outside any thread context and reports into
//! the transaction engine through this single atomic code. A new fault
//! overwrites an unconsumed one; there is no queue. The engine clears the
//! latch when it begins a new address phase and polls it while waiting
//! for the address acknowledge.

use core::sync::atomic::{AtomicI8, Ordering};

use crate::error::BusFault;

const CLEAR: i8 = 0;

/// Last-write-wins fault code, written by the error interrupt and read by
/// whichever thread holds the bus.
pub struct FaultLatch(AtomicI8);

impl FaultLatch {
    pub const fn new() -> Self {
        FaultLatch(AtomicI8::new(CLEAR))
    }

    /// Record a fault, replacing any unconsumed one.
    pub fn raise(&self, fault: BusFault) {
        self.0.store(fault.code(), Ordering::Release);
    }

    /// Drop any recorded fault.
    pub fn clear(&self) {
        self.0.store(CLEAR, Ordering::Release);
    }

    /// Currently latched fault, if any. Does not clear it.
    pub fn current(&self) -> Option<BusFault> {
        BusFault::from_code(self.0.load(Ordering::Acquire))
    }
}

impl Default for FaultLatch {
    fn default() -> Self {
        Self::new()
    }
}
