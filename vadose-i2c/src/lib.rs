//! I2C bus controller core for the Vadose node
//!
//! Everything on the node's sensor header (accelerometer, NFC front end,
//! soil probe) hangs off one of the SoC's I2C controllers. This crate is
//! the single path to those controllers: it computes bus timing, owns the
//! per-bus locks, runs the transaction state machine, and recovers the
//! bus when a device wedges it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Sensor drivers (vadose-drivers)        │
//! └─────────────────────────────────────────┘
//!                     │  vadose_hal::I2cBus
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  manager: locks, fault latch, byte API  │
//! │  transfer: transaction state machine    │
//! │  timing: speed class -> register value  │
//! └─────────────────────────────────────────┘
//!                     │  periph::I2cPeriph
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  vadose-hal-stm32l1 register block      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The engine is written against the [`periph::I2cPeriph`] register
//! interface, so the host test suite runs the full state machine against
//! a scripted mock controller.
//!
//! # Concurrency
//!
//! One transaction is in flight per bus at a time, enforced by the
//! per-bus lock; buses are independent of each other. The only state
//! shared with interrupt context is the fault latch, a single atomic
//! code written by [`manager::I2cBusManager::on_error_interrupt`] and
//! polled during the address-acknowledge wait. The short sections where
//! flag clearing and control writes must stay back to back run with
//! interrupts masked via `critical-section`.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod error;
pub mod manager;
pub mod periph;
pub mod timing;

mod latch;
mod lock;
mod transfer;

#[cfg(test)]
mod mock;

// Re-export the public surface at crate root for convenience
pub use error::{BusFault, I2cError};
pub use manager::{I2cBusManager, ManagedBus};
pub use periph::{Direction, FaultFlags, I2cPeriph};
pub use timing::{BusTiming, SpeedClass};
