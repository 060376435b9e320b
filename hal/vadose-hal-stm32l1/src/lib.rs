//! STM32L1 bindings for the Vadose node
//!
//! Memory-mapped implementations of the hardware interfaces the portable
//! crates are written against. Everything here is a thin register-access
//! layer; sequencing and policy live in the portable crates.
//!
//! Only meaningful when running on the node. The crate still compiles on
//! the host so the workspace builds as one unit, but touching the
//! peripheral handles anywhere but on target is undefined behavior.

#![no_std]

pub mod i2c;

pub use i2c::{I2C1, I2C2};
