//! Sensor driver implementations
//!
//! This crate provides drivers for the peripherals on the node's sensor
//! header, written against the bus traits from vadose-hal:
//!
//! - Accelerometer (LIS2HH12)
//!
//! Drivers are plain register plumbing: they never touch the bus
//! controller directly and stay portable across anything that implements
//! the traits.

#![no_std]
#![deny(unsafe_code)]

pub mod accel;
