//! Accelerometer drivers

pub mod lis2hh12;

pub use lis2hh12::{AccelSample, Lis2hh12, Lis2hh12Config, Lis2hh12Error, OutputRate, Scale};
