//! Calibration utilities for Wii Remote peripherals
//!
//! This crate holds the calibration records decoded during the device and
//! expansion handshakes, the repair rules applied to defective factory
//! bytes, and the normalization used to turn raw axis samples into
//! `[-1.0, 1.0]` stick positions.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod accel;
pub mod joystick;
pub mod repair;
pub mod types;

pub use accel::*;
pub use joystick::*;
pub use repair::*;
pub use types::*;
