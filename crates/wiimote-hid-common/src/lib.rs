//! Common HID utilities for the Wii Remote driver crates
//!
//! This crate provides the transport capability the driver calls into and
//! the byte cursors shared by the report parsers and command encoders.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod report_parser;
pub mod transport;

pub use report_parser::*;
pub use transport::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to read from device: {0}")]
    ReadError(String),

    #[error("Failed to write to device: {0}")]
    WriteError(String),

    #[error("Invalid report format: {0}")]
    InvalidReport(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;
