//! Wii Remote host driver.
//!
//! Two ways to bring a remote up over a [`ReportTransport`]:
//!
//! - [`Session`] runs the handshake from input reports as they arrive,
//!   one exchange at a time, and keeps decoding data reports afterwards.
//! - [`blocking_handshake`] (or [`Session::handshake_blocking`]) performs the
//!   whole sequence on the calling thread with [`wait_for_report`].
//!
//! Both drive the same [`DeviceRecord`] from `wiimote-hid-protocol`.

#![deny(static_mut_refs)]

pub mod blocking;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod wait;

pub use blocking::blocking_handshake;
pub use config::{DriverConfig, LogConfig};
pub use error::{DriverError, DriverResult};
pub use logging::init_logging;
pub use session::Session;
pub use wait::{read_memory_sync, wait_for_report, write_memory_sync};

pub use wiimote_hid_common::{ReportTransport, TransportError};
pub use wiimote_hid_protocol::{
    Capabilities, DeviceRecord, ExpansionKind, PeripheralRegistry, WiimoteEvent,
};
