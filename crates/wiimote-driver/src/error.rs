//! Driver error type

use thiserror::Error;
use wiimote_hid_common::TransportError;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Timed out after {timeout_ms} ms waiting for report {report_id:#04x}")]
    Timeout { report_id: u8, timeout_ms: u64 },

    #[error("Read of {address:#010x} rejected with error code {code}")]
    ReadFailed { address: u32, code: u8 },

    #[error("Read of {address:#010x} returned {actual} of {expected} bytes")]
    ShortRead {
        address: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Gave up on {address:#010x} after {attempts} attempts")]
    RetriesExhausted { address: u32, attempts: u32 },

    #[error("Device is not connected")]
    NotConnected,

    #[error("Request cannot be encoded: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration parse error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = DriverError::Timeout {
            report_id: 0x21,
            timeout_ms: 1000,
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 1000 ms waiting for report 0x21"
        );
    }

    #[test]
    fn test_read_failed_message() {
        let err = DriverError::ReadFailed {
            address: 0x04A4_0020,
            code: 7,
        };
        assert_eq!(
            err.to_string(),
            "Read of 0x04a40020 rejected with error code 7"
        );
    }

    #[test]
    fn test_transport_conversion() {
        let err: DriverError = TransportError::Disconnected.into();
        assert!(matches!(err, DriverError::Transport(TransportError::Disconnected)));
    }
}
