//! Driver configuration

use crate::error::{DriverError, DriverResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Timing and retry settings shared by both execution models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Per-report wait in the blocking model; `0` waits forever.
    pub read_timeout_ms: u64,
    /// Sleep between transport polls while waiting.
    pub poll_interval_ms: u64,
    /// Pause after the blocking reset before talking to the remote again.
    pub settle_delay_ms: u64,
    /// Status requests sent by the blocking handshake until a non-zero
    /// flags byte comes back.
    pub status_attempts: u32,
    /// Sends of one exchange before giving up on it: multi-chunk read
    /// restarts, and resends of a request that got no reply.
    pub max_read_attempts: u32,
    /// Ask for data reports even when nothing changed.
    pub continuous_reporting: bool,
    pub log: LogConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 1000,
            poll_interval_ms: 10,
            settle_delay_ms: 500,
            status_attempts: 3,
            max_read_attempts: 5,
            continuous_reporting: false,
            log: LogConfig::default(),
        }
    }
}

impl DriverConfig {
    pub fn from_json_str(json: &str) -> DriverResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> DriverResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        debug!("Loaded driver config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> DriverResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(DriverError::InvalidConfig(
                "poll_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.status_attempts == 0 {
            return Err(DriverError::InvalidConfig(
                "status_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_read_attempts == 0 {
            return Err(DriverError::InvalidConfig(
                "max_read_attempts must be at least 1".to_string(),
            ));
        }
        if self.log.level.trim().is_empty() {
            return Err(DriverError::InvalidConfig("log.level is empty".to_string()));
        }
        Ok(())
    }

    /// `None` means wait forever.
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_ms != 0).then(|| Duration::from_millis(self.read_timeout_ms))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"wiimote_hid_protocol=debug"`.
    pub level: String,
    pub ansi: bool,
    pub show_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
            show_target: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.read_timeout(), Some(Duration::from_secs(1)));
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.status_attempts, 3);
        assert!(matches!(config.validate(), Ok(())));
    }

    #[test]
    fn test_partial_json_keeps_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let config = DriverConfig::from_json_str(r#"{"read_timeout_ms": 0, "log": {"level": "debug"}}"#)?;
        assert_eq!(config.read_timeout(), None);
        assert_eq!(config.max_read_attempts, 5);
        assert_eq!(config.log.level, "debug");
        assert!(config.log.ansi);
        Ok(())
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = DriverConfig::from_json_str(r#"{"poll_interval_ms": 0}"#);
        assert!(matches!(result, Err(DriverError::InvalidConfig(_))));

        let result = DriverConfig::from_json_str(r#"{"max_read_attempts": 0}"#);
        assert!(matches!(result, Err(DriverError::InvalidConfig(_))));
    }

    #[test]
    fn test_malformed_json() {
        let result = DriverConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(DriverError::Config(_))));
    }

    #[test]
    fn test_load_from_file() -> Result<(), Box<dyn std::error::Error>> {
        let path = std::env::temp_dir().join(format!(
            "wiimote-driver-config-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"settle_delay_ms": 250, "continuous_reporting": true}"#)?;
        let loaded = DriverConfig::load(&path);
        std::fs::remove_file(&path)?;

        let config = loaded?;
        assert_eq!(config.settle_delay(), Duration::from_millis(250));
        assert!(config.continuous_reporting);
        Ok(())
    }

    #[test]
    fn test_load_missing_file() {
        let result = DriverConfig::load("/nonexistent/wiimote-driver.json");
        assert!(matches!(result, Err(DriverError::Io(_))));
    }
}
