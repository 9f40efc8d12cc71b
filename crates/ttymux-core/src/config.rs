//! Multiplexer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bus::DEFAULT_CAPACITY;

/// Config error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Liveness poll interval must be non-zero")]
    ZeroInterval,
}

/// Tunables shared by every context of one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxConfig {
    /// Prefix of session labels (`TTY` gives `TTY0`..`TTY7`).
    pub label_prefix: String,
    /// How often spawned contexts are polled for termination.
    pub liveness_poll_ms: u64,
    /// Per-listener backlog of the in-process bus.
    pub bus_capacity: usize,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            label_prefix: "TTY".to_string(),
            liveness_poll_ms: 1000,
            bus_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl MuxConfig {
    /// Parse a JSON config document; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns error if the document is not valid or the interval is zero.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.liveness_interval()?;
        Ok(config)
    }

    /// Liveness poll interval.
    ///
    /// # Errors
    /// Returns error if the interval is zero.
    pub fn liveness_interval(&self) -> Result<Duration, ConfigError> {
        if self.liveness_poll_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(Duration::from_millis(self.liveness_poll_ms))
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_ok;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = MuxConfig::default();
        assert_eq!(config.label_prefix, "TTY");
        assert_eq!(assert_ok!(config.liveness_interval()), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_document() {
        let config = assert_ok!(MuxConfig::from_json(r#"{ "liveness_poll_ms": 250 }"#));
        assert_eq!(config.liveness_poll_ms, 250);
        assert_eq!(config.label_prefix, "TTY");
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(matches!(
            MuxConfig::from_json(r#"{ "liveness_poll_ms": 0 }"#),
            Err(ConfigError::ZeroInterval)
        ));
    }
}
