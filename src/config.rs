use crate::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Engine tunables. Every timing is further capped by the caller's deadline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed wait after an interaction before its effect is checked.
    /// A tuning parameter; it does not adapt to observed latency.
    pub settle_ms: u64,

    /// Bound on the native interaction.
    pub native_click_timeout_ms: u64,

    /// How long an `element-appeared` effect may take to show up.
    pub verify_timeout_ms: u64,

    /// Polling period while waiting for a marker element.
    pub poll_interval_ms: u64,

    pub breaker: BreakerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle_ms: 2000,
            native_click_timeout_ms: 5000,
            verify_timeout_ms: 2000,
            poll_interval_ms: 100,
            breaker: BreakerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be at least 1".into()));
        }
        if self.native_click_timeout_ms == 0 {
            return Err(Error::Config(
                "native_click_timeout_ms must be at least 1".into(),
            ));
        }
        self.breaker.validate()
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn native_click_timeout(&self) -> Duration {
        Duration::from_millis(self.native_click_timeout_ms)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Exhausted actions before the circuit opens.
    pub failure_threshold: u32,

    /// How long the circuit stays open.
    pub cooldown_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 60_000,
        }
    }
}

impl BreakerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(Error::Config(
                "breaker.failure_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.settle(), Duration::from_millis(2000));
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.cooldown(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"settle_ms": 750, "breaker": {"cooldown_ms": 1000}}"#)
                .unwrap();
        assert_eq!(config.settle_ms, 750);
        assert_eq!(config.native_click_timeout_ms, 5000);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.cooldown_ms, 1000);
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let mut config = EngineConfig::default();
        config.breaker.failure_threshold = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let config = EngineConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
