//! Gossip protocol configuration.
//!
//! Tunable parameters for tick cadence, the simulated exchange delay, and
//! convergence tolerances.

use std::time::Duration;

/// Gossip protocol configuration.
#[derive(Debug, Clone)]
pub struct GossipConfig {
    /// Interval between gossip ticks.
    /// Default: 10s
    pub gossip_interval: Duration,

    /// Simulated network delay per exchange.
    /// Default: 100ms
    pub exchange_delay: Duration,

    /// Pairwise counter tolerance for the periodic convergence check.
    /// Default: 2
    pub check_tolerance: u64,

    /// Pairwise counter tolerance for the dedicated measurement.
    /// Default: 1
    pub measure_tolerance: u64,

    /// Poll interval used by convergence measurement.
    /// Default: 1s
    pub measure_poll_interval: Duration,

    /// Upper bound on convergence measurement.
    /// Default: 120s
    pub measure_timeout: Duration,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            gossip_interval: Duration::from_secs(10),
            exchange_delay: Duration::from_millis(100),
            check_tolerance: 2,
            measure_tolerance: 1,
            measure_poll_interval: Duration::from_secs(1),
            measure_timeout: Duration::from_secs(120),
        }
    }
}

impl GossipConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the gossip tick interval.
    pub fn with_gossip_interval(mut self, interval: Duration) -> Self {
        self.gossip_interval = interval;
        self
    }

    /// Set the simulated exchange delay.
    pub fn with_exchange_delay(mut self, delay: Duration) -> Self {
        self.exchange_delay = delay;
        self
    }

    /// Set the measurement poll interval and timeout.
    pub fn with_measurement(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.measure_poll_interval = poll_interval;
        self.measure_timeout = timeout;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gossip_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "gossip_interval must be > 0".into(),
            ));
        }
        if self.measure_poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "measure_poll_interval must be > 0".into(),
            ));
        }
        if self.measure_poll_interval >= self.measure_timeout {
            return Err(ConfigError::InvalidValue(
                "measure_poll_interval must be < measure_timeout".into(),
            ));
        }
        if self.measure_tolerance > self.check_tolerance {
            return Err(ConfigError::InvalidValue(
                "measure_tolerance must be <= check_tolerance".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GossipConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gossip_interval, Duration::from_secs(10));
        assert_eq!(config.check_tolerance, 2);
        assert_eq!(config.measure_tolerance, 1);
        assert_eq!(config.measure_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = GossipConfig::default().with_gossip_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_must_be_below_timeout() {
        let config = GossipConfig::default()
            .with_measurement(Duration::from_secs(5), Duration::from_secs(5));
        assert!(config.validate().is_err());
    }
}
