//! Node configuration.
//!
//! Loads and validates configuration from a YAML file or environment
//! variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Node configuration.
///
/// Example YAML:
/// ```yaml
/// node_id: "S1"
/// address: "http://localhost:5001"
/// data_dir: "/var/lib/kombu"
/// peers:
///   - node_id: "S2"
///     address: "http://localhost:5002"
///   - node_id: "S3"
///     address: "http://localhost:5003"
/// simulation:
///   min_processing_delay_ms: 2000
///   max_processing_delay_ms: 5000
///   failure_rate: 0.25
///   inject_partitions: true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node identifier
    pub node_id: String,

    /// Advertised address
    #[serde(default = "default_address")]
    pub address: String,

    /// Directory holding the leader record
    pub data_dir: PathBuf,

    /// Other nodes in the simulated cluster
    #[serde(default)]
    pub peers: Vec<PeerConfig>,

    /// Simulation knobs
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// A peer node in the simulated cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Peer node identifier
    pub node_id: String,

    /// Peer address
    pub address: String,
}

/// Knobs for the simulated failure behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Minimum artificial processing delay, milliseconds.
    /// Default: 2000
    #[serde(default = "default_min_delay_ms")]
    pub min_processing_delay_ms: u64,

    /// Maximum artificial processing delay, milliseconds.
    /// Default: 5000
    #[serde(default = "default_max_delay_ms")]
    pub max_processing_delay_ms: u64,

    /// Probability a request fails spuriously (0.0 - 1.0).
    /// Default: 0.25
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,

    /// Whether to run the random partition injector.
    /// Default: true
    #[serde(default = "default_inject_partitions")]
    pub inject_partitions: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            min_processing_delay_ms: default_min_delay_ms(),
            max_processing_delay_ms: default_max_delay_ms(),
            failure_rate: default_failure_rate(),
            inject_partitions: default_inject_partitions(),
        }
    }
}

impl SimulationConfig {
    /// Artificial delay bounds as durations.
    pub fn delay_bounds(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.min_processing_delay_ms),
            Duration::from_millis(self.max_processing_delay_ms),
        )
    }
}

fn default_address() -> String {
    "http://localhost:5001".to_string()
}

fn default_min_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_failure_rate() -> f64 {
    0.25
}

fn default_inject_partitions() -> bool {
    true
}

impl NodeConfig {
    /// Load configuration from a YAML file.
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("failed to read config file: {e}")))?;

        let config: NodeConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("failed to parse YAML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// Supported variables:
    /// - KOMBU_NODE_ID
    /// - KOMBU_ADDRESS
    /// - KOMBU_DATA_DIR
    /// - KOMBU_PEERS (comma-separated `id=address` pairs)
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let node_id = std::env::var("KOMBU_NODE_ID")
            .map_err(|_| ConfigError::MissingField("KOMBU_NODE_ID".to_string()))?;

        let address = std::env::var("KOMBU_ADDRESS").unwrap_or_else(|_| default_address());

        let data_dir = std::env::var("KOMBU_DATA_DIR")
            .map_err(|_| ConfigError::MissingField("KOMBU_DATA_DIR".to_string()))?;

        let peers = std::env::var("KOMBU_PEERS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .filter(|s| !s.trim().is_empty())
                    .map(parse_peer)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        let config = NodeConfig {
            node_id,
            address,
            data_dir: PathBuf::from(data_dir),
            peers,
            simulation: SimulationConfig::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id.is_empty() {
            return Err(ConfigError::InvalidValue("node_id must not be empty".into()));
        }
        if self.simulation.min_processing_delay_ms > self.simulation.max_processing_delay_ms {
            return Err(ConfigError::InvalidValue(
                "min_processing_delay_ms must be <= max_processing_delay_ms".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.simulation.failure_rate) {
            return Err(ConfigError::InvalidValue(
                "failure_rate must be within 0.0..=1.0".into(),
            ));
        }
        if self.peers.iter().any(|p| p.node_id == self.node_id) {
            return Err(ConfigError::InvalidValue(
                "peers must not include the local node".into(),
            ));
        }
        Ok(())
    }

    /// Path of the persisted leader record.
    pub fn leader_file(&self) -> PathBuf {
        self.data_dir.join("leader.json")
    }
}

fn parse_peer(raw: &str) -> Result<PeerConfig, ConfigError> {
    let raw = raw.trim();
    match raw.split_once('=') {
        Some((node_id, address)) if !node_id.is_empty() && !address.is_empty() => Ok(PeerConfig {
            node_id: node_id.to_string(),
            address: address.to_string(),
        }),
        _ => Err(ConfigError::Parse(format!(
            "invalid peer entry (expected id=address): {raw}"
        ))),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
