//! Configuration file of the companion.

use crate::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use thiserror::Error;

/// Default timeout of every call to the followed node.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default listen address of the query service.
pub const DEFAULT_RPC_LISTEN_ADDRESS: &str = "127.0.0.1:8080";

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("error reading configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for [`Config`].
    #[error("cannot unmarshal configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field failed validation. `section` names the config section.
    #[error("error in [{section}] section: {message}")]
    Invalid {
        /// Section of the offending field.
        section: &'static str,
        /// Human readable reason.
        message: String,
    },
}

/// Top level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Followed node.
    pub node: NodeConfig,
    /// Relational store.
    pub storage: StorageConfig,
    /// Ingestion pipeline.
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Query service.
    #[serde(default)]
    pub rpc: RpcConfig,
}

impl Config {
    /// Parses a configuration from TOML and validates it.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate_basic()?;
        Ok(config)
    }

    /// Loads and validates the configuration file at `path`.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Performs basic validation and returns an error if any check fails.
    pub fn validate_basic(&self) -> Result<(), ConfigError> {
        self.node.validate_basic()?;
        self.storage.validate_basic()?;
        self.ingest.retry.validate_basic()
    }
}

/// `[node]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data plane address, e.g. `tcp://127.0.0.1:26657`.
    pub address: String,
    /// Privileged control plane address.
    pub privileged_address: String,
    /// Timeout of every call to the node, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl NodeConfig {
    /// Returns the request timeout.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Checks that both addresses are set and fully formed.
    pub fn validate_basic(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::Invalid { section: "node", message };

        if self.address.trim().is_empty() {
            return Err(invalid(
                "invalid node listening address, cannot be blank, please ensure a value is set \
                 in the config"
                    .to_string(),
            ));
        }
        if !self.address.contains("://") {
            return Err(invalid(format!(
                "invalid listening address {} (use fully formed addresses, including the tcp:// \
                 or unix:// prefix)",
                self.address
            )));
        }
        if self.privileged_address.trim().is_empty() {
            return Err(invalid(
                "invalid privileged listening address, cannot be blank, please ensure a value is \
                 set in the config"
                    .to_string(),
            ));
        }
        if !self.privileged_address.contains("://") {
            return Err(invalid(format!(
                "invalid privileged listening address {} (use fully formed addresses, including \
                 the tcp:// or unix:// prefix)",
                self.privileged_address
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the SQLite database file.
    pub path: PathBuf,
    /// Wrap every block insert in one transaction.
    #[serde(default)]
    pub atomic_block_writes: bool,
}

impl StorageConfig {
    /// Checks that a database path is set.
    pub fn validate_basic(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                section: "storage",
                message: "invalid storage path, cannot be blank".to_string(),
            });
        }
        Ok(())
    }
}

/// What the persistence worker stores per block.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Decompose and store the full block.
    #[default]
    Full,
    /// Store only the serialized header.
    Header,
}

/// `[ingest]` section.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// What is stored per block.
    #[serde(default)]
    pub mode: IngestMode,
    /// Retry policy for fetching and persisting a height.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Advance the block results retain height together with the block retain height.
    #[serde(default)]
    pub advance_block_results_retain_height: bool,
}

/// Named retry strategies of the `[ingest.retry]` section.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    /// Give up after the first failure.
    #[default]
    Drop,
    /// Retry with exponential backoff.
    Exponential,
}

/// `[ingest.retry]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Strategy to use.
    #[serde(default)]
    pub strategy: RetryStrategy,
    /// Maximum number of retries for the exponential strategy.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// First retry delay in milliseconds.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    /// Maximum retry delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

const fn default_max_retries() -> usize {
    3
}

const fn default_min_delay_ms() -> u64 {
    100
}

const fn default_max_delay_ms() -> u64 {
    5_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::default(),
            max_retries: default_max_retries(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Checks that the delay bounds are ordered.
    pub fn validate_basic(&self) -> Result<(), ConfigError> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(ConfigError::Invalid {
                section: "ingest.retry",
                message: format!(
                    "min_delay_ms ({}) must not exceed max_delay_ms ({})",
                    self.min_delay_ms, self.max_delay_ms
                ),
            });
        }
        Ok(())
    }

    /// Returns the [`RetryPolicy`] described by this section.
    pub const fn policy(&self) -> RetryPolicy {
        match self.strategy {
            RetryStrategy::Drop => RetryPolicy::Drop,
            RetryStrategy::Exponential => RetryPolicy::Exponential {
                max_retries: self.max_retries,
                min_delay: Duration::from_millis(self.min_delay_ms),
                max_delay: Duration::from_millis(self.max_delay_ms),
            },
        }
    }
}

/// `[rpc]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Listen address of the query service.
    #[serde(default = "default_rpc_listen_address")]
    pub listen_address: SocketAddr,
}

fn default_rpc_listen_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self { listen_address: default_rpc_listen_address() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const MINIMAL: &str = r#"
        [node]
        address = "tcp://127.0.0.1:26657"
        privileged_address = "tcp://127.0.0.1:26658"

        [storage]
        path = "companion.db"
    "#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.node.request_timeout(), Duration::from_secs(10));
        assert!(!config.storage.atomic_block_writes);
        assert_eq!(config.ingest.mode, IngestMode::Full);
        assert_eq!(config.ingest.retry.policy(), RetryPolicy::Drop);
        assert!(!config.ingest.advance_block_results_retain_height);
        assert_eq!(config.rpc.listen_address.to_string(), DEFAULT_RPC_LISTEN_ADDRESS);
    }

    #[test]
    fn test_full_config() {
        let raw = r#"
            [node]
            address = "ws://node:26657"
            privileged_address = "http://node:26658"
            request_timeout_secs = 3

            [storage]
            path = "/var/lib/companion/db.sqlite"
            atomic_block_writes = true

            [ingest]
            mode = "header"
            advance_block_results_retain_height = true

            [ingest.retry]
            strategy = "exponential"
            max_retries = 5
            min_delay_ms = 10
            max_delay_ms = 20

            [rpc]
            listen_address = "0.0.0.0:9000"
        "#;
        let config = Config::from_toml_str(raw).unwrap();

        assert_eq!(config.ingest.mode, IngestMode::Header);
        assert_eq!(
            config.ingest.retry.policy(),
            RetryPolicy::Exponential {
                max_retries: 5,
                min_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(20),
            }
        );
        assert_eq!(config.rpc.listen_address.port(), 9000);
    }

    #[rstest]
    #[case::blank_address("", "tcp://a:1", "cannot be blank")]
    #[case::bare_address("127.0.0.1:26657", "tcp://a:1", "use fully formed addresses")]
    #[case::blank_privileged("tcp://a:1", "  ", "privileged listening address, cannot be blank")]
    #[case::bare_privileged("tcp://a:1", "a:1", "invalid privileged listening address a:1")]
    fn test_invalid_node_addresses(
        #[case] address: &str,
        #[case] privileged_address: &str,
        #[case] expected: &str,
    ) {
        let node = NodeConfig {
            address: address.to_string(),
            privileged_address: privileged_address.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        };
        let err = node.validate_basic().unwrap_err();

        assert!(err.to_string().starts_with("error in [node] section"));
        assert!(err.to_string().contains(expected), "{err}");
    }

    #[test]
    fn test_unordered_retry_delays_rejected() {
        let retry = RetryConfig { min_delay_ms: 10, max_delay_ms: 1, ..Default::default() };
        assert!(matches!(
            retry.validate_basic(),
            Err(ConfigError::Invalid { section: "ingest.retry", .. })
        ));
    }

    #[test]
    fn test_missing_section_is_parse_error() {
        assert!(matches!(
            Config::from_toml_str("[storage]\npath = \"db\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
