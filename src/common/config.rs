//! Configuration for shardmeta components
//!
//! Sources are layered: built-in defaults, then an optional TOML file, then
//! `SHARDMETA__*` environment variables. Binaries apply CLI flags last.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::Result;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Node ID (unique identifier)
    #[serde(default = "default_node_id")]
    pub node_id: String,

    /// Bind address for the HTTP command API
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Data-bearing shards known to this config server
    #[serde(default = "default_shards")]
    pub shards: Vec<String>,
}

fn default_node_id() -> String {
    "config-1".to_string()
}
fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 27019))
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_shards() -> Vec<String> {
    vec!["shard0".to_string(), "shard1".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            bind_addr: default_bind_addr(),
            log_level: default_log_level(),
            storage: StorageConfig::default(),
            coordinator: CoordinatorConfig::default(),
            shards: default_shards(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Rocksdb,
}

/// Metadata store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// RocksDB path for metadata documents
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_backend() -> StorageBackend {
    StorageBackend::Rocksdb
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./config-data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_db_path(),
        }
    }
}

/// DDL coordinator engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Attempts per phase before the coordinator is marked failed
    #[serde(default = "default_max_phase_attempts")]
    pub max_phase_attempts: usize,

    /// First backoff delay between phase attempts
    #[serde(default = "default_retry_initial_delay")]
    pub retry_initial_delay_ms: u64,

    /// Timeout after which a waiting request cancels its coordinator (0 = none)
    #[serde(default)]
    pub default_timeout_ms: u64,
}

fn default_max_phase_attempts() -> usize {
    5
}
fn default_retry_initial_delay() -> u64 {
    100
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_phase_attempts: default_max_phase_attempts(),
            retry_initial_delay_ms: default_retry_initial_delay(),
            default_timeout_ms: 0,
        }
    }
}

impl CoordinatorConfig {
    pub fn retry_initial_delay(&self) -> Duration {
        Duration::from_millis(self.retry_initial_delay_ms)
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        (self.default_timeout_ms > 0).then(|| Duration::from_millis(self.default_timeout_ms))
    }
}

impl Config {
    /// Load from `shardmeta.toml` in the working directory if present, plus environment.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from an explicit file (required when given), plus environment.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p.to_path_buf()).required(true),
            None => config::File::with_name("shardmeta").required(false),
        };

        let cfg: Config = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("SHARDMETA").separator("__"))
            .build()?
            .try_deserialize()?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_id.is_empty() {
            return Err(crate::Error::InvalidConfig("node_id cannot be empty".into()));
        }
        if self.coordinator.max_phase_attempts == 0 {
            return Err(crate::Error::InvalidConfig(
                "coordinator.max_phase_attempts must be at least 1".into(),
            ));
        }
        if self.shards.iter().any(|s| s.is_empty()) {
            return Err(crate::Error::InvalidConfig("shard ids cannot be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.coordinator.max_phase_attempts, 5);
        assert_eq!(cfg.storage.backend, StorageBackend::Rocksdb);
        assert!(cfg.coordinator.default_timeout().is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
node_id = "cfg-a"
shards = ["s0", "s1", "s2"]

[storage]
backend = "memory"

[coordinator]
max_phase_attempts = 2
default_timeout_ms = 1500
"#
        )
        .unwrap();

        let cfg = Config::load_from(Some(file.path())).unwrap();
        assert_eq!(cfg.node_id, "cfg-a");
        assert_eq!(cfg.shards.len(), 3);
        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert_eq!(cfg.coordinator.max_phase_attempts, 2);
        assert_eq!(
            cfg.coordinator.default_timeout(),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut cfg = Config::default();
        cfg.coordinator.max_phase_attempts = 0;
        assert!(cfg.validate().is_err());
    }
}
