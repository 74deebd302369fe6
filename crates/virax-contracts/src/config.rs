//! Pipeline configuration.
//!
//! `PipelineConfig` is usually deserialized from TOML. Every key is optional;
//! missing keys take the defaults below.
//!
//! ```toml
//! store_path = "audit.db"
//! session_id = "billing-worker-3"
//! batch_size = 100
//! max_delay_ms = 1000
//! heartbeat_enabled = false
//! algorithm = "sha3_256"
//! ```

use std::{fmt, path::Path, path::PathBuf, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{ViraxError, ViraxResult};

/// Digest used to link chain records.
///
/// The algorithm is not recorded per row, so a store must be audited with
/// the algorithm it was written with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[default]
    #[serde(rename = "sha256")]
    Sha256,
    #[serde(rename = "sha3_256")]
    Sha3_256,
    /// BLAKE2b with a 32-byte output.
    #[serde(rename = "blake2b")]
    Blake2b256,
}

impl HashAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha3_256 => "sha3_256",
            HashAlgorithm::Blake2b256 => "blake2b",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ViraxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha3_256" => Ok(HashAlgorithm::Sha3_256),
            "blake2b" | "blake2b_256" => Ok(HashAlgorithm::Blake2b256),
            _ => Err(ViraxError::UnsupportedAlgorithm {
                name: s.to_string(),
            }),
        }
    }
}

/// Construction parameters for the store, pipeline, watchers and heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// SQLite database file. `:memory:` opens a private in-memory database.
    pub store_path: PathBuf,

    /// Session id stamped on every record this pipeline produces.
    pub session_id: String,

    /// Default diagnostic filter for binaries (`RUST_LOG` overrides it).
    pub log_level: String,

    /// Threads in the watcher callback pool.
    pub max_workers: usize,

    /// Records per durable commit.
    pub batch_size: usize,

    /// Longest time a partial batch may wait before it is committed.
    pub max_delay_ms: u64,

    /// How long the commit worker blocks on an empty queue before it checks
    /// for shutdown and flushes a partial batch.
    pub poll_interval_ms: u64,

    /// Records held in memory awaiting commit; submissions beyond this drop.
    pub queue_capacity: usize,

    pub heartbeat_enabled: bool,
    pub heartbeat_interval_secs: u64,

    /// Heartbeat rows older than this are removed by maintenance.
    pub retention_days: u32,

    pub algorithm: HashAlgorithm,

    /// Upper bound on how long `shutdown` waits for background workers.
    pub shutdown_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("virax_universal.db"),
            session_id: "SESS-DEFAULT".to_string(),
            log_level: "info".to_string(),
            max_workers: 10,
            batch_size: 50,
            max_delay_ms: 2_000,
            poll_interval_ms: 500,
            queue_capacity: 10_000,
            heartbeat_enabled: true,
            heartbeat_interval_secs: 60,
            retention_days: 30,
            algorithm: HashAlgorithm::Sha256,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl PipelineConfig {
    /// A configuration backed by a private in-memory database with the
    /// heartbeat disabled. Intended for tests and short-lived tools.
    pub fn in_memory() -> Self {
        Self {
            store_path: PathBuf::from(":memory:"),
            heartbeat_enabled: false,
            ..Self::default()
        }
    }

    /// Parse `s` as TOML and validate the result.
    ///
    /// Returns `ViraxError::Config` if the TOML is malformed, names an
    /// unknown algorithm, or fails [`validate`](Self::validate).
    pub fn from_toml_str(s: &str) -> ViraxResult<Self> {
        let config: PipelineConfig = toml::from_str(s).map_err(|e| ViraxError::Config {
            reason: format!("failed to parse pipeline TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it with [`from_toml_str`](Self::from_toml_str).
    pub fn from_file(path: &Path) -> ViraxResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ViraxError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reject values that would stall or disable the pipeline.
    pub fn validate(&self) -> ViraxResult<()> {
        let positive = [
            ("max_workers", self.max_workers as u64),
            ("batch_size", self.batch_size as u64),
            ("queue_capacity", self.queue_capacity as u64),
            ("poll_interval_ms", self.poll_interval_ms),
            ("heartbeat_interval_secs", self.heartbeat_interval_secs),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ViraxError::Config {
                    reason: format!("'{}' must be greater than zero", key),
                });
            }
        }
        if self.session_id.is_empty() {
            return Err(ViraxError::Config {
                reason: "'session_id' must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
