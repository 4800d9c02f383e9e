//! Cloak Configuration
//!
//! Handles loading configuration from:
//! 1. CLOAK_CONFIG env var (explicit path)
//! 2. ./config.toml (current directory)
//! 3. ~/.cloak/config.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".cloak";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_DB_PATH: &str = "./cloak-db";
const DEFAULT_MIN_CONFIRMATIONS: u64 = 1;
const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloakConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub prover: ProverConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Which store backs the wallet database
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Rocksdb,
    Memory,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default)]
    pub backend: StoreBackend,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DB_PATH.into(),
            backend: StoreBackend::Rocksdb,
        }
    }
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.into()
}

/// L1 confirmation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Transactions with fewer confirmations are treated as not yet mined.
    #[serde(default = "default_min_confirmations")]
    pub min_confirmations: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            min_confirmations: DEFAULT_MIN_CONFIRMATIONS,
        }
    }
}

fn default_min_confirmations() -> u64 {
    DEFAULT_MIN_CONFIRMATIONS
}

/// Prover configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProverConfig {
    /// Upper bound on a single join-split proof. `None` waits forever.
    #[serde(default)]
    pub proof_timeout_secs: Option<u64>,
}

impl ProverConfig {
    pub fn proof_timeout(&self) -> Option<Duration> {
        self.proof_timeout_secs.map(Duration::from_secs)
    }
}

/// Rollup sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        if let Ok(parsed) = v.parse() {
            *field = parsed;
        } else {
            log::warn!("Ignoring unparseable {key}={v}");
        }
    }
}

/// Set Option<T> from env var if present and parseable
fn env_parse_option<T: std::str::FromStr>(key: &str, field: &mut Option<T>) {
    if let Ok(v) = env::var(key) {
        if let Ok(parsed) = v.parse() {
            *field = Some(parsed);
        }
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl CloakConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::read_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = env::var("CLOAK_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("CLOAK_CONFIG points at missing file {}", path.display());
        }

        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        env_string("CLOAK_DB_PATH", &mut self.database.path);
        if let Ok(v) = env::var("CLOAK_DB_BACKEND") {
            self.database.backend = match v.to_ascii_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                _ => StoreBackend::Rocksdb,
            };
        }

        env_parse("CLOAK_MIN_CONFIRMATIONS", &mut self.chain.min_confirmations);

        env_parse_option(
            "CLOAK_PROOF_TIMEOUT_SECS",
            &mut self.prover.proof_timeout_secs,
        );

        env_parse("CLOAK_POLL_INTERVAL_MS", &mut self.sync.poll_interval_ms);
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.prover.proof_timeout_secs = Some(300);
        toml::to_string_pretty(&sample).unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================
