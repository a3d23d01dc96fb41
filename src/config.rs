//! Store configuration.
//!
//! The configuration is serializable so it can be loaded from JSON (or TOML
//! with the `toml` feature) alongside the rest of an application's settings.
use crate::block::BlockIndex;
use crate::error::{GridError, Result};
use blockgrid_types::schema::Schema;
use serde::{Deserialize, Serialize};

/// Synchronization policy for persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    /// Never sync to disk (fastest, least safe)
    Never,
    /// Sync every second (recommended default)
    #[default]
    EverySecond,
    /// Sync after every write (slowest, safest)
    Always,
}

/// File synchronization strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Call `fsync` / `File::sync_all` to persist metadata + data.
    #[default]
    All,
    /// Call `fdatasync` / `File::sync_data` to persist data only.
    Data,
}

/// Positional store configuration
///
/// `block_size` and `schema` are fixed for the lifetime of a store. A
/// persisted store remembers both and refuses to reopen with different values.
///
/// # Example
///
/// ```rust
/// use blockgrid::{Config, SyncPolicy};
///
/// let json = r#"{
///     "block_size": 50.0,
///     "schema": [{"name": "label", "type": "text"}],
///     "sync_policy": "always"
/// }"#;
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.block_size, 50.0);
/// assert_eq!(config.sync_policy, SyncPolicy::Always);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Side length of every grid block
    #[serde(default = "Config::default_block_size")]
    pub block_size: f64,

    /// Extension fields appended to every point record
    #[serde(default)]
    pub schema: Schema,

    /// How often data is synced to disk
    #[serde(default)]
    pub sync_policy: SyncPolicy,

    /// Controls whether the store issues `fsync` or `fdatasync`.
    #[serde(default)]
    pub sync_mode: SyncMode,

    /// Compact the append-only file once it grows past this many bytes
    #[serde(default = "Config::default_aof_rewrite_threshold")]
    pub aof_rewrite_threshold: u64,
}

impl Config {
    const fn default_block_size() -> f64 {
        BlockIndex::DEFAULT_BLOCK_SIZE
    }

    const fn default_aof_rewrite_threshold() -> u64 {
        64 * 1024 * 1024
    }

    /// Default configuration with the given extension schema.
    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    pub fn with_block_size(mut self, block_size: f64) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync_policy = policy;
        self
    }

    pub fn with_sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = mode;
        self
    }

    pub fn with_aof_rewrite_threshold(mut self, bytes: u64) -> Self {
        self.aof_rewrite_threshold = bytes;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.block_size.is_finite() {
            return Err("Block size must be finite (not NaN or infinity)".to_string());
        }
        if self.block_size <= 0.0 {
            return Err("Block size must be positive".to_string());
        }
        if self.aof_rewrite_threshold == 0 {
            return Err("AOF rewrite threshold must be greater than zero".to_string());
        }
        self.schema.validate()
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate().map_err(GridError::InvalidConfig)?;
        Ok(config)
    }

    /// Parse and validate a TOML configuration.
    #[cfg(feature = "toml")]
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| GridError::Serialization(e.to_string()))?;
        config.validate().map_err(GridError::InvalidConfig)?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: Self::default_block_size(),
            schema: Schema::empty(),
            sync_policy: SyncPolicy::default(),
            sync_mode: SyncMode::default(),
            aof_rewrite_threshold: Self::default_aof_rewrite_threshold(),
        }
    }
}
