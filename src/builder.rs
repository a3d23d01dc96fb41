//! Store builder for flexible configuration
//!
//! This module provides a builder pattern for creating stores with a custom
//! persistence path, grid geometry, schema or storage backend.

use crate::config::{Config, SyncPolicy};
use crate::db::PositionalDB;
use crate::error::Result;
use crate::storage::{MemoryBackend, StorageBackend};
use blockgrid_types::schema::Schema;
use std::fmt;
#[cfg(feature = "aof")]
use std::path::PathBuf;

/// Builder for stores with custom persistence paths and settings.
pub struct DBBuilder {
    #[cfg(feature = "aof")]
    aof_path: Option<PathBuf>,
    backend: Option<Box<dyn StorageBackend>>,
    config: Config,
    in_memory: bool,
}

impl DBBuilder {
    /// Create a new builder with default in-memory configuration.
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "aof")]
            aof_path: None,
            backend: None,
            config: Config::default(),
            in_memory: true,
        }
    }

    /// Set the AOF path for persistence. File is created if needed and replayed on startup.
    #[cfg(feature = "aof")]
    pub fn aof_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.aof_path = Some(path.into());
        self.backend = None;
        self.in_memory = false;
        self
    }

    /// Configure for in-memory storage with no persistence.
    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self.backend = None;
        #[cfg(feature = "aof")]
        {
            self.aof_path = None;
        }
        self
    }

    /// Run the store on a caller-provided backend.
    pub fn backend(mut self, backend: Box<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self.in_memory = false;
        #[cfg(feature = "aof")]
        {
            self.aof_path = None;
        }
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn block_size(mut self, block_size: f64) -> Self {
        self.config = self.config.with_block_size(block_size);
        self
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.config.schema = schema;
        self
    }

    pub fn sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.config = self.config.with_sync_policy(policy);
        self
    }

    /// Build the store. Opens and replays the AOF if one is configured.
    pub fn build(self) -> Result<PositionalDB> {
        if let Some(backend) = self.backend {
            return PositionalDB::with_backend(backend, self.config);
        }

        #[cfg(feature = "aof")]
        if let Some(aof_path) = self.aof_path {
            return PositionalDB::open(aof_path, self.config);
        }

        PositionalDB::with_backend(Box::new(MemoryBackend::new()), self.config)
    }
}

impl Default for DBBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DBBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("DBBuilder");
        #[cfg(feature = "aof")]
        s.field("aof_path", &self.aof_path);
        s.field("custom_backend", &self.backend.is_some())
            .field("config", &self.config)
            .field("in_memory", &self.in_memory)
            .finish()
    }
}
