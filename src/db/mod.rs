//! Core store implementation for blockgrid.
//!
//! This module defines the `PositionalDB` type. Entity operations live in
//! `entities.rs` and spatial queries in `queries.rs`, both as `impl` blocks on
//! the same type.

use crate::block::BlockIndex;
use crate::block_store::BlockStore;
use crate::config::Config;
use crate::error::{GridError, Result};
use crate::storage::{MemoryBackend, StorageBackend, StorageStats};
use blockgrid_types::schema::Schema;
use std::marker::PhantomData;
use std::path::Path;

mod entities;
mod queries;

/// Main positional store (single-threaded by design).
///
/// Points are partitioned into square grid blocks of side `block_size`; each
/// occupied block has its own storage unit, created on first insert and
/// dropped when its last point leaves. Range queries only touch the blocks
/// overlapping the query region.
///
/// `PositionalDB` is neither `Send` nor `Sync`. Wrap it in a lock if it has
/// to be shared.
///
/// # Examples
///
/// ```rust
/// use blockgrid::{Config, PointRecord, PositionalDB, Schema};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::with_schema(Schema::parse("label TEXT")?);
/// let mut db = PositionalDB::memory_with_config(config)?;
///
/// let id = db.add(PointRecord::new(25.0, 25.0).with_field("label", "oak"))?;
/// db.add(PointRecord::new(5.0, 5.0).with_field("label", "elm"))?;
///
/// let found = db.within_rect(0.0, 0.0, 30.0, 30.0)?;
/// assert_eq!(found.len(), 2);
///
/// let moved = db.move_point(&id, 45.0, 45.0, Some((25.0, 25.0)))?;
/// assert_eq!(moved.position(), (45.0, 45.0));
/// # Ok(())
/// # }
/// ```
pub struct PositionalDB {
    pub(crate) index: BlockIndex,
    pub(crate) store: BlockStore,
    pub(crate) config: Config,
    pub(crate) closed: bool,
    _not_send_sync: PhantomData<*const ()>,
}

impl PositionalDB {
    /// Opens a store from a file path or creates a new one.
    ///
    /// The path `":memory:"` gives a store without persistence. Any other path
    /// is an append-only log that is replayed on open; the log remembers the
    /// block size and schema it was created with, and opening it with a
    /// different configuration fails with [`GridError::ConfigMismatch`].
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> Result<Self> {
        let path = path.as_ref();
        config.validate().map_err(GridError::InvalidConfig)?;

        if path.to_str() == Some(":memory:") {
            return Self::with_backend(Box::new(MemoryBackend::new()), config);
        }

        Self::open_file(path, config)
    }

    #[cfg(feature = "aof")]
    fn open_file(path: &Path, config: Config) -> Result<Self> {
        let backend = crate::storage::AOFBackend::open(path, &config)?;
        Self::with_backend(Box::new(backend), config)
    }

    #[cfg(not(feature = "aof"))]
    fn open_file(path: &Path, _config: Config) -> Result<Self> {
        Err(GridError::InvalidConfig(format!(
            "Cannot open {}: file persistence requires the `aof` feature",
            path.display()
        )))
    }

    /// Creates a new in-memory store with the default configuration.
    pub fn memory() -> Result<Self> {
        Self::memory_with_config(Config::default())
    }

    /// Create an in-memory store with custom configuration
    pub fn memory_with_config(config: Config) -> Result<Self> {
        Self::open(":memory:", config)
    }

    /// Run the store on a caller-provided storage backend.
    pub fn with_backend(backend: Box<dyn StorageBackend>, config: Config) -> Result<Self> {
        config.validate().map_err(GridError::InvalidConfig)?;
        let index = BlockIndex::new(config.block_size)?;

        Ok(Self {
            index,
            store: BlockStore::new(backend),
            config,
            closed: false,
            _not_send_sync: PhantomData,
        })
    }

    /// Create a store builder for advanced configuration.
    pub fn builder() -> crate::builder::DBBuilder {
        crate::builder::DBBuilder::new()
    }

    pub fn block_size(&self) -> f64 {
        self.index.block_size()
    }

    pub fn block_index(&self) -> &BlockIndex {
        &self.index
    }

    pub fn schema(&self) -> &Schema {
        &self.config.schema
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        self.ensure_open()?;
        self.store.stats()
    }

    /// Force pending writes to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.store.sync()
    }

    /// Sync and close the store. Later operations fail with
    /// [`GridError::DatabaseClosed`].
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.store.close()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(GridError::DatabaseClosed);
        }
        Ok(())
    }
}

impl Drop for PositionalDB {
    fn drop(&mut self) {
        if !self.closed {
            // Best effort, errors are ignored
            let _ = self.store.sync();
        }
    }
}

/// Reject NaN and infinite coordinates before they reach the grid math.
pub(crate) fn check_coordinates(x: f64, y: f64) -> Result<()> {
    if !x.is_finite() || !y.is_finite() {
        return Err(GridError::InvalidInput(format!(
            "Coordinates must be finite, got ({}, {})",
            x, y
        )));
    }
    Ok(())
}
