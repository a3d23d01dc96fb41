//! Embedded positional store that partitions points into fixed-size grid blocks.
//!
//! Each occupied block gets its own storage unit, created when the first point
//! lands in it and dropped when the last one leaves. Rectangle and radius
//! queries only read the blocks overlapping the query region.
//!
//! ```rust
//! use blockgrid::{PointRecord, PositionalDB};
//!
//! let mut db = PositionalDB::memory()?;
//! let id = db.add(PointRecord::new(25.0, 25.0))?;
//! db.add(PointRecord::new(5.0, 5.0))?;
//!
//! assert_eq!(db.within_rect(0.0, 0.0, 30.0, 30.0)?.len(), 2);
//!
//! db.move_point(&id, 90.0, 10.0, Some((25.0, 25.0)))?;
//! assert_eq!(db.within_radius(50.0, 10.0, 40.0)?.len(), 1);
//! # Ok::<(), blockgrid::GridError>(())
//! ```

pub mod block;
pub mod block_store;
pub mod builder;
pub mod config;
pub mod db;
pub mod error;
pub mod patch;
pub mod storage;

#[cfg(feature = "aof")]
pub mod persistence;

pub use block::{BlockId, BlockIndex, BlockRange};
pub use block_store::BlockStore;
pub use builder::DBBuilder;
pub use config::{Config, SyncMode, SyncPolicy};
pub use db::PositionalDB;
pub use error::{GridError, Result};
pub use patch::Patch;

pub use blockgrid_types::{FieldDef, FieldType, FieldValue, PointRecord, Schema};

pub use geo::Rect;

pub use storage::{MemoryBackend, StorageBackend, StorageOp, StorageStats};

#[cfg(feature = "aof")]
pub use storage::AOFBackend;

#[cfg(feature = "aof")]
pub use persistence::{AOFConfig, AOFFile, AOFHeader};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{DBBuilder, GridError, PositionalDB, Result};

    pub use crate::{BlockId, BlockIndex, Patch};

    pub use crate::{Config, SyncPolicy};

    pub use crate::{FieldType, FieldValue, PointRecord, Schema};

    pub use crate::{MemoryBackend, StorageBackend};

    #[cfg(feature = "aof")]
    pub use crate::AOFBackend;
}
