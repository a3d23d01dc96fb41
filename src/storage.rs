//! Storage backend abstraction for blockgrid
//!
//! A backend is the persistence substrate the block store runs on: a catalog
//! of named storage units (one per occupied block) holding point records.
//! Backends provide atomic create-if-absent, insert, replace, delete,
//! predicate selection and catalog listing, plus all-or-nothing batches.

use crate::block::BlockId;
use crate::error::{GridError, Result};
use blockgrid_types::point::PointRecord;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trait for storage backend implementations
///
/// Read methods report a missing unit as `None` so callers can tell "no such
/// unit" apart from "empty unit" if they need to. Writes go through
/// [`StorageBackend::apply`], which must apply every op or none of them.
pub trait StorageBackend: Send + Sync {
    /// Apply a batch of operations atomically
    fn apply(&mut self, ops: &[StorageOp]) -> Result<()>;

    /// Check if a storage unit exists
    fn unit_exists(&self, block: BlockId) -> Result<bool>;

    /// List every existing storage unit
    fn units(&self) -> Result<Vec<BlockId>>;

    /// Get a record by id; `None` if the unit or the row is absent
    fn get(&self, block: BlockId, id: &str) -> Result<Option<PointRecord>>;

    /// Number of rows in a unit, `None` if the unit does not exist
    fn count(&self, block: BlockId) -> Result<Option<usize>>;

    /// Rows of a unit matching `filter`, `None` if the unit does not exist
    fn scan(
        &self,
        block: BlockId,
        filter: &dyn Fn(&PointRecord) -> bool,
    ) -> Result<Option<Vec<PointRecord>>>;

    /// Flush any pending writes to persistent storage
    fn sync(&mut self) -> Result<()>;

    /// Close the storage backend
    fn close(&mut self) -> Result<()>;

    /// Get storage statistics
    fn stats(&self) -> Result<StorageStats>;

    /// Create a unit if it does not exist
    fn create_unit(&mut self, block: BlockId) -> Result<()> {
        self.apply(&[StorageOp::CreateUnit { block }])
    }

    /// Drop a unit together with its rows
    fn drop_unit(&mut self, block: BlockId) -> Result<()> {
        self.apply(&[StorageOp::DropUnit { block }])
    }

    /// Insert a record into an existing unit
    fn insert(&mut self, block: BlockId, record: PointRecord) -> Result<()> {
        self.apply(&[StorageOp::Insert { block, record }])
    }

    /// Delete a row by id; a missing row or unit is a no-op
    fn delete(&mut self, block: BlockId, id: &str) -> Result<()> {
        self.apply(&[StorageOp::Delete {
            block,
            id: id.to_string(),
        }])
    }

    /// Find the unit holding `id`, scanning the catalog
    fn locate(&self, id: &str) -> Result<Option<BlockId>> {
        for block in self.units()? {
            if self.get(block, id)?.is_some() {
                return Ok(Some(block));
            }
        }
        Ok(None)
    }
}

/// Storage operation for batch processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StorageOp {
    /// Create a unit if absent
    CreateUnit { block: BlockId },
    /// Drop a unit and every row in it
    DropUnit { block: BlockId },
    /// Drop a unit only if it holds no rows
    DropIfEmpty { block: BlockId },
    /// Insert a new row; the unit must exist and the id must be new to the store
    Insert { block: BlockId, record: PointRecord },
    /// Overwrite an existing row with the same id
    Replace { block: BlockId, record: PointRecord },
    /// Delete a row by id if present
    Delete { block: BlockId, id: String },
}

/// Storage backend statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of existing storage units
    pub unit_count: usize,
    /// Total number of rows across all units
    pub record_count: usize,
    /// Number of operations applied
    pub operations_count: u64,
    /// Number of batches applied
    pub batch_count: u64,
}

type Unit = FxHashMap<String, PointRecord>;

/// Inverse of an applied op, used to roll a partial batch back.
#[derive(Debug)]
pub(crate) enum Undo {
    RemoveUnit(BlockId),
    RestoreUnit(BlockId, Unit),
    RemoveRow(BlockId, String),
    RestoreRow(BlockId, PointRecord),
}

/// In-memory storage backend: a sorted catalog of hash-mapped units
///
/// An id appears in at most one unit. `locations` maps every stored id to its
/// unit and is kept in step with `units` by every op and every rollback.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    units: BTreeMap<BlockId, Unit>,
    locations: FxHashMap<String, BlockId>,
    stats: StorageStats,
}

impl MemoryBackend {
    /// Create a new in-memory storage backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `ops` in order, returning the undo log.
    ///
    /// On failure everything applied so far is rolled back before the error
    /// is returned.
    pub(crate) fn apply_with_undo(&mut self, ops: &[StorageOp]) -> Result<Vec<Undo>> {
        let mut undo = Vec::with_capacity(ops.len());

        for op in ops {
            if let Err(e) = self.apply_one(op, &mut undo) {
                self.rollback(undo);
                return Err(e);
            }
        }

        self.stats.operations_count += ops.len() as u64;
        self.stats.batch_count += 1;
        Ok(undo)
    }

    /// Revert ops recorded in `undo`, newest first.
    pub(crate) fn rollback(&mut self, undo: Vec<Undo>) {
        for entry in undo.into_iter().rev() {
            match entry {
                Undo::RemoveUnit(block) => {
                    if let Some(unit) = self.units.remove(&block) {
                        self.forget(&unit);
                    }
                }
                Undo::RestoreUnit(block, unit) => {
                    for id in unit.keys() {
                        self.locations.insert(id.clone(), block);
                    }
                    self.units.insert(block, unit);
                }
                Undo::RemoveRow(block, id) => {
                    if let Some(unit) = self.units.get_mut(&block) {
                        unit.remove(&id);
                    }
                    self.locations.remove(&id);
                }
                Undo::RestoreRow(block, record) => {
                    self.locations.insert(record.id().to_string(), block);
                    self.units
                        .entry(block)
                        .or_default()
                        .insert(record.id().to_string(), record);
                }
            }
        }
    }

    fn apply_one(&mut self, op: &StorageOp, undo: &mut Vec<Undo>) -> Result<()> {
        match op {
            StorageOp::CreateUnit { block } => {
                if !self.units.contains_key(block) {
                    self.units.insert(*block, Unit::default());
                    undo.push(Undo::RemoveUnit(*block));
                }
            }
            StorageOp::DropUnit { block } => {
                if let Some(unit) = self.units.remove(block) {
                    self.forget(&unit);
                    undo.push(Undo::RestoreUnit(*block, unit));
                }
            }
            StorageOp::DropIfEmpty { block } => {
                if self.units.get(block).is_some_and(|u| u.is_empty()) {
                    self.units.remove(block);
                    undo.push(Undo::RestoreUnit(*block, Unit::default()));
                }
            }
            StorageOp::Insert { block, record } => {
                if let Some(existing) = self.locations.get(record.id()) {
                    return Err(GridError::DuplicateId {
                        id: record.id().to_string(),
                        block: *existing,
                    });
                }
                let unit = self
                    .units
                    .get_mut(block)
                    .ok_or(GridError::MissingUnit(*block))?;
                unit.insert(record.id().to_string(), record.clone());
                self.locations.insert(record.id().to_string(), *block);
                undo.push(Undo::RemoveRow(*block, record.id().to_string()));
            }
            StorageOp::Replace { block, record } => {
                let unit = self
                    .units
                    .get_mut(block)
                    .ok_or(GridError::MissingUnit(*block))?;
                let slot = unit
                    .get_mut(record.id())
                    .ok_or_else(|| GridError::not_found(record.id()))?;
                let previous = std::mem::replace(slot, record.clone());
                undo.push(Undo::RestoreRow(*block, previous));
            }
            StorageOp::Delete { block, id } => {
                if let Some(previous) = self.units.get_mut(block).and_then(|u| u.remove(id)) {
                    self.locations.remove(id);
                    undo.push(Undo::RestoreRow(*block, previous));
                }
            }
        }
        Ok(())
    }

    fn forget(&mut self, unit: &Unit) {
        for id in unit.keys() {
            self.locations.remove(id);
        }
    }

    /// Batches that rebuild the current state from nothing, one per unit.
    pub(crate) fn rebuild_batches(&self) -> impl Iterator<Item = Vec<StorageOp>> + '_ {
        self.units.iter().map(|(block, unit)| {
            let mut ops = Vec::with_capacity(unit.len() + 1);
            ops.push(StorageOp::CreateUnit { block: *block });
            ops.extend(unit.values().map(|record| StorageOp::Insert {
                block: *block,
                record: record.clone(),
            }));
            ops
        })
    }
}

impl StorageBackend for MemoryBackend {
    fn apply(&mut self, ops: &[StorageOp]) -> Result<()> {
        self.apply_with_undo(ops).map(|_| ())
    }

    fn unit_exists(&self, block: BlockId) -> Result<bool> {
        Ok(self.units.contains_key(&block))
    }

    fn units(&self) -> Result<Vec<BlockId>> {
        Ok(self.units.keys().copied().collect())
    }

    fn get(&self, block: BlockId, id: &str) -> Result<Option<PointRecord>> {
        Ok(self.units.get(&block).and_then(|u| u.get(id)).cloned())
    }

    fn count(&self, block: BlockId) -> Result<Option<usize>> {
        Ok(self.units.get(&block).map(|u| u.len()))
    }

    fn locate(&self, id: &str) -> Result<Option<BlockId>> {
        Ok(self.locations.get(id).copied())
    }

    fn scan(
        &self,
        block: BlockId,
        filter: &dyn Fn(&PointRecord) -> bool,
    ) -> Result<Option<Vec<PointRecord>>> {
        Ok(self
            .units
            .get(&block)
            .map(|u| u.values().filter(|r| filter(r)).cloned().collect()))
    }

    fn sync(&mut self) -> Result<()> {
        // No-op for in-memory storage
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.units.clear();
        self.locations.clear();
        self.stats = StorageStats::default();
        Ok(())
    }

    fn stats(&self) -> Result<StorageStats> {
        let mut stats = self.stats.clone();
        stats.unit_count = self.units.len();
        stats.record_count = self.units.values().map(|u| u.len()).sum();
        Ok(stats)
    }
}

/// Persistent storage backend using AOF (Append-Only File)
///
/// Every batch is logged as a single frame after it has been applied in
/// memory; if the write fails the in-memory batch is rolled back. On open the
/// log is replayed, discarding a torn trailing frame.
#[cfg(feature = "aof")]
pub struct AOFBackend {
    memory: MemoryBackend,
    aof_writer: crate::persistence::AOFFile,
    sync_policy: crate::config::SyncPolicy,
    sync_mode: crate::config::SyncMode,
    last_sync: std::time::Instant,
}

#[cfg(feature = "aof")]
impl AOFBackend {
    /// Open (or create) the log at `path` and replay it.
    pub fn open<P: AsRef<std::path::Path>>(
        path: P,
        config: &crate::config::Config,
    ) -> Result<Self> {
        use crate::persistence::{AOFConfig, AOFFile, AOFHeader};

        let header = AOFHeader {
            block_size: config.block_size,
            schema: config.schema.clone(),
        };
        let aof_config = AOFConfig {
            rewrite_size_threshold: config.aof_rewrite_threshold,
        };
        let mut aof_writer = AOFFile::open_with_config(path, header, aof_config)?;

        let mut memory = MemoryBackend::new();
        let batches = aof_writer.replay()?;
        let replayed = batches.len();
        for ops in batches {
            memory.apply(&ops)?;
        }
        log::info!(
            "Replayed {} batches from {}",
            replayed,
            aof_writer.path().display()
        );

        Ok(Self {
            memory,
            aof_writer,
            sync_policy: config.sync_policy,
            sync_mode: config.sync_mode,
            last_sync: std::time::Instant::now(),
        })
    }

    /// Current size of the log file in bytes
    pub fn aof_size(&self) -> u64 {
        self.aof_writer.size()
    }

    /// Rewrite the log from the live state.
    pub fn compact(&mut self) -> Result<()> {
        self.aof_writer.rewrite(self.memory.rebuild_batches())
    }

    fn maybe_sync(&mut self) -> Result<()> {
        use crate::config::SyncPolicy;

        match self.sync_policy {
            SyncPolicy::Always => self.sync_now(),
            SyncPolicy::EverySecond
                if self.last_sync.elapsed() >= std::time::Duration::from_secs(1) =>
            {
                self.sync_now()
            }
            _ => Ok(()),
        }
    }

    fn sync_now(&mut self) -> Result<()> {
        self.aof_writer.sync_with_mode(self.sync_mode)?;
        self.last_sync = std::time::Instant::now();
        Ok(())
    }
}

#[cfg(feature = "aof")]
impl StorageBackend for AOFBackend {
    fn apply(&mut self, ops: &[StorageOp]) -> Result<()> {
        let undo = self.memory.apply_with_undo(ops)?;

        if let Err(e) = self.aof_writer.write_batch(ops) {
            self.memory.rollback(undo);
            return Err(e);
        }

        // The batch is logged and will replay; later failures must not undo it.
        if let Err(e) = self.maybe_sync() {
            log::warn!(
                "Sync of {} failed after write: {}",
                self.aof_writer.path().display(),
                e
            );
        }

        if self.aof_writer.should_rewrite() {
            if let Err(e) = self.compact() {
                log::warn!(
                    "Compaction of {} failed, retrying on next write: {}",
                    self.aof_writer.path().display(),
                    e
                );
            }
        }
        Ok(())
    }

    fn unit_exists(&self, block: BlockId) -> Result<bool> {
        self.memory.unit_exists(block)
    }

    fn units(&self) -> Result<Vec<BlockId>> {
        self.memory.units()
    }

    fn get(&self, block: BlockId, id: &str) -> Result<Option<PointRecord>> {
        self.memory.get(block, id)
    }

    fn count(&self, block: BlockId) -> Result<Option<usize>> {
        self.memory.count(block)
    }

    fn locate(&self, id: &str) -> Result<Option<BlockId>> {
        self.memory.locate(id)
    }

    fn scan(
        &self,
        block: BlockId,
        filter: &dyn Fn(&PointRecord) -> bool,
    ) -> Result<Option<Vec<PointRecord>>> {
        self.memory.scan(block, filter)
    }

    fn sync(&mut self) -> Result<()> {
        self.sync_now()
    }

    fn close(&mut self) -> Result<()> {
        self.sync_now()?;
        self.memory.close()
    }

    fn stats(&self) -> Result<StorageStats> {
        self.memory.stats()
    }
}
