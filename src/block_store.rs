//! Block-addressed adapter over a storage backend.
//!
//! Every method takes the [`BlockId`] of the storage unit it works on. A unit
//! that does not exist reads as empty: zero rows, no matches, no record.

use crate::block::BlockId;
use crate::error::Result;
use crate::storage::{StorageBackend, StorageOp, StorageStats};
use blockgrid_types::point::PointRecord;

pub struct BlockStore {
    backend: Box<dyn StorageBackend>,
}

impl BlockStore {
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Create the block's storage unit if it does not exist yet.
    pub fn ensure_created(&mut self, block: BlockId) -> Result<()> {
        if !self.backend.unit_exists(block)? {
            self.backend.create_unit(block)?;
            log::debug!("Created storage unit {}", block);
        }
        Ok(())
    }

    /// Insert into an existing unit. The id must be new to the unit.
    pub fn insert(&mut self, block: BlockId, record: PointRecord) -> Result<()> {
        self.backend.insert(block, record)
    }

    /// Delete a row if present.
    pub fn delete(&mut self, block: BlockId, id: &str) -> Result<()> {
        self.backend.delete(block, id)
    }

    pub fn exists(&self, block: BlockId) -> Result<bool> {
        self.backend.unit_exists(block)
    }

    pub fn count(&self, block: BlockId) -> Result<usize> {
        Ok(self.backend.count(block)?.unwrap_or(0))
    }

    pub fn select_all(&self, block: BlockId) -> Result<Vec<PointRecord>> {
        self.select_where(block, |_| true)
    }

    pub fn select_by_id(&self, block: BlockId, id: &str) -> Result<Option<PointRecord>> {
        self.backend.get(block, id)
    }

    pub fn select_where<F>(&self, block: BlockId, predicate: F) -> Result<Vec<PointRecord>>
    where
        F: Fn(&PointRecord) -> bool,
    {
        Ok(self.backend.scan(block, &predicate)?.unwrap_or_default())
    }

    /// Every block that currently has a storage unit.
    pub fn list_existing_blocks(&self) -> Result<Vec<BlockId>> {
        self.backend.units()
    }

    /// Drop the unit if it holds no rows. Returns whether it was dropped.
    pub fn drop_if_empty(&mut self, block: BlockId) -> Result<bool> {
        if self.backend.count(block)? != Some(0) {
            return Ok(false);
        }
        self.backend.apply(&[StorageOp::DropIfEmpty { block }])?;
        log::debug!("Dropped empty storage unit {}", block);
        Ok(true)
    }

    /// Create the unit if needed and insert, as one batch.
    ///
    /// A rejected insert leaves no empty unit behind.
    pub fn add(&mut self, block: BlockId, record: PointRecord) -> Result<()> {
        let created = !self.backend.unit_exists(block)?;
        self.backend.apply(&[
            StorageOp::CreateUnit { block },
            StorageOp::Insert { block, record },
        ])?;
        if created {
            log::debug!("Created storage unit {}", block);
        }
        Ok(())
    }

    /// Delete a row and drop the unit if that emptied it, as one batch.
    pub fn remove(&mut self, block: BlockId, id: &str) -> Result<()> {
        self.backend.apply(&[
            StorageOp::Delete {
                block,
                id: id.to_string(),
            },
            StorageOp::DropIfEmpty { block },
        ])?;
        if !self.backend.unit_exists(block)? {
            log::debug!("Dropped empty storage unit {}", block);
        }
        Ok(())
    }

    /// Overwrite a row in place.
    pub fn replace(&mut self, block: BlockId, record: PointRecord) -> Result<()> {
        self.backend.apply(&[StorageOp::Replace { block, record }])
    }

    /// Move a row between units as one batch: delete from `from`, drop `from`
    /// if it emptied, create `to` if needed, insert into `to`.
    pub fn relocate(&mut self, from: BlockId, to: BlockId, record: PointRecord) -> Result<()> {
        let id = record.id().to_string();
        self.backend.apply(&[
            StorageOp::Delete {
                block: from,
                id: id.clone(),
            },
            StorageOp::DropIfEmpty { block: from },
            StorageOp::CreateUnit { block: to },
            StorageOp::Insert { block: to, record },
        ])?;
        log::debug!("Relocated {} from {} to {}", id, from, to);
        Ok(())
    }

    /// Find the block holding `id` and its current row.
    pub fn locate(&self, id: &str) -> Result<Option<(BlockId, PointRecord)>> {
        let Some(block) = self.backend.locate(id)? else {
            return Ok(None);
        };
        Ok(self.select_by_id(block, id)?.map(|record| (block, record)))
    }

    pub fn sync(&mut self) -> Result<()> {
        self.backend.sync()
    }

    pub fn close(&mut self) -> Result<()> {
        self.backend.close()
    }

    pub fn stats(&self) -> Result<StorageStats> {
        self.backend.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GridError;
    use crate::storage::MemoryBackend;

    fn store() -> BlockStore {
        BlockStore::new(Box::new(MemoryBackend::new()))
    }

    #[test]
    fn test_absent_unit_reads_as_empty() {
        let store = store();
        let block = BlockId::new(9, 9);

        assert_eq!(store.count(block).unwrap(), 0);
        assert!(store.select_all(block).unwrap().is_empty());
        assert!(store.select_where(block, |_| true).unwrap().is_empty());
        assert!(store.select_by_id(block, "missing").unwrap().is_none());
        assert!(store.list_existing_blocks().unwrap().is_empty());
    }

    #[test]
    fn test_delete_on_absent_unit_is_noop() {
        let mut store = store();
        store.delete(BlockId::new(1, 1), "missing").unwrap();
        store.remove(BlockId::new(1, 1), "missing").unwrap();
        assert!(!store.exists(BlockId::new(1, 1)).unwrap());
    }

    #[test]
    fn test_ensure_created_then_insert() {
        let mut store = store();
        let block = BlockId::new(0, 0);
        let record = PointRecord::new(3.0, 4.0);

        store.ensure_created(block).unwrap();
        store.ensure_created(block).unwrap();
        store.insert(block, record.clone()).unwrap();

        assert_eq!(store.count(block).unwrap(), 1);
        assert_eq!(store.select_by_id(block, record.id()).unwrap(), Some(record));
    }

    #[test]
    fn test_add_and_remove_manage_unit_lifecycle() {
        let mut store = store();
        let block = BlockId::new(1, 1);
        let record = PointRecord::new(25.0, 25.0);

        store.add(block, record.clone()).unwrap();
        assert!(store.exists(block).unwrap());

        store.remove(block, record.id()).unwrap();
        assert!(!store.exists(block).unwrap());
    }

    #[test]
    fn test_duplicate_add_is_rejected() {
        let mut store = store();
        let block = BlockId::new(2, 0);
        let record = PointRecord::new(41.0, 1.0);

        store.add(block, record.clone()).unwrap();
        assert!(matches!(
            store.add(block, record.clone()),
            Err(GridError::DuplicateId { .. })
        ));
        assert_eq!(store.count(block).unwrap(), 1);
    }

    #[test]
    fn test_drop_if_empty_keeps_occupied_units() {
        let mut store = store();
        let block = BlockId::new(0, 0);
        let record = PointRecord::new(1.0, 1.0);

        store.add(block, record.clone()).unwrap();
        assert!(!store.drop_if_empty(block).unwrap());

        store.delete(block, record.id()).unwrap();
        assert!(store.exists(block).unwrap());
        assert!(store.drop_if_empty(block).unwrap());
        assert!(!store.exists(block).unwrap());
        assert!(!store.drop_if_empty(block).unwrap());
    }

    #[test]
    fn test_relocate_and_locate() {
        let mut store = store();
        let from = BlockId::new(0, 0);
        let to = BlockId::new(2, 2);
        let record = PointRecord::new(1.0, 1.0);

        store.add(from, record.clone()).unwrap();
        let moved = record.clone().with_position(41.0, 41.0);
        store.relocate(from, to, moved.clone()).unwrap();

        assert!(!store.exists(from).unwrap());
        assert_eq!(store.locate(record.id()).unwrap(), Some((to, moved)));
        assert_eq!(store.locate("missing").unwrap(), None);
    }
}
