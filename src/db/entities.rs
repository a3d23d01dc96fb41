//! Identity-preserving CRUD for point entities.

use super::{PositionalDB, check_coordinates};
use crate::block::BlockId;
use crate::error::{GridError, Result};
use crate::patch::Patch;
use blockgrid_types::point::PointRecord;

impl PositionalDB {
    /// Store a point in the block its coordinates resolve to.
    ///
    /// The block's storage unit is created if this is its first point.
    /// Attributes are checked against the schema; declared fields the record
    /// leaves out are stored as `Null`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use blockgrid::{PointRecord, PositionalDB};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut db = PositionalDB::memory()?;
    /// let point = PointRecord::new(25.0, 25.0);
    /// let id = db.add(point.clone())?;
    ///
    /// assert_eq!(db.get(&id, None)?, point);
    /// # Ok(())
    /// # }
    /// ```
    pub fn add(&mut self, mut record: PointRecord) -> Result<String> {
        self.ensure_open()?;
        check_coordinates(record.x(), record.y())?;
        self.config
            .schema
            .conform(record.attributes_mut())
            .map_err(GridError::SchemaViolation)?;

        let block = self.index.find_table(record.x(), record.y());
        let id = record.id().to_string();
        self.store.add(block, record)?;
        Ok(id)
    }

    /// Fetch a point by id.
    ///
    /// With `at` set to the point's current coordinates only its block is
    /// searched; without it every existing block is scanned.
    pub fn get(&self, id: &str, at: Option<(f64, f64)>) -> Result<PointRecord> {
        self.ensure_open()?;
        self.resolve(id, at).map(|(_, record)| record)
    }

    /// Remove a point, dropping its block's storage unit if it was the last
    /// occupant. Returns the removed record.
    ///
    /// Fails with [`GridError::NotFound`] if the id is not at the resolved
    /// location.
    pub fn remove(&mut self, id: &str, at: Option<(f64, f64)>) -> Result<PointRecord> {
        self.ensure_open()?;
        let (block, record) = self.resolve(id, at)?;
        self.store.remove(block, id)?;
        Ok(record)
    }

    /// Remove a point using the record's own coordinates as the location.
    pub fn remove_record(&mut self, record: &PointRecord) -> Result<PointRecord> {
        self.remove(record.id(), Some(record.position()))
    }

    /// Move a point to `(new_x, new_y)` and return the updated record.
    ///
    /// `prev` is the point's current position, if known; without it every
    /// block is scanned. Within one block the row is updated in place.
    /// Across blocks the delete from the old block and the insert into the
    /// new one are applied as a single atomic batch.
    pub fn move_point(
        &mut self,
        id: &str,
        new_x: f64,
        new_y: f64,
        prev: Option<(f64, f64)>,
    ) -> Result<PointRecord> {
        self.ensure_open()?;
        check_coordinates(new_x, new_y)?;

        let (from, current) = self.resolve(id, prev)?;
        let updated = current.with_position(new_x, new_y);
        self.store_updated(from, updated)
    }

    /// Move a point using the record's own coordinates as its previous
    /// position.
    pub fn move_record(
        &mut self,
        record: &PointRecord,
        new_x: f64,
        new_y: f64,
    ) -> Result<PointRecord> {
        self.move_point(record.id(), new_x, new_y, Some(record.position()))
    }

    /// Merge `patch` over a point and return the updated record.
    ///
    /// Fails with [`GridError::InvalidOperation`] if the patch sets `id`, in
    /// which case nothing is written. A patch that changes `x` or `y`
    /// relocates the point exactly like [`PositionalDB::move_point`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use blockgrid::{Config, Patch, PointRecord, PositionalDB, Schema};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let schema = Schema::parse("hp INTEGER")?;
    /// let mut db = PositionalDB::memory_with_config(Config::with_schema(schema))?;
    /// let id = db.add(PointRecord::new(1.0, 1.0).with_field("hp", 10))?;
    ///
    /// let edited = db.edit(&id, Patch::new().set("hp", 4).x(50.0), None)?;
    /// assert_eq!(edited.position(), (50.0, 1.0));
    /// assert_eq!(edited.get("hp").and_then(|v| v.as_i64()), Some(4));
    /// # Ok(())
    /// # }
    /// ```
    pub fn edit(&mut self, id: &str, patch: Patch, at: Option<(f64, f64)>) -> Result<PointRecord> {
        self.ensure_open()?;
        if patch.get("id").is_some() {
            return Err(GridError::InvalidOperation(format!(
                "cannot edit id of point {}",
                id
            )));
        }

        let (from, current) = self.resolve(id, at)?;
        let updated = patch.merge(&current, &self.config.schema)?;
        self.store_updated(from, updated)
    }

    /// Edit a point using the record's own coordinates as the location.
    pub fn edit_record(&mut self, record: &PointRecord, patch: Patch) -> Result<PointRecord> {
        self.edit(record.id(), patch, Some(record.position()))
    }

    /// Find the block holding `id` and its current record.
    fn resolve(&self, id: &str, at: Option<(f64, f64)>) -> Result<(BlockId, PointRecord)> {
        match at {
            Some((x, y)) => {
                check_coordinates(x, y)?;
                let block = self.index.find_table(x, y);
                self.store
                    .select_by_id(block, id)?
                    .map(|record| (block, record))
                    .ok_or_else(|| GridError::not_found(id))
            }
            None => self
                .store
                .locate(id)?
                .ok_or_else(|| GridError::not_found(id)),
        }
    }

    /// Write back an updated record that currently lives in `from`.
    fn store_updated(&mut self, from: BlockId, updated: PointRecord) -> Result<PointRecord> {
        let to = self.index.find_table(updated.x(), updated.y());

        if from == to {
            self.store.replace(to, updated.clone())?;
        } else {
            self.store.relocate(from, to, updated.clone())?;
        }
        Ok(updated)
    }
}
