//! Spatial queries: rectangle, radius, per-block and whole-store reads.

use super::{PositionalDB, check_coordinates};
use crate::block::{BlockId, BlockRange};
use crate::error::{GridError, Result};
use blockgrid_types::point::PointRecord;
use geo::{Rect, coord};

impl PositionalDB {
    /// Points inside the axis-aligned rectangle spanned by `(x, y)` and
    /// `(x + width, y + height)`, edges included.
    ///
    /// Negative extents span the other way. Blocks strictly inside the
    /// rectangle's block range are returned without filtering; blocks on its
    /// perimeter are filtered point by point. Results are unordered.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use blockgrid::{PointRecord, PositionalDB};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut db = PositionalDB::memory()?;
    /// db.add(PointRecord::new(25.0, 25.0))?;
    /// db.add(PointRecord::new(5.0, 5.0))?;
    /// db.add(PointRecord::new(35.0, 5.0))?;
    ///
    /// assert_eq!(db.within_rect(0.0, 0.0, 30.0, 30.0)?.len(), 3);
    /// assert_eq!(db.within_rect(0.0, 0.0, 30.0, 4.0)?.len(), 0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn within_rect(
        &self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<Vec<PointRecord>> {
        self.ensure_open()?;
        let rect = query_rect(x, y, width, height)?;
        let range = self.index.range(&rect);

        let mut results = Vec::new();
        for block in self.candidate_blocks(&range)? {
            if range.is_interior(block) {
                results.extend(self.store.select_all(block)?);
            } else {
                results.extend(self.store.select_where(block, |p| rect_contains(&rect, p))?);
            }
        }
        Ok(results)
    }

    /// Points whose Euclidean distance from `(x, y)` is at most `radius`.
    ///
    /// Every block overlapping the circle's bounding square is filtered with
    /// `dx² + dy² <= radius²`. A negative or non-finite radius is rejected.
    pub fn within_radius(&self, x: f64, y: f64, radius: f64) -> Result<Vec<PointRecord>> {
        self.ensure_open()?;
        check_query(x, y)?;
        if !radius.is_finite() || radius < 0.0 {
            log::warn!("Rejected radius query with radius {}", radius);
            return Err(GridError::InvalidInput(format!(
                "Radius must be finite and non-negative, got {}",
                radius
            )));
        }

        let bounds = Rect::new(
            coord! { x: x - radius, y: y - radius },
            coord! { x: x + radius, y: y + radius },
        );
        let range = self.index.range(&bounds);
        let radius_sq = radius * radius;

        let mut results = Vec::new();
        for block in self.candidate_blocks(&range)? {
            results.extend(
                self.store
                    .select_where(block, |p| p.distance_sq(x, y) <= radius_sq)?,
            );
        }
        Ok(results)
    }

    /// Every point in the block containing `(x, y)`.
    pub fn within_block(&self, x: f64, y: f64) -> Result<Vec<PointRecord>> {
        self.ensure_open()?;
        check_query(x, y)?;
        self.within_block_id(self.index.find_table(x, y))
    }

    /// Every point in `block`. An unoccupied block yields nothing.
    pub fn within_block_id(&self, block: BlockId) -> Result<Vec<PointRecord>> {
        self.ensure_open()?;
        self.store.select_all(block)
    }

    /// Every point in the store.
    pub fn all(&self) -> Result<Vec<PointRecord>> {
        self.ensure_open()?;
        let mut results = Vec::new();
        for block in self.store.list_existing_blocks()? {
            results.extend(self.store.select_all(block)?);
        }
        Ok(results)
    }

    pub fn count_within_rect(&self, x: f64, y: f64, width: f64, height: f64) -> Result<usize> {
        self.ensure_open()?;
        let rect = query_rect(x, y, width, height)?;
        let range = self.index.range(&rect);

        let mut count = 0;
        for block in self.candidate_blocks(&range)? {
            count += if range.is_interior(block) {
                self.store.count(block)?
            } else {
                self.store
                    .select_where(block, |p| rect_contains(&rect, p))?
                    .len()
            };
        }
        Ok(count)
    }

    pub fn count_within_radius(&self, x: f64, y: f64, radius: f64) -> Result<usize> {
        self.within_radius(x, y, radius).map(|points| points.len())
    }

    /// Occupied blocks overlapping the rectangle, in row-major order.
    pub fn blocks_in_rect(
        &self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<Vec<BlockId>> {
        self.ensure_open()?;
        let rect = query_rect(x, y, width, height)?;
        self.candidate_blocks(&self.index.range(&rect))
    }

    /// Occupied blocks inside `range`.
    ///
    /// Walks the range cell by cell unless it holds more cells than there are
    /// occupied blocks, in which case the catalog is filtered instead.
    fn candidate_blocks(&self, range: &BlockRange) -> Result<Vec<BlockId>> {
        let existing = self.store.list_existing_blocks()?;

        if range.len() > existing.len() as u128 {
            let mut blocks: Vec<BlockId> = existing
                .into_iter()
                .filter(|b| range.contains(*b))
                .collect();
            blocks.sort_by_key(|b| (b.iy, b.ix));
            return Ok(blocks);
        }

        let mut blocks = Vec::new();
        for block in range.iter() {
            if self.store.exists(block)? {
                blocks.push(block);
            }
        }
        Ok(blocks)
    }
}

fn check_query(x: f64, y: f64) -> Result<()> {
    check_coordinates(x, y).inspect_err(|_| {
        log::warn!("Rejected query at non-finite position ({}, {})", x, y);
    })
}

fn query_rect(x: f64, y: f64, width: f64, height: f64) -> Result<Rect<f64>> {
    check_query(x, y)?;
    check_query(x + width, y + height)?;
    Ok(Rect::new(
        coord! { x: x, y: y },
        coord! { x: x + width, y: y + height },
    ))
}

fn rect_contains(rect: &Rect<f64>, point: &PointRecord) -> bool {
    let (min, max) = (rect.min(), rect.max());
    (min.x..=max.x).contains(&point.x()) && (min.y..=max.y).contains(&point.y())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::collections::HashSet;

    fn ids(points: &[PointRecord]) -> HashSet<String> {
        points.iter().map(|p| p.id().to_string()).collect()
    }

    fn populated() -> (PositionalDB, Vec<PointRecord>) {
        let mut db = PositionalDB::memory().unwrap();
        let points: Vec<PointRecord> = [
            (5.0, 5.0),
            (25.0, 25.0),
            (45.0, 45.0),
            (-5.0, -5.0),
            (65.0, 5.0),
            (30.0, 30.0),
        ]
        .iter()
        .map(|&(x, y)| PointRecord::new(x, y))
        .collect();
        for p in &points {
            db.add(p.clone()).unwrap();
        }
        (db, points)
    }

    #[test]
    fn test_rect_two_blocks() {
        let mut db = PositionalDB::memory().unwrap();
        let a = PointRecord::new(25.0, 25.0);
        let b = PointRecord::new(5.0, 5.0);
        db.add(a.clone()).unwrap();
        db.add(b.clone()).unwrap();

        let found = db.within_rect(0.0, 0.0, 30.0, 30.0).unwrap();
        assert_eq!(ids(&found), ids(&[a, b]));
    }

    #[test]
    fn test_rect_edges_are_inclusive() {
        let (db, points) = populated();

        // (30, 30) sits on the top-right corner.
        let found = db.within_rect(0.0, 0.0, 30.0, 30.0).unwrap();
        assert_eq!(ids(&found), ids(&[points[0].clone(), points[1].clone(), points[5].clone()]));

        let on_edge = db.within_rect(30.0, 0.0, 10.0, 30.0).unwrap();
        assert_eq!(ids(&on_edge), ids(&[points[5].clone()]));
    }

    #[test]
    fn test_rect_negative_extent_spans_other_way() {
        let (db, _) = populated();
        let forward = db.within_rect(-10.0, -10.0, 40.0, 40.0).unwrap();
        let backward = db.within_rect(30.0, 30.0, -40.0, -40.0).unwrap();
        assert_eq!(ids(&forward), ids(&backward));
        assert_eq!(forward.len(), 4);
    }

    #[test]
    fn test_rect_interior_blocks_unfiltered() {
        let (db, points) = populated();
        // Block (1, 1) is interior to the range (0..=2, 0..=2).
        let found = db.within_rect(1.0, 1.0, 50.0, 50.0).unwrap();
        assert_eq!(
            ids(&found),
            ids(&[points[0].clone(), points[1].clone(), points[2].clone(), points[5].clone()])
        );
        assert_eq!(db.count_within_rect(1.0, 1.0, 50.0, 50.0).unwrap(), 4);
    }

    #[test]
    fn test_radius_boundary_is_inclusive() {
        let mut db = PositionalDB::memory().unwrap();
        db.add(PointRecord::new(10.0, 10.0)).unwrap();
        db.add(PointRecord::new(90.0, 10.0)).unwrap();

        assert_eq!(db.within_radius(50.0, 10.0, 40.0).unwrap().len(), 2);
        assert_eq!(db.within_radius(50.0, 10.0, 39.0).unwrap().len(), 0);
        assert_eq!(db.count_within_radius(50.0, 10.0, 41.0).unwrap(), 2);
    }

    #[test]
    fn test_radius_zero_matches_exact_position() {
        let (db, points) = populated();
        let found = db.within_radius(45.0, 45.0, 0.0).unwrap();
        assert_eq!(ids(&found), ids(&[points[2].clone()]));
    }

    #[test]
    fn test_radius_rejects_bad_input() {
        let (db, _) = populated();
        assert!(matches!(
            db.within_radius(0.0, 0.0, -1.0),
            Err(GridError::InvalidInput(_))
        ));
        assert!(matches!(
            db.within_radius(0.0, 0.0, f64::NAN),
            Err(GridError::InvalidInput(_))
        ));
        assert!(matches!(
            db.within_radius(f64::INFINITY, 0.0, 1.0),
            Err(GridError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_within_block_and_all() {
        let (db, points) = populated();

        let block = db.within_block(-1.0, -19.0).unwrap();
        assert_eq!(ids(&block), ids(&[points[3].clone()]));

        let same = db.within_block_id(BlockId::new(-1, -1)).unwrap();
        assert_eq!(ids(&same), ids(&block));

        assert!(db.within_block(500.0, 500.0).unwrap().is_empty());
        assert_eq!(ids(&db.all().unwrap()), ids(&points));
    }

    #[test]
    fn test_huge_query_uses_catalog() {
        let (db, points) = populated();
        let found = db.within_rect(-1e15, -1e15, 2e15, 2e15).unwrap();
        assert_eq!(ids(&found), ids(&points));
        assert_eq!(db.within_radius(0.0, 0.0, 1e12).unwrap().len(), points.len());
    }

    #[test]
    fn test_blocks_in_rect_lists_occupied_only() {
        let (db, _) = populated();
        let blocks = db.blocks_in_rect(-20.0, -20.0, 60.0, 30.0).unwrap();
        assert_eq!(blocks, vec![BlockId::new(-1, -1), BlockId::new(0, 0)]);
    }

    #[test]
    fn test_queries_on_empty_store() {
        let db = PositionalDB::memory_with_config(Config::default().with_block_size(0.5)).unwrap();
        assert!(db.within_rect(0.0, 0.0, 10.0, 10.0).unwrap().is_empty());
        assert!(db.within_radius(0.0, 0.0, 10.0).unwrap().is_empty());
        assert!(db.all().unwrap().is_empty());
    }
}
