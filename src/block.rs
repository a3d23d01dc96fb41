//! Grid math: mapping coordinates to the blocks that own them.
//!
//! The plane is tiled by square cells of side `block_size`. Cell indices are
//! computed with floor division, so a cell always spans
//! `[ix * size, (ix + 1) * size)` on each axis, negative coordinates included.

use crate::error::{GridError, Result};
use geo::{Rect, coord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one grid block, in cell units.
///
/// This is the key of a block's storage unit. Its display form
/// (`xp1yn2` for cell `(1, -2)`) is injective: signs are spelled out so that
/// no two cells share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId {
    pub ix: i64,
    pub iy: i64,
}

impl BlockId {
    pub const fn new(ix: i64, iy: i64) -> Self {
        Self { ix, iy }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = |v: i64| if v < 0 { 'n' } else { 'p' };
        write!(
            f,
            "x{}{}y{}{}",
            sign(self.ix),
            self.ix.unsigned_abs(),
            sign(self.iy),
            self.iy.unsigned_abs()
        )
    }
}

/// Parses the display form back, e.g. `"xp1yn2"` to cell `(1, -2)`.
///
/// Only canonical names are accepted: `n0` and leading zeros are rejected, so
/// every block has exactly one name.
impl FromStr for BlockId {
    type Err = GridError;

    fn from_str(name: &str) -> Result<Self> {
        let invalid = || GridError::InvalidInput(format!("Invalid block name '{}'", name));

        let rest = name.strip_prefix('x').ok_or_else(invalid)?;
        let split = rest.find('y').ok_or_else(invalid)?;
        let (x_part, y_part) = (&rest[..split], &rest[split + 1..]);

        let ix = parse_signed(x_part).ok_or_else(invalid)?;
        let iy = parse_signed(y_part).ok_or_else(invalid)?;
        Ok(BlockId::new(ix, iy))
    }
}

fn parse_signed(part: &str) -> Option<i64> {
    let (negative, digits) = match part.split_at_checked(1)? {
        ("p", digits) => (false, digits),
        ("n", digits) => (true, digits),
        _ => return None,
    };
    if digits.is_empty()
        || !digits.bytes().all(|b| b.is_ascii_digit())
        || (digits.len() > 1 && digits.starts_with('0'))
    {
        return None;
    }

    let magnitude: i128 = digits.parse().ok()?;
    if negative && magnitude == 0 {
        return None;
    }
    i64::try_from(if negative { -magnitude } else { magnitude }).ok()
}

const CORNER_TOLERANCE: f64 = 1e-9;

/// Pure coordinate-to-block mapping for a fixed block size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockIndex {
    block_size: f64,
}

impl BlockIndex {
    pub const DEFAULT_BLOCK_SIZE: f64 = 20.0;

    /// Create an index for `block_size`, which must be positive and finite.
    pub fn new(block_size: f64) -> Result<Self> {
        if !block_size.is_finite() || block_size <= 0.0 {
            return Err(GridError::InvalidConfig(format!(
                "Block size must be positive and finite, got {}",
                block_size
            )));
        }
        Ok(Self { block_size })
    }

    pub fn block_size(&self) -> f64 {
        self.block_size
    }

    /// Grid-aligned lower-left corner of the block containing `(x, y)`.
    pub fn find_block(&self, x: f64, y: f64) -> (f64, f64) {
        self.origin(self.find_table(x, y))
    }

    /// Identifier of the block whose aligned corner is `(block_x, block_y)`.
    ///
    /// Corners produced by [`BlockIndex::find_block`] map back exactly despite
    /// float error. A coordinate that is not a corner maps to the block
    /// containing it, same as [`BlockIndex::find_table`].
    pub fn block_key(&self, block_x: f64, block_y: f64) -> BlockId {
        BlockId::new(self.corner_cell(block_x), self.corner_cell(block_y))
    }

    /// Identifier of the block containing `(x, y)`.
    pub fn find_table(&self, x: f64, y: f64) -> BlockId {
        BlockId::new(self.cell(x), self.cell(y))
    }

    /// Lower-left corner of a block.
    pub fn origin(&self, block: BlockId) -> (f64, f64) {
        (
            block.ix as f64 * self.block_size,
            block.iy as f64 * self.block_size,
        )
    }

    /// The square a block covers.
    pub fn footprint(&self, block: BlockId) -> Rect<f64> {
        let (x, y) = self.origin(block);
        Rect::new(
            coord! { x: x, y: y },
            coord! { x: x + self.block_size, y: y + self.block_size },
        )
    }

    /// Inclusive range of blocks overlapping `rect`.
    pub fn range(&self, rect: &Rect<f64>) -> BlockRange {
        BlockRange {
            lower: self.find_table(rect.min().x, rect.min().y),
            upper: self.find_table(rect.max().x, rect.max().y),
        }
    }

    // Saturates for coordinates beyond the i64 cell range.
    fn cell(&self, v: f64) -> i64 {
        (v / self.block_size).floor() as i64
    }

    // Snaps to the nearest cell index only when within float error of it.
    fn corner_cell(&self, v: f64) -> i64 {
        let q = v / self.block_size;
        let nearest = q.round();
        if (q - nearest).abs() <= CORNER_TOLERANCE * nearest.abs().max(1.0) {
            nearest as i64
        } else {
            q.floor() as i64
        }
    }
}

impl Default for BlockIndex {
    fn default() -> Self {
        Self {
            block_size: Self::DEFAULT_BLOCK_SIZE,
        }
    }
}

/// Inclusive rectangle of block ids, `lower` to `upper` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub lower: BlockId,
    pub upper: BlockId,
}

impl BlockRange {
    pub fn contains(&self, block: BlockId) -> bool {
        (self.lower.ix..=self.upper.ix).contains(&block.ix)
            && (self.lower.iy..=self.upper.iy).contains(&block.iy)
    }

    /// Strictly inside the range on every side.
    ///
    /// When the range was computed from a query rectangle, every point of an
    /// interior block lies inside that rectangle.
    pub fn is_interior(&self, block: BlockId) -> bool {
        block.ix > self.lower.ix
            && block.ix < self.upper.ix
            && block.iy > self.lower.iy
            && block.iy < self.upper.iy
    }

    /// Number of blocks in the range.
    pub fn len(&self) -> u128 {
        let w = (self.upper.ix as i128 - self.lower.ix as i128 + 1).max(0) as u128;
        let h = (self.upper.iy as i128 - self.lower.iy as i128 + 1).max(0) as u128;
        w * h
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major iteration over every block id in the range.
    pub fn iter(&self) -> impl Iterator<Item = BlockId> + '_ {
        (self.lower.iy..=self.upper.iy).flat_map(move |iy| {
            (self.lower.ix..=self.upper.ix).map(move |ix| BlockId::new(ix, iy))
        })
    }
}
