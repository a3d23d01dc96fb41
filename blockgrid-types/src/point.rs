use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A point entity: immutable identity, a position and extension attributes.
///
/// The identity is assigned once by [`PointRecord::new`] and never changes.
/// Records are transient values; the store holds the only durable copy.
///
/// # Examples
///
/// ```
/// use blockgrid_types::point::PointRecord;
///
/// let record = PointRecord::new(12.5, -3.0).with_field("kind", "beacon");
/// assert_eq!(record.position(), (12.5, -3.0));
/// assert_eq!(record.get("kind").and_then(|v| v.as_str()), Some("beacon"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    id: String,
    x: f64,
    y: f64,
    #[serde(default)]
    attributes: BTreeMap<String, FieldValue>,
}

impl PointRecord {
    /// Create a record at `(x, y)` with a fresh random identity.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            x,
            y,
            attributes: BTreeMap::new(),
        }
    }

    /// Set an extension attribute, builder style.
    pub fn with_field<S: Into<String>, V: Into<FieldValue>>(mut self, name: S, value: V) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Copy of this record at a new position, identity unchanged.
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.attributes.get(name)
    }

    pub fn set<S: Into<String>, V: Into<FieldValue>>(&mut self, name: S, value: V) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn attributes(&self) -> &BTreeMap<String, FieldValue> {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut BTreeMap<String, FieldValue> {
        &mut self.attributes
    }

    /// Squared euclidean distance to `(x, y)`.
    pub fn distance_sq(&self, x: f64, y: f64) -> f64 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }
}
