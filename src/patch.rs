//! Partial updates for point records.

use crate::error::{GridError, Result};
use blockgrid_types::point::PointRecord;
use blockgrid_types::schema::Schema;
use blockgrid_types::value::FieldValue;
use std::collections::BTreeMap;

/// A set of field overwrites applied with shallow-merge semantics.
///
/// Merging a patch over a record yields `{...record, ...patch}`: every field
/// named in the patch replaces the record's value, everything else is kept.
/// `x` and `y` address the position; `id` may never be patched.
///
/// # Examples
///
/// ```rust
/// use blockgrid::Patch;
///
/// let patch = Patch::new().set("label", "moved").position(40.0, 45.0);
/// assert!(patch.changes_position());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    fields: BTreeMap<String, FieldValue>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite `name` with `value`.
    pub fn set<S: Into<String>, V: Into<FieldValue>>(mut self, name: S, value: V) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn x(self, x: f64) -> Self {
        self.set("x", x)
    }

    pub fn y(self, y: f64) -> Self {
        self.set("y", y)
    }

    pub fn position(self, x: f64, y: f64) -> Self {
        self.x(x).y(y)
    }

    /// Build a patch from a JSON object.
    ///
    /// Numbers become `Integer` when they fit an `i64` and `Real` otherwise;
    /// arrays of byte-sized integers become `Blob`.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| GridError::InvalidInput("Patch must be a JSON object".into()))?;

        let mut patch = Self::new();
        for (name, value) in object {
            patch.fields.insert(name.clone(), json_to_value(name, value)?);
        }
        Ok(patch)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn changes_position(&self) -> bool {
        self.fields.contains_key("x") || self.fields.contains_key("y")
    }

    /// Merge this patch over `current`, validating against `schema`.
    pub(crate) fn merge(&self, current: &PointRecord, schema: &Schema) -> Result<PointRecord> {
        if self.fields.contains_key("id") {
            return Err(GridError::InvalidOperation(format!(
                "cannot edit id of point {}",
                current.id()
            )));
        }

        let x = self.coordinate("x", current.x())?;
        let y = self.coordinate("y", current.y())?;
        let mut merged = current.clone().with_position(x, y);

        for (name, value) in &self.fields {
            if name == "x" || name == "y" {
                continue;
            }
            let value = schema
                .check_value(name, value.clone())
                .map_err(GridError::SchemaViolation)?;
            merged.set(name.clone(), value);
        }

        Ok(merged)
    }

    fn coordinate(&self, name: &str, current: f64) -> Result<f64> {
        let Some(value) = self.fields.get(name) else {
            return Ok(current);
        };
        match value.as_f64() {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(GridError::InvalidInput(format!(
                "Coordinate '{}' must be a finite number, got {}",
                name, value
            ))),
        }
    }
}

fn json_to_value(name: &str, value: &serde_json::Value) -> Result<FieldValue> {
    use serde_json::Value;

    match value {
        Value::Null => Ok(FieldValue::Null),
        Value::Bool(b) => Ok(FieldValue::Boolean(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(FieldValue::Integer)
            .or_else(|| n.as_f64().map(FieldValue::Real))
            .ok_or_else(|| {
                GridError::InvalidInput(format!("Field '{}' has an unrepresentable number", name))
            }),
        Value::String(s) => Ok(FieldValue::Text(s.clone())),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect::<Option<Vec<u8>>>()
            .map(FieldValue::Blob)
            .ok_or_else(|| {
                GridError::InvalidInput(format!("Field '{}' must be an array of bytes", name))
            }),
        Value::Object(_) => Err(GridError::InvalidInput(format!(
            "Field '{}' cannot hold a nested object",
            name
        ))),
    }
}
