use crate::value::{FieldType, FieldValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Names every record carries outside the declared schema.
pub const RESERVED_FIELDS: [&str; 3] = ["id", "x", "y"];

/// One declared extension field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
}

impl FieldDef {
    pub fn new<S: Into<String>>(name: S, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Ordered list of extension fields appended to every point record.
///
/// The schema is fixed for the lifetime of a store; all points managed by
/// one store share it.
///
/// # Examples
///
/// ```
/// use blockgrid_types::schema::Schema;
/// use blockgrid_types::value::FieldType;
///
/// let schema = Schema::parse("label TEXT, weight REAL").unwrap();
/// assert_eq!(schema.len(), 2);
/// assert_eq!(schema.field("weight").unwrap().ty, FieldType::Real);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: Vec<FieldDef>,
}

impl Schema {
    /// Build a schema from field definitions, validating names.
    pub fn new(fields: Vec<FieldDef>) -> Result<Self, String> {
        let schema = Self { fields };
        schema.validate()?;
        Ok(schema)
    }

    /// A schema with no extension fields.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a column declaration list such as `"name TEXT, hp INTEGER"`.
    ///
    /// Empty input yields an empty schema.
    pub fn parse(declaration: &str) -> Result<Self, String> {
        let mut fields = Vec::new();

        for column in declaration.split(',') {
            let column = column.trim();
            if column.is_empty() {
                continue;
            }

            let mut parts = column.split_whitespace();
            let name = parts
                .next()
                .ok_or_else(|| format!("Missing field name in '{}'", column))?;
            let ty_name = parts
                .next()
                .ok_or_else(|| format!("Missing type for field '{}'", name))?;
            if parts.next().is_some() {
                return Err(format!(
                    "Unexpected tokens after type in column '{}'",
                    column
                ));
            }

            let ty = FieldType::parse(ty_name)
                .ok_or_else(|| format!("Unknown type '{}' for field '{}'", ty_name, name))?;
            fields.push(FieldDef::new(name, ty));
        }

        Self::new(fields)
    }

    /// Check that names are non-empty, unique and not reserved.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::with_capacity(self.fields.len());

        for field in &self.fields {
            if field.name.is_empty() {
                return Err("Field name cannot be empty".to_string());
            }
            if RESERVED_FIELDS.contains(&field.name.as_str()) {
                return Err(format!("Field name '{}' is reserved", field.name));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(format!("Duplicate field name '{}'", field.name));
            }
        }

        Ok(())
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate a single value against its declared field, returning the
    /// value in stored form.
    pub fn check_value(&self, name: &str, value: FieldValue) -> Result<FieldValue, String> {
        let def = self
            .field(name)
            .ok_or_else(|| format!("Field '{}' is not declared in the schema", name))?;

        if !def.ty.accepts(&value) {
            return Err(format!(
                "Field '{}' expects {} but got {}",
                name,
                def.ty,
                value
                    .field_type()
                    .map_or_else(|| "NULL".to_string(), |t| t.to_string())
            ));
        }

        Ok(value.coerce_to(def.ty))
    }

    /// Bring an attribute map in line with the schema.
    ///
    /// Unknown names and mistyped values are rejected; declared fields that
    /// are missing are filled with `Null`.
    pub fn conform(&self, attributes: &mut BTreeMap<String, FieldValue>) -> Result<(), String> {
        let mut conformed = BTreeMap::new();

        for (name, value) in attributes.iter() {
            let value = self.check_value(name, value.clone())?;
            conformed.insert(name.clone(), value);
        }

        for field in &self.fields {
            conformed.entry(field.name.clone()).or_default();
        }

        *attributes = conformed;
        Ok(())
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", field.name, field.ty)?;
        }
        Ok(())
    }
}
