//! # blockgrid-types
//!
//! Record and schema types shared by the blockgrid positional store.
//!
//! - **Values**: `FieldValue`, `FieldType`
//! - **Schema**: `FieldDef`, `Schema` (the declared extension fields of a store)
//! - **Records**: `PointRecord` (identity, position and extension attributes)
//!
//! All types are serializable with Serde.
//!
//! ## Examples
//!
//! ```rust
//! use blockgrid_types::point::PointRecord;
//! use blockgrid_types::schema::Schema;
//!
//! let schema = Schema::parse("name TEXT, hp INTEGER").unwrap();
//! let mut record = PointRecord::new(25.0, 25.0).with_field("name", "tree");
//! schema.conform(record.attributes_mut()).unwrap();
//!
//! assert_eq!(record.get("hp"), Some(&blockgrid_types::value::FieldValue::Null));
//! ```

pub mod point;
pub mod schema;
pub mod value;

pub use point::PointRecord;
pub use schema::{FieldDef, Schema};
pub use value::{FieldType, FieldValue};
