//! Schema catalog.
//!
//! The catalog describes entities, their fields and the relations joins can
//! follow. It is the runtime field registry the planner resolves plans
//! against.

mod catalog;
mod entity;
mod field;
mod relation;
mod types;

pub use catalog::Catalog;
pub use entity::EntityDef;
pub use field::FieldDef;
pub use relation::{Cardinality, RelationDef};
pub use types::{FieldType, ScalarType};
