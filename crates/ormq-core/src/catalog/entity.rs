//! Entity definitions.

use super::field::FieldDef;
use serde::{Deserialize, Serialize};

/// An entity definition (table schema).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name (unique within the catalog).
    pub name: String,
    /// Name of the identity field.
    pub identity_field: String,
    /// Field definitions, in row order.
    pub fields: Vec<FieldDef>,
}

impl EntityDef {
    /// Create a new entity definition.
    pub fn new(name: impl Into<String>, identity_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity_field: identity_field.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get the identity field definition.
    pub fn get_identity_field(&self) -> Option<&FieldDef> {
        self.get_field(&self.identity_field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ScalarType;

    #[test]
    fn test_entity_builder() {
        let entity = EntityDef::new("Member", "id")
            .with_field(FieldDef::scalar("id", ScalarType::Int64))
            .with_field(FieldDef::optional_scalar("username", ScalarType::String))
            .with_field(FieldDef::scalar("age", ScalarType::Int32));

        assert_eq!(entity.name, "Member");
        assert_eq!(entity.fields.len(), 3);
        assert!(entity.get_identity_field().is_some());
        assert!(entity.get_field("username").is_some_and(FieldDef::is_nullable));
        assert!(entity.get_field("nonexistent").is_none());
    }
}
