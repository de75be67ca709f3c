//! In-memory catalog of entities and relations.

use std::collections::HashMap;

use super::{EntityDef, FieldDef, RelationDef};
use crate::error::Error;

/// The catalog of entity and relation metadata.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entities: HashMap<String, EntityDef>,
    relations: Vec<RelationDef>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Add a relation.
    ///
    /// A relation with the same source entity and name replaces the old one.
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations
            .retain(|r| !(r.from_entity == relation.from_entity && r.name == relation.name));
        self.relations.push(relation);
        self
    }

    /// Get an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Get a relation by source entity and relation name.
    pub fn get_relation(&self, from_entity: &str, name: &str) -> Option<&RelationDef> {
        self.relations
            .iter()
            .find(|r| r.from_entity == from_entity && r.name == name)
    }

    /// Get all relations navigable from an entity.
    pub fn relations_from(&self, entity: &str) -> Vec<&RelationDef> {
        self.relations
            .iter()
            .filter(|r| r.from_entity == entity)
            .collect()
    }

    /// List entity names, sorted.
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve an entity, failing with `InvalidPlan`.
    pub fn entity(&self, name: &str) -> Result<&EntityDef, Error> {
        self.get_entity(name)
            .ok_or_else(|| Error::InvalidPlan(format!("unknown entity '{}'", name)))
    }

    /// Resolve a field of an entity, failing with `InvalidPlan`.
    pub fn field(&self, entity: &str, field: &str) -> Result<&FieldDef, Error> {
        self.entity(entity)?.get_field(field).ok_or_else(|| {
            Error::InvalidPlan(format!("entity '{}' has no field '{}'", entity, field))
        })
    }

    /// Resolve a relation, failing with `InvalidPlan`.
    pub fn relation(&self, from_entity: &str, name: &str) -> Result<&RelationDef, Error> {
        self.get_relation(from_entity, name).ok_or_else(|| {
            Error::InvalidPlan(format!(
                "entity '{}' has no relation '{}'",
                from_entity, name
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ScalarType;

    fn sample_catalog() -> Catalog {
        let team = EntityDef::new("Team", "id")
            .with_field(FieldDef::scalar("id", ScalarType::Int64))
            .with_field(FieldDef::scalar("name", ScalarType::String));
        let member = EntityDef::new("Member", "id")
            .with_field(FieldDef::scalar("id", ScalarType::Int64))
            .with_field(FieldDef::optional_scalar("team", ScalarType::Int64));
        let rel = RelationDef::many_to_one("team", "Member", "team", "Team", "id");

        Catalog::new()
            .with_entity(team)
            .with_entity(member)
            .with_relation(rel.inverse("members"))
            .with_relation(rel)
    }

    #[test]
    fn test_lookups() {
        let catalog = sample_catalog();
        assert_eq!(catalog.entity_names(), vec!["Member", "Team"]);
        assert!(catalog.entity("Team").is_ok());
        assert!(catalog.field("Member", "team").is_ok());
        assert_eq!(catalog.relation("Team", "members").unwrap().to_entity, "Member");
        assert_eq!(catalog.relations_from("Member").len(), 1);
    }

    #[test]
    fn test_unknown_names_are_invalid_plan() {
        let catalog = sample_catalog();
        assert!(matches!(catalog.entity("Player"), Err(Error::InvalidPlan(_))));
        assert!(matches!(catalog.field("Team", "age"), Err(Error::InvalidPlan(_))));
        assert!(matches!(
            catalog.relation("Member", "members"),
            Err(Error::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_relation_replaced_by_name() {
        let catalog = sample_catalog()
            .with_relation(RelationDef::many_to_one("team", "Member", "id", "Team", "id"));
        assert_eq!(catalog.relations_from("Member").len(), 1);
        assert_eq!(catalog.relation("Member", "team").unwrap().from_field, "id");
    }
}
