//! Relation definitions between entities.

use serde::{Deserialize, Serialize};

/// Cardinality of a relation, seen from its source entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    /// Each source row references at most one target (foreign key on source).
    ManyToOne,
    /// Each source row is referenced by any number of targets.
    OneToMany,
}

/// A named, navigable relation from one entity to another.
///
/// Joining along a relation pairs a source row with every target row where
/// `target[to_field] == source[from_field]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relation name, unique per source entity.
    pub name: String,
    /// Source entity name.
    pub from_entity: String,
    /// Target entity name.
    pub to_entity: String,
    /// Relation cardinality.
    pub cardinality: Cardinality,
    /// Key field on the source entity.
    pub from_field: String,
    /// Key field on the target entity.
    pub to_field: String,
}

impl RelationDef {
    /// Create a many-to-one relation (a stored reference).
    pub fn many_to_one(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_field: impl Into<String>,
        to_entity: impl Into<String>,
        to_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.into(),
            to_entity: to_entity.into(),
            cardinality: Cardinality::ManyToOne,
            from_field: from_field.into(),
            to_field: to_field.into(),
        }
    }

    /// Get the inverse relation (swapping from/to).
    pub fn inverse(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            from_entity: self.to_entity.clone(),
            to_entity: self.from_entity.clone(),
            cardinality: match self.cardinality {
                Cardinality::ManyToOne => Cardinality::OneToMany,
                Cardinality::OneToMany => Cardinality::ManyToOne,
            },
            from_field: self.to_field.clone(),
            to_field: self.from_field.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_many_to_one_relation() {
        let rel = RelationDef::many_to_one("team", "Member", "team", "Team", "id");
        assert_eq!(rel.cardinality, Cardinality::ManyToOne);
        assert_eq!(rel.from_entity, "Member");
        assert_eq!(rel.to_entity, "Team");
    }

    #[test]
    fn test_inverse_relation() {
        let rel = RelationDef::many_to_one("team", "Member", "team", "Team", "id");
        let inverse = rel.inverse("members");

        assert_eq!(inverse.from_entity, "Team");
        assert_eq!(inverse.to_entity, "Member");
        assert_eq!(inverse.from_field, "id");
        assert_eq!(inverse.to_field, "team");
        assert_eq!(inverse.cardinality, Cardinality::OneToMany);
    }
}
