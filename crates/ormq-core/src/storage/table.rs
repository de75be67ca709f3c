//! Entity tables.

use std::collections::HashMap;

use ormq_proto::{EntityRow, Value};

use crate::catalog::Catalog;
use crate::error::{Error, Result};

/// Rows of every entity, keyed by entity name, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    tables: HashMap<String, Vec<EntityRow>>,
}

impl TableSet {
    /// Create an empty table set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows of an entity, in insertion order. Unknown entities have no rows.
    pub fn rows(&self, entity: &str) -> &[EntityRow] {
        self.tables.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of rows stored for an entity.
    pub fn len(&self, entity: &str) -> usize {
        self.rows(entity).len()
    }

    /// Total number of rows across all entities.
    pub fn total_rows(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    /// Whether no rows are stored at all.
    pub fn is_empty(&self) -> bool {
        self.total_rows() == 0
    }

    /// Insert a row after checking it against the catalog.
    ///
    /// The stored row has every catalog field, in catalog order. Missing
    /// nullable fields become null.
    pub fn insert(&mut self, catalog: &Catalog, entity: &str, row: EntityRow) -> Result<()> {
        let def = catalog
            .get_entity(entity)
            .ok_or_else(|| Error::Dataset(format!("unknown entity '{}'", entity)))?;

        for (name, _) in &row.fields {
            if def.get_field(name).is_none() {
                return Err(Error::Dataset(format!(
                    "entity '{}' has no field '{}'",
                    entity, name
                )));
            }
        }

        let mut fields = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            let value = if field.name == def.identity_field {
                match row.get(&field.name) {
                    Some(v) if v.as_i64() != Some(row.id) => {
                        return Err(Error::Dataset(format!(
                            "{} row {} has mismatched identity {}",
                            entity, row.id, v
                        )));
                    }
                    _ => Value::Int64(row.id),
                }
            } else {
                row.get(&field.name).cloned().unwrap_or(Value::Null)
            };

            if !field.field_type.accepts(&value) {
                return Err(Error::Dataset(format!(
                    "{}.{} of row {} cannot hold {} ({})",
                    entity,
                    field.name,
                    row.id,
                    value,
                    value.type_name()
                )));
            }
            fields.push((field.name.clone(), value));
        }

        let table = self.tables.entry(entity.to_string()).or_default();
        if table.iter().any(|r| r.id == row.id) {
            return Err(Error::Dataset(format!(
                "duplicate {} identity {}",
                entity, row.id
            )));
        }
        table.push(EntityRow { id: row.id, fields });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model;

    #[test]
    fn test_insert_normalizes_rows() {
        let catalog = model::catalog();
        let mut tables = TableSet::new();
        tables
            .insert(&catalog, "Member", EntityRow::new(1).with_field("age", 10))
            .unwrap();

        let row = &tables.rows("Member")[0];
        let names: Vec<&str> = row.fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["id", "username", "age", "team"]);
        assert_eq!(row.get("username"), Some(&Value::Null));
        assert_eq!(row.get("id"), Some(&Value::Int64(1)));
        assert_eq!(tables.len("Member"), 1);
        assert!(tables.rows("Team").is_empty());
    }

    #[test]
    fn test_insert_rejects_bad_rows() {
        let catalog = model::catalog();
        let mut tables = TableSet::new();

        let missing_required = EntityRow::new(1).with_field("username", "member1");
        assert!(matches!(
            tables.insert(&catalog, "Member", missing_required),
            Err(Error::Dataset(_))
        ));

        let wrong_type = EntityRow::new(1).with_field("age", "ten");
        assert!(tables.insert(&catalog, "Member", wrong_type).is_err());

        let unknown_field = EntityRow::new(1).with_field("age", 1).with_field("email", "x");
        assert!(tables.insert(&catalog, "Member", unknown_field).is_err());

        assert!(tables.insert(&catalog, "Player", EntityRow::new(1)).is_err());

        let ok = EntityRow::new(1).with_field("name", "teamA");
        tables.insert(&catalog, "Team", ok.clone()).unwrap();
        assert!(matches!(
            tables.insert(&catalog, "Team", ok),
            Err(Error::Dataset(_))
        ));
        assert!(!tables.is_empty());
    }
}
