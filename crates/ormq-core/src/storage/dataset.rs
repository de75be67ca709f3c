//! JSON dataset loading.
//!
//! A dataset is a JSON object mapping entity names to arrays of row objects:
//!
//! ```json
//! {"Team": [{"id": 1, "name": "teamA"}],
//!  "Member": [{"id": 1, "username": "member1", "age": 10, "team": 1}]}
//! ```
//!
//! Field values are converted according to the catalog. Rows keep the order
//! they appear in.

use ormq_proto::{EntityRow, Value};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::catalog::{Catalog, EntityDef, ScalarType};
use crate::error::{Error, Result};

use super::TableSet;

/// Parse a JSON dataset into a table set.
pub fn load_dataset(catalog: &Catalog, json: &str) -> Result<TableSet> {
    let root: JsonValue =
        serde_json::from_str(json).map_err(|e| Error::Dataset(e.to_string()))?;
    let object = root
        .as_object()
        .ok_or_else(|| Error::Dataset("dataset must be a JSON object".to_string()))?;

    let mut tables = TableSet::new();
    for (entity, rows) in object {
        let def = catalog
            .get_entity(entity)
            .ok_or_else(|| Error::Dataset(format!("unknown entity '{}'", entity)))?;
        let rows = rows
            .as_array()
            .ok_or_else(|| Error::Dataset(format!("'{}' must be an array of rows", entity)))?;

        for (index, row) in rows.iter().enumerate() {
            let row = row_from_json(def, row)
                .map_err(|e| Error::Dataset(format!("{}[{}]: {}", entity, index, e)))?;
            tables.insert(catalog, entity, row)?;
        }
        debug!(entity = %entity, rows = rows.len(), "Loaded table");
    }

    Ok(tables)
}

fn row_from_json(def: &EntityDef, json: &JsonValue) -> std::result::Result<EntityRow, String> {
    let object = json.as_object().ok_or("row must be a JSON object")?;

    let id = object
        .get(&def.identity_field)
        .and_then(JsonValue::as_i64)
        .ok_or_else(|| format!("missing integer '{}'", def.identity_field))?;

    let mut row = EntityRow::new(id);
    for (name, value) in object {
        if *name == def.identity_field {
            continue;
        }
        let field = def
            .get_field(name)
            .ok_or_else(|| format!("unknown field '{}'", name))?;
        let value = convert(field.field_type.scalar_type(), value)
            .ok_or_else(|| format!("field '{}' cannot hold {}", name, value))?;
        row.set(name.clone(), value);
    }
    Ok(row)
}

fn convert(scalar: ScalarType, json: &JsonValue) -> Option<Value> {
    if json.is_null() {
        return Some(Value::Null);
    }
    match scalar {
        ScalarType::Bool => json.as_bool().map(Value::Bool),
        ScalarType::Int32 => json
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(Value::Int32),
        ScalarType::Int64 => json.as_i64().map(Value::Int64),
        ScalarType::Float64 => json.as_f64().map(Value::Float64),
        ScalarType::String => json.as_str().map(|s| Value::String(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model;

    #[test]
    fn test_load_dataset() {
        let json = r#"{
            "Team": [{"id": 1, "name": "teamA"}, {"id": 2, "name": "teamB"}],
            "Member": [
                {"id": 1, "username": "member1", "age": 10, "team": 1},
                {"id": 2, "username": null, "age": 20},
                {"id": 3, "age": 30, "team": 2}
            ]
        }"#;
        let tables = load_dataset(&model::catalog(), json).unwrap();

        assert_eq!(tables.len("Team"), 2);
        assert_eq!(tables.len("Member"), 3);
        let second = &tables.rows("Member")[1];
        assert_eq!(second.get("username"), Some(&Value::Null));
        assert_eq!(second.get("team"), Some(&Value::Null));
        assert_eq!(second.get("age"), Some(&Value::Int32(20)));
        assert_eq!(tables.rows("Member")[2].get("team"), Some(&Value::Int64(2)));
    }

    #[test]
    fn test_load_dataset_errors() {
        let catalog = model::catalog();
        assert!(matches!(load_dataset(&catalog, "[]"), Err(Error::Dataset(_))));
        assert!(matches!(load_dataset(&catalog, "{"), Err(Error::Dataset(_))));
        assert!(load_dataset(&catalog, r#"{"Player": []}"#).is_err());
        assert!(load_dataset(&catalog, r#"{"Team": [{"name": "teamA"}]}"#).is_err());
        assert!(load_dataset(&catalog, r#"{"Team": [{"id": 1, "name": 5}]}"#).is_err());
        assert!(
            load_dataset(&catalog, r#"{"Member": [{"id": 1, "age": 99999999999}]}"#).is_err()
        );
    }
}
