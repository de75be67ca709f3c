//! Snapshot-isolated database handle.

use std::sync::Arc;

use ormq_proto::EntityRow;
use parking_lot::RwLock;
use tracing::debug;

use crate::catalog::Catalog;
use crate::config::ExecutorConfig;
use crate::error::Result;
use crate::model::Entity;
use crate::query::QueryExecutor;

use super::{load_dataset, TableSet};

/// A catalog plus the current table set.
///
/// Writers copy the table set on write; readers execute against a
/// [`Snapshot`] that never changes underneath them.
pub struct Database {
    catalog: Arc<Catalog>,
    tables: RwLock<Arc<TableSet>>,
    config: ExecutorConfig,
}

impl Database {
    /// Create an empty database.
    pub fn new(catalog: Catalog) -> Self {
        Self::with_tables(catalog, TableSet::new())
    }

    /// Create a database over existing tables.
    pub fn with_tables(catalog: Catalog, tables: TableSet) -> Self {
        Self {
            catalog: Arc::new(catalog),
            tables: RwLock::new(Arc::new(tables)),
            config: ExecutorConfig::default(),
        }
    }

    /// Create a database from a JSON dataset.
    pub fn from_json(catalog: Catalog, json: &str) -> Result<Self> {
        let tables = load_dataset(&catalog, json)?;
        Ok(Self::with_tables(catalog, tables))
    }

    /// Set the executor configuration used by snapshots.
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Get the executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Take a consistent read view.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            catalog: Arc::clone(&self.catalog),
            tables: Arc::clone(&*self.tables.read()),
            config: self.config.clone(),
        }
    }

    /// Insert an untyped row.
    pub fn insert_row(&self, entity: &str, row: EntityRow) -> Result<()> {
        let id = row.id;
        let mut tables = self.tables.write();
        Arc::make_mut(&mut *tables).insert(&self.catalog, entity, row)?;
        debug!(entity = %entity, id, "Inserted row");
        Ok(())
    }

    /// Insert a typed entity.
    pub fn insert<E: Entity>(&self, entity: &E) -> Result<()> {
        self.insert_row(E::NAME, entity.to_row())
    }
}

/// An immutable view of a database at one point in time.
#[derive(Clone)]
pub struct Snapshot {
    catalog: Arc<Catalog>,
    tables: Arc<TableSet>,
    config: ExecutorConfig,
}

impl Snapshot {
    /// Get the catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Get the table set.
    pub fn tables(&self) -> &TableSet {
        &self.tables
    }

    /// Create an executor over this snapshot.
    pub fn executor(&self) -> QueryExecutor<'_> {
        QueryExecutor::new(&self.catalog, &self.tables).with_config(self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{self, Member, Team};

    #[test]
    fn test_snapshot_isolation() {
        let db = Database::new(model::catalog());
        db.insert(&Team::new(1, "teamA")).unwrap();
        db.insert(&Member::new(1, "member1", 10, Some(1))).unwrap();

        let before = db.snapshot();
        db.insert(&Member::new(2, "member2", 20, Some(1))).unwrap();
        let after = db.snapshot();

        assert_eq!(before.tables().len("Member"), 1);
        assert_eq!(after.tables().len("Member"), 2);
    }

    #[test]
    fn test_failed_insert_leaves_tables_unchanged() {
        let db = Database::new(model::catalog());
        db.insert(&Team::new(1, "teamA")).unwrap();
        assert!(db.insert(&Team::new(1, "teamB")).is_err());

        let snapshot = db.snapshot();
        assert_eq!(snapshot.tables().len("Team"), 1);
        assert_eq!(
            snapshot.tables().rows("Team")[0].get("name"),
            Some(&ormq_proto::Value::String("teamA".into()))
        );
    }
}
