//! ORMQ Core - Catalog, typed paths, and in-memory query execution.
//!
//! Queries are built from typed paths ([`model::QMember`], [`model::QTeam`]),
//! turned into a [`proto::QueryPlan`], and run by a [`QueryExecutor`] over a
//! [`storage::Snapshot`] of the database.
//!
//! ```ignore
//! use ormq_core::prelude::*;
//!
//! let db = Database::new(model::catalog());
//! let m = QMember::member();
//! let query = QueryFactory::new()
//!     .select_from(&m)
//!     .where_(m.age.between(10, 30))
//!     .order_by(m.age.desc())
//!     .build()?;
//! let members = db.snapshot().executor().fetch(&query)?;
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod path;
pub mod query;
pub mod storage;

pub use catalog::{
    Cardinality, Catalog, EntityDef, FieldDef, FieldType, RelationDef, ScalarType,
};
pub use config::ExecutorConfig;
pub use error::{Error, Result};
pub use model::{Entity, Member, QMember, QTeam, Team};
pub use path::{EntityPath, EntitySource, NumberPath, Path, RelationPath, StringPath};
pub use query::{
    FromProjection, IntoCondition, Query, QueryBuilder, QueryExecutor, QueryFactory,
};
pub use storage::{load_dataset, Database, Snapshot, TableSet};

/// Re-export protocol types.
pub use ormq_proto as proto;

/// Everything needed to build and run queries.
pub mod prelude {
    pub use crate::model::{self, Entity, Member, QMember, QTeam, Team};
    pub use crate::path::{EntitySource, Path};
    pub use crate::query::{Query, QueryExecutor, QueryFactory};
    pub use crate::storage::Database;
    pub use crate::{Error, Result};
    pub use ormq_proto::{EntityRow, Expr, ResultPage, Tuple, Value};
}
