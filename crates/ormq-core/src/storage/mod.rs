//! In-memory row storage.
//!
//! Rows live in a [`TableSet`], an immutable-once-shared map from entity name
//! to ordered rows. [`Database`] keeps the current table set behind a lock and
//! hands out snapshots for query execution.

mod database;
mod dataset;
mod table;

pub use database::{Database, Snapshot};
pub use dataset::load_dataset;
pub use table::TableSet;
