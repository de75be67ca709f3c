//! Built-in dataset used when no `--data` file is given.

use std::path::Path;

use ormq_core::{model, Database, ExecutorConfig};
use tracing::info;

use crate::executor::ExecuteError;

/// Two teams with two members each, plus one member without a team.
pub const DEMO_DATASET: &str = r#"{
  "Team": [
    {"id": 1, "name": "teamA"},
    {"id": 2, "name": "teamB"}
  ],
  "Member": [
    {"id": 1, "username": "member1", "age": 10, "team": 1},
    {"id": 2, "username": "member2", "age": 20, "team": 1},
    {"id": 3, "username": "member3", "age": 30, "team": 2},
    {"id": 4, "username": "member4", "age": 40, "team": 2},
    {"id": 5, "username": null, "age": 50, "team": null}
  ]
}"#;

/// Open the dataset at `path`, or the built-in one.
pub fn open_database(path: Option<&Path>, config: ExecutorConfig) -> Result<Database, ExecuteError> {
    let db = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|source| ExecuteError::Io {
                path: path.display().to_string(),
                source,
            })?;
            Database::from_json(model::catalog(), &json)?
        }
        None => Database::from_json(model::catalog(), DEMO_DATASET)?,
    };

    let snapshot = db.snapshot();
    info!(
        source = %path.map(|p| p.display().to_string()).unwrap_or_else(|| "built-in".into()),
        rows = snapshot.tables().total_rows(),
        "Dataset loaded"
    );
    Ok(db.with_config(config))
}
