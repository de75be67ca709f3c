//! Statement execution against a database snapshot.

use ormq_core::Database;
use ormq_lang::{parse_and_compile, Params};
use thiserror::Error;
use tracing::debug;

use crate::formatter::Formatter;

/// Errors reported by the CLI.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Parse or compile failure, already rendered against its source.
    #[error("{0}")]
    Language(String),

    /// Execution failure.
    #[error("{0}")]
    Query(#[from] ormq_core::Error),

    /// Plan serialization failure.
    #[error("{0}")]
    Plan(#[from] ormq_proto::Error),

    /// A file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs statements against one database.
pub struct StatementRunner<'a> {
    db: &'a Database,
    params: &'a Params,
    formatter: Box<dyn Formatter>,
    explain: bool,
}

impl<'a> StatementRunner<'a> {
    /// Create a runner.
    pub fn new(db: &'a Database, params: &'a Params, formatter: Box<dyn Formatter>) -> Self {
        Self {
            db,
            params,
            formatter,
            explain: false,
        }
    }

    /// Print compiled plans instead of executing them.
    pub fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    /// Compile and run one statement, returning formatted output.
    pub fn run(&self, input: &str) -> Result<String, ExecuteError> {
        let plan = parse_and_compile(input, self.params)
            .map_err(|e| ExecuteError::Language(e.format_with_source(input)))?;

        if self.explain {
            return Ok(plan.to_json()?);
        }

        let snapshot = self.db.snapshot();
        let page = snapshot.executor().execute_page(&plan)?;
        debug!(rows = page.len(), total = page.total, "Statement executed");
        Ok(self.formatter.format_page(&page))
    }
}

/// Split a script into statements on `;`, outside string literals.
///
/// Lines starting with `--`, `//` or `#` are comments. Blank statements are
/// dropped.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in script.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("--") || trimmed.starts_with("//") || trimmed.starts_with('#') {
            continue;
        }

        let mut in_string = false;
        for c in line.chars() {
            match c {
                '\'' => {
                    in_string = !in_string;
                    current.push(c);
                }
                ';' if !in_string => {
                    push_statement(&mut statements, &mut current);
                }
                _ => current.push(c),
            }
        }
        current.push('\n');
    }
    push_statement(&mut statements, &mut current);

    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::open_database;
    use crate::formatter::{create_formatter, OutputFormat};
    use ormq_core::ExecutorConfig;
    use ormq_proto::Value;
    use pretty_assertions::assert_eq;

    fn runner<'a>(db: &'a Database, params: &'a Params, format: OutputFormat) -> StatementRunner<'a> {
        StatementRunner::new(db, params, create_formatter(format))
    }

    #[test]
    fn test_split_statements() {
        let script = "\
-- members
select m from Member m;
# teams
select t from Team t where t.name = 'a;b'

;select count(*) from Member m";
        assert_eq!(
            split_statements(script),
            vec![
                "select m from Member m",
                "select t from Team t where t.name = 'a;b'",
                "select count(*) from Member m",
            ]
        );
        assert!(split_statements("  ;\n// nothing\n").is_empty());
    }

    #[test]
    fn test_run_with_params() {
        let db = open_database(None, ExecutorConfig::default()).unwrap();
        let params = Params::new().with("name", Value::from("member2"));
        let output = runner(&db, &params, OutputFormat::Csv)
            .run("select m.username, m.age from Member m where m.username = :name")
            .unwrap();
        assert_eq!(output, "m.username,m.age\nmember2,20");
    }

    #[test]
    fn test_run_join_group() {
        let db = open_database(None, ExecutorConfig::default()).unwrap();
        let params = Params::new();
        let output = runner(&db, &params, OutputFormat::Csv)
            .run("select t.name, avg(m.age) from Member m join m.team t group by t.name")
            .unwrap();
        assert_eq!(output, "t.name,avg(m.age)\nteamA,15\nteamB,35");
    }

    #[test]
    fn test_explain() {
        let db = open_database(None, ExecutorConfig::default()).unwrap();
        let params = Params::new();
        let output = runner(&db, &params, OutputFormat::Table)
            .with_explain(true)
            .run("select m from Member m limit 2")
            .unwrap();
        let plan = ormq_proto::QueryPlan::from_json(&output).unwrap();
        assert_eq!(plan.limit, Some(2));
    }

    #[test]
    fn test_errors() {
        let db = open_database(None, ExecutorConfig::default()).unwrap();
        let params = Params::new();
        let runner = runner(&db, &params, OutputFormat::Table);

        let err = runner.run("select m from Member m where m.age = :age").unwrap_err();
        assert!(matches!(err, ExecuteError::Language(ref msg) if msg.contains("age")));

        let err = runner.run("select m from Player m").unwrap_err();
        assert!(matches!(err, ExecuteError::Query(ormq_core::Error::InvalidPlan(_))));

        let err = runner.run("select avg(m.age) from Member m where m.age > 100").unwrap_err();
        assert!(matches!(err, ExecuteError::Query(ormq_core::Error::EmptyAggregate(_))));
    }
}
