//! Command-line arguments and run configuration.

use std::path::PathBuf;

use clap::Parser;
use ormq_core::config::{ExecutorConfig, DEFAULT_HASH_JOIN_THRESHOLD, DEFAULT_MAX_ROWS};
use ormq_lang::Params;
use ormq_proto::Value;

use crate::formatter::OutputFormat;

/// ORMQ - run JPQL-style queries over a Member/Team dataset
#[derive(Parser, Debug)]
#[command(name = "ormq")]
#[command(version, about = "Run JPQL-style queries over a Member/Team dataset")]
pub struct Args {
    /// Dataset JSON file (defaults to the built-in demo data)
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Execute statements and exit (separate several with ';')
    #[arg(short = 'c', long, conflicts_with = "file")]
    pub command: Option<String>,

    /// Execute statements from a file
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,

    /// Bind a query parameter, e.g. -p username=member1
    #[arg(short = 'p', long = "param", value_parser = parse_param)]
    pub params: Vec<(String, Value)>,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// Print the compiled plan as JSON instead of running it
    #[arg(long)]
    pub explain: bool,

    /// Maximum intermediate rows per query
    #[arg(long, default_value_t = DEFAULT_MAX_ROWS)]
    pub max_rows: usize,

    /// Left-side row count above which joins use a hash table
    #[arg(long, default_value_t = DEFAULT_HASH_JOIN_THRESHOLD)]
    pub hash_join_threshold: usize,
}

fn parse_param(s: &str) -> Result<(String, Value), String> {
    Params::parse_assignment(s).ok_or_else(|| format!("expected name=value, got '{}'", s))
}

/// Where statements come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(String),
    File(PathBuf),
    Stdin,
}

/// Resolved run configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub data: Option<PathBuf>,
    pub input: Input,
    pub params: Params,
    pub format: OutputFormat,
    pub explain: bool,
    pub executor: ExecutorConfig,
}

impl Args {
    /// Convert command-line arguments to a run configuration.
    pub fn into_config(self) -> CliConfig {
        let input = match (self.command, self.file) {
            (Some(command), _) => Input::Command(command),
            (None, Some(file)) => Input::File(file),
            (None, None) => Input::Stdin,
        };

        let params = self
            .params
            .into_iter()
            .fold(Params::new(), |params, (name, value)| params.with(name, value));

        CliConfig {
            data: self.data,
            input,
            params,
            format: self.format,
            explain: self.explain,
            executor: ExecutorConfig::new()
                .with_max_rows(self.max_rows)
                .with_hash_join_threshold(self.hash_join_threshold),
        }
    }
}
