//! ORMQ CLI - run JPQL-style queries over a Member/Team dataset.

mod config;
mod demo;
mod executor;
mod formatter;

use std::io::Read;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Args, CliConfig, Input};
use crate::executor::{split_statements, ExecuteError, StatementRunner};
use crate::formatter::create_formatter;

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "ormq=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Args::parse().into_config();
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), format = %config.format, "Starting ormq");

    match run(config) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Run every statement; returns whether all of them succeeded.
fn run(config: CliConfig) -> Result<bool, ExecuteError> {
    let db = demo::open_database(config.data.as_deref(), config.executor.clone())?;

    let script = match &config.input {
        Input::Command(command) => command.clone(),
        Input::File(path) => std::fs::read_to_string(path).map_err(|source| ExecuteError::Io {
            path: path.display().to_string(),
            source,
        })?,
        Input::Stdin => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|source| ExecuteError::Io {
                    path: "<stdin>".to_string(),
                    source,
                })?;
            buf
        }
    };

    let runner = StatementRunner::new(&db, &config.params, create_formatter(config.format))
        .with_explain(config.explain);

    let mut ok = true;
    for (i, statement) in split_statements(&script).iter().enumerate() {
        match runner.run(statement) {
            Ok(output) => println!("{}", output),
            Err(e) => {
                eprintln!("Error in statement {}:\n{}", i + 1, e);
                ok = false;
            }
        }
    }
    Ok(ok)
}
