//! Output formatters for query results.

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use ormq_proto::{Projected, ResultPage, Tuple, Value};

/// Output format for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// ASCII table format (default).
    #[default]
    Table,
    /// JSON format.
    Json,
    /// CSV format.
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Trait for formatting query results.
pub trait Formatter {
    /// Format a page of result tuples.
    fn format_page(&self, page: &ResultPage<Tuple>) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}

/// Flatten a tuple into named columns. Entities expand to `alias.field`.
fn columns(tuple: &Tuple) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    for (item, projected) in tuple.items().iter().zip(tuple.values()) {
        match projected {
            Projected::Value(value) => out.push((item.to_string(), value)),
            Projected::Entity(row) => {
                for (name, value) in &row.fields {
                    out.push((format!("{}.{}", item, name), value));
                }
            }
        }
    }
    out
}

fn footer(page: &ResultPage<Tuple>) -> String {
    let shown = page.len();
    if shown as u64 == page.total {
        format!("{} row(s)", shown)
    } else {
        format!(
            "{} of {} row(s), offset {}",
            shown, page.total, page.offset
        )
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_page(&self, page: &ResultPage<Tuple>) -> String {
        let Some(first) = page.results.first() else {
            return if page.total == 0 {
                "No results".to_string()
            } else {
                format!("No results on this page ({} in total)", page.total)
            };
        };

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table.set_header(columns(first).into_iter().map(|(name, _)| Cell::new(name)));
        for tuple in &page.results {
            table.add_row(
                columns(tuple)
                    .into_iter()
                    .map(|(_, value)| Cell::new(format_value(value))),
            );
        }

        format!("{}\n{}", table, footer(page))
    }
}

/// JSON formatter: one object per row, keyed by projection.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_page(&self, page: &ResultPage<Tuple>) -> String {
        let rows: Vec<serde_json::Value> = page.results.iter().map(tuple_to_json).collect();

        let output = serde_json::json!({
            "total": page.total,
            "offset": page.offset,
            "limit": page.limit,
            "results": rows,
        });

        serde_json::to_string_pretty(&output).unwrap_or_else(|e| format!("JSON error: {}", e))
    }
}

fn tuple_to_json(tuple: &Tuple) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    for (item, projected) in tuple.items().iter().zip(tuple.values()) {
        let value = match projected {
            Projected::Value(value) => value_to_json(value),
            Projected::Entity(row) => serde_json::Value::Object(
                row.fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value_to_json(value)))
                    .collect(),
            ),
        };
        obj.insert(item.to_string(), value);
    }
    serde_json::Value::Object(obj)
}

/// CSV formatter.
pub struct CsvFormatter;

impl Formatter for CsvFormatter {
    fn format_page(&self, page: &ResultPage<Tuple>) -> String {
        let Some(first) = page.results.first() else {
            return String::new();
        };

        let mut lines = Vec::with_capacity(page.len() + 1);
        lines.push(
            columns(first)
                .iter()
                .map(|(name, _)| escape_csv(name))
                .collect::<Vec<_>>()
                .join(","),
        );
        for tuple in &page.results {
            lines.push(
                columns(tuple)
                    .into_iter()
                    .map(|(_, value)| format_csv_value(value))
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }

        lines.join("\n")
    }
}

/// Format a value for table display.
fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

/// Format a value for CSV output.
fn format_csv_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => escape_csv(s),
        other => other.to_string(),
    }
}

/// Escape a string for CSV.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Convert a value to JSON.
fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int32(i) => serde_json::Value::Number((*i).into()),
        Value::Int64(i) => serde_json::Value::Number((*i).into()),
        Value::Float64(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
    }
}
