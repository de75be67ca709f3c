//! ORMQ query IR.
//!
//! Plain, serialisable types shared by the engine, the query language and
//! the CLI.
//!
//! # Modules
//!
//! - [`value`] - Runtime value types for literals and results
//! - [`expr`] - Expression trees: predicates, fields and aggregates
//! - [`query`] - Query plans, sources, joins and sort keys
//! - [`result`] - Result rows, tuples and pages
//! - [`error`] - Plan-level errors

pub mod error;
pub mod expr;
pub mod query;
pub mod result;
pub mod value;

pub use error::Error;

pub use expr::{escape_like, AggregateFunction, CompareOp, Expr, FieldRef};
pub use query::{JoinSpec, NullOrdering, OrderDirection, OrderSpec, QueryPlan, SelectItem, Source};
pub use result::{EntityRow, Projected, ResultPage, Tuple};
pub use value::Value;
