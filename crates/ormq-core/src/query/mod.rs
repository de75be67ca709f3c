//! Query engine for ORMQ.
//!
//! Builders produce a [`QueryPlan`](ormq_proto::QueryPlan); the executor
//! resolves it against the catalog and evaluates it over a table set in
//! fixed stages: sources, filter, grouping, having, sort, paging, projection.

mod aggregate;
mod builder;
mod executor;
mod filter;
mod join;
mod planner;
mod projection;

pub use aggregate::{aggregate_values, Accumulator, GroupKey, KeyPart};
pub use builder::{IntoCondition, Query, QueryBuilder, QueryFactory};
pub use executor::{compare_sort_values, QueryExecutor};
pub use filter::{like_match, values_equal, FilterEvaluator, RowContext};
pub use join::{cross_product, join, Binding, HashJoinExecutor, JoinStrategy, NestedLoopExecutor};
pub use planner::{QueryPlanner, ResolvedJoin, ResolvedPlan, Slot};
pub use projection::FromProjection;
