//! Source resolution: cross products and relation joins.
//!
//! This module provides two join algorithms:
//! - NestedLoop: O(N*M), lower overhead for small inputs
//! - HashJoin: O(N+M) using a hash table over the target rows
//!
//! Both produce bindings in left order, then target order, so the choice of
//! strategy never changes results.

use std::collections::HashMap;

use ormq_proto::{EntityRow, Value};
use tracing::{debug, warn};

use crate::catalog::RelationDef;
use crate::error::{Error, Result};

use super::aggregate::KeyPart;
use super::filter::values_equal;

/// One row per bound alias, indexed by slot.
pub type Binding<'a> = Vec<&'a EntityRow>;

/// Join strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    /// Nested loop join - O(N*M), best for small inputs.
    NestedLoop,
    /// Hash join - O(N+M), best for larger inputs.
    HashJoin,
}

impl JoinStrategy {
    /// Hash join once the left side has more than `threshold` bindings.
    pub fn select(left_count: usize, threshold: usize) -> Self {
        if left_count > threshold {
            JoinStrategy::HashJoin
        } else {
            JoinStrategy::NestedLoop
        }
    }
}

fn check_budget(actual: usize, limit: usize) -> Result<()> {
    if actual > limit {
        warn!(actual, limit, "Intermediate result exceeds budget");
        return Err(Error::BudgetExceeded { limit, actual });
    }
    Ok(())
}

/// Cartesian product of source tables, leftmost source varying slowest.
pub fn cross_product<'a>(tables: &[&'a [EntityRow]], max_rows: usize) -> Result<Vec<Binding<'a>>> {
    let size = tables
        .iter()
        .try_fold(1usize, |acc, t| acc.checked_mul(t.len()))
        .unwrap_or(usize::MAX);
    check_budget(size, max_rows)?;

    let mut bindings: Vec<Binding<'a>> = vec![Vec::with_capacity(tables.len())];
    for table in tables {
        let mut next = Vec::with_capacity(bindings.len() * table.len());
        for binding in &bindings {
            for row in *table {
                let mut extended = binding.clone();
                extended.push(row);
                next.push(extended);
            }
        }
        bindings = next;
    }

    debug!(sources = tables.len(), bindings = bindings.len(), "Cross product");
    Ok(bindings)
}

fn join_key<'a>(row: &'a EntityRow, field: &str) -> Option<&'a Value> {
    row.get(field).filter(|v| !v.is_null())
}

/// Extend each binding with the target rows related to `binding[left_slot]`.
///
/// Bindings without a related row are dropped (inner join).
pub fn join<'a>(
    bindings: Vec<Binding<'a>>,
    left_slot: usize,
    relation: &RelationDef,
    targets: &'a [EntityRow],
    strategy: JoinStrategy,
    max_rows: usize,
) -> Result<Vec<Binding<'a>>> {
    let joined = match strategy {
        JoinStrategy::NestedLoop => {
            NestedLoopExecutor::execute(bindings, left_slot, relation, targets, max_rows)?
        }
        JoinStrategy::HashJoin => {
            HashJoinExecutor::execute(bindings, left_slot, relation, targets, max_rows)?
        }
    };
    debug!(
        relation = %relation.name,
        ?strategy,
        bindings = joined.len(),
        "Joined relation"
    );
    Ok(joined)
}

/// Nested loop join executor for small inputs.
pub struct NestedLoopExecutor;

impl NestedLoopExecutor {
    /// For each binding, scan every target row.
    pub fn execute<'a>(
        bindings: Vec<Binding<'a>>,
        left_slot: usize,
        relation: &RelationDef,
        targets: &'a [EntityRow],
        max_rows: usize,
    ) -> Result<Vec<Binding<'a>>> {
        let mut out = Vec::new();
        for binding in bindings {
            let Some(key) = join_key(binding[left_slot], &relation.from_field) else {
                continue;
            };
            for target in targets {
                if join_key(target, &relation.to_field).is_some_and(|k| values_equal(key, k)) {
                    let mut extended = binding.clone();
                    extended.push(target);
                    out.push(extended);
                    check_budget(out.len(), max_rows)?;
                }
            }
        }
        Ok(out)
    }
}

/// Hash join executor.
///
/// Algorithm:
/// 1. Build phase: scan targets once into key -> rows (target order kept)
/// 2. Probe phase: look up each binding's key
pub struct HashJoinExecutor;

impl HashJoinExecutor {
    /// Build over targets, probe with bindings.
    pub fn execute<'a>(
        bindings: Vec<Binding<'a>>,
        left_slot: usize,
        relation: &RelationDef,
        targets: &'a [EntityRow],
        max_rows: usize,
    ) -> Result<Vec<Binding<'a>>> {
        let mut table: HashMap<KeyPart, Vec<&'a EntityRow>> = HashMap::new();
        for target in targets {
            if let Some(key) = join_key(target, &relation.to_field) {
                table.entry(KeyPart::from_value(key)).or_default().push(target);
            }
        }

        let mut out = Vec::new();
        for binding in bindings {
            let Some(key) = join_key(binding[left_slot], &relation.from_field) else {
                continue;
            };
            if let Some(matches) = table.get(&KeyPart::from_value(key)) {
                for target in matches {
                    let mut extended = binding.clone();
                    extended.push(*target);
                    out.push(extended);
                }
                check_budget(out.len(), max_rows)?;
            }
        }
        Ok(out)
    }
}
