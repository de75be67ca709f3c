//! Query executor for running plans against a table set.
//!
//! Every plan runs through the same pipeline: source resolution, filter,
//! group, having, order, paginate, project.

use std::cmp::Ordering;
use std::collections::HashMap;

use ormq_proto::{
    AggregateFunction, EntityRow, Expr, FieldRef, NullOrdering, OrderDirection, OrderSpec,
    Projected, QueryPlan, ResultPage, SelectItem, Tuple, Value,
};
use tracing::{debug, instrument, warn};

use crate::catalog::Catalog;
use crate::config::ExecutorConfig;
use crate::error::{Error, Result};
use crate::storage::TableSet;

use super::aggregate::{Accumulator, GroupKey, KeyPart};
use super::builder::Query;
use super::filter::{FilterEvaluator, RowContext};
use super::join::{self, cross_product, Binding, JoinStrategy};
use super::planner::{QueryPlanner, ResolvedPlan, Slot};
use super::projection::FromProjection;

/// Query executor over one catalog and table set.
pub struct QueryExecutor<'a> {
    catalog: &'a Catalog,
    tables: &'a TableSet,
    config: ExecutorConfig,
}

/// Projected rows plus the pre-pagination count.
struct Evaluated {
    total: u64,
    rows: Vec<Vec<Projected>>,
}

impl<'a> QueryExecutor<'a> {
    /// Create a new executor with default configuration.
    pub fn new(catalog: &'a Catalog, tables: &'a TableSet) -> Self {
        Self {
            catalog,
            tables,
            config: ExecutorConfig::default(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute a plan, returning projected tuples.
    pub fn execute(&self, plan: &QueryPlan) -> Result<Vec<Tuple>> {
        let evaluated = self.run(plan, false)?;
        Ok(evaluated
            .rows
            .into_iter()
            .map(|values| Tuple::new(plan.projection.clone(), values))
            .collect())
    }

    /// Execute a plan, returning a page with the pre-pagination total.
    pub fn execute_page(&self, plan: &QueryPlan) -> Result<ResultPage<Tuple>> {
        let evaluated = self.run(plan, false)?;
        let results = evaluated
            .rows
            .into_iter()
            .map(|values| Tuple::new(plan.projection.clone(), values))
            .collect();
        Ok(ResultPage::new(evaluated.total, plan.limit, plan.offset, results))
    }

    /// Count rows (or groups) before offset and limit.
    pub fn count(&self, plan: &QueryPlan) -> Result<u64> {
        Ok(self.run(plan, true)?.total)
    }

    /// Fetch every result.
    pub fn fetch<T: FromProjection>(&self, query: &Query<T>) -> Result<Vec<T>> {
        let plan = query.plan();
        self.run(plan, false)?
            .rows
            .into_iter()
            .map(|values| T::from_projection(&plan.projection, values))
            .collect()
    }

    /// Fetch at most one result; more than one is an error.
    pub fn fetch_one<T: FromProjection>(&self, query: &Query<T>) -> Result<Option<T>> {
        let mut results = self.fetch(query)?;
        if results.len() > 1 {
            warn!(results = results.len(), "fetch_one matched more than one result");
            return Err(Error::TooManyResults(results.len()));
        }
        Ok(results.pop())
    }

    /// Fetch the first result, applying a limit of one.
    pub fn fetch_first<T: FromProjection>(&self, query: &Query<T>) -> Result<Option<T>> {
        let plan = query.plan().clone().with_limit(1);
        let evaluated = self.run(&plan, false)?;
        evaluated
            .rows
            .into_iter()
            .next()
            .map(|values| T::from_projection(&plan.projection, values))
            .transpose()
    }

    /// Fetch a page of results with the pre-pagination total.
    pub fn fetch_results<T: FromProjection>(&self, query: &Query<T>) -> Result<ResultPage<T>> {
        let plan = query.plan();
        let evaluated = self.run(plan, false)?;
        ResultPage::new(evaluated.total, plan.limit, plan.offset, evaluated.rows)
            .try_map(|values| T::from_projection(&plan.projection, values))
    }

    /// Count results before offset and limit.
    pub fn fetch_count<T>(&self, query: &Query<T>) -> Result<u64> {
        self.count(query.plan())
    }

    #[instrument(level = "debug", skip(self, plan))]
    fn run(&self, plan: &QueryPlan, count_only: bool) -> Result<Evaluated> {
        let resolved = QueryPlanner::new(self.catalog).resolve(plan)?;

        let bindings = self.resolve_sources(&resolved)?;
        let bindings = self.apply_filter(&resolved, bindings)?;

        if plan.is_grouped() {
            let groups = self.group(&resolved, bindings)?;
            let groups = self.apply_having(plan, groups)?;
            self.finish(plan, groups, count_only)
        } else {
            let units = bindings
                .into_iter()
                .map(|rows| RowUnit {
                    slots: &resolved.slots,
                    rows,
                })
                .collect();
            self.finish(plan, units, count_only)
        }
    }

    /// Stage 1: cross product of sources, then joins.
    fn resolve_sources(&self, resolved: &ResolvedPlan<'_>) -> Result<Vec<Binding<'a>>> {
        let sources: Vec<&'a [EntityRow]> = resolved.slots[..resolved.source_count()]
            .iter()
            .map(|slot| self.tables.rows(&slot.entity))
            .collect();
        let mut bindings = cross_product(&sources, self.config.max_rows)?;

        for spec in &resolved.joins {
            let strategy = JoinStrategy::select(bindings.len(), self.config.hash_join_threshold);
            let targets = self.tables.rows(&spec.relation.to_entity);
            bindings = join::join(
                bindings,
                spec.left_slot,
                &spec.relation,
                targets,
                strategy,
                self.config.max_rows,
            )?;
        }

        debug!(bindings = bindings.len(), "Resolved sources");
        Ok(bindings)
    }

    /// Stage 2: keep bindings where the filter is definitely true.
    fn apply_filter(
        &self,
        resolved: &ResolvedPlan<'_>,
        bindings: Vec<Binding<'a>>,
    ) -> Result<Vec<Binding<'a>>> {
        let Some(filter) = &resolved.plan.filter else {
            return Ok(bindings);
        };

        let before = bindings.len();
        let mut kept = Vec::with_capacity(before);
        for binding in bindings {
            let ctx = RowRef {
                slots: &resolved.slots,
                rows: &binding,
            };
            if FilterEvaluator::matches(filter, &ctx)? {
                kept.push(binding);
            }
        }

        debug!(before, after = kept.len(), "Applied filter");
        Ok(kept)
    }

    /// Stage 3: partition bindings by group key, in first-seen order.
    fn group<'r>(
        &self,
        resolved: &'r ResolvedPlan<'r>,
        bindings: Vec<Binding<'a>>,
    ) -> Result<Vec<GroupUnit<'r, 'a>>> {
        let keys = &resolved.plan.group_by;
        let slots = &resolved.slots;

        if keys.is_empty() {
            return Ok(vec![GroupUnit {
                slots,
                keys,
                key_values: Vec::new(),
                rows: bindings,
            }]);
        }

        let mut index: HashMap<GroupKey, usize> = HashMap::new();
        let mut groups: Vec<GroupUnit<'r, 'a>> = Vec::new();
        for binding in bindings {
            let ctx = RowRef {
                slots,
                rows: &binding,
            };
            let key_values = keys
                .iter()
                .map(|k| FilterEvaluator::value(k, &ctx))
                .collect::<Result<Vec<_>>>()?;
            let key: GroupKey = key_values.iter().map(KeyPart::from_value).collect();

            match index.get(&key) {
                Some(&i) => groups[i].rows.push(binding),
                None => {
                    index.insert(key, groups.len());
                    groups.push(GroupUnit {
                        slots,
                        keys,
                        key_values,
                        rows: vec![binding],
                    });
                }
            }
        }

        debug!(groups = groups.len(), "Grouped bindings");
        Ok(groups)
    }

    /// Stage 4: keep groups where `having` is definitely true.
    fn apply_having<'r>(
        &self,
        plan: &QueryPlan,
        groups: Vec<GroupUnit<'r, 'a>>,
    ) -> Result<Vec<GroupUnit<'r, 'a>>> {
        let Some(having) = &plan.having else {
            return Ok(groups);
        };

        let before = groups.len();
        let mut kept = Vec::with_capacity(before);
        for group in groups {
            if FilterEvaluator::matches(having, &group)? {
                kept.push(group);
            }
        }

        debug!(before, after = kept.len(), "Applied having");
        Ok(kept)
    }

    /// Stages 5-7: order, paginate and project.
    fn finish<U: Unit>(&self, plan: &QueryPlan, units: Vec<U>, count_only: bool) -> Result<Evaluated> {
        let total = units.len() as u64;
        if count_only {
            return Ok(Evaluated {
                total,
                rows: Vec::new(),
            });
        }

        let units = sort_units(units, &plan.order_by)?;

        let offset = usize::try_from(plan.offset).unwrap_or(usize::MAX);
        let limit = plan
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        let rows = units
            .iter()
            .skip(offset)
            .take(limit)
            .map(|unit| project(&plan.projection, unit))
            .collect::<Result<Vec<_>>>()?;

        debug!(total, returned = rows.len(), "Projected results");
        Ok(Evaluated { total, rows })
    }
}

/// A result unit: a binding or a group.
trait Unit: RowContext {
    /// The whole entity bound to `alias`.
    fn entity(&self, alias: &str) -> Result<EntityRow>;
}

fn slot_of(slots: &[Slot], alias: &str) -> Result<usize> {
    slots
        .iter()
        .position(|s| s.alias == alias)
        .ok_or_else(|| Error::InvalidPlan(format!("unknown alias '{}'", alias)))
}

/// A borrowed view of one binding.
struct RowRef<'x> {
    slots: &'x [Slot],
    rows: &'x [&'x EntityRow],
}

impl RowContext for RowRef<'_> {
    fn field(&self, field: &FieldRef) -> Result<Value> {
        let slot = slot_of(self.slots, &field.alias)?;
        self.rows[slot]
            .get(&field.field)
            .cloned()
            .ok_or_else(|| Error::InvalidPlan(format!("unknown field '{}'", field)))
    }

    fn aggregate(&self, function: AggregateFunction, _arg: Option<&Expr>) -> Result<Value> {
        Err(Error::InvalidPlan(format!(
            "{} used outside of a grouped query",
            function.name()
        )))
    }
}

struct RowUnit<'r, 'a> {
    slots: &'r [Slot],
    rows: Binding<'a>,
}

impl RowUnit<'_, '_> {
    fn view(&self) -> RowRef<'_> {
        RowRef {
            slots: self.slots,
            rows: &self.rows,
        }
    }
}

impl RowContext for RowUnit<'_, '_> {
    fn field(&self, field: &FieldRef) -> Result<Value> {
        self.view().field(field)
    }

    fn aggregate(&self, function: AggregateFunction, arg: Option<&Expr>) -> Result<Value> {
        self.view().aggregate(function, arg)
    }
}

impl Unit for RowUnit<'_, '_> {
    fn entity(&self, alias: &str) -> Result<EntityRow> {
        let slot = slot_of(self.slots, alias)?;
        Ok(self.rows[slot].clone())
    }
}

struct GroupUnit<'r, 'a> {
    slots: &'r [Slot],
    keys: &'r [Expr],
    key_values: Vec<Value>,
    rows: Vec<Binding<'a>>,
}

impl RowContext for GroupUnit<'_, '_> {
    fn field(&self, field: &FieldRef) -> Result<Value> {
        match self.rows.first() {
            Some(first) => RowRef {
                slots: self.slots,
                rows: first,
            }
            .field(field),
            None => Ok(Value::Null),
        }
    }

    fn aggregate(&self, function: AggregateFunction, arg: Option<&Expr>) -> Result<Value> {
        let mut acc = Accumulator::new(function);
        for binding in &self.rows {
            match arg {
                None => acc.add_row(),
                Some(arg) => {
                    let ctx = RowRef {
                        slots: self.slots,
                        rows: binding,
                    };
                    acc.add(&FilterEvaluator::value(arg, &ctx)?)?;
                }
            }
        }
        acc.finish()
    }

    fn lookup(&self, expr: &Expr) -> Option<Value> {
        self.keys
            .iter()
            .position(|k| k == expr)
            .and_then(|i| self.key_values.get(i).cloned())
    }
}

impl Unit for GroupUnit<'_, '_> {
    fn entity(&self, alias: &str) -> Result<EntityRow> {
        Err(Error::InvalidPlan(format!(
            "entity '{}' cannot be projected from a grouped query",
            alias
        )))
    }
}

fn project<U: Unit>(projection: &[SelectItem], unit: &U) -> Result<Vec<Projected>> {
    projection
        .iter()
        .map(|item| match item {
            SelectItem::Entity(alias) => unit.entity(alias).map(Projected::Entity),
            SelectItem::Expr(expr) => FilterEvaluator::value(expr, unit).map(Projected::Value),
        })
        .collect()
}

/// Stable multi-key sort. Keys are evaluated once per unit.
fn sort_units<U: Unit>(units: Vec<U>, order_by: &[OrderSpec]) -> Result<Vec<U>> {
    if order_by.is_empty() {
        return Ok(units);
    }

    let mut keyed = units
        .into_iter()
        .map(|unit| {
            let keys = order_by
                .iter()
                .map(|spec| FilterEvaluator::value(&spec.expr, &unit))
                .collect::<Result<Vec<_>>>()?;
            Ok((keys, unit))
        })
        .collect::<Result<Vec<_>>>()?;

    keyed.sort_by(|(a, _), (b, _)| compare_sort_keys(a, b, order_by));
    Ok(keyed.into_iter().map(|(_, unit)| unit).collect())
}

fn compare_sort_keys(a: &[Value], b: &[Value], order_by: &[OrderSpec]) -> Ordering {
    for ((av, bv), spec) in a.iter().zip(b).zip(order_by) {
        let cmp = compare_sort_values(av, bv, spec);
        if cmp != Ordering::Equal {
            return cmp;
        }
    }
    Ordering::Equal
}

/// Compare two sort key values under a sort spec.
///
/// Null placement ignores direction unless it is `Default`, where null is
/// the smallest value.
pub fn compare_sort_values(a: &Value, b: &Value, spec: &OrderSpec) -> Ordering {
    let null_first = match spec.nulls {
        NullOrdering::First => true,
        NullOrdering::Last => false,
        NullOrdering::Default => spec.direction == OrderDirection::Asc,
    };
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) if null_first => Ordering::Less,
        (true, false) => Ordering::Greater,
        (false, true) if null_first => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let cmp = a.compare(b).unwrap_or(Ordering::Equal);
            match spec.direction {
                OrderDirection::Asc => cmp,
                OrderDirection::Desc => cmp.reverse(),
            }
        }
    }
}
