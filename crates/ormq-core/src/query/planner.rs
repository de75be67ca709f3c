//! Plan resolution against the catalog.
//!
//! Every alias, entity, relation and field a plan names is checked here
//! before any row is read.

use ormq_proto::{AggregateFunction, Expr, QueryPlan, SelectItem, Value};
use tracing::debug;

use crate::catalog::{Catalog, RelationDef, ScalarType};
use crate::error::{Error, Result};

/// An alias bound to an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// Alias.
    pub alias: String,
    /// Entity name.
    pub entity: String,
}

/// A join resolved to its relation definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedJoin {
    /// Binding slot of the left side.
    pub left_slot: usize,
    /// The relation followed.
    pub relation: RelationDef,
}

/// A plan whose names have been resolved.
#[derive(Debug, Clone)]
pub struct ResolvedPlan<'p> {
    /// The plan itself.
    pub plan: &'p QueryPlan,
    /// Binding slots: sources first, then join targets, in plan order.
    pub slots: Vec<Slot>,
    /// Resolved joins, in plan order.
    pub joins: Vec<ResolvedJoin>,
}

impl ResolvedPlan<'_> {
    /// Slot index bound to `alias`.
    pub fn slot(&self, alias: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.alias == alias)
    }

    /// Number of source slots (the cross product width).
    pub fn source_count(&self) -> usize {
        self.plan.sources.len()
    }
}

/// Resolves plans against a catalog.
pub struct QueryPlanner<'a> {
    catalog: &'a Catalog,
}

impl<'a> QueryPlanner<'a> {
    /// Create a planner.
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Validate and resolve a plan.
    pub fn resolve<'p>(&self, plan: &'p QueryPlan) -> Result<ResolvedPlan<'p>> {
        plan.validate()?;

        let mut slots = Vec::with_capacity(plan.sources.len() + plan.joins.len());
        for source in &plan.sources {
            self.catalog.entity(&source.entity)?;
            slots.push(Slot {
                alias: source.alias.clone(),
                entity: source.entity.clone(),
            });
        }

        let mut joins = Vec::with_capacity(plan.joins.len());
        for join in &plan.joins {
            let left_slot = slots
                .iter()
                .position(|s| s.alias == join.left_alias)
                .ok_or_else(|| {
                    Error::InvalidPlan(format!("unknown alias '{}'", join.left_alias))
                })?;
            let relation = self
                .catalog
                .relation(&slots[left_slot].entity, &join.relation)?
                .clone();
            slots.push(Slot {
                alias: join.alias.clone(),
                entity: relation.to_entity.clone(),
            });
            joins.push(ResolvedJoin {
                left_slot,
                relation,
            });
        }

        let resolved = ResolvedPlan { plan, slots, joins };

        for item in &plan.projection {
            if let SelectItem::Expr(e) = item {
                self.check_expr(&resolved, e)?;
            }
        }
        let clauses = plan
            .filter
            .iter()
            .chain(plan.group_by.iter())
            .chain(plan.having.iter())
            .chain(plan.order_by.iter().map(|o| &o.expr));
        for expr in clauses {
            self.check_expr(&resolved, expr)?;
        }

        debug!(
            slots = resolved.slots.len(),
            joins = resolved.joins.len(),
            grouped = plan.is_grouped(),
            "Resolved query plan"
        );
        Ok(resolved)
    }

    /// Static type of an expression, when it is a field or literal.
    fn scalar_type(&self, resolved: &ResolvedPlan<'_>, expr: &Expr) -> Result<Option<ScalarType>> {
        Ok(match expr {
            Expr::Field(f) => {
                let slot = resolved
                    .slot(&f.alias)
                    .ok_or_else(|| Error::InvalidPlan(format!("unknown alias '{}'", f.alias)))?;
                let field = self.catalog.field(&resolved.slots[slot].entity, &f.field)?;
                Some(field.field_type.scalar_type())
            }
            Expr::Literal(v) => literal_type(v),
            _ => None,
        })
    }

    fn check_expr(&self, resolved: &ResolvedPlan<'_>, expr: &Expr) -> Result<()> {
        for child in expr.children() {
            self.check_expr(resolved, child)?;
        }

        match expr {
            Expr::Field(_) => {
                self.scalar_type(resolved, expr)?;
            }
            Expr::Compare { left, right, .. } => {
                let l = self.scalar_type(resolved, left)?;
                let r = self.scalar_type(resolved, right)?;
                check_comparable(expr, l, r)?;
            }
            Expr::Between { expr: e, low, high } => {
                let t = self.scalar_type(resolved, e)?;
                check_comparable(expr, t, literal_type(low))?;
                check_comparable(expr, t, literal_type(high))?;
            }
            Expr::In { expr: e, values, .. } => {
                let t = self.scalar_type(resolved, e)?;
                for v in values {
                    check_comparable(expr, t, literal_type(v))?;
                }
            }
            Expr::Like { expr: e, .. } => {
                if let Some(t) = self.scalar_type(resolved, e)? {
                    if t != ScalarType::String {
                        return Err(Error::InvalidPlan(format!(
                            "like requires a string operand in '{}'",
                            expr
                        )));
                    }
                }
            }
            Expr::Aggregate {
                function: AggregateFunction::Sum | AggregateFunction::Avg,
                arg: Some(arg),
            } => {
                if let Some(t) = self.scalar_type(resolved, arg)? {
                    if !t.is_numeric() {
                        return Err(Error::InvalidPlan(format!(
                            "'{}' requires a numeric argument",
                            expr
                        )));
                    }
                }
            }
            Expr::Aggregate { arg: Some(arg), .. } if arg.contains_aggregate() => {
                return Err(Error::InvalidPlan(format!(
                    "nested aggregate in '{}'",
                    expr
                )));
            }
            _ => {}
        }
        Ok(())
    }
}

fn literal_type(value: &Value) -> Option<ScalarType> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(ScalarType::Bool),
        Value::Int32(_) => Some(ScalarType::Int32),
        Value::Int64(_) => Some(ScalarType::Int64),
        Value::Float64(_) => Some(ScalarType::Float64),
        Value::String(_) => Some(ScalarType::String),
    }
}

fn check_comparable(expr: &Expr, a: Option<ScalarType>, b: Option<ScalarType>) -> Result<()> {
    match (a, b) {
        (Some(a), Some(b)) if a != b && !(a.is_numeric() && b.is_numeric()) => {
            Err(Error::InvalidPlan(format!(
                "cannot compare {:?} with {:?} in '{}'",
                a, b, expr
            )))
        }
        _ => Ok(()),
    }
}
