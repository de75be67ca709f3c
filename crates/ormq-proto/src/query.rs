//! Query plan IR.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::expr::Expr;

/// One item of a query projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    /// The whole entity bound to an alias.
    Entity(String),
    /// A scalar or aggregate expression.
    Expr(Expr),
}

impl SelectItem {
    /// Whether this item is evaluated over a group of rows.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            SelectItem::Entity(_) => false,
            SelectItem::Expr(e) => e.contains_aggregate(),
        }
    }
}

impl From<Expr> for SelectItem {
    fn from(expr: Expr) -> Self {
        SelectItem::Expr(expr)
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectItem::Entity(alias) => f.write_str(alias),
            SelectItem::Expr(e) => write!(f, "{}", e),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

/// Placement of null sort keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NullOrdering {
    /// Null is the smallest value: first ascending, last descending.
    #[default]
    Default,
    /// Nulls before every non-null key regardless of direction.
    First,
    /// Nulls after every non-null key regardless of direction.
    Last,
}

/// A single sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Key expression.
    pub expr: Expr,
    /// Sort direction.
    pub direction: OrderDirection,
    /// Null placement.
    pub nulls: NullOrdering,
}

impl OrderSpec {
    /// Ascending sort on an expression.
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: OrderDirection::Asc,
            nulls: NullOrdering::Default,
        }
    }

    /// Descending sort on an expression.
    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: OrderDirection::Desc,
            nulls: NullOrdering::Default,
        }
    }

    /// Place nulls first.
    pub fn nulls_first(mut self) -> Self {
        self.nulls = NullOrdering::First;
        self
    }

    /// Place nulls last.
    pub fn nulls_last(mut self) -> Self {
        self.nulls = NullOrdering::Last;
        self
    }
}

/// An entity source bound to an alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Entity type name.
    pub entity: String,
    /// Alias used by expressions.
    pub alias: String,
}

impl Source {
    /// Create a new source.
    pub fn new(entity: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            alias: alias.into(),
        }
    }
}

/// An inner join along a declared relation.
///
/// The target entity and the join predicate come from the relation
/// definition, resolved against the catalog at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    /// Alias of the already-bound side.
    pub left_alias: String,
    /// Relation name on the left entity.
    pub relation: String,
    /// Alias bound to the relation target.
    pub alias: String,
}

impl JoinSpec {
    /// Create a new join spec.
    pub fn new(
        left_alias: impl Into<String>,
        relation: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            left_alias: left_alias.into(),
            relation: relation.into(),
            alias: alias.into(),
        }
    }
}

/// An immutable description of a query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryPlan {
    /// Projected items, in output order.
    pub projection: Vec<SelectItem>,
    /// Sources; more than one forms a cross product.
    pub sources: Vec<Source>,
    /// Inner joins applied after the cross product, in order.
    pub joins: Vec<JoinSpec>,
    /// Row filter.
    pub filter: Option<Expr>,
    /// Group-by keys.
    pub group_by: Vec<Expr>,
    /// Group filter.
    pub having: Option<Expr>,
    /// Sort keys; later keys break ties.
    pub order_by: Vec<OrderSpec>,
    /// Rows skipped before results are taken.
    pub offset: u64,
    /// Maximum number of results.
    pub limit: Option<u64>,
}

impl QueryPlan {
    /// Create an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a projection item.
    pub fn with_select(mut self, item: impl Into<SelectItem>) -> Self {
        self.projection.push(item.into());
        self
    }

    /// Add a source.
    pub fn with_source(mut self, entity: impl Into<String>, alias: impl Into<String>) -> Self {
        self.sources.push(Source::new(entity, alias));
        self
    }

    /// Add a join.
    pub fn with_join(mut self, join: JoinSpec) -> Self {
        self.joins.push(join);
        self
    }

    /// AND a condition into the filter.
    pub fn with_filter(mut self, condition: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    /// Add a group-by key.
    pub fn with_group_by(mut self, key: Expr) -> Self {
        self.group_by.push(key);
        self
    }

    /// AND a condition into the group filter.
    pub fn with_having(mut self, condition: Expr) -> Self {
        self.having = Some(match self.having.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    /// Add a sort key.
    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order_by.push(order);
        self
    }

    /// Set the offset.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Set the limit.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether rows are collapsed into groups before projection.
    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty() || self.projection.iter().any(SelectItem::contains_aggregate)
    }

    /// Every alias bound by sources and joins, in binding order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.sources
            .iter()
            .map(|s| s.alias.as_str())
            .chain(self.joins.iter().map(|j| j.alias.as_str()))
    }

    /// Check structural well-formedness.
    ///
    /// Field, entity and relation names are not checked here; they need a
    /// catalog.
    pub fn validate(&self) -> Result<(), Error> {
        if self.sources.is_empty() {
            return Err(invalid("query has no source"));
        }
        if self.projection.is_empty() {
            return Err(invalid("query has no projection"));
        }
        if self.limit == Some(0) {
            return Err(invalid("limit must be positive"));
        }

        let mut bound: HashSet<&str> = HashSet::new();
        for source in &self.sources {
            if !bound.insert(source.alias.as_str()) {
                return Err(invalid(format!("duplicate alias '{}'", source.alias)));
            }
        }
        for join in &self.joins {
            if !bound.contains(join.left_alias.as_str()) {
                return Err(invalid(format!(
                    "join on '{}.{}' references an unbound alias",
                    join.left_alias, join.relation
                )));
            }
            if !bound.insert(join.alias.as_str()) {
                return Err(invalid(format!("duplicate alias '{}'", join.alias)));
            }
        }

        let exprs = self
            .projection
            .iter()
            .filter_map(|item| match item {
                SelectItem::Expr(e) => Some(e),
                SelectItem::Entity(_) => None,
            })
            .chain(self.filter.iter())
            .chain(self.group_by.iter())
            .chain(self.having.iter())
            .chain(self.order_by.iter().map(|o| &o.expr));
        for expr in exprs {
            for field in expr.field_refs() {
                if !bound.contains(field.alias.as_str()) {
                    return Err(invalid(format!("unknown alias '{}' in {}", field.alias, expr)));
                }
            }
        }
        for item in &self.projection {
            if let SelectItem::Entity(alias) = item {
                if !bound.contains(alias.as_str()) {
                    return Err(invalid(format!("unknown alias '{}' in projection", alias)));
                }
            }
        }

        if let Some(filter) = &self.filter {
            if filter.contains_aggregate() {
                return Err(invalid("aggregates are not allowed in where; use having"));
            }
        }
        if self.group_by.iter().any(Expr::contains_aggregate) {
            return Err(invalid("aggregates are not allowed in group by"));
        }
        if self.having.is_some() && self.group_by.is_empty() {
            return Err(invalid("having requires group by"));
        }

        if self.is_grouped() {
            for item in &self.projection {
                match item {
                    SelectItem::Entity(alias) => {
                        return Err(invalid(format!(
                            "entity '{}' cannot be projected from a grouped query",
                            alias
                        )));
                    }
                    SelectItem::Expr(e) if !e.is_grouped_by(&self.group_by) => {
                        return Err(invalid(format!(
                            "'{}' is neither grouped nor aggregated",
                            e
                        )));
                    }
                    SelectItem::Expr(_) => {}
                }
            }
            if let Some(having) = &self.having {
                if !having.is_grouped_by(&self.group_by) {
                    return Err(invalid(format!(
                        "having '{}' is neither grouped nor aggregated",
                        having
                    )));
                }
            }
            for order in &self.order_by {
                if !order.expr.is_grouped_by(&self.group_by) {
                    return Err(invalid(format!(
                        "order key '{}' is neither grouped nor aggregated",
                        order.expr
                    )));
                }
            }
        } else if let Some(order) = self.order_by.iter().find(|o| o.expr.contains_aggregate()) {
            return Err(invalid(format!(
                "order key '{}' aggregates an ungrouped query",
                order.expr
            )));
        }

        Ok(())
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidPlan(msg.into())
}
