//! Fluent query construction.
//!
//! Builders collect clauses into a [`QueryPlan`] and never touch data. The
//! first error raised while building is kept and returned from `build`.

use std::fmt;
use std::marker::PhantomData;

use ormq_proto::{Expr, JoinSpec, OrderSpec, QueryPlan, ResultPage, SelectItem, Tuple, Value};

use crate::error::{Error, Result};
use crate::path::{EntitySource, RelationPath};

use super::executor::QueryExecutor;
use super::projection::FromProjection;

/// A condition accepted by `where_` and `having`.
///
/// Fallible constructors such as `between` can be passed directly; their
/// error surfaces from `build`.
pub trait IntoCondition {
    /// Convert into a condition expression.
    fn into_condition(self) -> Result<Expr>;
}

impl IntoCondition for Expr {
    fn into_condition(self) -> Result<Expr> {
        Ok(self)
    }
}

impl IntoCondition for Result<Expr> {
    fn into_condition(self) -> Result<Expr> {
        self
    }
}

/// Entry point for building queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryFactory;

impl QueryFactory {
    /// Create a factory.
    pub fn new() -> Self {
        Self
    }

    /// Select an entity from itself: `select m from Member m`.
    pub fn select_from<S: EntitySource>(&self, source: &S) -> QueryBuilder<S::Entity> {
        self.select_entity(source).from(source)
    }

    /// Select an entity; sources are added with `from`.
    pub fn select_entity<S: EntitySource>(&self, source: &S) -> QueryBuilder<S::Entity> {
        QueryBuilder::new(QueryPlan::new().with_select(source.entity_path()))
    }

    /// Select a single field or aggregate.
    pub fn select_one(&self, item: impl Into<SelectItem>) -> QueryBuilder<Value> {
        QueryBuilder::new(QueryPlan::new().with_select(item))
    }

    /// Select several items into tuples.
    pub fn select(&self, items: impl IntoIterator<Item = SelectItem>) -> QueryBuilder<Tuple> {
        let plan = items
            .into_iter()
            .fold(QueryPlan::new(), |plan, item| plan.with_select(item));
        QueryBuilder::new(plan)
    }
}

/// A query under construction, producing rows of `T`.
pub struct QueryBuilder<T> {
    plan: QueryPlan,
    error: Option<Error>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> QueryBuilder<T> {
    fn new(plan: QueryPlan) -> Self {
        Self {
            plan,
            error: None,
            _marker: PhantomData,
        }
    }

    fn record(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Add a source. Several sources form a cross product.
    pub fn from<S: EntitySource>(mut self, source: &S) -> Self {
        let path = source.entity_path();
        self.plan = self.plan.with_source(path.entity(), path.alias());
        self
    }

    /// Inner join along a relation, binding the target to `target`'s alias.
    pub fn join<S: EntitySource>(mut self, relation: &RelationPath, target: &S) -> Self {
        let path = target.entity_path();
        if relation.target() != path.entity() {
            self.record(Error::InvalidPlan(format!(
                "relation '{}.{}' leads to {}, not {}",
                relation.alias(),
                relation.name(),
                relation.target(),
                path.entity()
            )));
            return self;
        }
        self.plan = self
            .plan
            .with_join(JoinSpec::new(relation.alias(), relation.name(), path.alias()));
        self
    }

    /// Add a filter condition; repeated calls are AND-ed.
    pub fn where_(mut self, condition: impl IntoCondition) -> Self {
        match condition.into_condition() {
            Ok(expr) => self.plan = self.plan.with_filter(expr),
            Err(e) => self.record(e),
        }
        self
    }

    /// Add several filter conditions, AND-ed together.
    pub fn where_all<C: IntoCondition>(self, conditions: impl IntoIterator<Item = C>) -> Self {
        conditions.into_iter().fold(self, |b, c| b.where_(c))
    }

    /// Add a group-by key.
    pub fn group_by(mut self, key: impl Into<Expr>) -> Self {
        self.plan = self.plan.with_group_by(key.into());
        self
    }

    /// Add a group filter. Requires a prior `group_by`.
    pub fn having(mut self, condition: impl IntoCondition) -> Self {
        if self.plan.group_by.is_empty() {
            self.record(Error::InvalidPlan("having requires group_by".to_string()));
            return self;
        }
        match condition.into_condition() {
            Ok(expr) => self.plan = self.plan.with_having(expr),
            Err(e) => self.record(e),
        }
        self
    }

    /// Add a sort key; later keys break ties.
    pub fn order_by(mut self, order: OrderSpec) -> Self {
        self.plan = self.plan.with_order(order);
        self
    }

    /// Skip `n` results.
    pub fn offset(mut self, n: i64) -> Self {
        match u64::try_from(n) {
            Ok(n) => self.plan = self.plan.with_offset(n),
            Err(_) => self.record(Error::InvalidPlan(format!("negative offset {}", n))),
        }
        self
    }

    /// Return at most `n` results.
    pub fn limit(mut self, n: i64) -> Self {
        match u64::try_from(n) {
            Ok(n) if n > 0 => self.plan = self.plan.with_limit(n),
            _ => self.record(Error::InvalidPlan(format!("limit must be positive, got {}", n))),
        }
        self
    }

    /// The plan built so far.
    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    /// Finish the query.
    pub fn build(self) -> Result<Query<T>> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Query::from_plan(self.plan)
    }
}

/// A built, immutable query producing rows of `T`.
pub struct Query<T> {
    plan: QueryPlan,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Query<T> {
    /// Wrap a plan after checking it.
    pub fn from_plan(plan: QueryPlan) -> Result<Self> {
        plan.validate()?;
        Ok(Self {
            plan,
            _marker: PhantomData,
        })
    }

    /// The underlying plan.
    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    /// Take the underlying plan.
    pub fn into_plan(self) -> QueryPlan {
        self.plan
    }

    /// Projected items.
    pub fn projection(&self) -> &[SelectItem] {
        &self.plan.projection
    }

    /// Filter condition.
    pub fn filter(&self) -> Option<&Expr> {
        self.plan.filter.as_ref()
    }

    /// Sort keys.
    pub fn order_by(&self) -> &[OrderSpec] {
        &self.plan.order_by
    }
}

impl<T: FromProjection> Query<T> {
    /// See [`QueryExecutor::fetch`].
    pub fn fetch(&self, executor: &QueryExecutor<'_>) -> Result<Vec<T>> {
        executor.fetch(self)
    }

    /// See [`QueryExecutor::fetch_one`].
    pub fn fetch_one(&self, executor: &QueryExecutor<'_>) -> Result<Option<T>> {
        executor.fetch_one(self)
    }

    /// See [`QueryExecutor::fetch_first`].
    pub fn fetch_first(&self, executor: &QueryExecutor<'_>) -> Result<Option<T>> {
        executor.fetch_first(self)
    }

    /// See [`QueryExecutor::fetch_results`].
    pub fn fetch_results(&self, executor: &QueryExecutor<'_>) -> Result<ResultPage<T>> {
        executor.fetch_results(self)
    }

    /// See [`QueryExecutor::fetch_count`].
    pub fn fetch_count(&self, executor: &QueryExecutor<'_>) -> Result<u64> {
        executor.fetch_count(self)
    }
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            plan: self.plan.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query").field("plan", &self.plan).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Member, QMember, QTeam};
    use crate::path::Path;

    #[test]
    fn test_build_records_plan() {
        let m = QMember::member();
        let query = QueryFactory::new()
            .select_from(&m)
            .where_(m.username.eq("member1"))
            .where_(m.age.eq(10))
            .order_by(m.age.desc())
            .offset(1)
            .limit(2)
            .build()
            .unwrap();

        assert_eq!(query.projection(), &[SelectItem::Entity("member".into())]);
        assert_eq!(
            query.filter(),
            Some(&m.username.eq("member1").and(m.age.eq(10)))
        );
        assert_eq!(query.order_by(), &[m.age.desc()]);
        assert_eq!(query.plan().offset, 1);
        assert_eq!(query.plan().limit, Some(2));
    }

    #[test]
    fn test_first_error_is_reported() {
        let m = QMember::member();
        let result = QueryFactory::new()
            .select_from(&m)
            .where_(m.age.between(30, 10))
            .limit(0)
            .build();
        assert!(matches!(result, Err(Error::InvalidRange(_))));
    }

    #[test]
    fn test_offset_and_limit_errors() {
        let m = QMember::member();
        let negative = QueryFactory::new().select_from(&m).offset(-1).build();
        assert!(matches!(negative, Err(Error::InvalidPlan(_))));

        let zero = QueryFactory::new().select_from(&m).limit(0).build();
        assert!(matches!(zero, Err(Error::InvalidPlan(_))));

        let negative_limit = QueryFactory::new().select_from(&m).limit(-5).build();
        assert!(matches!(negative_limit, Err(Error::InvalidPlan(_))));
    }

    #[test]
    fn test_having_without_group_by() {
        let m = QMember::member();
        let result = QueryFactory::new()
            .select_one(m.age.avg())
            .from(&m)
            .having(Expr::compare(ormq_proto::CompareOp::Gt, m.age.avg(), Expr::literal(10)))
            .build();
        assert!(matches!(result, Err(Error::InvalidPlan(_))));
    }

    #[test]
    fn test_join_target_must_match_relation() {
        let m = QMember::member();
        let other = QMember::new("other");
        let result = QueryFactory::new()
            .select_from(&m)
            .join(&m.team, &other)
            .build();
        assert!(matches!(result, Err(Error::InvalidPlan(_))));

        let t = QTeam::team();
        let query = QueryFactory::new().select_from(&m).join(&m.team, &t).build().unwrap();
        assert_eq!(query.plan().joins, vec![JoinSpec::new("member", "team", "team")]);
    }

    #[test]
    fn test_select_tuple() {
        let m = QMember::member();
        let t = QTeam::team();
        let query = QueryFactory::new()
            .select(vec![(&t.name).into(), m.age.avg().into()])
            .from(&m)
            .join(&m.team, &t)
            .group_by(&t.name)
            .build()
            .unwrap();
        assert_eq!(query.projection().len(), 2);
        assert_eq!(query.plan().group_by, vec![t.name.expr()]);
    }

    #[test]
    fn test_where_all_and_cross_join() {
        let m = QMember::member();
        let t = QTeam::team();
        let query = QueryFactory::new()
            .select_entity(&m)
            .from(&m)
            .from(&t)
            .where_all([m.username.eq_path(&t.name), m.age.gt(5)])
            .build()
            .unwrap();
        assert_eq!(query.plan().sources.len(), 2);
        assert!(matches!(query.filter(), Some(Expr::And(parts)) if parts.len() == 2));
        let _: &Query<Member> = &query;
    }
}
