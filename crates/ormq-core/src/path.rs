//! Typed field references.
//!
//! Each entity gets a hand-written registry (see [`crate::model`]) built from
//! these paths. A path knows its alias and field name and builds [`Expr`]
//! nodes; nothing is evaluated until a query runs.

use std::marker::PhantomData;

use ormq_proto::{escape_like, AggregateFunction, CompareOp, Expr, OrderSpec, SelectItem, Value};

use crate::error::Result;

/// Anything that names a single scalar column.
pub trait Path {
    /// The field reference expression.
    fn expr(&self) -> Expr;

    /// Equality against another column, for theta joins.
    fn eq_path(&self, other: &dyn Path) -> Expr {
        Expr::compare(CompareOp::Eq, self.expr(), other.expr())
    }

    /// Inequality against another column.
    fn ne_path(&self, other: &dyn Path) -> Expr {
        Expr::compare(CompareOp::Ne, self.expr(), other.expr())
    }

    /// IS NULL.
    fn is_null(&self) -> Expr {
        Expr::is_null(self.expr())
    }

    /// IS NOT NULL.
    fn is_not_null(&self) -> Expr {
        Expr::is_not_null(self.expr())
    }

    /// Number of non-null values.
    fn count(&self) -> Expr {
        Expr::aggregate(AggregateFunction::Count, Some(self.expr()))
    }

    /// Smallest non-null value.
    fn min(&self) -> Expr {
        Expr::aggregate(AggregateFunction::Min, Some(self.expr()))
    }

    /// Largest non-null value.
    fn max(&self) -> Expr {
        Expr::aggregate(AggregateFunction::Max, Some(self.expr()))
    }

    /// Ascending sort key.
    fn asc(&self) -> OrderSpec {
        OrderSpec::asc(self.expr())
    }

    /// Descending sort key.
    fn desc(&self) -> OrderSpec {
        OrderSpec::desc(self.expr())
    }
}

/// An aliased entity source.
#[derive(Debug)]
pub struct EntityPath<E> {
    entity: &'static str,
    alias: String,
    _marker: PhantomData<fn() -> E>,
}

impl<E> EntityPath<E> {
    /// Create a path for `entity` bound to `alias`.
    pub fn new(entity: &'static str, alias: impl Into<String>) -> Self {
        Self {
            entity,
            alias: alias.into(),
            _marker: PhantomData,
        }
    }

    /// Entity name.
    pub fn entity(&self) -> &'static str {
        self.entity
    }

    /// Alias.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Row count of the group (`count(*)`).
    pub fn count(&self) -> Expr {
        Expr::aggregate(AggregateFunction::Count, None)
    }
}

impl<E> Clone for EntityPath<E> {
    fn clone(&self) -> Self {
        Self::new(self.entity, self.alias.clone())
    }
}

impl<E> From<&EntityPath<E>> for SelectItem {
    fn from(path: &EntityPath<E>) -> Self {
        SelectItem::Entity(path.alias.clone())
    }
}

/// A source usable in `from`, `join` and `select_from`.
pub trait EntitySource {
    /// Typed entity the source produces.
    type Entity;

    /// The aliased entity path.
    fn entity_path(&self) -> &EntityPath<Self::Entity>;
}

impl<E> EntitySource for EntityPath<E> {
    type Entity = E;

    fn entity_path(&self) -> &EntityPath<E> {
        self
    }
}

/// A string-valued column.
#[derive(Debug, Clone)]
pub struct StringPath {
    alias: String,
    field: &'static str,
}

impl StringPath {
    /// Create a path for `alias.field`.
    pub fn new(alias: impl Into<String>, field: &'static str) -> Self {
        Self {
            alias: alias.into(),
            field,
        }
    }

    /// Equal to a literal.
    pub fn eq(&self, value: impl Into<String>) -> Expr {
        Expr::compare(CompareOp::Eq, self.expr(), Expr::literal(value.into()))
    }

    /// Not equal to a literal.
    pub fn ne(&self, value: impl Into<String>) -> Expr {
        Expr::compare(CompareOp::Ne, self.expr(), Expr::literal(value.into()))
    }

    /// Member of a set of literals.
    pub fn in_list<I, S>(&self, values: I) -> Expr
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expr::in_values(self.expr(), strings(values))
    }

    /// Not a member of a set of literals.
    pub fn not_in<I, S>(&self, values: I) -> Expr
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expr::not_in_values(self.expr(), strings(values))
    }

    /// LIKE with the pattern used as given.
    pub fn like(&self, pattern: impl Into<String>) -> Expr {
        Expr::like(self.expr(), pattern)
    }

    /// NOT LIKE.
    pub fn not_like(&self, pattern: impl Into<String>) -> Expr {
        Expr::Like {
            expr: Box::new(self.expr()),
            pattern: pattern.into(),
            negated: true,
        }
    }

    /// Contains `s` literally.
    pub fn contains(&self, s: &str) -> Expr {
        self.like(format!("%{}%", escape_like(s)))
    }

    /// Starts with `s` literally.
    pub fn starts_with(&self, s: &str) -> Expr {
        self.like(format!("{}%", escape_like(s)))
    }

    /// Ends with `s` literally.
    pub fn ends_with(&self, s: &str) -> Expr {
        self.like(format!("%{}", escape_like(s)))
    }
}

impl Path for StringPath {
    fn expr(&self) -> Expr {
        Expr::field(self.alias.clone(), self.field)
    }
}

fn strings<I, S>(values: I) -> Vec<Value>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(|s| Value::String(s.into())).collect()
}

/// A numeric column holding `T`.
#[derive(Debug)]
pub struct NumberPath<T> {
    alias: String,
    field: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for NumberPath<T> {
    fn clone(&self) -> Self {
        Self::new(self.alias.clone(), self.field)
    }
}

impl<T> NumberPath<T> {
    /// Create a path for `alias.field`.
    pub fn new(alias: impl Into<String>, field: &'static str) -> Self {
        Self {
            alias: alias.into(),
            field,
            _marker: PhantomData,
        }
    }

    /// Sum of non-null values.
    pub fn sum(&self) -> Expr {
        Expr::aggregate(AggregateFunction::Sum, Some(self.expr()))
    }

    /// Average of non-null values.
    pub fn avg(&self) -> Expr {
        Expr::aggregate(AggregateFunction::Avg, Some(self.expr()))
    }
}

impl<T: Into<Value>> NumberPath<T> {
    fn cmp(&self, op: CompareOp, value: T) -> Expr {
        Expr::compare(op, self.expr(), Expr::literal(value))
    }

    /// Equal to a literal.
    pub fn eq(&self, value: T) -> Expr {
        self.cmp(CompareOp::Eq, value)
    }

    /// Not equal to a literal.
    pub fn ne(&self, value: T) -> Expr {
        self.cmp(CompareOp::Ne, value)
    }

    /// Less than.
    pub fn lt(&self, value: T) -> Expr {
        self.cmp(CompareOp::Lt, value)
    }

    /// Greater than.
    pub fn gt(&self, value: T) -> Expr {
        self.cmp(CompareOp::Gt, value)
    }

    /// Less than or equal.
    pub fn loe(&self, value: T) -> Expr {
        self.cmp(CompareOp::Le, value)
    }

    /// Greater than or equal.
    pub fn goe(&self, value: T) -> Expr {
        self.cmp(CompareOp::Ge, value)
    }

    /// Inclusive range. Fails with `InvalidRange` when `low > high`.
    pub fn between(&self, low: T, high: T) -> Result<Expr> {
        Ok(Expr::between(self.expr(), low, high)?)
    }

    /// Member of a set of literals.
    pub fn in_list(&self, values: impl IntoIterator<Item = T>) -> Expr {
        Expr::in_values(self.expr(), values.into_iter().map(Into::into).collect())
    }

    /// Not a member of a set of literals.
    pub fn not_in(&self, values: impl IntoIterator<Item = T>) -> Expr {
        Expr::not_in_values(self.expr(), values.into_iter().map(Into::into).collect())
    }
}

impl<T> Path for NumberPath<T> {
    fn expr(&self) -> Expr {
        Expr::field(self.alias.clone(), self.field)
    }
}

impl From<&StringPath> for Expr {
    fn from(path: &StringPath) -> Self {
        path.expr()
    }
}

impl<T> From<&NumberPath<T>> for Expr {
    fn from(path: &NumberPath<T>) -> Self {
        path.expr()
    }
}

impl From<&StringPath> for SelectItem {
    fn from(path: &StringPath) -> Self {
        SelectItem::Expr(path.expr())
    }
}

impl<T> From<&NumberPath<T>> for SelectItem {
    fn from(path: &NumberPath<T>) -> Self {
        SelectItem::Expr(path.expr())
    }
}

/// A navigable relation from an aliased source.
#[derive(Debug, Clone)]
pub struct RelationPath {
    alias: String,
    name: &'static str,
    target: &'static str,
}

impl RelationPath {
    /// Create a path for relation `name` on `alias`, leading to `target`.
    pub fn new(alias: impl Into<String>, name: &'static str, target: &'static str) -> Self {
        Self {
            alias: alias.into(),
            name,
            target,
        }
    }

    /// Alias of the owning source.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Relation name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Target entity name.
    pub fn target(&self) -> &'static str {
        self.target
    }
}
