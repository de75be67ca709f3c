//! Abstract syntax tree for select statements.

use ormq_proto::{AggregateFunction, CompareOp, NullOrdering, OrderDirection};

use crate::span::{Span, Spanned};

/// A parsed `select` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    /// Projected expressions; a bare alias selects the whole entity.
    pub select: Vec<Spanned<Expr>>,
    /// `from` items; more than one forms a cross product.
    pub from: Vec<FromItem>,
    pub joins: Vec<JoinClause>,
    pub where_clause: Option<Spanned<Expr>>,
    pub group_by: Vec<Spanned<Expr>>,
    pub having: Option<Spanned<Expr>>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<Spanned<Operand>>,
    pub offset: Option<Spanned<Operand>>,
    /// The full span of the statement.
    pub span: Span,
}

/// `Entity alias` in a `from` list.
#[derive(Debug, Clone, PartialEq)]
pub struct FromItem {
    pub entity: Spanned<String>,
    pub alias: Spanned<String>,
}

/// `join alias.relation target`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub left_alias: Spanned<String>,
    pub relation: Spanned<String>,
    pub alias: Spanned<String>,
}

/// One `order by` key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Spanned<Expr>,
    pub direction: OrderDirection,
    pub nulls: NullOrdering,
}

/// A literal or a named parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Literal),
    /// `:name`, bound at compile time.
    Param(String),
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Expressions, both scalar and boolean.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `alias` or `alias.field`.
    Path {
        alias: String,
        field: Option<String>,
    },
    Operand(Operand),
    Compare {
        op: CompareOp,
        left: Box<Spanned<Expr>>,
        right: Box<Spanned<Expr>>,
    },
    Between {
        expr: Box<Spanned<Expr>>,
        low: Spanned<Operand>,
        high: Spanned<Operand>,
        negated: bool,
    },
    In {
        expr: Box<Spanned<Expr>>,
        values: Vec<Spanned<Operand>>,
        negated: bool,
    },
    Like {
        expr: Box<Spanned<Expr>>,
        pattern: Spanned<Operand>,
        negated: bool,
    },
    IsNull {
        expr: Box<Spanned<Expr>>,
        negated: bool,
    },
    And(Vec<Spanned<Expr>>),
    Or(Vec<Spanned<Expr>>),
    Not(Box<Spanned<Expr>>),
    /// `count(*)` has no argument.
    Aggregate {
        function: AggregateFunction,
        arg: Option<Box<Spanned<Expr>>>,
    },
}

impl Expr {
    /// Build a binary AND/OR, flattening same-kind operands.
    pub fn combine(and: bool, left: Spanned<Expr>, right: Spanned<Expr>) -> Spanned<Expr> {
        let span = left.span.merge(right.span);
        let mut parts = Vec::new();
        for side in [left, right] {
            match side.value {
                Expr::And(inner) if and => parts.extend(inner),
                Expr::Or(inner) if !and => parts.extend(inner),
                value => parts.push(Spanned::new(value, side.span)),
            }
        }
        let expr = if and { Expr::And(parts) } else { Expr::Or(parts) };
        Spanned::new(expr, span)
    }
}
