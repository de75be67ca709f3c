//! Expression IR: predicates, scalar references and aggregates.
//!
//! Expressions are plain data. Nothing is evaluated at construction time;
//! the only construction-time check is the bound order of `between`.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::value::Value;

/// A reference to a field of an aliased source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    /// Source alias (e.g. `member`).
    pub alias: String,
    /// Field name on the aliased entity.
    pub field: String,
}

impl FieldRef {
    /// Create a field reference.
    pub fn new(alias: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            field: field.into(),
        }
    }
}

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

impl CompareOp {
    /// Whether an ordering satisfies this operator.
    pub fn matches(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord.is_eq(),
            CompareOp::Ne => ord.is_ne(),
            CompareOp::Lt => ord.is_lt(),
            CompareOp::Le => ord.is_le(),
            CompareOp::Gt => ord.is_gt(),
            CompareOp::Ge => ord.is_ge(),
        }
    }
}

/// Aggregate function types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunction {
    /// Count of rows, or of non-null values when an argument is given.
    Count,
    /// Sum of numeric values.
    Sum,
    /// Average of numeric values (always real-valued).
    Avg,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
}

impl AggregateFunction {
    /// Lower-case function name.
    pub fn name(self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        }
    }
}

/// An expression tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Field of an aliased source.
    Field(FieldRef),
    /// Literal value.
    Literal(Value),
    /// Binary comparison.
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Inclusive range check.
    Between {
        expr: Box<Expr>,
        low: Value,
        high: Value,
    },
    /// Set membership.
    In {
        expr: Box<Expr>,
        values: Vec<Value>,
        negated: bool,
    },
    /// LIKE pattern match.
    Like {
        expr: Box<Expr>,
        pattern: String,
        negated: bool,
    },
    /// Null check.
    IsNull { expr: Box<Expr>, negated: bool },
    /// All conditions must hold.
    And(Vec<Expr>),
    /// At least one condition must hold.
    Or(Vec<Expr>),
    /// Negation.
    Not(Box<Expr>),
    /// Aggregate over the rows of a group. `arg: None` counts rows.
    Aggregate {
        function: AggregateFunction,
        arg: Option<Box<Expr>>,
    },
}

impl Expr {
    /// Field reference expression.
    pub fn field(alias: impl Into<String>, field: impl Into<String>) -> Self {
        Expr::Field(FieldRef::new(alias, field))
    }

    /// Literal expression.
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// Comparison between two expressions.
    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Inclusive range check. Fails when `low > high` or the bounds are
    /// incomparable.
    pub fn between(expr: Expr, low: impl Into<Value>, high: impl Into<Value>) -> Result<Self, Error> {
        let low = low.into();
        let high = high.into();
        match low.compare(&high) {
            Some(Ordering::Less) | Some(Ordering::Equal) => Ok(Expr::Between {
                expr: Box::new(expr),
                low,
                high,
            }),
            Some(Ordering::Greater) => Err(Error::InvalidRange(format!(
                "lower bound {} is greater than upper bound {}",
                low, high
            ))),
            None => Err(Error::InvalidRange(format!(
                "bounds {} ({}) and {} ({}) are not comparable",
                low,
                low.type_name(),
                high,
                high.type_name()
            ))),
        }
    }

    /// Set membership check.
    pub fn in_values(expr: Expr, values: Vec<Value>) -> Self {
        Expr::In {
            expr: Box::new(expr),
            values,
            negated: false,
        }
    }

    /// Negated set membership check.
    pub fn not_in_values(expr: Expr, values: Vec<Value>) -> Self {
        Expr::In {
            expr: Box::new(expr),
            values,
            negated: true,
        }
    }

    /// LIKE pattern match.
    pub fn like(expr: Expr, pattern: impl Into<String>) -> Self {
        Expr::Like {
            expr: Box::new(expr),
            pattern: pattern.into(),
            negated: false,
        }
    }

    /// IS NULL check.
    pub fn is_null(expr: Expr) -> Self {
        Expr::IsNull {
            expr: Box::new(expr),
            negated: false,
        }
    }

    /// IS NOT NULL check.
    pub fn is_not_null(expr: Expr) -> Self {
        Expr::IsNull {
            expr: Box::new(expr),
            negated: true,
        }
    }

    /// Aggregate expression.
    pub fn aggregate(function: AggregateFunction, arg: Option<Expr>) -> Self {
        Expr::Aggregate {
            function,
            arg: arg.map(Box::new),
        }
    }

    /// Combine with another expression using AND, flattening nested ANDs.
    pub fn and(self, other: Expr) -> Self {
        match (self, other) {
            (Expr::And(mut left), Expr::And(right)) => {
                left.extend(right);
                Expr::And(left)
            }
            (Expr::And(mut left), right) => {
                left.push(right);
                Expr::And(left)
            }
            (left, right) => Expr::And(vec![left, right]),
        }
    }

    /// Combine with another expression using OR, flattening nested ORs.
    pub fn or(self, other: Expr) -> Self {
        match (self, other) {
            (Expr::Or(mut left), Expr::Or(right)) => {
                left.extend(right);
                Expr::Or(left)
            }
            (Expr::Or(mut left), right) => {
                left.push(right);
                Expr::Or(left)
            }
            (left, right) => Expr::Or(vec![left, right]),
        }
    }

    /// Negate this expression.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// AND together a list of conditions. Returns `None` for an empty list.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Option<Self> {
        exprs.into_iter().reduce(Expr::and)
    }

    /// Whether this node is an aggregate.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Expr::Aggregate { .. })
    }

    /// Whether any node in this tree is an aggregate.
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| found |= e.is_aggregate());
        found
    }

    /// Collect every field referenced in this tree.
    pub fn field_refs(&self) -> Vec<&FieldRef> {
        let mut refs = Vec::new();
        self.visit_refs(&mut refs);
        refs
    }

    fn visit_refs<'a>(&'a self, refs: &mut Vec<&'a FieldRef>) {
        if let Expr::Field(f) = self {
            refs.push(f);
        }
        for child in self.children() {
            child.visit_refs(refs);
        }
    }

    /// Pre-order traversal.
    pub fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    /// Direct children of this node.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Field(_) | Expr::Literal(_) => vec![],
            Expr::Compare { left, right, .. } => vec![left, right],
            Expr::Between { expr, .. }
            | Expr::In { expr, .. }
            | Expr::Like { expr, .. }
            | Expr::IsNull { expr, .. }
            | Expr::Not(expr) => vec![expr],
            Expr::And(exprs) | Expr::Or(exprs) => exprs.iter().collect(),
            Expr::Aggregate { arg, .. } => arg.iter().map(|a| a.as_ref()).collect(),
        }
    }

    /// Whether this expression can be evaluated once per group given the
    /// grouping keys: every field reference sits inside an aggregate or
    /// inside a sub-expression equal to a key.
    pub fn is_grouped_by(&self, keys: &[Expr]) -> bool {
        if keys.contains(self) {
            return true;
        }
        match self {
            Expr::Field(_) => false,
            Expr::Literal(_) => true,
            Expr::Aggregate { .. } => true,
            other => other.children().into_iter().all(|c| c.is_grouped_by(keys)),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.alias, self.field)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, values: &[Value]) -> fmt::Result {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_literal(f, v)?;
    }
    Ok(())
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        other => write!(f, "{}", other),
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, exprs: &[Expr], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", e)?;
    }
    f.write_str(")")
}

/// Renders in the query-language surface syntax.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Field(r) => write!(f, "{}", r),
            Expr::Literal(v) => write_literal(f, v),
            Expr::Compare { op, left, right } => write!(f, "{} {} {}", left, op, right),
            Expr::Between { expr, low, high } => {
                write!(f, "{} between ", expr)?;
                write_literal(f, low)?;
                f.write_str(" and ")?;
                write_literal(f, high)
            }
            Expr::In {
                expr,
                values,
                negated,
            } => {
                write!(f, "{} {}in (", expr, if *negated { "not " } else { "" })?;
                write_list(f, values)?;
                f.write_str(")")
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                write!(f, "{} {}like ", expr, if *negated { "not " } else { "" })?;
                write_literal(f, &Value::String(pattern.clone()))
            }
            Expr::IsNull { expr, negated } => {
                write!(f, "{} is {}null", expr, if *negated { "not " } else { "" })
            }
            Expr::And(exprs) => write_joined(f, exprs, " and "),
            Expr::Or(exprs) => write_joined(f, exprs, " or "),
            Expr::Not(inner) => write!(f, "not ({})", inner),
            Expr::Aggregate { function, arg } => match arg {
                Some(arg) => write!(f, "{}({})", function.name(), arg),
                None => write!(f, "{}(*)", function.name()),
            },
        }
    }
}

/// Escape LIKE metacharacters so `s` matches literally inside a pattern.
pub fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_between_rejects_reversed_bounds() {
        let age = Expr::field("member", "age");
        assert!(Expr::between(age.clone(), 10, 30).is_ok());
        assert!(Expr::between(age.clone(), 30, 30).is_ok());
        assert!(matches!(
            Expr::between(age.clone(), 30, 10),
            Err(Error::InvalidRange(_))
        ));
        assert!(matches!(
            Expr::between(age, 10, "x"),
            Err(Error::InvalidRange(_))
        ));
    }

    #[test]
    fn test_and_flattens() {
        let a = Expr::compare(CompareOp::Eq, Expr::field("m", "a"), Expr::literal(1));
        let b = Expr::compare(CompareOp::Eq, Expr::field("m", "b"), Expr::literal(2));
        let c = Expr::compare(CompareOp::Eq, Expr::field("m", "c"), Expr::literal(3));

        let combined = a.clone().and(b.clone()).and(c.clone());
        assert_eq!(combined, Expr::And(vec![a, b, c]));
    }

    #[test]
    fn test_all_of_empty_is_none() {
        assert!(Expr::all(Vec::new()).is_none());
        let single = Expr::is_null(Expr::field("m", "username"));
        assert_eq!(Expr::all(vec![single.clone()]), Some(single));
    }

    #[test]
    fn test_field_refs() {
        let expr = Expr::compare(
            CompareOp::Eq,
            Expr::field("member", "username"),
            Expr::field("team", "name"),
        );
        let refs = expr.field_refs();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1], &FieldRef::new("team", "name"));
    }

    #[test]
    fn test_is_grouped_by() {
        let name = Expr::field("team", "name");
        let avg = Expr::aggregate(AggregateFunction::Avg, Some(Expr::field("member", "age")));
        let keys = vec![name.clone()];

        assert!(name.is_grouped_by(&keys));
        assert!(avg.is_grouped_by(&keys));
        assert!(!Expr::field("member", "username").is_grouped_by(&keys));

        let having = Expr::compare(CompareOp::Gt, avg, Expr::literal(10));
        assert!(having.is_grouped_by(&keys));
        assert!(having.contains_aggregate());
    }

    #[test]
    fn test_display() {
        let avg = Expr::aggregate(AggregateFunction::Avg, Some(Expr::field("m", "age")));
        assert_eq!(avg.to_string(), "avg(m.age)");
        assert_eq!(Expr::aggregate(AggregateFunction::Count, None).to_string(), "count(*)");

        let eq = Expr::compare(CompareOp::Eq, Expr::field("t", "name"), Expr::literal("teamA"));
        assert_eq!(eq.to_string(), "t.name = 'teamA'");

        let cond = Expr::in_values(Expr::field("m", "age"), vec![10.into(), 20.into()])
            .or(Expr::is_null(Expr::field("m", "username")));
        assert_eq!(cond.to_string(), "(m.age in (10, 20) or m.username is null)");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("member"), "member");
    }
}
