//! Expression evaluation with three-valued logic.
//!
//! Predicates evaluate to `Some(true)`, `Some(false)` or `None` (unknown).
//! Any comparison involving null is unknown, `not` keeps unknown unknown, and
//! callers keep a row only when the result is `Some(true)`.

use std::cmp::Ordering;

use ormq_proto::{AggregateFunction, Expr, FieldRef, Value};

use crate::error::{Error, Result};

/// Where an expression's leaves get their values.
pub trait RowContext {
    /// Value of a field reference.
    fn field(&self, field: &FieldRef) -> Result<Value>;

    /// Value of an aggregate.
    fn aggregate(&self, function: AggregateFunction, arg: Option<&Expr>) -> Result<Value>;

    /// Precomputed value for a whole sub-expression, such as a group key.
    fn lookup(&self, _expr: &Expr) -> Option<Value> {
        None
    }
}

/// Evaluates expressions against a [`RowContext`].
pub struct FilterEvaluator;

impl FilterEvaluator {
    /// Evaluate an expression to a value. Predicates yield `Bool`, or `Null`
    /// when unknown.
    pub fn value(expr: &Expr, ctx: &dyn RowContext) -> Result<Value> {
        if let Some(v) = ctx.lookup(expr) {
            return Ok(v);
        }
        match expr {
            Expr::Field(f) => ctx.field(f),
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Aggregate { function, arg } => ctx.aggregate(*function, arg.as_deref()),
            predicate => Ok(match Self::evaluate(predicate, ctx)? {
                Some(b) => Value::Bool(b),
                None => Value::Null,
            }),
        }
    }

    /// Evaluate a predicate.
    pub fn evaluate(expr: &Expr, ctx: &dyn RowContext) -> Result<Option<bool>> {
        if let Some(v) = ctx.lookup(expr) {
            return truth(expr, &v);
        }
        match expr {
            Expr::Field(_) | Expr::Literal(_) | Expr::Aggregate { .. } => {
                let v = Self::value(expr, ctx)?;
                truth(expr, &v)
            }

            Expr::Compare { op, left, right } => {
                let l = Self::value(left, ctx)?;
                let r = Self::value(right, ctx)?;
                Ok(compare_values(&l, &r).map(|ord| op.matches(ord)))
            }

            Expr::Between { expr, low, high } => {
                let v = Self::value(expr, ctx)?;
                let lower = compare_values(&v, low);
                let upper = compare_values(&v, high);
                Ok(match (lower, upper) {
                    (Some(lo), Some(hi)) => Some(lo.is_ge() && hi.is_le()),
                    _ => None,
                })
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                if values.is_empty() {
                    return Ok(Some(*negated));
                }
                let v = Self::value(expr, ctx)?;
                if v.is_null() {
                    return Ok(None);
                }
                let mut unknown = false;
                for candidate in values {
                    match compare_values(&v, candidate) {
                        Some(Ordering::Equal) => return Ok(Some(!negated)),
                        None if candidate.is_null() => unknown = true,
                        _ => {}
                    }
                }
                Ok(if unknown { None } else { Some(*negated) })
            }

            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let v = Self::value(expr, ctx)?;
                Ok(v.as_str().map(|s| like_match(s, pattern) != *negated))
            }

            Expr::IsNull { expr, negated } => {
                let v = Self::value(expr, ctx)?;
                Ok(Some(v.is_null() != *negated))
            }

            Expr::And(exprs) => {
                let mut result = Some(true);
                for e in exprs {
                    match Self::evaluate(e, ctx)? {
                        Some(false) => return Ok(Some(false)),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                Ok(result)
            }

            Expr::Or(exprs) => {
                let mut result = Some(false);
                for e in exprs {
                    match Self::evaluate(e, ctx)? {
                        Some(true) => return Ok(Some(true)),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                Ok(result)
            }

            Expr::Not(inner) => Ok(Self::evaluate(inner, ctx)?.map(|b| !b)),
        }
    }

    /// Whether a row passes the filter.
    pub fn matches(expr: &Expr, ctx: &dyn RowContext) -> Result<bool> {
        Ok(Self::evaluate(expr, ctx)? == Some(true))
    }
}

fn truth(expr: &Expr, value: &Value) -> Result<Option<bool>> {
    match value {
        Value::Bool(b) => Ok(Some(*b)),
        Value::Null => Ok(None),
        other => Err(Error::InvalidPlan(format!(
            "'{}' is used as a condition but evaluates to {}",
            expr,
            other.type_name()
        ))),
    }
}

/// Compare two values; `None` when either is null or they are incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    a.compare(b)
}

/// Check if two values are equal under query semantics.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Some(Ordering::Equal)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PatternToken {
    AnyRun,
    AnyOne,
    Literal(char),
}

fn tokenize(pattern: &str) -> Vec<PatternToken> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => PatternToken::AnyRun,
            '_' => PatternToken::AnyOne,
            // A trailing backslash matches itself.
            '\\' => PatternToken::Literal(chars.next().unwrap_or('\\')),
            c => PatternToken::Literal(c),
        });
    }
    tokens
}

/// SQL LIKE matching: `%` matches any run, `_` one character, `\` escapes.
///
/// Greedy matching with a single backtrack point at the last `%`.
pub fn like_match(value: &str, pattern: &str) -> bool {
    let tokens = tokenize(pattern);
    let chars: Vec<char> = value.chars().collect();

    let (mut t, mut c) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while c < chars.len() {
        match tokens.get(t) {
            Some(PatternToken::AnyRun) => {
                backtrack = Some((t, c));
                t += 1;
            }
            Some(PatternToken::AnyOne) => {
                t += 1;
                c += 1;
            }
            Some(PatternToken::Literal(p)) if *p == chars[c] => {
                t += 1;
                c += 1;
            }
            _ => match backtrack {
                Some((bt, bc)) => {
                    backtrack = Some((bt, bc + 1));
                    t = bt + 1;
                    c = bc + 1;
                }
                None => return false,
            },
        }
    }

    tokens[t..].iter().all(|tok| *tok == PatternToken::AnyRun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormq_proto::CompareOp;

    struct Row(Vec<(&'static str, Value)>);

    impl RowContext for Row {
        fn field(&self, field: &FieldRef) -> Result<Value> {
            Ok(self
                .0
                .iter()
                .find(|(n, _)| *n == field.field)
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Null))
        }

        fn aggregate(&self, _: AggregateFunction, _: Option<&Expr>) -> Result<Value> {
            Err(Error::InvalidPlan("no groups".into()))
        }
    }

    fn member(username: Option<&str>, age: i32) -> Row {
        Row(vec![
            ("username", username.map(str::to_string).into()),
            ("age", Value::Int32(age)),
        ])
    }

    fn username() -> Expr {
        Expr::field("m", "username")
    }

    fn age() -> Expr {
        Expr::field("m", "age")
    }

    fn eval(expr: &Expr, row: &Row) -> Option<bool> {
        FilterEvaluator::evaluate(expr, row).unwrap()
    }

    #[test]
    fn test_comparisons() {
        let row = member(Some("member1"), 10);
        let cases = [
            (CompareOp::Eq, 10, true),
            (CompareOp::Ne, 10, false),
            (CompareOp::Lt, 11, true),
            (CompareOp::Le, 10, true),
            (CompareOp::Gt, 10, false),
            (CompareOp::Ge, 10, true),
        ];
        for (op, literal, expected) in cases {
            let expr = Expr::compare(op, age(), Expr::literal(literal));
            assert_eq!(eval(&expr, &row), Some(expected), "{}", expr);
        }
    }

    #[test]
    fn test_null_comparison_is_unknown() {
        let row = member(None, 10);
        let eq = Expr::compare(CompareOp::Eq, username(), Expr::literal("member1"));
        let ne = Expr::compare(CompareOp::Ne, username(), Expr::literal("member1"));

        assert_eq!(eval(&eq, &row), None);
        assert_eq!(eval(&ne, &row), None);
        assert_eq!(eval(&eq.clone().not(), &row), None);
        assert!(!FilterEvaluator::matches(&eq.not(), &row).unwrap());
    }

    #[test]
    fn test_kleene_and_or() {
        let row = member(None, 10);
        let unknown = Expr::compare(CompareOp::Eq, username(), Expr::literal("x"));
        let t = Expr::compare(CompareOp::Eq, age(), Expr::literal(10));
        let f = Expr::compare(CompareOp::Eq, age(), Expr::literal(11));

        assert_eq!(eval(&unknown.clone().and(f.clone()), &row), Some(false));
        assert_eq!(eval(&unknown.clone().and(t.clone()), &row), None);
        assert_eq!(eval(&unknown.clone().or(t), &row), Some(true));
        assert_eq!(eval(&unknown.or(f), &row), None);
        assert_eq!(eval(&Expr::And(vec![]), &row), Some(true));
        assert_eq!(eval(&Expr::Or(vec![]), &row), Some(false));
    }

    #[test]
    fn test_between_inclusive() {
        let expr = Expr::between(age(), 10, 30).unwrap();
        for (a, expected) in [(9, false), (10, true), (20, true), (30, true), (31, false)] {
            assert_eq!(eval(&expr, &member(None, a)), Some(expected));
        }
    }

    #[test]
    fn test_in_and_not_in() {
        let row = member(Some("member1"), 10);
        let null_row = member(None, 10);

        let in_list = Expr::in_values(age(), vec![10.into(), 20.into()]);
        assert_eq!(eval(&in_list, &row), Some(true));
        let not_in = Expr::not_in_values(age(), vec![10.into(), 20.into()]);
        assert_eq!(eval(&not_in, &row), Some(false));

        assert_eq!(eval(&Expr::in_values(username(), vec![]), &null_row), Some(false));
        assert_eq!(eval(&Expr::not_in_values(username(), vec![]), &null_row), Some(true));
        assert_eq!(
            eval(&Expr::not_in_values(username(), vec!["a".into()]), &null_row),
            None
        );
        assert_eq!(
            eval(&Expr::not_in_values(age(), vec![20.into(), Value::Null]), &row),
            None
        );
    }

    #[test]
    fn test_is_null() {
        let row = member(None, 10);
        assert_eq!(eval(&Expr::is_null(username()), &row), Some(true));
        assert_eq!(eval(&Expr::is_not_null(username()), &row), Some(false));
        assert_eq!(eval(&Expr::is_not_null(age()), &row), Some(true));
    }

    #[test]
    fn test_like_predicate() {
        let row = member(Some("member1"), 10);
        assert_eq!(eval(&Expr::like(username(), "member%"), &row), Some(true));
        assert_eq!(eval(&Expr::like(username(), "%ber_"), &row), Some(true));
        assert_eq!(eval(&Expr::like(username(), "team%"), &row), Some(false));
        assert_eq!(eval(&Expr::like(username(), "%"), &member(None, 1)), None);
    }

    #[test]
    fn test_like_match() {
        assert!(like_match("member1", "member1"));
        assert!(like_match("member1", "%"));
        assert!(like_match("", "%"));
        assert!(!like_match("", "_"));
        assert!(like_match("member1", "%mem%1"));
        assert!(like_match("member1", "m_mber_"));
        assert!(!like_match("member1", "m_mber"));
        assert!(like_match("abcabc", "%abc"));
        assert!(like_match("aXbXc", "a%b%c"));
        assert!(!like_match("aXbXd", "a%b%c"));
        assert!(like_match("50%", "50\\%"));
        assert!(!like_match("500", "50\\%"));
        assert!(like_match("a_b", "a\\_b"));
        assert!(!like_match("axb", "a\\_b"));
        assert!(like_match("c:\\", "c:\\\\"));
    }

    #[test]
    fn test_non_boolean_condition_is_error() {
        let row = member(Some("member1"), 10);
        assert!(matches!(
            FilterEvaluator::evaluate(&age(), &row),
            Err(Error::InvalidPlan(_))
        ));
        assert_eq!(eval(&Expr::literal(true), &row), Some(true));
    }

    #[test]
    fn test_value_of_predicate() {
        let row = member(None, 10);
        let unknown = Expr::compare(CompareOp::Eq, username(), Expr::literal("x"));
        assert_eq!(FilterEvaluator::value(&unknown, &row).unwrap(), Value::Null);
        assert_eq!(FilterEvaluator::value(&age(), &row).unwrap(), Value::Int32(10));
    }
}
