//! Aggregate functions and grouping keys.

use std::cmp::Ordering;

use ormq_proto::{AggregateFunction, Value};
use tracing::warn;

use crate::error::{Error, Result};

/// A hashable image of a [`Value`], used for grouping and hash joins.
///
/// Integers of either width share one representation so equal numbers meet
/// in the same bucket; nulls compare equal to each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
}

impl KeyPart {
    /// Hashable image of a value.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => KeyPart::Null,
            Value::Bool(b) => KeyPart::Bool(*b),
            Value::Int32(i) => KeyPart::Int(*i as i64),
            Value::Int64(i) => KeyPart::Int(*i),
            Value::Float64(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                KeyPart::Int(*f as i64)
            }
            Value::Float64(f) => KeyPart::Float(f.to_bits()),
            Value::String(s) => KeyPart::Str(s.clone()),
        }
    }
}

/// A group key: one part per group-by expression.
pub type GroupKey = Vec<KeyPart>;

/// Running state for one aggregate over a stream of values.
#[derive(Debug)]
pub struct Accumulator {
    function: AggregateFunction,
    count: u64,
    int_sum: Option<i64>,
    float_sum: f64,
    all_int: bool,
    extreme: Option<Value>,
}

impl Accumulator {
    /// Create an empty accumulator.
    pub fn new(function: AggregateFunction) -> Self {
        Self {
            function,
            count: 0,
            int_sum: Some(0),
            float_sum: 0.0,
            all_int: true,
            extreme: None,
        }
    }

    /// Count a row without looking at a value (`count(*)`).
    pub fn add_row(&mut self) {
        self.count += 1;
    }

    /// Feed one value. Nulls are skipped.
    pub fn add(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        self.count += 1;

        match self.function {
            AggregateFunction::Count => {}
            AggregateFunction::Sum | AggregateFunction::Avg => {
                let f = value.as_f64().ok_or_else(|| {
                    Error::InvalidPlan(format!(
                        "{} requires numeric values, found {}",
                        self.function.name(),
                        value.type_name()
                    ))
                })?;
                self.float_sum += f;
                match value {
                    Value::Int32(_) | Value::Int64(_) => {
                        let i = value.as_i64().unwrap_or_default();
                        self.int_sum = self.int_sum.and_then(|s| s.checked_add(i));
                    }
                    _ => self.all_int = false,
                }
            }
            AggregateFunction::Min | AggregateFunction::Max => {
                let replace = match &self.extreme {
                    None => true,
                    Some(current) => {
                        let ord = value.compare(current).ok_or_else(|| {
                            Error::InvalidPlan(format!(
                                "{} over incomparable values {} and {}",
                                self.function.name(),
                                current.type_name(),
                                value.type_name()
                            ))
                        })?;
                        match self.function {
                            AggregateFunction::Min => ord == Ordering::Less,
                            _ => ord == Ordering::Greater,
                        }
                    }
                };
                if replace {
                    self.extreme = Some(value.clone());
                }
            }
        }
        Ok(())
    }

    /// Produce the aggregate value.
    pub fn finish(self) -> Result<Value> {
        if self.function == AggregateFunction::Count {
            return Ok(Value::Int64(self.count as i64));
        }
        if self.count == 0 {
            warn!(function = self.function.name(), "Aggregate over empty input");
            return Err(Error::EmptyAggregate(self.function.name().to_string()));
        }
        Ok(match self.function {
            AggregateFunction::Sum => match (self.all_int, self.int_sum) {
                (true, Some(sum)) => Value::Int64(sum),
                _ => Value::Float64(self.float_sum),
            },
            AggregateFunction::Avg => Value::Float64(self.float_sum / self.count as f64),
            _ => self.extreme.unwrap_or(Value::Null),
        })
    }
}

/// Compute an aggregate over already-evaluated values.
pub fn aggregate_values<'a>(
    function: AggregateFunction,
    values: impl IntoIterator<Item = &'a Value>,
) -> Result<Value> {
    let mut acc = Accumulator::new(function);
    for v in values {
        acc.add(v)?;
    }
    acc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ages() -> Vec<Value> {
        [10, 20, 30, 40].into_iter().map(Value::Int32).collect()
    }

    #[test]
    fn test_aggregates_over_ages() {
        let ages = ages();
        assert_eq!(aggregate_values(AggregateFunction::Count, &ages).unwrap(), Value::Int64(4));
        assert_eq!(aggregate_values(AggregateFunction::Sum, &ages).unwrap(), Value::Int64(100));
        assert_eq!(
            aggregate_values(AggregateFunction::Avg, &ages).unwrap(),
            Value::Float64(25.0)
        );
        assert_eq!(aggregate_values(AggregateFunction::Max, &ages).unwrap(), Value::Int32(40));
        assert_eq!(aggregate_values(AggregateFunction::Min, &ages).unwrap(), Value::Int32(10));
    }

    #[test]
    fn test_nulls_are_skipped() {
        let values = vec![Value::Int32(10), Value::Null, Value::Int32(30)];
        assert_eq!(
            aggregate_values(AggregateFunction::Count, &values).unwrap(),
            Value::Int64(2)
        );
        assert_eq!(
            aggregate_values(AggregateFunction::Avg, &values).unwrap(),
            Value::Float64(20.0)
        );
    }

    #[test]
    fn test_empty_input() {
        let empty: Vec<Value> = vec![Value::Null];
        assert_eq!(
            aggregate_values(AggregateFunction::Count, &empty).unwrap(),
            Value::Int64(0)
        );
        for function in [
            AggregateFunction::Sum,
            AggregateFunction::Avg,
            AggregateFunction::Min,
            AggregateFunction::Max,
        ] {
            assert!(matches!(
                aggregate_values(function, &empty),
                Err(Error::EmptyAggregate(_))
            ));
        }
    }

    #[test]
    fn test_sum_of_reals_and_overflow() {
        let reals = vec![Value::Float64(1.5), Value::Int32(2)];
        assert_eq!(
            aggregate_values(AggregateFunction::Sum, &reals).unwrap(),
            Value::Float64(3.5)
        );

        let big = vec![Value::Int64(i64::MAX), Value::Int64(1)];
        assert!(matches!(
            aggregate_values(AggregateFunction::Sum, &big).unwrap(),
            Value::Float64(_)
        ));
    }

    #[test]
    fn test_type_errors() {
        let strings = vec![Value::String("a".into())];
        assert!(aggregate_values(AggregateFunction::Sum, &strings).is_err());
        assert_eq!(
            aggregate_values(AggregateFunction::Max, &strings).unwrap(),
            Value::String("a".into())
        );

        let mixed = vec![Value::String("a".into()), Value::Int32(1)];
        assert!(matches!(
            aggregate_values(AggregateFunction::Min, &mixed),
            Err(Error::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_key_parts() {
        assert_eq!(KeyPart::from_value(&Value::Int32(1)), KeyPart::from_value(&Value::Int64(1)));
        assert_eq!(
            KeyPart::from_value(&Value::Float64(1.0)),
            KeyPart::from_value(&Value::Int32(1))
        );
        assert_eq!(
            KeyPart::from_value(&Value::Float64(-0.0)),
            KeyPart::from_value(&Value::Float64(0.0))
        );
        assert_ne!(
            KeyPart::from_value(&Value::String("1".into())),
            KeyPart::from_value(&Value::Int32(1))
        );
        assert_eq!(KeyPart::from_value(&Value::Null), KeyPart::Null);
    }
}
