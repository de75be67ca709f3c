//! Core type definitions for the catalog.

use ormq_proto::Value;
use serde::{Deserialize, Serialize};

/// Scalar data types a field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
}

/// Field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// A scalar value.
    Scalar(ScalarType),
    /// An optional scalar value (nullable).
    OptionalScalar(ScalarType),
}

impl ScalarType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Int32 | ScalarType::Int64 | ScalarType::Float64)
    }

    /// Check whether a non-null value has this type.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ScalarType::Bool, Value::Bool(_))
                | (ScalarType::Int32, Value::Int32(_))
                | (ScalarType::Int64, Value::Int64(_))
                | (ScalarType::Float64, Value::Float64(_))
                | (ScalarType::String, Value::String(_))
        )
    }
}

impl FieldType {
    /// Create a scalar field type.
    pub fn scalar(scalar: ScalarType) -> Self {
        FieldType::Scalar(scalar)
    }

    /// Create an optional scalar field type.
    pub fn optional(scalar: ScalarType) -> Self {
        FieldType::OptionalScalar(scalar)
    }

    /// The underlying scalar type.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            FieldType::Scalar(s) | FieldType::OptionalScalar(s) => *s,
        }
    }

    /// Check if this type is nullable.
    pub fn is_nullable(&self) -> bool {
        matches!(self, FieldType::OptionalScalar(_))
    }

    /// Check whether a value may be stored in a field of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match value {
            Value::Null => self.is_nullable(),
            v => self.scalar_type().accepts(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_type_numeric() {
        assert!(ScalarType::Int32.is_numeric());
        assert!(ScalarType::Float64.is_numeric());
        assert!(!ScalarType::String.is_numeric());
        assert!(!ScalarType::Bool.is_numeric());
    }

    #[test]
    fn test_field_type_accepts() {
        let name = FieldType::optional(ScalarType::String);
        assert!(name.accepts(&Value::Null));
        assert!(name.accepts(&Value::String("member1".into())));
        assert!(!name.accepts(&Value::Int32(1)));

        let age = FieldType::scalar(ScalarType::Int32);
        assert!(!age.accepts(&Value::Null));
        assert!(age.accepts(&Value::Int32(10)));
        assert!(!age.accepts(&Value::Int64(10)));
    }
}
