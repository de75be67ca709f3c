//! Core error types.

use thiserror::Error;

/// Query engine errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Range bounds out of order or incomparable.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// Malformed plan or unresolvable name.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// A single-result fetch matched more than one row.
    #[error("expected at most one result, found {0}")]
    TooManyResults(usize),

    /// sum/avg/min/max over no values.
    #[error("{0} over an empty set of values")]
    EmptyAggregate(String),

    /// Intermediate bindings exceeded the configured budget.
    #[error("intermediate result of {actual} rows exceeds budget of {limit}")]
    BudgetExceeded {
        /// Configured maximum.
        limit: usize,
        /// Rows produced.
        actual: usize,
    },

    /// Malformed dataset or row shape.
    #[error("invalid dataset: {0}")]
    Dataset(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<ormq_proto::Error> for Error {
    fn from(err: ormq_proto::Error) -> Self {
        match err {
            ormq_proto::Error::InvalidRange(msg) => Error::InvalidRange(msg),
            ormq_proto::Error::InvalidPlan(msg) => Error::InvalidPlan(msg),
            ormq_proto::Error::Serialization(msg) => Error::Serialization(msg),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proto_errors_convert() {
        let err: Error = ormq_proto::Error::InvalidRange("30 > 10".into()).into();
        assert_eq!(err, Error::InvalidRange("30 > 10".into()));

        let err: Error = ormq_proto::Error::InvalidPlan("no source".into()).into();
        assert!(matches!(err, Error::InvalidPlan(_)));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::TooManyResults(2).to_string(),
            "expected at most one result, found 2"
        );
        assert_eq!(
            Error::BudgetExceeded { limit: 10, actual: 16 }.to_string(),
            "intermediate result of 16 rows exceeds budget of 10"
        );
    }
}
