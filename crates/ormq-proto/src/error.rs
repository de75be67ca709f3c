//! IR-level error types.

use thiserror::Error;

/// Errors raised while constructing or validating query IR.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A range predicate whose bounds are reversed or incomparable.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// A structurally invalid query plan.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// Plan encoding/decoding error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
