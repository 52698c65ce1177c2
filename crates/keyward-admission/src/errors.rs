//! Admission controller error types.

use thiserror::Error;

/// Errors raised while configuring an [`AdmissionController`](crate::AdmissionController)
#[derive(Debug, Error, PartialEq)]
pub enum AdmissionError {
    /// Limit is NaN or infinite
    #[error("rate limit must be a finite number, got {0}")]
    NonFiniteLimit(f64),

    /// Limit smaller than the cost of a single request
    #[error("rate limit {limit} is below the cost of a single request ({cost})")]
    LimitBelowCost { limit: f64, cost: f64 },

    /// Zero-length averaging period
    #[error("rate limit period must be greater than zero")]
    ZeroPeriod,
}

/// Result type for admission operations
pub type Result<T> = std::result::Result<T, AdmissionError>;
