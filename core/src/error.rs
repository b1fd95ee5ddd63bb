//! Error type for the smoothing core
//!
//! The numerical pipeline can only fail in two ways: the caller handed it something it cannot
//! smooth, or the model built from the caller's parameters cannot be inverted somewhere along
//! the forward or backward pass. Neither is transient, so neither is retried; no partial output
//! is ever returned alongside an error.

use thiserror::Error;

/// Failure of a smoothing run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SmootherError {
    /// Observations or tuning parameters were rejected before any matrix was built.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A matrix that must be inverted was singular, not positive definite, or produced
    /// non-finite values.
    #[error("ill-conditioned model: {0}")]
    IllConditionedModel(String),
}

impl SmootherError {
    pub(crate) fn invalid<S: Into<String>>(message: S) -> Self {
        SmootherError::InvalidInput(message.into())
    }
    pub(crate) fn ill_conditioned<S: Into<String>>(message: S) -> Self {
        SmootherError::IllConditionedModel(message.into())
    }
}
