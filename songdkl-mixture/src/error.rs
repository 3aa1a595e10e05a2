//! Error types for mixture model fitting

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MixtureError>;

#[derive(Error, Debug)]
pub enum MixtureError {
    #[error("Fit failed: {0}")]
    FitConvergence(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Model not fitted, call fit() first")]
    NotFitted,
}

impl MixtureError {
    pub fn fit_convergence<S: Into<String>>(msg: S) -> Self {
        Self::FitConvergence(msg.into())
    }

    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
