//! Error types for spectral feature extraction

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Degenerate signal: {0}")]
    DegenerateSignal(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl FeatureError {
    pub fn degenerate_signal<S: Into<String>>(msg: S) -> Self {
        Self::DegenerateSignal(msg.into())
    }

    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
