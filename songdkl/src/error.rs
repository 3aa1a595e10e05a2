//! Error types for the divergence and syllable-count pipeline

use songdkl_audio::AudioError;
use songdkl_features::FeatureError;
use songdkl_mixture::MixtureError;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, SongDklError>;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum SongDklError {
    /// Waveform too short or otherwise unsegmentable
    #[error("Segmentation error: {0}")]
    Segmentation(String),

    /// Zero-variance clip or degenerate similarity scale
    #[error("Degenerate signal: {0}")]
    DegenerateSignal(String),

    /// Feature vectors of inconsistent length
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Rejected before any computation starts
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// EM could not produce a valid model
    #[error("Fit failed: {0}")]
    FitConvergence(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Feature store could not be read or written
    #[error("Store error: {0}")]
    Store(#[from] serde_json::Error),
}

impl SongDklError {
    pub fn segmentation<S: Into<String>>(msg: S) -> Self {
        Self::Segmentation(msg.into())
    }

    pub fn degenerate_signal<S: Into<String>>(msg: S) -> Self {
        Self::DegenerateSignal(msg.into())
    }

    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn fit_convergence<S: Into<String>>(msg: S) -> Self {
        Self::FitConvergence(msg.into())
    }
}

impl From<AudioError> for SongDklError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::Segmentation(msg) => Self::Segmentation(msg),
            AudioError::InvalidParameter(msg) => Self::InvalidParameter(msg),
            AudioError::Wav(e) => Self::Wav(e),
            AudioError::Io(e) => Self::Io(e),
        }
    }
}

impl From<FeatureError> for SongDklError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::DegenerateSignal(msg) => Self::DegenerateSignal(msg),
            FeatureError::InvalidParameter(msg) => Self::InvalidParameter(msg),
        }
    }
}

impl From<MixtureError> for SongDklError {
    fn from(err: MixtureError) -> Self {
        match err {
            MixtureError::FitConvergence(msg) => Self::FitConvergence(msg),
            MixtureError::InvalidParameter(msg) => Self::InvalidParameter(msg),
            MixtureError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            MixtureError::NotFitted => Self::fit_convergence("model was scored before fitting"),
        }
    }
}
