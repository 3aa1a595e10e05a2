//! Songdkl Features
//!
//! Spectral feature vectors for segmented birdsong syllables.
//!
//! Each syllable clip becomes one vector: the clip is normalized, its power
//! spectral density is estimated with an FFT length scaled to the recording's
//! sample rate (16384 points at 32 kHz), the 600-16000 Hz band is kept and
//! the band is normalized again. Vectors from different sample rates have
//! different lengths and must not be mixed.
//!
//! ## Example
//!
//! ```no_run
//! use songdkl_audio::{SegmentConfig, Segmenter};
//! use songdkl_features::{FeatureConfig, SpectralFeaturizer};
//!
//! let segmenter = Segmenter::new(SegmentConfig::default())?;
//! let syllables = segmenter.segment_wav("bird/song_001.wav")?;
//!
//! let featurizer = SpectralFeaturizer::new(FeatureConfig::default())?;
//! let vectors = featurizer.featurize_clips(&syllables.segmentation.clips)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod featurize;
pub mod psd;

pub use error::{FeatureError, Result};
pub use featurize::{array_split, norm, FeatureConfig, RateFeaturizer, SpectralFeaturizer};
pub use psd::PsdEstimator;
