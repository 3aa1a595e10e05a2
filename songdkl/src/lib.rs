//! Song D(KL): birdsong divergence and syllable-type counting
//!
//! Compares two birds' songs by fitting a Gaussian mixture to each bird's
//! syllables and cross-scoring held-out syllables, and estimates how many
//! syllable types one bird sings by BIC model selection.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ WAV directory │──>│ Segmenter      │──>│ Spectral      │──>│ N x D         │
//! │ (sorted)      │   │ (songdkl-audio)│   │ Featurizer    │   │ feature matrix│
//! └──────────────┘   └───────────────┘   └──────────────┘   └──────┬───────┘
//!                                                                   │
//!                      ┌──────────────────────────┬────────────────┘
//!                      v                          v
//!            ┌───────────────────┐      ┌──────────────────────┐
//!            │ Divergence        │      │ SyllableCount         │
//!            │ Calculator        │      │ Estimator             │
//!            │ (shared-max sims) │      │ (x1000 sims, BIC)     │
//!            └───────────────────┘      └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use songdkl::{calculate_from_path, numsyls_from_path, PipelineConfig};
//!
//! let config = PipelineConfig::default().n_basis(50);
//! let result = calculate_from_path(Path::new("tutor/"), Path::new("pupil/"), 9, 9, &config)?;
//! println!("D_KL(P||Q) = {:.4}", result.dkl_pq);
//!
//! let count = numsyls_from_path(Path::new("tutor/"), &config)?;
//! println!("{} syllable types", count.n_syls());
//! # Ok::<(), songdkl::SongDklError>(())
//! ```

pub mod annotation;
pub mod basis;
pub mod config;
pub mod divergence;
pub mod embed;
mod error;
pub mod numsyls;
pub mod prep;
pub mod store;

pub use basis::BasisSelection;
pub use config::{BasisPolicy, PipelineConfig};
pub use divergence::{calculate_from_path, DivergenceCalculator, DivergenceResult};
pub use embed::{sqeuclidean_cdist, SimilarityEmbedder};
pub use error::{Result, SongDklError};
pub use numsyls::{numsyls_from_path, SyllableCountEstimator, SyllableCountResult};
pub use prep::{load_or_prep, prep, prep_and_save, PreparedDataset};
pub use store::{load_psds, save_psds, PsdStore};

pub use songdkl_audio::{SegmentConfig, ThresholdPolicy};
pub use songdkl_features::FeatureConfig;
pub use songdkl_mixture::{CovarianceType, GmmConfig};
