//! Pipeline configuration
//!
//! One value gathers every tunable of a run. Defaults come from named
//! constants; `validate()` rejects bad values before any audio is read.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use songdkl_audio::SegmentConfig;
use songdkl_features::FeatureConfig;
use songdkl_mixture::GmmConfig;

use crate::error::{Result, SongDklError};

pub const DEFAULT_MAX_WAVS: usize = 120;
pub const DEFAULT_MAX_NUM_PSDS: usize = 10_000;
pub const DEFAULT_N_BASIS: usize = 50;
pub const DEFAULT_MIN_COMPONENTS: usize = 2;
pub const DEFAULT_MAX_COMPONENTS: usize = 22;
pub const DEFAULT_N_SPLITS: usize = 1;

/// How the basis set is drawn from the reference collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasisPolicy {
    /// The first `n_basis` vectors in extraction order
    #[default]
    First,
    /// `n_basis` indices drawn uniformly with replacement
    Random,
}

impl fmt::Display for BasisPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Random => write!(f, "random"),
        }
    }
}

impl FromStr for BasisPolicy {
    type Err = SongDklError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "first" => Ok(Self::First),
            "random" => Ok(Self::Random),
            other => Err(SongDklError::invalid_parameter(format!(
                "invalid basis '{}', must be one of first, random",
                other
            ))),
        }
    }
}

/// Everything a divergence or syllable-count run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Maximum WAV files read per directory (default: 120)
    pub max_wavs: usize,

    /// Maximum feature vectors kept per collection (default: 10000)
    pub max_num_psds: usize,

    /// Basis set size (default: 50)
    pub n_basis: usize,

    /// Basis selection policy (default: first)
    pub basis: BasisPolicy,

    /// Seed for random basis selection; entropy when unset
    pub basis_seed: Option<u64>,

    /// Syllable segmentation
    pub segment: SegmentConfig,

    /// PSD feature extraction
    pub features: FeatureConfig,

    /// Mixture model hyperparameters
    pub gmm: GmmConfig,

    /// Smallest component count in the syllable-count sweep (default: 2)
    pub min_components: usize,

    /// Exclusive upper bound of the sweep (default: 22)
    pub max_components: usize,

    /// Cross-validation folds for the sweep; 1 disables splitting (default: 1)
    pub n_splits: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_wavs: DEFAULT_MAX_WAVS,
            max_num_psds: DEFAULT_MAX_NUM_PSDS,
            n_basis: DEFAULT_N_BASIS,
            basis: BasisPolicy::default(),
            basis_seed: None,
            segment: SegmentConfig::default(),
            features: FeatureConfig::default(),
            gmm: GmmConfig::default(),
            min_components: DEFAULT_MIN_COMPONENTS,
            max_components: DEFAULT_MAX_COMPONENTS,
            n_splits: DEFAULT_N_SPLITS,
        }
    }
}

impl PipelineConfig {
    /// Set the WAV file cap
    pub fn max_wavs(mut self, n: usize) -> Self {
        self.max_wavs = n;
        self
    }

    /// Set the feature vector cap
    pub fn max_num_psds(mut self, n: usize) -> Self {
        self.max_num_psds = n;
        self
    }

    /// Set the basis set size
    pub fn n_basis(mut self, n: usize) -> Self {
        self.n_basis = n;
        self
    }

    /// Set the basis policy
    pub fn basis(mut self, policy: BasisPolicy) -> Self {
        self.basis = policy;
        self
    }

    /// Seed random basis selection
    pub fn basis_seed(mut self, seed: u64) -> Self {
        self.basis_seed = Some(seed);
        self
    }

    pub fn segment(mut self, segment: SegmentConfig) -> Self {
        self.segment = segment;
        self
    }

    pub fn features(mut self, features: FeatureConfig) -> Self {
        self.features = features;
        self
    }

    pub fn gmm(mut self, gmm: GmmConfig) -> Self {
        self.gmm = gmm;
        self
    }

    /// Set the `[min, max)` component sweep
    pub fn components(mut self, min: usize, max: usize) -> Self {
        self.min_components = min;
        self.max_components = max;
        self
    }

    /// Set the number of cross-validation folds
    pub fn n_splits(mut self, n: usize) -> Self {
        self.n_splits = n;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_wavs == 0 {
            return Err(SongDklError::invalid_parameter("max_wavs must be positive"));
        }

        if self.max_num_psds == 0 {
            return Err(SongDklError::invalid_parameter("max_num_psds must be positive"));
        }

        if self.n_basis == 0 {
            return Err(SongDklError::invalid_parameter("n_basis must be positive"));
        }

        if self.min_components == 0 {
            return Err(SongDklError::invalid_parameter(
                "min_components must be positive",
            ));
        }

        if self.max_components <= self.min_components {
            return Err(SongDklError::invalid_parameter(format!(
                "max_components ({}) must be greater than min_components ({})",
                self.max_components, self.min_components
            )));
        }

        if self.n_splits == 0 {
            return Err(SongDklError::invalid_parameter("n_splits must be at least 1"));
        }

        if self.n_splits > self.max_num_psds {
            return Err(SongDklError::invalid_parameter(format!(
                "n_splits ({}) exceeds max_num_psds ({}); every fold needs a feature vector",
                self.n_splits, self.max_num_psds
            )));
        }

        self.segment.validate()?;
        self.features.validate()?;
        self.gmm.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use songdkl_audio::ThresholdPolicy;
    use songdkl_mixture::CovarianceType;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_wavs, 120);
        assert_eq!(config.max_num_psds, 10_000);
        assert_eq!(config.n_basis, 50);
        assert_eq!(config.basis, BasisPolicy::First);
        assert_eq!(config.min_components, 2);
        assert_eq!(config.max_components, 22);
        assert_eq!(config.n_splits, 1);
        assert_eq!(config.segment.threshold, ThresholdPolicy::HalfOtsu);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_basis_policy_parse() {
        assert_eq!("first".parse::<BasisPolicy>().unwrap(), BasisPolicy::First);
        assert_eq!("Random".parse::<BasisPolicy>().unwrap(), BasisPolicy::Random);
        assert!(matches!(
            "last".parse::<BasisPolicy>(),
            Err(SongDklError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_validation_fails_fast() {
        assert!(PipelineConfig::default().n_basis(0).validate().is_err());
        assert!(PipelineConfig::default().components(5, 5).validate().is_err());
        assert!(PipelineConfig::default().components(0, 3).validate().is_err());
        assert!(PipelineConfig::default().n_splits(0).validate().is_err());
        assert!(PipelineConfig::default()
            .gmm(GmmConfig::default().with_n_init(0))
            .validate()
            .is_err());
    }

    #[test]
    fn test_n_splits_bounded_by_max_num_psds() {
        let config = PipelineConfig::default().max_num_psds(4).n_splits(5);
        assert!(matches!(
            config.validate(),
            Err(SongDklError::InvalidParameter(_))
        ));
        assert!(PipelineConfig::default().max_num_psds(5).n_splits(5).validate().is_ok());

        let from_file = toml::from_str::<PipelineConfig>("max_num_psds = 3\nn_splits = 4\n").unwrap();
        assert!(from_file.validate().is_err());
    }

    #[test]
    fn test_toml_overlay() {
        let config: PipelineConfig = toml::from_str(
            r#"
            n_basis = 25
            basis = "random"
            basis_seed = 7

            [segment]
            threshold = "half-average"

            [gmm]
            covariance_type = "diag"
            "#,
        )
        .unwrap();

        assert_eq!(config.n_basis, 25);
        assert_eq!(config.basis, BasisPolicy::Random);
        assert_eq!(config.basis_seed, Some(7));
        assert_eq!(config.segment.threshold, ThresholdPolicy::HalfAverage);
        assert_eq!(config.gmm.covariance_type, CovarianceType::Diag);
        assert_eq!(config.max_wavs, DEFAULT_MAX_WAVS);
    }

    #[test]
    fn test_component_count_in_gmm_section_rejected() {
        let result = toml::from_str::<PipelineConfig>("[gmm]\nn_components = 3\n");
        assert!(result.is_err());
    }
}
