//! Mixture model hyperparameters

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MixtureError, Result};

pub const DEFAULT_MAX_ITER: usize = 100_000;
pub const DEFAULT_N_INIT: usize = 5;
pub const DEFAULT_RANDOM_STATE: u64 = 42;
pub const DEFAULT_REG_COVAR: f64 = 1e-6;
pub const DEFAULT_TOL: f64 = 1e-3;

/// Shape of each component's covariance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CovarianceType {
    /// One unconstrained matrix per component
    #[default]
    Full,
    /// One matrix shared by every component
    Tied,
    /// One diagonal per component
    Diag,
    /// One variance per component
    Spherical,
}

impl fmt::Display for CovarianceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Full => "full",
            Self::Tied => "tied",
            Self::Diag => "diag",
            Self::Spherical => "spherical",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for CovarianceType {
    type Err = MixtureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "tied" => Ok(Self::Tied),
            "diag" => Ok(Self::Diag),
            "spherical" => Ok(Self::Spherical),
            other => Err(MixtureError::invalid_parameter(format!(
                "invalid covariance type '{}', expected full, tied, diag or spherical",
                other
            ))),
        }
    }
}

/// How EM responsibilities are seeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitMethod {
    /// Hard assignments from a k-means++ seeded Lloyd run
    #[default]
    KMeans,
    /// Uniform random responsibilities, row-normalized
    Random,
}

impl FromStr for InitMethod {
    type Err = MixtureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "kmeans" => Ok(Self::KMeans),
            "random" => Ok(Self::Random),
            other => Err(MixtureError::invalid_parameter(format!(
                "invalid init method '{}', expected kmeans or random",
                other
            ))),
        }
    }
}

/// EM hyperparameters shared by every fit in a run
///
/// The component count is not part of this type; it is always passed
/// explicitly to [`crate::GaussianMixture::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GmmConfig {
    /// Maximum EM iterations per initialization (default: 100000)
    pub max_iter: usize,

    /// Number of initializations; the best lower bound wins (default: 5)
    pub n_init: usize,

    /// Covariance structure (default: full)
    pub covariance_type: CovarianceType,

    /// Seed for initialization (default: 42)
    pub random_state: u64,

    /// Added to covariance diagonals (default: 1e-6)
    pub reg_covar: f64,

    /// Convergence threshold on the lower-bound change (default: 1e-3)
    pub tol: f64,

    /// Responsibility initialization (default: kmeans)
    pub init: InitMethod,
}

impl Default for GmmConfig {
    fn default() -> Self {
        Self {
            max_iter: DEFAULT_MAX_ITER,
            n_init: DEFAULT_N_INIT,
            covariance_type: CovarianceType::default(),
            random_state: DEFAULT_RANDOM_STATE,
            reg_covar: DEFAULT_REG_COVAR,
            tol: DEFAULT_TOL,
            init: InitMethod::default(),
        }
    }
}

impl GmmConfig {
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn with_covariance_type(mut self, covariance_type: CovarianceType) -> Self {
        self.covariance_type = covariance_type;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_reg_covar(mut self, reg_covar: f64) -> Self {
        self.reg_covar = reg_covar;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_init(mut self, init: InitMethod) -> Self {
        self.init = init;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.n_init == 0 {
            return Err(MixtureError::invalid_parameter("n_init must be at least 1"));
        }

        if !(self.reg_covar >= 0.0) {
            return Err(MixtureError::invalid_parameter(format!(
                "reg_covar must be non-negative, got {}",
                self.reg_covar
            )));
        }

        if !(self.tol >= 0.0) {
            return Err(MixtureError::invalid_parameter(format!(
                "tol must be non-negative, got {}",
                self.tol
            )));
        }

        Ok(())
    }
}
