//! Gaussian mixture models for song feature spaces
//!
//! Fits full, tied, diagonal or spherical Gaussian mixtures by
//! expectation-maximization with k-means++ (or random) initialization and
//! multiple seeded restarts. Fitted models expose per-sample log-densities,
//! hard and soft assignments, and information criteria for choosing the
//! number of components.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ndarray::array;
//! use songdkl_mixture::{CovarianceType, GaussianMixture, GmmConfig};
//!
//! # fn main() -> songdkl_mixture::Result<()> {
//! let x = array![[0.0, 0.1], [0.2, 0.0], [5.0, 5.1], [5.2, 4.9]];
//! let config = GmmConfig::default().with_covariance_type(CovarianceType::Diag);
//! let mut gmm = GaussianMixture::new(2, config)?;
//! gmm.fit(x.view())?;
//! println!("mean log-likelihood {:.3}", gmm.score(x.view())?);
//! println!("BIC {:.3}", gmm.bic(x.view())?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod gmm;
pub mod kmeans;
pub mod linalg;

pub use config::{CovarianceType, GmmConfig, InitMethod};
pub use error::{MixtureError, Result};
pub use gmm::{logsumexp, Covariances, FitSummary, GaussianMixture};
pub use kmeans::kmeans_labels;
