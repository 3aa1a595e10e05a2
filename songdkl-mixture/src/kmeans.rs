//! K-means labels used to seed EM
//!
//! One k-means++ seeded run of `linfa_clustering::KMeans`; its hard labels
//! become the initial one-hot responsibilities.

use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use ndarray::{Array1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::error::{MixtureError, Result};

/// Lloyd iteration cap
pub const KMEANS_MAX_ITER: u64 = 300;
/// Tolerance on the center shift between iterations
pub const KMEANS_TOL: f64 = 1e-4;

/// Cluster label of every row of `x` among `k` clusters
///
/// The k-means generator is seeded from `rng`, so a seeded caller gets
/// reproducible labels and successive calls draw different seeds.
pub fn kmeans_labels<R: Rng + ?Sized>(x: ArrayView2<f64>, k: usize, rng: &mut R) -> Result<Vec<usize>> {
    if k == 0 || k > x.nrows() {
        return Err(MixtureError::invalid_parameter(format!(
            "k-means needs 1 <= k <= n_samples, got k={} for {} samples",
            k,
            x.nrows()
        )));
    }

    let dataset = DatasetBase::from(x.to_owned());
    let model = KMeans::params_with_rng(k, StdRng::seed_from_u64(rng.gen()))
        .n_runs(1)
        .max_n_iterations(KMEANS_MAX_ITER)
        .tolerance(KMEANS_TOL)
        .fit(&dataset)
        .map_err(|e| MixtureError::fit_convergence(format!("k-means initialization failed: {}", e)))?;

    let labels: Array1<usize> = model.predict(&dataset);
    trace!("k-means with k={} labelled {} samples", k, labels.len());
    Ok(labels.to_vec())
}
