//! Gaussian mixture model fit by expectation-maximization
//!
//! Each fit runs `n_init` initializations from one seeded generator and keeps
//! the parameters with the highest final lower bound (mean log-likelihood).
//! Covariances are stored together with upper-triangular precision factors
//! so log-densities never need an explicit inverse.

use std::f64::consts::PI;

use ndarray::{s, Array1, Array2, Array3, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::config::{CovarianceType, GmmConfig, InitMethod};
use crate::error::{MixtureError, Result};
use crate::kmeans::kmeans_labels;
use crate::linalg::precision_cholesky;

/// Covariances in the layout of their [`CovarianceType`]
#[derive(Debug, Clone, PartialEq)]
pub enum Covariances {
    /// `k × d × d`
    Full(Array3<f64>),
    /// `d × d`
    Tied(Array2<f64>),
    /// `k × d`
    Diag(Array2<f64>),
    /// `k`
    Spherical(Array1<f64>),
}

/// Precision factors matching [`Covariances`]
#[derive(Debug, Clone, PartialEq)]
enum PrecisionCholesky {
    Full(Array3<f64>),
    Tied(Array2<f64>),
    Diag(Array2<f64>),
    Spherical(Array1<f64>),
}

#[derive(Debug, Clone)]
struct Params {
    weights: Array1<f64>,
    means: Array2<f64>,
    covariances: Covariances,
    precisions_cholesky: PrecisionCholesky,
}

/// Outcome of a fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSummary {
    pub converged: bool,
    pub n_iter: usize,
    pub lower_bound: f64,
}

/// Gaussian mixture with `n_components` components
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    n_components: usize,
    config: GmmConfig,
    params: Option<Params>,
    summary: Option<FitSummary>,
}

impl GaussianMixture {
    /// Create an unfitted model; `n_components` must be positive
    pub fn new(n_components: usize, config: GmmConfig) -> Result<Self> {
        if n_components == 0 {
            return Err(MixtureError::invalid_parameter(
                "n_components must be at least 1",
            ));
        }
        config.validate()?;

        Ok(Self {
            n_components,
            config,
            params: None,
            summary: None,
        })
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn config(&self) -> &GmmConfig {
        &self.config
    }

    pub fn covariance_type(&self) -> CovarianceType {
        self.config.covariance_type
    }

    pub fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    fn params(&self) -> Result<&Params> {
        self.params.as_ref().ok_or(MixtureError::NotFitted)
    }

    pub fn weights(&self) -> Result<&Array1<f64>> {
        Ok(&self.params()?.weights)
    }

    pub fn means(&self) -> Result<&Array2<f64>> {
        Ok(&self.params()?.means)
    }

    pub fn covariances(&self) -> Result<&Covariances> {
        Ok(&self.params()?.covariances)
    }

    /// Whether the kept initialization reached `tol` within `max_iter`
    pub fn converged(&self) -> Result<bool> {
        Ok(self.summary.ok_or(MixtureError::NotFitted)?.converged)
    }

    /// EM iterations used by the kept initialization
    pub fn n_iter(&self) -> Result<usize> {
        Ok(self.summary.ok_or(MixtureError::NotFitted)?.n_iter)
    }

    /// Final lower bound of the kept initialization
    pub fn lower_bound(&self) -> Result<f64> {
        Ok(self.summary.ok_or(MixtureError::NotFitted)?.lower_bound)
    }

    /// Fit to the rows of `x`
    ///
    /// Failing to converge within `max_iter` is not an error; it is logged
    /// and reported through [`FitSummary::converged`].
    pub fn fit(&mut self, x: ArrayView2<f64>) -> Result<FitSummary> {
        self.check_fit_data(x)?;

        let mut rng = StdRng::seed_from_u64(self.config.random_state);
        let mut best: Option<(Params, FitSummary)> = None;

        for init in 0..self.config.n_init {
            let resp = self.initial_responsibilities(x, &mut rng)?;
            let mut params = self.estimate_params(x, resp.view())?;

            let mut lower_bound = f64::NEG_INFINITY;
            let mut converged = false;
            let mut n_iter = 0;

            for iter in 1..=self.config.max_iter {
                n_iter = iter;
                let prev = lower_bound;

                let (log_prob_norm, log_resp) = e_step(x, &params)?;
                params = self.estimate_params(x, log_resp.mapv(f64::exp).view())?;
                lower_bound = log_prob_norm;

                if (lower_bound - prev).abs() < self.config.tol {
                    converged = true;
                    break;
                }
            }

            debug!(
                "GMM k={} init {}: lower bound {:.6} after {} iterations (converged: {})",
                self.n_components, init, lower_bound, n_iter, converged
            );

            let better = match &best {
                None => true,
                Some((_, summary)) => lower_bound > summary.lower_bound,
            };
            if better {
                best = Some((
                    params,
                    FitSummary {
                        converged,
                        n_iter,
                        lower_bound,
                    },
                ));
            }
        }

        let (params, summary) = best.ok_or_else(|| {
            MixtureError::invalid_parameter("n_init must be at least 1")
        })?;

        if !summary.converged && self.config.max_iter > 0 {
            warn!(
                "GMM with {} components did not converge in {} iterations; \
                 try a larger max_iter or tol, or check the data",
                self.n_components, self.config.max_iter
            );
        }

        self.params = Some(params);
        self.summary = Some(summary);
        Ok(summary)
    }

    fn check_fit_data(&self, x: ArrayView2<f64>) -> Result<()> {
        let n = x.nrows();
        if n < 2 {
            return Err(MixtureError::fit_convergence(format!(
                "need at least 2 samples to fit, got {}",
                n
            )));
        }
        if n < self.n_components {
            return Err(MixtureError::fit_convergence(format!(
                "expected n_samples >= n_components, got {} samples for {} components",
                n, self.n_components
            )));
        }
        if x.ncols() == 0 {
            return Err(MixtureError::fit_convergence("data has no features"));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(MixtureError::fit_convergence(
                "data contains NaN or infinite values",
            ));
        }
        Ok(())
    }

    fn check_features(&self, x: ArrayView2<f64>) -> Result<&Params> {
        let params = self.params()?;
        let expected = params.means.ncols();
        if x.ncols() != expected {
            return Err(MixtureError::DimensionMismatch {
                expected,
                actual: x.ncols(),
            });
        }
        Ok(params)
    }

    fn initial_responsibilities(&self, x: ArrayView2<f64>, rng: &mut StdRng) -> Result<Array2<f64>> {
        let (n, k) = (x.nrows(), self.n_components);
        match self.config.init {
            InitMethod::KMeans => {
                let labels = kmeans_labels(x, k, rng)?;
                let mut resp = Array2::<f64>::zeros((n, k));
                for (i, &label) in labels.iter().enumerate() {
                    resp[[i, label]] = 1.0;
                }
                Ok(resp)
            }
            InitMethod::Random => {
                let mut resp = Array2::from_shape_fn((n, k), |_| rng.gen::<f64>());
                for mut row in resp.rows_mut() {
                    let total = row.sum();
                    row /= total;
                }
                Ok(resp)
            }
        }
    }

    /// M-step: weights, means and covariances from responsibilities
    fn estimate_params(&self, x: ArrayView2<f64>, resp: ArrayView2<f64>) -> Result<Params> {
        let d = x.ncols();
        let k = self.n_components;
        let reg = self.config.reg_covar;

        let nk = resp.sum_axis(Axis(0)).mapv(|v| v + 10.0 * f64::EPSILON);
        let means = &resp.t().dot(&x) / &nk.view().insert_axis(Axis(1));

        let covariances = match self.config.covariance_type {
            CovarianceType::Full => {
                let mut cov = Array3::<f64>::zeros((k, d, d));
                for j in 0..k {
                    let diff = &x - &means.row(j);
                    let weighted = &diff * &resp.column(j).insert_axis(Axis(1));
                    let mut c = weighted.t().dot(&diff) / nk[j];
                    c.diag_mut().mapv_inplace(|v| v + reg);
                    cov.slice_mut(s![j, .., ..]).assign(&c);
                }
                Covariances::Full(cov)
            }
            CovarianceType::Tied => {
                let avg_x2 = x.t().dot(&x);
                let weighted_means = &means * &nk.view().insert_axis(Axis(1));
                let avg_means2 = weighted_means.t().dot(&means);
                let mut c = (avg_x2 - avg_means2) / nk.sum();
                c.diag_mut().mapv_inplace(|v| v + reg);
                Covariances::Tied(c)
            }
            CovarianceType::Diag | CovarianceType::Spherical => {
                let x2 = x.mapv(|v| v * v);
                let avg_x2 = &resp.t().dot(&x2) / &nk.view().insert_axis(Axis(1));
                let diag = avg_x2 - means.mapv(|v| v * v) + reg;
                if self.config.covariance_type == CovarianceType::Diag {
                    Covariances::Diag(diag)
                } else {
                    Covariances::Spherical(diag.mean_axis(Axis(1)).unwrap_or_else(|| Array1::zeros(k)))
                }
            }
        };

        let precisions_cholesky = compute_precision_cholesky(&covariances)?;
        let weights = &nk / nk.sum();

        Ok(Params {
            weights,
            means,
            covariances,
            precisions_cholesky,
        })
    }

    /// Per-sample log-density under the mixture
    pub fn score_samples(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let params = self.check_features(x)?;
        let weighted = weighted_log_prob(x, params);
        Ok(weighted
            .rows()
            .into_iter()
            .map(|row| logsumexp(row.iter().copied()))
            .collect())
    }

    /// Mean per-sample log-likelihood of `x`
    pub fn score(&self, x: ArrayView2<f64>) -> Result<f64> {
        if x.nrows() == 0 {
            return Err(MixtureError::invalid_parameter("cannot score an empty matrix"));
        }
        let per_sample = self.score_samples(x)?;
        Ok(per_sample.sum() / x.nrows() as f64)
    }

    /// Component posterior probabilities for each row
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let params = self.check_features(x)?;
        let (_, log_resp) = log_prob_resp(x, params);
        Ok(log_resp.mapv(f64::exp))
    }

    /// Most probable component for each row
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<usize>> {
        let params = self.check_features(x)?;
        let weighted = weighted_log_prob(x, params);
        Ok(weighted
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (j, &v)| {
                        if v > best.1 {
                            (j, v)
                        } else {
                            best
                        }
                    })
                    .0
            })
            .collect())
    }

    /// Number of free parameters for `n_features` dimensions
    pub fn n_parameters_for(&self, n_features: usize) -> usize {
        let (k, d) = (self.n_components, n_features);
        let cov_params = match self.config.covariance_type {
            CovarianceType::Full => k * d * (d + 1) / 2,
            CovarianceType::Tied => d * (d + 1) / 2,
            CovarianceType::Diag => k * d,
            CovarianceType::Spherical => k,
        };
        cov_params + k * d + k - 1
    }

    /// Number of free parameters of the fitted model
    pub fn n_parameters(&self) -> Result<usize> {
        Ok(self.n_parameters_for(self.params()?.means.ncols()))
    }

    /// Bayesian information criterion on `x`; lower is better
    pub fn bic(&self, x: ArrayView2<f64>) -> Result<f64> {
        let n = x.nrows() as f64;
        Ok(-2.0 * self.score(x)? * n + self.n_parameters()? as f64 * n.ln())
    }

    /// Akaike information criterion on `x`; lower is better
    pub fn aic(&self, x: ArrayView2<f64>) -> Result<f64> {
        let n = x.nrows() as f64;
        Ok(-2.0 * self.score(x)? * n + 2.0 * self.n_parameters()? as f64)
    }
}

fn ill_defined() -> MixtureError {
    MixtureError::fit_convergence(
        "some components have ill-defined empirical covariance (for instance caused by \
         singleton or collapsed samples); try decreasing the number of components \
         or increasing reg_covar",
    )
}

fn compute_precision_cholesky(covariances: &Covariances) -> Result<PrecisionCholesky> {
    match covariances {
        Covariances::Full(cov) => {
            let mut prec = Array3::<f64>::zeros(cov.raw_dim());
            for (j, c) in cov.outer_iter().enumerate() {
                let p = precision_cholesky(c).ok_or_else(ill_defined)?;
                prec.slice_mut(s![j, .., ..]).assign(&p);
            }
            Ok(PrecisionCholesky::Full(prec))
        }
        Covariances::Tied(cov) => Ok(PrecisionCholesky::Tied(
            precision_cholesky(cov.view()).ok_or_else(ill_defined)?,
        )),
        Covariances::Diag(cov) => {
            if cov.iter().any(|&v| !(v > 0.0)) {
                return Err(ill_defined());
            }
            Ok(PrecisionCholesky::Diag(cov.mapv(|v| 1.0 / v.sqrt())))
        }
        Covariances::Spherical(cov) => {
            if cov.iter().any(|&v| !(v > 0.0)) {
                return Err(ill_defined());
            }
            Ok(PrecisionCholesky::Spherical(cov.mapv(|v| 1.0 / v.sqrt())))
        }
    }
}

/// `log N(x | μ_j, Σ_j)` for every row and component
fn estimate_log_gaussian_prob(x: ArrayView2<f64>, params: &Params) -> Array2<f64> {
    let (n, d) = x.dim();
    let k = params.means.nrows();
    let mut log_prob = Array2::<f64>::zeros((n, k));
    let mut log_det = Array1::<f64>::zeros(k);

    match &params.precisions_cholesky {
        PrecisionCholesky::Full(prec) => {
            for j in 0..k {
                let pc = prec.slice(s![j, .., ..]);
                let y = (&x - &params.means.row(j)).dot(&pc);
                log_prob
                    .column_mut(j)
                    .assign(&y.mapv(|v| v * v).sum_axis(Axis(1)));
                log_det[j] = pc.diag().mapv(f64::ln).sum();
            }
        }
        PrecisionCholesky::Tied(pc) => {
            let det = pc.diag().mapv(f64::ln).sum();
            for j in 0..k {
                let y = (&x - &params.means.row(j)).dot(pc);
                log_prob
                    .column_mut(j)
                    .assign(&y.mapv(|v| v * v).sum_axis(Axis(1)));
                log_det[j] = det;
            }
        }
        PrecisionCholesky::Diag(pc) => {
            for j in 0..k {
                let precision = pc.row(j).mapv(|v| v * v);
                let diff2 = (&x - &params.means.row(j)).mapv(|v| v * v);
                log_prob.column_mut(j).assign(&diff2.dot(&precision));
                log_det[j] = pc.row(j).mapv(f64::ln).sum();
            }
        }
        PrecisionCholesky::Spherical(pc) => {
            for j in 0..k {
                let precision = pc[j] * pc[j];
                let diff2 = (&x - &params.means.row(j)).mapv(|v| v * v).sum_axis(Axis(1));
                log_prob.column_mut(j).assign(&(diff2 * precision));
                log_det[j] = d as f64 * pc[j].ln();
            }
        }
    }

    let norm = d as f64 * (2.0 * PI).ln();
    for mut row in log_prob.rows_mut() {
        row.zip_mut_with(&log_det, |v, &det| *v = -0.5 * (norm + *v) + det);
    }
    log_prob
}

fn weighted_log_prob(x: ArrayView2<f64>, params: &Params) -> Array2<f64> {
    let mut log_prob = estimate_log_gaussian_prob(x, params);
    let log_weights = params.weights.mapv(f64::ln);
    for mut row in log_prob.rows_mut() {
        row += &log_weights;
    }
    log_prob
}

/// Per-row normalizers and log-responsibilities
fn log_prob_resp(x: ArrayView2<f64>, params: &Params) -> (Array1<f64>, Array2<f64>) {
    let mut weighted = weighted_log_prob(x, params);
    let norms: Array1<f64> = weighted
        .rows()
        .into_iter()
        .map(|row| logsumexp(row.iter().copied()))
        .collect();
    for (mut row, &norm) in weighted.rows_mut().into_iter().zip(norms.iter()) {
        row -= norm;
    }
    (norms, weighted)
}

/// E-step: mean log-likelihood and log-responsibilities
fn e_step(x: ArrayView2<f64>, params: &Params) -> Result<(f64, Array2<f64>)> {
    let (norms, log_resp) = log_prob_resp(x, params);
    let mean = norms.sum() / x.nrows() as f64;
    if !mean.is_finite() {
        return Err(MixtureError::fit_convergence(
            "log-likelihood became non-finite during EM",
        ));
    }
    Ok((mean, log_resp))
}

/// Numerically stable `ln Σ exp(v)`
pub fn logsumexp<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let values: Vec<f64> = values.into_iter().collect();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}
