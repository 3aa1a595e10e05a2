//! Syllable-type count by BIC model selection

use std::path::Path;

use ndarray::{concatenate, s, Array2, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use songdkl_mixture::{GaussianMixture, GmmConfig};
use tracing::{debug, info};

use crate::basis::BasisSelection;
use crate::config::{BasisPolicy, PipelineConfig};
use crate::embed::SimilarityEmbedder;
use crate::error::{Result, SongDklError};
use crate::prep::load_or_prep;

/// Outcome of a component sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyllableCountResult {
    /// Component count with the lowest BIC
    pub n_syls: usize,
    /// `(n_components, bic)` for every candidate, in sweep order
    pub bic_curve: Vec<(usize, f64)>,
    pub basis: BasisSelection,
}

impl SyllableCountResult {
    pub fn n_syls(&self) -> usize {
        self.n_syls
    }
}

/// Row ranges of `n` contiguous folds; the first `len % n` are one row longer
pub fn fold_ranges(len: usize, n: usize) -> Vec<(usize, usize)> {
    if n == 0 {
        return Vec::new();
    }
    let (base, extra) = (len / n, len % n);
    let mut ranges = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let stop = start + base + usize::from(i < extra);
        ranges.push((start, stop));
        start = stop;
    }
    ranges
}

/// Index of the first smallest value; NaN never wins
fn first_minimum(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b <= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Sweeps mixture sizes over one bird's song and keeps the BIC minimizer
#[derive(Debug, Clone)]
pub struct SyllableCountEstimator {
    n_basis: usize,
    basis: BasisPolicy,
    basis_seed: Option<u64>,
    min_components: usize,
    max_components: usize,
    n_splits: usize,
    gmm: GmmConfig,
}

impl SyllableCountEstimator {
    /// Build from the basis, sweep and mixture settings of a pipeline config
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            n_basis: config.n_basis,
            basis: config.basis,
            basis_seed: config.basis_seed,
            min_components: config.min_components,
            max_components: config.max_components,
            n_splits: config.n_splits,
            gmm: config.gmm.clone(),
        })
    }

    /// Candidate component counts, `[min_components, max_components)`
    pub fn candidates(&self) -> std::ops::Range<usize> {
        self.min_components..self.max_components
    }

    /// Estimate the number of syllable types in `psds_ref`
    ///
    /// With more than one split, each candidate's BIC is the mean over folds
    /// of the BIC on the held-out fold. Split BICs tend to undercount when
    /// data are limited.
    pub fn estimate(&self, psds_ref: ArrayView2<f64>) -> Result<SyllableCountResult> {
        if self.n_splits > psds_ref.nrows() {
            return Err(SongDklError::invalid_parameter(format!(
                "n_splits ({}) exceeds the number of feature vectors ({})",
                self.n_splits,
                psds_ref.nrows()
            )));
        }

        info!(
            "Estimating syllable count for psds_ref {:?}: n_basis={}, basis={}, \
             components {}..{}, n_splits={}",
            psds_ref.shape(),
            self.n_basis,
            self.basis,
            self.min_components,
            self.max_components,
            self.n_splits
        );

        let basis = BasisSelection::select(psds_ref.nrows(), self.n_basis, self.basis, self.basis_seed)?;
        let basis_vectors = basis.vectors(psds_ref);

        info!("Computing distances");
        let similarity =
            SimilarityEmbedder::syllable_count().embed(psds_ref, basis_vectors.view())?;

        info!("Fitting {} candidate component counts", self.candidates().len());
        let bics = self
            .candidates()
            .into_par_iter()
            .map(|k| self.candidate_bic(similarity.view(), k))
            .collect::<Result<Vec<f64>>>()?;

        let bic_curve: Vec<(usize, f64)> = self.candidates().zip(bics.iter().copied()).collect();
        let best = first_minimum(&bics).ok_or_else(|| {
            SongDklError::fit_convergence("every candidate produced an undefined BIC")
        })?;
        let n_syls = bic_curve[best].0;
        info!("Lowest BIC {:.3} at {} components", bic_curve[best].1, n_syls);

        Ok(SyllableCountResult {
            n_syls,
            bic_curve,
            basis,
        })
    }

    /// BIC for one component count, averaged over folds when splitting
    fn candidate_bic(&self, similarity: ArrayView2<f64>, k: usize) -> Result<f64> {
        let bic = if self.n_splits <= 1 {
            let mut gmm = GaussianMixture::new(k, self.gmm.clone())?;
            gmm.fit(similarity)?;
            gmm.bic(similarity)?
        } else {
            let folds = fold_ranges(similarity.nrows(), self.n_splits);
            let mut total = 0.0;
            for (held, &(start, stop)) in folds.iter().enumerate() {
                let train_parts: Vec<ArrayView2<f64>> = folds
                    .iter()
                    .enumerate()
                    .filter(|&(i, _)| i != held)
                    .map(|(_, &(a, b))| similarity.slice(s![a..b, ..]))
                    .collect();
                let train: Array2<f64> = concatenate(Axis(0), &train_parts).map_err(|e| {
                    SongDklError::invalid_parameter(format!("cannot assemble training folds: {}", e))
                })?;

                let mut gmm = GaussianMixture::new(k, self.gmm.clone())?;
                gmm.fit(train.view())?;
                total += gmm.bic(similarity.slice(s![start..stop, ..]))?;
            }
            total / folds.len() as f64
        };

        debug!("{} components: BIC {:.3}", k, bic);
        Ok(bic)
    }
}

/// Syllable count for a WAV directory or feature store
pub fn numsyls_from_path(path: &Path, config: &PipelineConfig) -> Result<SyllableCountResult> {
    let estimator = SyllableCountEstimator::new(config)?;
    info!("Getting PSDs from {}", path.display());
    let psds = load_or_prep(path, config)?;
    estimator.estimate(psds.view())
}
