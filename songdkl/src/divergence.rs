//! Song D(KL) between two birds

use std::f64::consts::LOG2_E;
use std::path::Path;

use ndarray::{s, ArrayView2};
use serde::{Deserialize, Serialize};
use songdkl_mixture::{GaussianMixture, GmmConfig};
use tracing::{debug, info};

use crate::basis::BasisSelection;
use crate::config::{BasisPolicy, PipelineConfig};
use crate::embed::SimilarityEmbedder;
use crate::error::{Result, SongDklError};
use crate::prep::load_or_prep;

fn check_components(k_ref: usize, k_compare: usize) -> Result<()> {
    if k_ref == 0 || k_compare == 0 {
        return Err(SongDklError::invalid_parameter(format!(
            "component counts must be positive, got k_ref={}, k_compare={}",
            k_ref, k_compare
        )));
    }
    Ok(())
}

/// Divergence estimate in both directions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceResult {
    /// Bits lost per basis dimension encoding the reference with the comparison model
    pub dkl_pq: f64,
    /// Same, comparison encoded with the reference model
    pub dkl_qp: f64,
    /// Reference vectors used, before the train/held-out split
    pub n_psds_ref: usize,
    /// Comparison vectors used, before the split
    pub n_psds_compare: usize,
    pub basis: BasisSelection,
}

/// Fits one mixture per bird on half the data and cross-scores the other half
#[derive(Debug, Clone)]
pub struct DivergenceCalculator {
    n_basis: usize,
    basis: BasisPolicy,
    basis_seed: Option<u64>,
    gmm: GmmConfig,
}

impl Default for DivergenceCalculator {
    fn default() -> Self {
        let config = PipelineConfig::default();
        Self {
            n_basis: config.n_basis,
            basis: config.basis,
            basis_seed: config.basis_seed,
            gmm: config.gmm,
        }
    }
}

impl DivergenceCalculator {
    /// Build from the basis and mixture settings of a pipeline config
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            n_basis: config.n_basis,
            basis: config.basis,
            basis_seed: config.basis_seed,
            gmm: config.gmm.clone(),
        })
    }

    pub fn n_basis(&self) -> usize {
        self.n_basis
    }

    /// Estimate `D_KL(P||Q)` and `D_KL(Q||P)`
    ///
    /// Each collection is split at `len / 2`; the first half trains its
    /// bird's mixture and the second half is held out for scoring.
    pub fn calculate(
        &self,
        psds_ref: ArrayView2<f64>,
        psds_compare: ArrayView2<f64>,
        k_ref: usize,
        k_compare: usize,
    ) -> Result<DivergenceResult> {
        check_components(k_ref, k_compare)?;
        if psds_ref.ncols() != psds_compare.ncols() {
            return Err(SongDklError::DimensionMismatch {
                expected: psds_ref.ncols(),
                actual: psds_compare.ncols(),
            });
        }

        info!(
            "Calculating Song D(KL) with psds_ref {:?} and psds_compare {:?}, \
             k_ref={}, k_compare={}, n_basis={}, basis={}",
            psds_ref.shape(),
            psds_compare.shape(),
            k_ref,
            k_compare,
            self.n_basis,
            self.basis
        );

        let basis = BasisSelection::select(psds_ref.nrows(), self.n_basis, self.basis, self.basis_seed)?;
        let basis_vectors = basis.vectors(psds_ref);

        let ref_half = psds_ref.nrows() / 2;
        let compare_half = psds_compare.nrows() / 2;

        info!("Computing distance matrices");
        let similarities = SimilarityEmbedder::shared_max().embed_all(
            &[
                psds_ref.slice(s![..ref_half, ..]),
                psds_ref.slice(s![ref_half.., ..]),
                psds_compare.slice(s![..compare_half, ..]),
                psds_compare.slice(s![compare_half.., ..]),
            ],
            basis_vectors.view(),
        )?;
        let (s_ref, s_ref_held) = (&similarities[0], &similarities[1]);
        let (s_compare, s_compare_held) = (&similarities[2], &similarities[3]);

        info!("Fitting Gaussian mixture models");
        let mut p = GaussianMixture::new(k_ref, self.gmm.clone())?;
        p.fit(s_ref.view())?;
        let mut q = GaussianMixture::new(k_compare, self.gmm.clone())?;
        q.fit(s_compare.view())?;

        info!("Scoring held-out data");
        let p_hat_p = p.score(s_ref_held.view())?;
        let q_hat_p = q.score(s_ref_held.view())?;
        let p_hat_q = p.score(s_compare_held.view())?;
        let q_hat_q = q.score(s_compare_held.view())?;
        debug!(
            "Held-out scores: P|ref {:.4}, Q|ref {:.4}, P|compare {:.4}, Q|compare {:.4}",
            p_hat_p, q_hat_p, p_hat_q, q_hat_q
        );

        let n = basis.len() as f64;
        let dkl_pq = LOG2_E * (p_hat_p - q_hat_p) / n;
        let dkl_qp = LOG2_E * (q_hat_q - p_hat_q) / n;
        info!("Song D(KL): PQ {:.6}, QP {:.6}", dkl_pq, dkl_qp);

        Ok(DivergenceResult {
            dkl_pq,
            dkl_qp,
            n_psds_ref: psds_ref.nrows(),
            n_psds_compare: psds_compare.nrows(),
            basis,
        })
    }
}

/// Song D(KL) between two WAV directories or feature stores
pub fn calculate_from_path(
    ref_path: &Path,
    compare_path: &Path,
    k_ref: usize,
    k_compare: usize,
    config: &PipelineConfig,
) -> Result<DivergenceResult> {
    let calculator = DivergenceCalculator::new(config)?;
    check_components(k_ref, k_compare)?;

    info!("Getting PSDs from ref_path: {}", ref_path.display());
    let psds_ref = load_or_prep(ref_path, config)?;
    info!("Getting PSDs from compare_path: {}", compare_path.display());
    let psds_compare = load_or_prep(compare_path, config)?;

    calculator.calculate(psds_ref.view(), psds_compare.view(), k_ref, k_compare)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Smooth pseudo-random collection whose rows cluster around `types` templates
    fn collection(n: usize, dim: usize, types: usize, offset: f64) -> Array2<f64> {
        Array2::from_shape_fn((n, dim), |(i, j)| {
            let t = (i % types) as f64;
            let jitter = ((i * 31 + j * 17) as f64 * 0.618).sin() * 0.05;
            ((j as f64 * 0.3 + t * 1.7 + offset).sin()) + jitter
        })
    }

    fn small_calculator() -> DivergenceCalculator {
        let config = PipelineConfig::default()
            .n_basis(5)
            .gmm(GmmConfig::default().with_n_init(1));
        DivergenceCalculator::new(&config).unwrap()
    }

    #[test]
    fn test_zero_components_rejected() {
        let x = collection(40, 8, 3, 0.0);
        let calc = small_calculator();
        assert!(matches!(
            calc.calculate(x.view(), x.view(), 0, 3),
            Err(SongDklError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_mismatched_feature_lengths() {
        let a = collection(40, 8, 3, 0.0);
        let b = collection(40, 9, 3, 0.0);
        assert!(matches!(
            small_calculator().calculate(a.view(), b.view(), 2, 2),
            Err(SongDklError::DimensionMismatch { expected: 8, actual: 9 })
        ));
    }

    #[test]
    fn test_counts_are_pre_split() {
        let a = collection(41, 8, 3, 0.0);
        let b = collection(36, 8, 3, 0.9);
        let result = small_calculator().calculate(a.view(), b.view(), 3, 3).unwrap();
        assert_eq!(result.n_psds_ref, 41);
        assert_eq!(result.n_psds_compare, 36);
        assert_eq!(result.basis.indices, vec![0, 1, 2, 3, 4]);
        assert!(result.dkl_pq.is_finite());
        assert!(result.dkl_qp.is_finite());
    }

    #[test]
    fn test_too_few_rows_for_components() {
        let a = collection(6, 8, 3, 0.0);
        let b = collection(40, 8, 3, 0.9);
        let config = PipelineConfig::default().n_basis(3);
        let calc = DivergenceCalculator::new(&config).unwrap();
        assert!(matches!(
            calc.calculate(a.view(), b.view(), 4, 3),
            Err(SongDklError::FitConvergence(_))
        ));
    }
}
