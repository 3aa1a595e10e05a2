//! Basis set selection

use ndarray::{Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BasisPolicy;
use crate::error::{Result, SongDklError};

/// Which reference vectors anchor the similarity embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasisSelection {
    pub policy: BasisPolicy,
    /// Seed used for `Random`; `None` means the draw was not reproducible
    pub seed: Option<u64>,
    /// Row indices into the reference collection, in basis order
    pub indices: Vec<usize>,
}

impl BasisSelection {
    /// Draw `n_basis` rows from a collection of `n_vectors`
    ///
    /// `First` with more basis vectors than rows is rejected. `Random`
    /// samples with replacement and needs at least one row.
    pub fn select(
        n_vectors: usize,
        n_basis: usize,
        policy: BasisPolicy,
        seed: Option<u64>,
    ) -> Result<Self> {
        if n_basis == 0 {
            return Err(SongDklError::invalid_parameter("n_basis must be positive"));
        }
        if n_vectors == 0 {
            return Err(SongDklError::invalid_parameter(
                "cannot select a basis from an empty collection",
            ));
        }

        let indices = match policy {
            BasisPolicy::First => {
                if n_basis > n_vectors {
                    return Err(SongDklError::invalid_parameter(format!(
                        "n_basis ({}) is larger than the reference collection ({})",
                        n_basis, n_vectors
                    )));
                }
                (0..n_basis).collect()
            }
            BasisPolicy::Random => {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                (0..n_basis).map(|_| rng.gen_range(0..n_vectors)).collect()
            }
        };

        debug!("Selected {} basis vectors ({})", n_basis, policy);
        Ok(Self {
            policy,
            seed: if policy == BasisPolicy::Random { seed } else { None },
            indices,
        })
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Gather the basis rows from the reference collection
    pub fn vectors(&self, reference: ArrayView2<f64>) -> Array2<f64> {
        reference.select(Axis(0), &self.indices)
    }
}
