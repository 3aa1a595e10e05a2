//! Similarity embedding against a basis set
//!
//! Distances are squared Euclidean. Two scaling conventions exist and their
//! outputs are not interchangeable:
//!
//! - shared max: `1 - d / max`, with `max` taken over every matrix of one
//!   divergence computation, so entries lie in `(-inf, 1]`
//! - scaled: `1 - d / max * 1000`, the syllable-count convention

use ndarray::{Array2, ArrayView2, Zip};

use crate::error::{Result, SongDklError};

/// Scale applied by the syllable-count convention
pub const SYLLABLE_COUNT_SCALE: f64 = 1000.0;

/// Squared Euclidean distance from every row of `x` to every basis row
pub fn sqeuclidean_cdist(x: ArrayView2<f64>, basis: ArrayView2<f64>) -> Result<Array2<f64>> {
    if x.ncols() != basis.ncols() {
        return Err(SongDklError::DimensionMismatch {
            expected: basis.ncols(),
            actual: x.ncols(),
        });
    }

    let mut dist = Array2::<f64>::zeros((x.nrows(), basis.nrows()));
    Zip::from(dist.rows_mut())
        .and(x.rows())
        .for_each(|mut out, row| {
            for (d, b) in out.iter_mut().zip(basis.rows()) {
                *d = row
                    .iter()
                    .zip(b.iter())
                    .map(|(u, v)| (u - v) * (u - v))
                    .sum();
            }
        });
    Ok(dist)
}

fn max_entry<'a, I: IntoIterator<Item = &'a Array2<f64>>>(matrices: I) -> f64 {
    matrices
        .into_iter()
        .flat_map(|m| m.iter().copied())
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Maps distances to similarities
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityEmbedder {
    scale: f64,
}

impl Default for SimilarityEmbedder {
    fn default() -> Self {
        Self::shared_max()
    }
}

impl SimilarityEmbedder {
    /// `1 - d / max`
    pub fn shared_max() -> Self {
        Self { scale: 1.0 }
    }

    /// `1 - d / max * 1000`
    pub fn syllable_count() -> Self {
        Self {
            scale: SYLLABLE_COUNT_SCALE,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Convert distance matrices to similarities against their joint maximum
    ///
    /// A zero maximum (every vector equal to every basis vector) is
    /// degenerate.
    pub fn to_similarity(&self, distances: Vec<Array2<f64>>) -> Result<Vec<Array2<f64>>> {
        let max = max_entry(&distances);
        if !(max > 0.0) || !max.is_finite() {
            return Err(SongDklError::degenerate_signal(format!(
                "maximum distance to the basis is {}, cannot normalize",
                max
            )));
        }

        let scale = self.scale;
        Ok(distances
            .into_iter()
            .map(|d| d.mapv_into(|v| 1.0 - v / max * scale))
            .collect())
    }

    /// Embed several collections against one basis with a shared maximum
    pub fn embed_all(
        &self,
        collections: &[ArrayView2<f64>],
        basis: ArrayView2<f64>,
    ) -> Result<Vec<Array2<f64>>> {
        let distances = collections
            .iter()
            .map(|x| sqeuclidean_cdist(*x, basis))
            .collect::<Result<Vec<_>>>()?;
        self.to_similarity(distances)
    }

    /// Embed one collection against the basis
    pub fn embed(&self, x: ArrayView2<f64>, basis: ArrayView2<f64>) -> Result<Array2<f64>> {
        let mut embedded = self.embed_all(&[x], basis)?;
        embedded
            .pop()
            .ok_or_else(|| SongDklError::invalid_parameter("nothing to embed"))
    }
}
