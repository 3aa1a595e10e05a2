//! Small dense linear algebra for covariance matrices

use ndarray::{Array2, ArrayView2};

/// Lower Cholesky factor of a symmetric matrix
///
/// Returns `None` if the matrix is not positive definite.
pub fn cholesky(a: ArrayView2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return None;
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let mut diag = a[[j, j]];
        for k in 0..j {
            diag -= l[[j, k]] * l[[j, k]];
        }
        if !(diag > 0.0) || !diag.is_finite() {
            return None;
        }
        let ljj = diag.sqrt();
        l[[j, j]] = ljj;

        for i in (j + 1)..n {
            let mut s = a[[i, j]];
            for k in 0..j {
                s -= l[[i, k]] * l[[j, k]];
            }
            l[[i, j]] = s / ljj;
        }
    }

    Some(l)
}

/// Inverse of a lower-triangular matrix with non-zero diagonal
pub fn invert_lower_triangular(l: ArrayView2<f64>) -> Array2<f64> {
    let n = l.nrows();
    let mut inv = Array2::<f64>::zeros((n, n));

    // Forward substitution, one column of the identity at a time
    for col in 0..n {
        inv[[col, col]] = 1.0 / l[[col, col]];
        for i in (col + 1)..n {
            let mut s = 0.0;
            for k in col..i {
                s -= l[[i, k]] * inv[[k, col]];
            }
            inv[[i, col]] = s / l[[i, i]];
        }
    }

    inv
}

/// Upper-triangular precision factor `U` with `U Uᵀ = cov⁻¹`
///
/// This is the transpose of the inverse Cholesky factor of `cov`.
pub fn precision_cholesky(cov: ArrayView2<f64>) -> Option<Array2<f64>> {
    let l = cholesky(cov)?;
    Some(invert_lower_triangular(l.view()).reversed_axes())
}
