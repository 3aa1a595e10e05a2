//! Model selection behaviour of the mixture fitter

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use songdkl_mixture::{CovarianceType, GaussianMixture, GmmConfig, MixtureError};

/// Standard normal draw (Box-Muller)
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// `k` isotropic Gaussian clusters in 3-D spaced far apart
fn blobs(k: usize, per_cluster: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((k * per_cluster, 3), |(i, j)| {
        let cluster = i / per_cluster;
        (cluster * 20) as f64 + j as f64 + 0.5 * gaussian(&mut rng)
    })
}

fn bic_for(x: &Array2<f64>, k: usize) -> f64 {
    let mut gmm = GaussianMixture::new(k, GmmConfig::default().with_n_init(2)).unwrap();
    gmm.fit(x.view()).unwrap();
    gmm.bic(x.view()).unwrap()
}

#[test]
fn test_bic_prefers_true_component_count() {
    let x = blobs(3, 40, 11);
    let bics: Vec<f64> = (1..=5).map(|k| bic_for(&x, k)).collect();

    let best = bics
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i + 1)
        .unwrap();
    assert_eq!(best, 3, "BIC curve {:?}", bics);
}

#[test]
fn test_held_out_score() {
    let train = blobs(2, 50, 1);
    let test = blobs(2, 50, 2);

    let mut gmm = GaussianMixture::new(2, GmmConfig::default()).unwrap();
    gmm.fit(train.view()).unwrap();

    let fit_score = gmm.score(train.view()).unwrap();
    let held_out = gmm.score(test.view()).unwrap();
    assert!(held_out.is_finite());
    assert!((fit_score - held_out).abs() < 1.0);

    // Shifted data is far less likely
    let shifted = test.mapv(|v| v + 7.0);
    assert!(gmm.score(shifted.view()).unwrap() < held_out - 5.0);
}

#[test]
fn test_every_covariance_type_fits() {
    let x = blobs(2, 30, 5);
    for cov in ["full", "tied", "diag", "spherical"] {
        let cov: CovarianceType = cov.parse().unwrap();
        let mut gmm =
            GaussianMixture::new(2, GmmConfig::default().with_covariance_type(cov)).unwrap();
        let summary = gmm.fit(x.view()).unwrap();
        assert!(summary.lower_bound.is_finite(), "{}", cov);
        assert_eq!(gmm.lower_bound().unwrap(), summary.lower_bound);
        assert!(gmm.n_iter().unwrap() >= 1);
    }
}

#[test]
fn test_refit_replaces_parameters() {
    let mut gmm = GaussianMixture::new(2, GmmConfig::default()).unwrap();
    gmm.fit(blobs(2, 30, 5).view()).unwrap();

    let wide = Array2::from_shape_fn((40, 5), |(i, j)| (i % 2 * 50 + j) as f64 + 0.01 * i as f64);
    gmm.fit(wide.view()).unwrap();
    assert_eq!(gmm.means().unwrap().ncols(), 5);
    assert!(matches!(
        gmm.score(blobs(2, 10, 5).view()),
        Err(MixtureError::DimensionMismatch { expected: 5, actual: 3 })
    ));
}
