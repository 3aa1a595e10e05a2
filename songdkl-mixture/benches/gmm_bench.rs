//! Mixture Fitting Benchmarks
//!
//! Run with: cargo bench -p songdkl-mixture --bench gmm_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use songdkl_mixture::{CovarianceType, GaussianMixture, GmmConfig};

/// `k` loose clusters in `d` dimensions
fn clustered(n: usize, d: usize, k: usize) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(3);
    Array2::from_shape_fn((n, d), |(i, j)| {
        let center = ((i % k) * 10 + j) as f64;
        center + rng.gen_range(-1.0..1.0)
    })
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("gmm_fit");
    group.sample_size(10);
    let x = clustered(500, 20, 8);

    for cov in [CovarianceType::Full, CovarianceType::Diag] {
        let config = GmmConfig::default().with_covariance_type(cov).with_n_init(1);
        group.bench_with_input(BenchmarkId::from_parameter(cov), &x, |b, x| {
            b.iter(|| {
                let mut gmm = GaussianMixture::new(8, config.clone()).unwrap();
                gmm.fit(black_box(x.view())).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_score(c: &mut Criterion) {
    let x = clustered(2000, 20, 8);
    let mut gmm = GaussianMixture::new(8, GmmConfig::default().with_n_init(1)).unwrap();
    gmm.fit(x.view()).unwrap();

    c.bench_function("gmm_score_2000x20", |b| {
        b.iter(|| gmm.score(black_box(x.view())).unwrap())
    });
}

criterion_group!(benches, bench_fit, bench_score);
criterion_main!(benches);
