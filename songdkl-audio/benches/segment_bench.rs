//! Segmentation Benchmarks
//!
//! Run with: cargo bench -p songdkl-audio --bench segment_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::f64::consts::PI;

use songdkl_audio::{IirFilter, SegmentConfig, Segmenter, Waveform};

/// Song-like signal: 60 ms tone bursts every 150 ms
fn synthetic_song(rate: u32, secs: f64) -> Waveform {
    let n = (secs * rate as f64) as usize;
    let period = (0.150 * rate as f64) as usize;
    let burst = (0.060 * rate as f64) as usize;
    let samples = (0..n)
        .map(|i| {
            if i % period < burst {
                6000.0 * (2.0 * PI * 2500.0 * i as f64 / rate as f64).sin()
            } else {
                0.0
            }
        })
        .collect();
    Waveform::new(rate, samples).unwrap()
}

fn bench_filtfilt(c: &mut Criterion) {
    let mut group = c.benchmark_group("filtfilt");
    let filter = IirFilter::song_highpass().unwrap();

    for secs in [1.0, 5.0, 20.0] {
        let wav = synthetic_song(32000, secs);
        group.throughput(Throughput::Elements(wav.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(secs), &wav, |b, wav| {
            b.iter(|| filter.filtfilt(black_box(wav.samples())).unwrap())
        });
    }

    group.finish();
}

fn bench_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment");
    let segmenter = Segmenter::new(SegmentConfig::default()).unwrap();

    for secs in [1.0, 5.0, 20.0] {
        let wav = synthetic_song(32000, secs);
        group.throughput(Throughput::Elements(wav.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(secs), &wav, |b, wav| {
            b.iter(|| segmenter.segment(black_box(wav)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_filtfilt, bench_segment);
criterion_main!(benches);
