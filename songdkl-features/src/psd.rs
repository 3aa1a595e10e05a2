//! Averaged-periodogram power spectral density
//!
//! Non-overlapping Hann-windowed segments, one-sided, scaled to a density.
//! Signals shorter than one segment are zero-padded.

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::{FeatureError, Result};

/// PSD estimator for a fixed FFT length
pub struct PsdEstimator {
    nfft: usize,
    window: Vec<f64>,
    window_power: f64,
    fft: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for PsdEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PsdEstimator")
            .field("nfft", &self.nfft)
            .finish()
    }
}

impl PsdEstimator {
    pub fn new(nfft: usize) -> Result<Self> {
        if nfft < 2 {
            return Err(FeatureError::invalid_parameter(format!(
                "FFT length must be at least 2, got {}",
                nfft
            )));
        }

        let window = hann_window(nfft);
        let window_power = window.iter().map(|w| w * w).sum();
        let fft = FftPlanner::new().plan_fft_forward(nfft);

        Ok(Self {
            nfft,
            window,
            window_power,
            fft,
        })
    }

    pub fn nfft(&self) -> usize {
        self.nfft
    }

    /// Number of one-sided frequency bins
    pub fn num_freqs(&self) -> usize {
        if self.nfft % 2 == 0 {
            self.nfft / 2 + 1
        } else {
            (self.nfft + 1) / 2
        }
    }

    /// Bin centre frequencies for sample rate `fs`
    pub fn frequencies(&self, fs: f64) -> Vec<f64> {
        (0..self.num_freqs())
            .map(|k| k as f64 * fs / self.nfft as f64)
            .collect()
    }

    /// One-sided power spectral density of `x` sampled at `fs`
    pub fn psd(&self, x: &[f64], fs: f64) -> Vec<f64> {
        let padded;
        let x = if x.len() < self.nfft {
            padded = {
                let mut v = x.to_vec();
                v.resize(self.nfft, 0.0);
                v
            };
            &padded[..]
        } else {
            x
        };

        let num_freqs = self.num_freqs();
        let n_segments = x.len() / self.nfft;
        let mut acc = vec![0.0; num_freqs];
        let mut buffer = vec![Complex::new(0.0, 0.0); self.nfft];

        for segment in x.chunks_exact(self.nfft) {
            for ((b, &s), &w) in buffer.iter_mut().zip(segment).zip(&self.window) {
                *b = Complex::new(s * w, 0.0);
            }
            self.fft.process(&mut buffer);
            for (a, b) in acc.iter_mut().zip(&buffer) {
                *a += b.norm_sqr();
            }
        }

        // Fold negative frequencies into the interior bins; DC and an even
        // FFT's Nyquist bin appear once.
        let doubled_end = if self.nfft % 2 == 0 {
            num_freqs - 1
        } else {
            num_freqs
        };
        for a in &mut acc[1..doubled_end] {
            *a *= 2.0;
        }

        let scale = 1.0 / (fs * self.window_power * n_segments as f64);
        acc.iter_mut().for_each(|a| *a *= scale);
        acc
    }
}

/// Symmetric Hann window
fn hann_window(len: usize) -> Vec<f64> {
    if len == 1 {
        return vec![1.0];
    }
    (0..len)
        .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f64 / (len - 1) as f64).cos())
        .collect()
}
