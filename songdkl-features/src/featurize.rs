//! Syllable clip to feature vector
//!
//! ```text
//! clip ─▶ split (psds_per_syl) ─▶ norm ─▶ PSD (nfft scaled to rate) ─▶ 600..16000 Hz ─┐
//!                                                                                     │
//!                       FeatureVector ◀── norm ◀── concatenate ◀──────────────────────┘
//! ```

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use songdkl_audio::SyllableClip;
use tracing::{debug, warn};

use crate::error::{FeatureError, Result};
use crate::psd::PsdEstimator;

/// Lower edge of the feature band in Hz
pub const DEFAULT_BAND_LOW_HZ: f64 = 600.0;
/// Upper edge of the feature band in Hz
pub const DEFAULT_BAND_HIGH_HZ: f64 = 16000.0;
/// FFT length at the reference rate
pub const DEFAULT_REFERENCE_NFFT: usize = 1 << 14;
/// Rate at which the reference FFT length applies
pub const DEFAULT_REFERENCE_RATE: u32 = 32000;

/// Feature extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureConfig {
    /// Contiguous pieces each clip is split into before the PSD (default: 1)
    pub psds_per_syl: usize,

    /// Band lower edge in Hz (default: 600)
    pub band_low_hz: f64,

    /// Band upper edge in Hz (default: 16000)
    pub band_high_hz: f64,

    /// FFT length at `reference_rate` (default: 16384)
    /// Other rates scale it to keep the same frequency resolution
    pub reference_nfft: usize,

    /// Reference sample rate in Hz (default: 32000)
    pub reference_rate: u32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            psds_per_syl: 1,
            band_low_hz: DEFAULT_BAND_LOW_HZ,
            band_high_hz: DEFAULT_BAND_HIGH_HZ,
            reference_nfft: DEFAULT_REFERENCE_NFFT,
            reference_rate: DEFAULT_REFERENCE_RATE,
        }
    }
}

impl FeatureConfig {
    /// Set number of PSDs per syllable
    pub fn psds_per_syl(mut self, n: usize) -> Self {
        self.psds_per_syl = n;
        self
    }

    /// Set frequency band
    pub fn band(mut self, low_hz: f64, high_hz: f64) -> Self {
        self.band_low_hz = low_hz;
        self.band_high_hz = high_hz;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.psds_per_syl == 0 {
            return Err(FeatureError::invalid_parameter(
                "psds_per_syl must be at least 1",
            ));
        }

        if !(self.band_low_hz >= 0.0 && self.band_low_hz < self.band_high_hz) {
            return Err(FeatureError::invalid_parameter(format!(
                "band must satisfy 0 <= low < high, got {}..{}",
                self.band_low_hz, self.band_high_hz
            )));
        }

        if self.reference_nfft < 2 || self.reference_rate == 0 {
            return Err(FeatureError::invalid_parameter(
                "reference_nfft must be at least 2 and reference_rate positive",
            ));
        }

        Ok(())
    }

    /// FFT length for recordings at `rate`
    pub fn nfft_for_rate(&self, rate: u32) -> usize {
        (self.reference_nfft as f64 / self.reference_rate as f64 * rate as f64).round_ties_even() as usize
    }
}

/// Subtract the mean and divide by the population standard deviation
///
/// Fails with a degenerate-signal error for empty, constant or non-finite
/// input.
pub fn norm(x: &[f64]) -> Result<Vec<f64>> {
    if x.is_empty() {
        return Err(FeatureError::degenerate_signal("cannot normalize an empty signal"));
    }

    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    let std = (x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

    if !std.is_finite() || std == 0.0 {
        return Err(FeatureError::degenerate_signal(format!(
            "signal of {} samples has standard deviation {}",
            x.len(),
            std
        )));
    }

    Ok(x.iter().map(|v| (v - mean) / std).collect())
}

/// Split into `n` contiguous parts; the first `len % n` parts get one extra sample
pub fn array_split(x: &[f64], n: usize) -> Vec<&[f64]> {
    if n == 0 {
        return Vec::new();
    }
    let base = x.len() / n;
    let extra = x.len() % n;

    let mut parts = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let len = base + usize::from(i < extra);
        parts.push(&x[start..start + len]);
        start += len;
    }
    parts
}

/// PSD estimator plus band indices for one sample rate
#[derive(Debug)]
pub struct RateFeaturizer {
    rate: u32,
    estimator: PsdEstimator,
    band_start: usize,
    band_end: usize,
    psds_per_syl: usize,
}

impl RateFeaturizer {
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Length of the vectors this featurizer produces
    pub fn feature_len(&self) -> usize {
        (self.band_end - self.band_start) * self.psds_per_syl
    }

    /// Band-limited PSD of one piece, before the final normalization
    fn band_psd(&self, piece: &[f64]) -> Result<Vec<f64>> {
        let normed = norm(piece)?;
        let psd = self.estimator.psd(&normed, self.rate as f64);
        Ok(psd[self.band_start..self.band_end].to_vec())
    }

    /// Feature vector for raw clip samples
    pub fn featurize(&self, samples: &[f64]) -> Result<Vec<f64>> {
        let mut concatenated = Vec::with_capacity(self.feature_len());
        for piece in array_split(samples, self.psds_per_syl) {
            concatenated.extend(self.band_psd(piece)?);
        }
        norm(&concatenated)
    }
}

/// Turns syllable clips into normalized band-limited PSD feature vectors
#[derive(Debug, Clone, Default)]
pub struct SpectralFeaturizer {
    config: FeatureConfig,
}

impl SpectralFeaturizer {
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Prepare FFT and band indices for recordings at `rate`
    ///
    /// Band edges past the last one-sided bin are clamped to it, so low
    /// rates give shorter vectors.
    pub fn for_rate(&self, rate: u32) -> Result<RateFeaturizer> {
        if rate == 0 {
            return Err(FeatureError::invalid_parameter("sample rate cannot be zero"));
        }

        let nfft = self.config.nfft_for_rate(rate);
        let estimator = PsdEstimator::new(nfft)?;
        let bin_width = rate as f64 / nfft as f64;
        let num_freqs = estimator.num_freqs();

        let band_start = ((self.config.band_low_hz / bin_width).round_ties_even() as usize).min(num_freqs);
        let band_end = ((self.config.band_high_hz / bin_width).round_ties_even() as usize).min(num_freqs);
        if band_end <= band_start {
            return Err(FeatureError::invalid_parameter(format!(
                "band {}..{} Hz is empty at {} Hz",
                self.config.band_low_hz, self.config.band_high_hz, rate
            )));
        }

        debug!(
            "Featurizer at {} Hz: nfft {}, bins {}..{}",
            rate, nfft, band_start, band_end
        );

        Ok(RateFeaturizer {
            rate,
            estimator,
            band_start,
            band_end,
            psds_per_syl: self.config.psds_per_syl,
        })
    }

    /// Feature vector for one clip sampled at `rate`
    pub fn featurize(&self, samples: &[f64], rate: u32) -> Result<Vec<f64>> {
        self.for_rate(rate)?.featurize(samples)
    }

    /// Feature vectors for every clip, in order
    ///
    /// Clips are featurized in parallel with one FFT plan per sample rate.
    /// Degenerate clips are dropped with a warning; other errors abort.
    pub fn featurize_clips(&self, clips: &[SyllableClip]) -> Result<Vec<Vec<f64>>> {
        let mut by_rate: Vec<RateFeaturizer> = Vec::new();
        for clip in clips {
            if !by_rate.iter().any(|f| f.rate() == clip.sample_rate) {
                by_rate.push(self.for_rate(clip.sample_rate)?);
            }
        }

        let features = clips
            .par_iter()
            .map(|clip| {
                let featurizer = by_rate
                    .iter()
                    .find(|f| f.rate() == clip.sample_rate)
                    .ok_or_else(|| {
                        FeatureError::invalid_parameter(format!(
                            "no featurizer prepared for {} Hz",
                            clip.sample_rate
                        ))
                    })?;

                match featurizer.featurize(clip.samples()) {
                    Ok(v) => Ok(Some(v)),
                    Err(FeatureError::DegenerateSignal(msg)) => {
                        warn!("Skipping clip [{}, {}): {}", clip.start, clip.stop, msg);
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            })
            .collect::<Result<Vec<Option<Vec<f64>>>>>()?;

        Ok(features.into_iter().flatten().collect())
    }
}
