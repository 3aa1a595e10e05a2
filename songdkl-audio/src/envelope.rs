//! Amplitude envelope, thresholding and run labeling
//!
//! These are the detection stages of the segmenter: rectify and smooth the
//! filtered waveform, pick a threshold, zero everything at or below it,
//! bridge short gaps and report the surviving runs as sample ranges.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AudioError, Result};

/// Histograms wider than this are refused by [`otsu`]
const MAX_OTSU_BINS: usize = 1 << 24;

/// Full-wave rectify and smooth with a normalized boxcar of `window_ms`
///
/// The kernel spans `round(rate * window_ms / 1000)` samples. The full
/// convolution is re-centred and one sample shorter than the input is kept,
/// matching the historical envelope so sample indices line up with
/// published segmentations.
pub fn smooth_rectify(data: &[f64], rate: u32, window_ms: f64) -> Result<Vec<f64>> {
    let width = (rate as f64 * window_ms / 1000.0).round_ties_even();
    if !width.is_finite() || width < 1.0 {
        return Err(AudioError::invalid_parameter(format!(
            "smoothing window of {} ms at {} Hz is shorter than one sample",
            window_ms, rate
        )));
    }
    let width = width as usize;

    if data.len() < width {
        return Err(AudioError::segmentation(format!(
            "waveform of {} samples is shorter than the {}-sample smoothing window",
            data.len(),
            width
        )));
    }

    let n = data.len();
    let offset = ((width - 1) as f64 / 2.0).round_ties_even() as usize;
    let scale = 1.0 / width as f64;

    // Running boxcar sum over |x|. The count of non-zero samples in the
    // window lets silent stretches come out as exact zeros.
    let full_len = n + width - 1;
    let mut smooth = Vec::with_capacity(n.saturating_sub(1));
    let mut sum = 0.0;
    let mut nonzero = 0usize;

    for i in 0..(n + offset).min(full_len) {
        if i < n {
            let v = data[i].abs();
            sum += v;
            if v != 0.0 {
                nonzero += 1;
            }
        }
        if i >= width {
            let v = data[i - width].abs();
            sum -= v;
            if v != 0.0 {
                nonzero -= 1;
            }
        }

        if i > offset {
            smooth.push(if nonzero == 0 { 0.0 } else { sum * scale });
        }
    }

    Ok(smooth)
}

/// Keep samples whose magnitude is strictly above `thresh`, zero the rest
pub fn threshold(data: &[f64], thresh: f64) -> Vec<f64> {
    data.iter()
        .map(|&v| if v.abs() > thresh { v } else { 0.0 })
        .collect()
}

/// Otsu's threshold over integer histogram bins
///
/// Values are truncated to non-negative integers. Returns the bin that
/// maximizes between-class variance; the first maximum wins. A signal with
/// every value in bin 0 returns 0.
pub fn otsu(data: &[f64]) -> Result<u32> {
    let max = data
        .iter()
        .map(|&v| if v.is_finite() && v > 0.0 { v.trunc() } else { 0.0 })
        .fold(0.0f64, f64::max);
    if max >= MAX_OTSU_BINS as f64 {
        return Err(AudioError::invalid_parameter(format!(
            "envelope maximum {} is too large for an Otsu histogram",
            max
        )));
    }

    let bins = max as usize + 1;
    let mut hist = vec![0.0f64; bins];
    for &v in data {
        let bin = if v.is_finite() && v > 0.0 { v.trunc() as usize } else { 0 };
        hist[bin] += 1.0;
    }

    let total: f64 = hist.iter().sum();
    if total == 0.0 || bins == 1 {
        return Ok(0);
    }
    let weighted_total: f64 = hist.iter().enumerate().map(|(i, &h)| i as f64 * h).sum();

    let mut n_below = hist[0];
    let mut weighted_below = 0.0;
    let between = |n_below: f64, weighted_below: f64| -> f64 {
        let n_above = total - n_below;
        if n_below == 0.0 || n_above == 0.0 {
            return 0.0;
        }
        let mu_below = weighted_below / n_below;
        let mu_above = (weighted_total - weighted_below) / n_above;
        n_below * n_above * (mu_below - mu_above).powi(2)
    };

    let mut best = between(n_below, weighted_below);
    let mut best_bin = 0;

    for t in 1..bins {
        n_below += hist[t];
        weighted_below += t as f64 * hist[t];
        if n_below == 0.0 {
            continue;
        }
        if n_below == total {
            break;
        }
        let score = between(n_below, weighted_below);
        if score > best {
            best = score;
            best_bin = t;
        }
    }

    Ok(best_bin as u32)
}

/// How the envelope threshold is chosen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdPolicy {
    /// Half of Otsu's threshold on the integer-binned envelope
    HalfOtsu,
    /// Half of the envelope's arithmetic mean
    HalfAverage,
    /// A fixed value
    Explicit(f64),
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::HalfOtsu
    }
}

impl ThresholdPolicy {
    /// A fixed threshold; must be finite and non-negative
    pub fn explicit(value: f64) -> Result<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(AudioError::invalid_parameter(format!(
                "threshold must be a finite non-negative number, got {}",
                value
            )));
        }
        Ok(Self::Explicit(value))
    }

    /// Threshold value for `envelope` under this policy
    pub fn compute(&self, envelope: &[f64]) -> Result<f64> {
        match *self {
            Self::HalfOtsu => Ok(otsu(envelope)? as f64 / 2.0),
            Self::HalfAverage => {
                if envelope.is_empty() {
                    return Err(AudioError::segmentation("cannot average an empty envelope"));
                }
                Ok(envelope.iter().sum::<f64>() / envelope.len() as f64 / 2.0)
            }
            Self::Explicit(value) => Ok(value),
        }
    }
}

impl fmt::Display for ThresholdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HalfOtsu => write!(f, "half-otsu"),
            Self::HalfAverage => write!(f, "half-average"),
            Self::Explicit(value) => write!(f, "{}", value),
        }
    }
}

impl FromStr for ThresholdPolicy {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "half-otsu" | "half_otsu" | "otsu" => Ok(Self::HalfOtsu),
            "half-average" | "half_average" | "average" => Ok(Self::HalfAverage),
            other => match other.parse::<f64>() {
                Ok(value) => Self::explicit(value),
                Err(_) => Err(AudioError::invalid_parameter(format!(
                    "invalid threshold policy '{}', expected 'half-otsu', 'half-average' or a number",
                    s
                ))),
            },
        }
    }
}

impl Serialize for ThresholdPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Explicit(value) => serializer.serialize_f64(*value),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for ThresholdPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Self::explicit(value).map_err(serde::de::Error::custom),
            Repr::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Bridge short gaps in a thresholded envelope
///
/// Sums the envelope over a `width`-sample window (half-sample-symmetric
/// reflection at both ends) and returns a mask of the positions whose sum
/// exceeds 0.5.
pub fn pad_gaps(thresholded: &[f64], width: usize) -> Vec<bool> {
    let n = thresholded.len();
    if n == 0 || width == 0 {
        return vec![false; n];
    }

    // Window covers [i - before, i + after]
    let before = (width - 1) / 2;
    let after = width - 1 - before;
    let before = before as isize;
    let after = after as isize;
    let n_i = n as isize;

    let reflect = |k: isize| -> usize {
        let period = 2 * n_i;
        let k = k.rem_euclid(period);
        if k >= n_i {
            (period - 1 - k) as usize
        } else {
            k as usize
        }
    };

    // Sum at position 0, then slide
    let mut sum: f64 = (-before..=after).map(|k| thresholded[reflect(k)]).sum();
    let mut nonzero = (-before..=after)
        .filter(|&k| thresholded[reflect(k)] != 0.0)
        .count();

    let mut mask = Vec::with_capacity(n);
    for i in 0..n_i {
        if i > 0 {
            let leaving = thresholded[reflect(i - 1 - before)];
            let entering = thresholded[reflect(i + after)];
            sum += entering - leaving;
            if leaving != 0.0 {
                nonzero -= 1;
            }
            if entering != 0.0 {
                nonzero += 1;
            }
        }
        mask.push(nonzero > 0 && sum > 0.5);
    }
    mask
}

/// Half-open `[start, stop)` ranges of the contiguous `true` runs in `mask`
pub fn label_runs(mask: &[bool]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = None;

    for (i, &on) in mask.iter().enumerate() {
        match (on, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, mask.len()));
    }

    runs
}
