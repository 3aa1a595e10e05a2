//! Transfer-function IIR filtering
//!
//! The song high-pass is a 5th-order elliptic design (1 dB passband ripple,
//! 60 dB stopband attenuation, edges at 4% and 2% of Nyquist) applied
//! forward and backward for zero phase.
//!
//! ```text
//! x ──▶ odd extension ──▶ lfilter (zi·x0) ──▶ reverse ──▶ lfilter (zi·y0) ──▶ reverse ──▶ trim ──▶ y
//! ```

use std::f64::consts::PI;

use num_complex::Complex64;
use tracing::trace;

use crate::elliptic::{ellipap, ellipord};
use crate::error::{AudioError, Result};

/// Passband edge of the song high-pass, fraction of Nyquist
pub const SONG_PASSBAND_EDGE: f64 = 0.04;
/// Stopband edge of the song high-pass, fraction of Nyquist
pub const SONG_STOPBAND_EDGE: f64 = 0.02;
/// Maximum passband loss in dB
pub const SONG_PASSBAND_RIPPLE_DB: f64 = 1.0;
/// Minimum stopband attenuation in dB
pub const SONG_STOPBAND_ATTENUATION_DB: f64 = 60.0;

/// IIR filter in transfer-function form, `a[0]` normalized to 1
#[derive(Debug, Clone, PartialEq)]
pub struct IirFilter {
    b: Vec<f64>,
    a: Vec<f64>,
}

impl IirFilter {
    /// Build from numerator `b` and denominator `a`
    ///
    /// Both are padded to a common length and divided by `a[0]`.
    pub fn new(mut b: Vec<f64>, mut a: Vec<f64>) -> Result<Self> {
        if b.is_empty() || a.is_empty() {
            return Err(AudioError::invalid_parameter(
                "filter coefficients cannot be empty",
            ));
        }
        let a0 = a[0];
        if a0 == 0.0 || !a0.is_finite() {
            return Err(AudioError::invalid_parameter(
                "leading denominator coefficient must be finite and non-zero",
            ));
        }

        let n = b.len().max(a.len());
        b.resize(n, 0.0);
        a.resize(n, 0.0);
        b.iter_mut().for_each(|c| *c /= a0);
        a.iter_mut().for_each(|c| *c /= a0);

        Ok(Self { b, a })
    }

    /// Digital elliptic high-pass meeting the given edges and gains
    ///
    /// Edges are fractions of Nyquist with `stopband < passband`.
    pub fn elliptic_highpass(
        passband: f64,
        stopband: f64,
        ripple_db: f64,
        attenuation_db: f64,
    ) -> Result<Self> {
        if stopband >= passband {
            return Err(AudioError::invalid_parameter(format!(
                "high-pass needs stopband < passband, got {} >= {}",
                stopband, passband
            )));
        }

        let order = ellipord(passband, stopband, ripple_db, attenuation_db)?;

        // Pre-warp the passband edge with fs = 2 so edges stay in Nyquist units
        let fs = 2.0;
        let warped = 2.0 * fs * (PI * passband / fs).tan();

        let zpk = ellipap(order, ripple_db, attenuation_db)?
            .lowpass_to_highpass(warped)
            .bilinear(fs);
        let (b, a) = zpk.to_transfer_function();

        trace!("Elliptic high-pass order {}: b={:?} a={:?}", order, b, a);
        Self::new(b, a)
    }

    /// High-pass applied to every recording before segmentation
    pub fn song_highpass() -> Result<Self> {
        Self::elliptic_highpass(
            SONG_PASSBAND_EDGE,
            SONG_STOPBAND_EDGE,
            SONG_PASSBAND_RIPPLE_DB,
            SONG_STOPBAND_ATTENUATION_DB,
        )
    }

    pub fn numerator(&self) -> &[f64] {
        &self.b
    }

    pub fn denominator(&self) -> &[f64] {
        &self.a
    }

    pub fn order(&self) -> usize {
        self.a.len() - 1
    }

    /// Direct form II transposed filtering with optional initial state
    pub fn lfilter(&self, x: &[f64], zi: Option<&[f64]>) -> Vec<f64> {
        let n = self.b.len();
        let mut z = match zi {
            Some(zi) => zi.to_vec(),
            None => vec![0.0; n - 1],
        };
        z.resize(n - 1, 0.0);

        let mut y = Vec::with_capacity(x.len());
        for &xi in x {
            let yi = self.b[0] * xi + z.first().copied().unwrap_or(0.0);
            for k in 0..n.saturating_sub(2) {
                z[k] = self.b[k + 1] * xi - self.a[k + 1] * yi + z[k + 1];
            }
            if n >= 2 {
                z[n - 2] = self.b[n - 1] * xi - self.a[n - 1] * yi;
            }
            y.push(yi);
        }
        y
    }

    /// Initial state giving the steady-state response to a unit step
    pub fn lfilter_zi(&self) -> Vec<f64> {
        let n = self.b.len();
        if n < 2 {
            return Vec::new();
        }

        let b0 = self.b[0];
        let num: f64 = (1..n).map(|k| self.b[k] - self.a[k] * b0).sum();
        let den: f64 = self.a.iter().sum();

        let mut zi = vec![0.0; n - 1];
        zi[0] = num / den;
        let mut asum = 1.0;
        let mut csum = 0.0;
        for k in 1..n - 1 {
            asum += self.a[k];
            csum += self.b[k] - self.a[k] * b0;
            zi[k] = asum * zi[0] - csum;
        }
        zi
    }

    /// Number of samples reflected onto each end by [`IirFilter::filtfilt`]
    pub fn pad_len(&self) -> usize {
        3 * self.b.len()
    }

    /// Zero-phase forward-backward filtering with odd extension at both ends
    ///
    /// Inputs no longer than [`IirFilter::pad_len`] samples are rejected.
    pub fn filtfilt(&self, x: &[f64]) -> Result<Vec<f64>> {
        let edge = self.pad_len();
        if x.len() <= edge {
            return Err(AudioError::segmentation(format!(
                "signal of {} samples is too short to filter, need more than {}",
                x.len(),
                edge
            )));
        }

        let ext = odd_extend(x, edge);
        let zi = self.lfilter_zi();

        let x0 = ext[0];
        let forward_zi: Vec<f64> = zi.iter().map(|z| z * x0).collect();
        let mut y = self.lfilter(&ext, Some(&forward_zi));

        y.reverse();
        let y0 = y[0];
        let backward_zi: Vec<f64> = zi.iter().map(|z| z * y0).collect();
        let mut y = self.lfilter(&y, Some(&backward_zi));
        y.reverse();

        Ok(y[edge..y.len() - edge].to_vec())
    }

    /// Magnitude of the frequency response at `freq` (fraction of Nyquist)
    pub fn magnitude_response(&self, freq: f64) -> f64 {
        let w = PI * freq;
        let eval = |coeffs: &[f64]| -> Complex64 {
            coeffs
                .iter()
                .enumerate()
                .map(|(k, &c)| c * Complex64::from_polar(1.0, -w * k as f64))
                .sum()
        };
        (eval(&self.b) / eval(&self.a)).norm()
    }
}

/// Point-reflect `n` samples about each endpoint
fn odd_extend(x: &[f64], n: usize) -> Vec<f64> {
    let len = x.len();
    let first = x[0];
    let last = x[len - 1];

    let mut ext = Vec::with_capacity(len + 2 * n);
    ext.extend((1..=n).rev().map(|i| 2.0 * first - x[i]));
    ext.extend_from_slice(x);
    ext.extend((1..=n).map(|i| 2.0 * last - x[len - 1 - i]));
    ext
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_song_highpass_order() {
        let filter = IirFilter::song_highpass().unwrap();
        assert_eq!(filter.order(), 5);
        assert_eq!(filter.pad_len(), 18);
        assert_relative_eq!(filter.denominator()[0], 1.0);
    }

    #[test]
    fn test_song_highpass_response() {
        let filter = IirFilter::song_highpass().unwrap();

        // DC and stopband are attenuated by at least 60 dB
        assert!(filter.magnitude_response(0.0) < 1e-3);
        assert!(filter.magnitude_response(SONG_STOPBAND_EDGE) < 1.01e-3);

        // Passband within 1 dB ripple
        let floor = 10f64.powf(-SONG_PASSBAND_RIPPLE_DB / 20.0) - 1e-4;
        for &f in &[SONG_PASSBAND_EDGE, 0.1, 0.3, 0.6, 0.9] {
            let mag = filter.magnitude_response(f);
            assert!(mag >= floor && mag <= 1.0 + 1e-4, "f={} mag={}", f, mag);
        }
    }

    #[test]
    fn test_lfilter_moving_average() {
        let filter = IirFilter::new(vec![0.5, 0.5], vec![1.0]).unwrap();
        let y = filter.lfilter(&[2.0, 4.0, 6.0], None);
        assert_eq!(y, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_lfilter_zi_is_steady_state() {
        let filter = IirFilter::song_highpass().unwrap();
        let zi = filter.lfilter_zi();
        // A constant input started from zi stays at the DC response
        let y = filter.lfilter(&[1.0; 50], Some(&zi));
        let dc = filter.numerator().iter().sum::<f64>() / filter.denominator().iter().sum::<f64>();
        for v in y {
            assert_relative_eq!(v, dc, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_filtfilt_removes_dc() {
        let filter = IirFilter::song_highpass().unwrap();
        let x: Vec<f64> = (0..4000)
            .map(|i| 500.0 + 100.0 * (2.0 * PI * 0.2 * i as f64).sin())
            .collect();
        let y = filter.filtfilt(&x).unwrap();
        assert_eq!(y.len(), x.len());

        let mid = &y[1000..3000];
        let mean = mid.iter().sum::<f64>() / mid.len() as f64;
        assert!(mean.abs() < 1.0, "mean={}", mean);
        let peak = mid.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        assert!(peak > 70.0 && peak < 110.0, "peak={}", peak);
    }

    #[test]
    fn test_filtfilt_rejects_short_input() {
        let filter = IirFilter::song_highpass().unwrap();
        assert!(matches!(
            filter.filtfilt(&[1.0; 18]),
            Err(AudioError::Segmentation(_))
        ));
        assert!(filter.filtfilt(&[1.0; 19]).is_ok());
    }

    #[test]
    fn test_odd_extend() {
        let ext = odd_extend(&[1.0, 2.0, 4.0, 7.0], 2);
        assert_eq!(ext, vec![-2.0, 0.0, 1.0, 2.0, 4.0, 7.0, 10.0, 12.0]);
    }

    #[test]
    fn test_new_normalizes() {
        let filter = IirFilter::new(vec![2.0], vec![2.0, 1.0]).unwrap();
        assert_eq!(filter.numerator(), &[1.0, 0.0]);
        assert_eq!(filter.denominator(), &[1.0, 0.5]);
        assert!(IirFilter::new(vec![1.0], vec![0.0, 1.0]).is_err());
    }
}
