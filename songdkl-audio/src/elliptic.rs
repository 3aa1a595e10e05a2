//! Elliptic (Cauer) filter design
//!
//! Complete elliptic integrals, Jacobi elliptic functions, order selection
//! and the normalized analog low-pass prototype. The digital high-pass used
//! for song filtering is assembled from these in [`crate::filter`].

use std::f64::consts::{FRAC_PI_2, PI};

use num_complex::Complex64;

use crate::error::{AudioError, Result};

/// Magnitude below which a zero/pole coordinate counts as zero
const EPSILON: f64 = 2e-16;

/// Number of terms in the nome series used to solve the degree equation
const ELLIPDEG_TERMS: i32 = 7;

/// Iteration cap for the descending Landen sequence in [`arc_jac_sc1`]
const ARC_JAC_MAX_ITER: usize = 10;

/// Arithmetic-geometric mean of `a` and `b`
fn agm(mut a: f64, mut b: f64) -> f64 {
    for _ in 0..64 {
        if (a - b).abs() <= f64::EPSILON * a {
            break;
        }
        let next_a = (a + b) / 2.0;
        b = (a * b).sqrt();
        a = next_a;
    }
    a
}

/// Complete elliptic integral of the first kind, K(m), parameter `m = k²`
pub fn ellipk(m: f64) -> f64 {
    ellipkm1(1.0 - m)
}

/// K(1 - p), taking the complementary parameter directly so tiny `p`
/// keeps its precision
pub fn ellipkm1(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::INFINITY;
    }
    PI / (2.0 * agm(1.0, p.sqrt()))
}

/// Jacobi elliptic functions `(sn, cn, dn)` of argument `u`, parameter `m`
///
/// Descending Landen transformation (AGM) with series fallbacks near
/// `m = 0` and `m = 1`.
pub fn ellipj(u: f64, m: f64) -> (f64, f64, f64) {
    if m < 1e-9 {
        let t = u.sin();
        let b = u.cos();
        let ai = 0.25 * m * (u - t * b);
        return (t - ai * b, b + ai * t, 1.0 - 0.5 * m * t * t);
    }

    if m >= 0.999_999_999_9 {
        let ai = 0.25 * (1.0 - m);
        let b = u.cosh();
        let t = u.tanh();
        let phi = 1.0 / b;
        let twon = b * u.sinh();
        let sn = t + ai * (twon - u) / (b * b);
        let ai = ai * t * phi;
        let cn = phi - ai * (twon - u);
        let dn = phi + ai * (twon + u);
        return (sn, cn, dn);
    }

    let mut a = [0.0f64; 9];
    let mut c = [0.0f64; 9];
    a[0] = 1.0;
    c[0] = m.sqrt();
    let mut b = (1.0 - m).sqrt();
    let mut twon = 1.0;
    let mut i = 0;

    while (c[i] / a[i]).abs() > f64::EPSILON && i < 8 {
        let ai = a[i];
        i += 1;
        c[i] = (ai - b) / 2.0;
        let t = (ai * b).sqrt();
        a[i] = (ai + b) / 2.0;
        b = t;
        twon *= 2.0;
    }

    let mut phi = twon * a[i] * u;
    let mut prev = phi;
    while i > 0 {
        let t = c[i] * phi.sin() / a[i];
        prev = phi;
        phi = (t.asin() + phi) / 2.0;
        i -= 1;
    }

    let cn = phi.cos();
    (phi.sin(), cn, cn / (phi - prev).cos())
}

/// Solve the degree equation: selectivity parameter of an order-`n`
/// elliptic filter with discrimination parameter `m1`
fn ellipdeg(n: usize, m1: f64) -> f64 {
    let k1 = ellipk(m1);
    let k1p = ellipkm1(m1);
    let q1 = (-PI * k1p / k1).exp();
    let q = q1.powf(1.0 / n as f64);

    let num: f64 = (0..=ELLIPDEG_TERMS).map(|i| q.powi(i * (i + 1))).sum();
    let den: f64 = 1.0 + 2.0 * (1..=ELLIPDEG_TERMS + 1).map(|i| q.powi(i * i)).sum::<f64>();

    16.0 * q * (num / den).powi(4)
}

/// Real `v` such that `sc(v, m) = w`, i.e. the imaginary part of the inverse
/// Jacobi `sn` evaluated at `i·w`
fn arc_jac_sc1(w: f64, m: f64) -> Result<f64> {
    let k = m.sqrt();
    if k >= 1.0 {
        return Err(AudioError::invalid_parameter(format!(
            "elliptic modulus must be below 1, got {}",
            k
        )));
    }

    let mut ks = vec![k];
    while let Some(&last) = ks.last() {
        if last == 0.0 {
            break;
        }
        if ks.len() > ARC_JAC_MAX_ITER + 1 {
            return Err(AudioError::invalid_parameter(
                "Landen sequence did not converge",
            ));
        }
        let kp = ((1.0 - last) * (1.0 + last)).sqrt();
        ks.push((1.0 - kp) / (1.0 + kp));
    }

    let capk: f64 = ks[1..].iter().map(|kn| 1.0 + kn).product::<f64>() * FRAC_PI_2;

    // Along the imaginary axis every Landen step stays imaginary, so only
    // the imaginary coordinate is tracked.
    let mut y = w;
    for pair in ks.windows(2) {
        let (kn, knext) = (pair[0], pair[1]);
        y = 2.0 * y / ((1.0 + knext) * (1.0 + (1.0 + (kn * y) * (kn * y)).sqrt()));
    }

    Ok(capk * 2.0 / PI * y.asinh())
}

/// Minimum elliptic order meeting a digital specification
///
/// Edges are fractions of Nyquist. `wp < ws` designs a low-pass,
/// `wp > ws` a high-pass.
pub fn ellipord(wp: f64, ws: f64, gpass: f64, gstop: f64) -> Result<usize> {
    if !(0.0 < wp && wp < 1.0 && 0.0 < ws && ws < 1.0) || wp == ws {
        return Err(AudioError::invalid_parameter(format!(
            "band edges must lie in (0, 1) and differ, got wp={}, ws={}",
            wp, ws
        )));
    }
    if gpass <= 0.0 || gstop <= gpass {
        return Err(AudioError::invalid_parameter(format!(
            "need 0 < gpass < gstop, got gpass={}, gstop={}",
            gpass, gstop
        )));
    }

    let passb = (PI * wp / 2.0).tan();
    let stopb = (PI * ws / 2.0).tan();
    let nat = if wp < ws { stopb / passb } else { passb / stopb };

    let arg1_sq = (10f64.powf(0.1 * gpass) - 1.0) / (10f64.powf(0.1 * gstop) - 1.0);
    let arg0_sq = (1.0 / nat).powi(2);

    let d0 = (ellipk(arg0_sq), ellipkm1(arg0_sq));
    let d1 = (ellipk(arg1_sq), ellipkm1(arg1_sq));

    Ok((d0.0 * d1.1 / (d0.1 * d1.0)).ceil() as usize)
}

/// Zeros, poles and gain of a filter
#[derive(Debug, Clone, PartialEq)]
pub struct Zpk {
    pub zeros: Vec<Complex64>,
    pub poles: Vec<Complex64>,
    pub gain: f64,
}

impl Zpk {
    /// Analog low-pass to high-pass with cutoff `wo`
    pub fn lowpass_to_highpass(self, wo: f64) -> Self {
        let degree = self.poles.len() - self.zeros.len();

        let prod_z: Complex64 = self.zeros.iter().map(|z| -z).product();
        let prod_p: Complex64 = self.poles.iter().map(|p| -p).product();
        let gain = self.gain * (prod_z / prod_p).re;

        let mut zeros: Vec<Complex64> = self.zeros.iter().map(|z| wo / z).collect();
        zeros.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(degree));
        let poles = self.poles.iter().map(|p| wo / p).collect();

        Self { zeros, poles, gain }
    }

    /// Bilinear transform to a digital filter at sample rate `fs`
    pub fn bilinear(self, fs: f64) -> Self {
        let degree = self.poles.len() - self.zeros.len();
        let fs2 = Complex64::new(2.0 * fs, 0.0);

        let prod_z: Complex64 = self.zeros.iter().map(|z| fs2 - z).product();
        let prod_p: Complex64 = self.poles.iter().map(|p| fs2 - p).product();
        let gain = self.gain * (prod_z / prod_p).re;

        let mut zeros: Vec<Complex64> = self.zeros.iter().map(|z| (fs2 + z) / (fs2 - z)).collect();
        zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(degree));
        let poles = self.poles.iter().map(|p| (fs2 + p) / (fs2 - p)).collect();

        Self { zeros, poles, gain }
    }

    /// Expand to transfer-function coefficients `(b, a)`
    pub fn to_transfer_function(&self) -> (Vec<f64>, Vec<f64>) {
        let b = poly(&self.zeros).into_iter().map(|c| c.re * self.gain).collect();
        let a = poly(&self.poles).into_iter().map(|c| c.re).collect();
        (b, a)
    }
}

/// Monic polynomial coefficients (highest power first) with the given roots
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for root in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c * root;
        }
        coeffs = next;
    }
    coeffs
}

/// Normalized analog elliptic low-pass prototype of order `n`
///
/// `rp` is the passband ripple and `rs` the stopband attenuation, both in dB.
pub fn ellipap(n: usize, rp: f64, rs: f64) -> Result<Zpk> {
    if n == 0 {
        return Err(AudioError::invalid_parameter("filter order must be positive"));
    }

    let eps_sq = 10f64.powf(0.1 * rp) - 1.0;
    let eps = eps_sq.sqrt();

    if n == 1 {
        let p = -(1.0 / eps_sq).sqrt();
        return Ok(Zpk {
            zeros: Vec::new(),
            poles: vec![Complex64::new(p, 0.0)],
            gain: -p,
        });
    }

    let ck1_sq = eps_sq / (10f64.powf(0.1 * rs) - 1.0);
    if ck1_sq == 0.0 {
        return Err(AudioError::invalid_parameter(
            "Cannot design a filter with given rp and rs specifications",
        ));
    }

    let val0 = ellipk(ck1_sq);
    let m = ellipdeg(n, ck1_sq);
    let capk = ellipk(m);

    let js: Vec<usize> = ((1 - n % 2)..n).step_by(2).collect();
    let sncndn: Vec<(f64, f64, f64)> = js
        .iter()
        .map(|&j| ellipj(j as f64 * capk / n as f64, m))
        .collect();

    let mut zeros: Vec<Complex64> = sncndn
        .iter()
        .filter(|(s, _, _)| s.abs() > EPSILON)
        .map(|(s, _, _)| Complex64::new(0.0, 1.0 / (m.sqrt() * s)))
        .collect();
    let conj_zeros: Vec<Complex64> = zeros.iter().map(|z| z.conj()).collect();
    zeros.extend(conj_zeros);

    let r = arc_jac_sc1(1.0 / eps, ck1_sq)?;
    let v0 = capk * r / (n as f64 * val0);
    let (sv, cv, dv) = ellipj(v0, 1.0 - m);

    let mut poles: Vec<Complex64> = sncndn
        .iter()
        .map(|&(s, c, d)| {
            let num = Complex64::new(c * d * sv * cv, s * dv);
            -num / (1.0 - (d * sv).powi(2))
        })
        .collect();

    if n % 2 == 1 {
        let norm = poles.iter().map(|p| p.norm_sqr()).sum::<f64>().sqrt();
        let extra: Vec<Complex64> = poles
            .iter()
            .filter(|p| p.im.abs() > EPSILON * norm)
            .map(|p| p.conj())
            .collect();
        poles.extend(extra);
    } else {
        let extra: Vec<Complex64> = poles.iter().map(|p| p.conj()).collect();
        poles.extend(extra);
    }

    let prod_p: Complex64 = poles.iter().map(|p| -p).product();
    let prod_z: Complex64 = zeros.iter().map(|z| -z).product();
    let mut gain = (prod_p / prod_z).re;
    if n % 2 == 0 {
        gain /= (1.0 + eps_sq).sqrt();
    }

    Ok(Zpk { zeros, poles, gain })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ellipk_known_values() {
        assert_relative_eq!(ellipk(0.0), FRAC_PI_2, epsilon = 1e-14);
        // K(0.5) = 1.854074677301372
        assert_relative_eq!(ellipk(0.5), 1.854_074_677_301_372, epsilon = 1e-12);
        assert!(ellipk(1.0).is_infinite());
    }

    #[test]
    fn test_ellipkm1_matches_ellipk() {
        assert_relative_eq!(ellipkm1(0.3), ellipk(0.7), epsilon = 1e-12);
    }

    #[test]
    fn test_ellipj_identities() {
        for &(u, m) in &[(0.3, 0.2), (1.1, 0.75), (2.0, 0.5), (0.7, 1e-12)] {
            let (sn, cn, dn) = ellipj(u, m);
            assert_relative_eq!(sn * sn + cn * cn, 1.0, epsilon = 1e-12);
            assert_relative_eq!(dn * dn + m * sn * sn, 1.0, epsilon = 1e-12);
        }
        // sn(K(m), m) = 1
        let m = 0.4;
        let (sn, _, _) = ellipj(ellipk(m), m);
        assert_relative_eq!(sn, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_song_filter_order() {
        // Classical song high-pass: wp=0.04, ws=0.02, 1 dB ripple, 60 dB stop
        assert_eq!(ellipord(0.04, 0.02, 1.0, 60.0).unwrap(), 5);
    }

    #[test]
    fn test_ellipord_rejects_bad_edges() {
        assert!(ellipord(0.0, 0.02, 1.0, 60.0).is_err());
        assert!(ellipord(0.04, 0.04, 1.0, 60.0).is_err());
        assert!(ellipord(0.04, 0.02, 60.0, 1.0).is_err());
    }

    #[test]
    fn test_prototype_shape() {
        let zpk = ellipap(5, 1.0, 60.0).unwrap();
        assert_eq!(zpk.poles.len(), 5);
        assert_eq!(zpk.zeros.len(), 4);
        assert!(zpk.poles.iter().all(|p| p.re < 0.0));
        // zeros sit on the imaginary axis
        assert!(zpk.zeros.iter().all(|z| z.re.abs() < 1e-12));
    }

    #[test]
    fn test_poly_expands_roots() {
        let roots = [Complex64::new(1.0, 0.0), Complex64::new(2.0, 0.0)];
        let c = poly(&roots);
        assert_relative_eq!(c[0].re, 1.0);
        assert_relative_eq!(c[1].re, -3.0);
        assert_relative_eq!(c[2].re, 2.0);
    }
}
