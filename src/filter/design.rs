//! Butterworth IIR design matching `scipy.signal.iirfilter(ftype='butter',
//! output='ba')`.
//!
//! The design runs entirely in zero/pole/gain form:
//!   • analog prototype poles on the unit circle (`buttap`)
//!   • frequency pre-warping `4 · tan(π·Wn / 2)` for the bilinear transform
//!   • lowpass → {lowpass, highpass, bandpass, bandstop} transform
//!   • bilinear transform at `fs = 2` (Wn is a Nyquist fraction)
//!   • expansion of zeros and poles to real `b`, `a` polynomials
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

type C64 = Complex<f64>;

/// Order of every conditioning filter in the pipeline.
pub const BUTTER_ORDER: usize = 3;

/// Filter response type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
    Bandstop,
}

impl FilterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterType::Lowpass => "lowpass",
            FilterType::Highpass => "highpass",
            FilterType::Bandpass => "bandpass",
            FilterType::Bandstop => "bandstop",
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lowpass" => Ok(FilterType::Lowpass),
            "highpass" => Ok(FilterType::Highpass),
            "bandpass" => Ok(FilterType::Bandpass),
            "bandstop" => Ok(FilterType::Bandstop),
            other => Err(Error::param(format!(
                "'{other}' is an invalid filter type, choose 'lowpass', 'highpass', \
                 'bandpass' or 'bandstop'"
            ))),
        }
    }
}

/// Transfer-function coefficients, `a[0] == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct BaCoeffs {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

/// Zeros, poles and gain of a filter.
#[derive(Debug, Clone)]
struct Zpk {
    z: Vec<C64>,
    p: Vec<C64>,
    k: f64,
}

impl Zpk {
    fn degree(&self) -> usize {
        self.p.len() - self.z.len()
    }
}

/// Name suffix used for a filtered channel, e.g. `bandpass_0.5_30.0`.
pub fn filter_name(btype: FilterType, low: f64, high: f64) -> String {
    match btype {
        FilterType::Lowpass => format!("{btype}_{high:?}"),
        FilterType::Highpass => format!("{btype}_{low:?}"),
        FilterType::Bandpass | FilterType::Bandstop => format!("{btype}_{low:?}_{high:?}"),
    }
}

/// Design an `order`-th order digital Butterworth filter.
///
/// `low` and `high` are in Hz; only the cutoff(s) relevant to `btype` are
/// used. Cutoffs are normalised to the Nyquist frequency `sf / 2` and must
/// fall strictly inside `(0, 1)`.
pub fn butter(order: usize, btype: FilterType, low: f64, high: f64, sf: f64) -> Result<BaCoeffs> {
    if order == 0 {
        return Err(Error::param("filter order must be at least 1"));
    }
    if !sf.is_finite() || sf <= 0.0 {
        return Err(Error::param(format!("sampling frequency must be positive, got {sf}")));
    }
    let nyq = 0.5 * sf;
    let norm = |f: f64, what: &str| -> Result<f64> {
        if !f.is_finite() {
            return Err(Error::param(format!("{what} cutoff must be a finite number, got {f}")));
        }
        let wn = f / nyq;
        if wn <= 0.0 || wn >= 1.0 {
            return Err(Error::param(format!(
                "{what} cutoff {f} Hz must lie in (0, {nyq}) for sf = {sf} Hz"
            )));
        }
        Ok(wn)
    };

    let proto = buttap(order);
    let warp = |wn: f64| 4.0 * (PI * wn / 2.0).tan();

    let analog = match btype {
        FilterType::Lowpass => lp2lp(proto, warp(norm(high, "high")?)),
        FilterType::Highpass => lp2hp(proto, warp(norm(low, "low")?)),
        FilterType::Bandpass | FilterType::Bandstop => {
            let (wl, wh) = (norm(low, "low")?, norm(high, "high")?);
            if wl >= wh {
                return Err(Error::param(format!(
                    "low cutoff ({low} Hz) must be below high cutoff ({high} Hz)"
                )));
            }
            let (w1, w2) = (warp(wl), warp(wh));
            let bw = w2 - w1;
            let wo = (w1 * w2).sqrt();
            if btype == FilterType::Bandpass {
                lp2bp(proto, wo, bw)
            } else {
                lp2bs(proto, wo, bw)
            }
        }
    };

    Ok(zpk2tf(&bilinear(analog, 2.0)))
}

// ── Analog prototype and transforms ─────────────────────────────────────────

/// Analog Butterworth prototype: no zeros, `order` poles on the left unit
/// half-circle, unit gain.
fn buttap(order: usize) -> Zpk {
    let n = order as f64;
    let p = (0..order)
        .map(|i| {
            let m = -(n - 1.0) + 2.0 * i as f64;
            -C64::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect();
    Zpk { z: vec![], p, k: 1.0 }
}

fn lp2lp(f: Zpk, wo: f64) -> Zpk {
    let degree = f.degree() as i32;
    Zpk {
        z: f.z.iter().map(|&z| z * wo).collect(),
        p: f.p.iter().map(|&p| p * wo).collect(),
        k: f.k * wo.powi(degree),
    }
}

fn lp2hp(f: Zpk, wo: f64) -> Zpk {
    let degree = f.degree();
    let gain = (prod(f.z.iter().map(|&z| -z)) / prod(f.p.iter().map(|&p| -p))).re;
    let mut z: Vec<C64> = f.z.iter().map(|&z| wo / z).collect();
    z.extend(std::iter::repeat(C64::new(0.0, 0.0)).take(degree));
    Zpk {
        z,
        p: f.p.iter().map(|&p| wo / p).collect(),
        k: f.k * gain,
    }
}

fn lp2bp(f: Zpk, wo: f64, bw: f64) -> Zpk {
    let degree = f.degree() as i32;
    let split = |r: C64| -> [C64; 2] {
        let s = r * (bw / 2.0);
        let d = (s * s - wo * wo).sqrt();
        [s + d, s - d]
    };
    let mut z: Vec<C64> = f.z.iter().flat_map(|&r| split(r)).collect();
    z.extend(std::iter::repeat(C64::new(0.0, 0.0)).take(degree as usize));
    let p = f.p.iter().flat_map(|&r| split(r)).collect();
    Zpk { z, p, k: f.k * bw.powi(degree) }
}

fn lp2bs(f: Zpk, wo: f64, bw: f64) -> Zpk {
    let degree = f.degree();
    let gain = (prod(f.z.iter().map(|&z| -z)) / prod(f.p.iter().map(|&p| -p))).re;
    let split = |r: C64| -> [C64; 2] {
        let s = (bw / 2.0) / r;
        let d = (s * s - wo * wo).sqrt();
        [s + d, s - d]
    };
    let mut z: Vec<C64> = f.z.iter().flat_map(|&r| split(r)).collect();
    z.extend(std::iter::repeat(C64::new(0.0, wo)).take(degree));
    z.extend(std::iter::repeat(C64::new(0.0, -wo)).take(degree));
    let p = f.p.iter().flat_map(|&r| split(r)).collect();
    Zpk { z, p, k: f.k * gain }
}

fn bilinear(f: Zpk, fs: f64) -> Zpk {
    let degree = f.degree();
    let fs2 = C64::new(2.0 * fs, 0.0);
    let gain = (prod(f.z.iter().map(|&z| fs2 - z)) / prod(f.p.iter().map(|&p| fs2 - p))).re;
    let mut z: Vec<C64> = f.z.iter().map(|&z| (fs2 + z) / (fs2 - z)).collect();
    z.extend(std::iter::repeat(C64::new(-1.0, 0.0)).take(degree));
    Zpk {
        z,
        p: f.p.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect(),
        k: f.k * gain,
    }
}

// ── Polynomial helpers ──────────────────────────────────────────────────────

fn prod(it: impl Iterator<Item = C64>) -> C64 {
    it.fold(C64::new(1.0, 0.0), |acc, v| acc * v)
}

/// Monic polynomial with the given roots, highest power first.
fn poly(roots: &[C64]) -> Vec<C64> {
    let mut c = vec![C64::new(1.0, 0.0)];
    for r in roots {
        let mut next = vec![C64::new(0.0, 0.0); c.len() + 1];
        for (i, &ci) in c.iter().enumerate() {
            next[i] += ci;
            next[i + 1] -= ci * *r;
        }
        c = next;
    }
    c
}

fn zpk2tf(f: &Zpk) -> BaCoeffs {
    // Roots come in conjugate pairs, so the imaginary parts cancel.
    let b = poly(&f.z).iter().map(|c| c.re * f.k).collect();
    let a = poly(&f.p).iter().map(|c| c.re).collect();
    BaCoeffs { b, a }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// |H(e^{jω})| of a transfer function at `freq` Hz.
    fn gain_at(ba: &BaCoeffs, freq: f64, sf: f64) -> f64 {
        let w = 2.0 * PI * freq / sf;
        let eval = |c: &[f64]| {
            c.iter()
                .enumerate()
                .fold(C64::new(0.0, 0.0), |acc, (i, &v)| acc + C64::from_polar(v, -w * i as f64))
        };
        (eval(&ba.b) / eval(&ba.a)).norm()
    }

    #[test]
    fn lowpass_matches_scipy_coefficients() {
        // scipy.signal.butter(3, 0.5) → b = [1/6, 1/2, 1/2, 1/6], a = [1, 0, 1/3, 0]
        let ba = butter(3, FilterType::Lowpass, 0.0, 50.0, 200.0).unwrap();
        let b_ref = [1.0 / 6.0, 0.5, 0.5, 1.0 / 6.0];
        let a_ref = [1.0, 0.0, 1.0 / 3.0, 0.0];
        for (got, exp) in ba.b.iter().zip(b_ref) {
            approx::assert_abs_diff_eq!(*got, exp, epsilon = 1e-12);
        }
        for (got, exp) in ba.a.iter().zip(a_ref) {
            approx::assert_abs_diff_eq!(*got, exp, epsilon = 1e-12);
        }
    }

    #[test]
    fn band_filters_double_the_order() {
        let bp = butter(3, FilterType::Bandpass, 0.5, 30.0, 256.0).unwrap();
        assert_eq!(bp.b.len(), 7);
        assert_eq!(bp.a.len(), 7);
        let bs = butter(3, FilterType::Bandstop, 47.0, 53.0, 512.0).unwrap();
        assert_eq!(bs.a.len(), 7);
    }

    #[test]
    fn responses_have_expected_shape() {
        let sf = 256.0;
        let lp = butter(3, FilterType::Lowpass, 0.0, 30.0, sf).unwrap();
        approx::assert_abs_diff_eq!(gain_at(&lp, 0.0, sf), 1.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(gain_at(&lp, 30.0, sf), std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-6);

        let hp = butter(3, FilterType::Highpass, 1.0, 0.0, sf).unwrap();
        assert!(gain_at(&hp, 0.0, sf) < 1e-9);
        approx::assert_abs_diff_eq!(gain_at(&hp, 64.0, sf), 1.0, epsilon = 1e-4);

        let bs = butter(3, FilterType::Bandstop, 47.0, 53.0, sf).unwrap();
        assert!(gain_at(&bs, 50.0, sf) < 1e-3);
        approx::assert_abs_diff_eq!(gain_at(&bs, 10.0, sf), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(matches!(
            "notch".parse::<FilterType>(),
            Err(Error::InvalidParameter(_))
        ));
        assert!(butter(3, FilterType::Lowpass, 0.0, 200.0, 256.0).is_err());
        assert!(butter(3, FilterType::Bandpass, 30.0, 10.0, 256.0).is_err());
        assert!(butter(3, FilterType::Highpass, f64::NAN, 0.0, 256.0).is_err());
    }

    #[test]
    fn names_follow_cutoffs() {
        assert_eq!(filter_name(FilterType::Lowpass, 0.5, 30.0), "lowpass_30.0");
        assert_eq!(filter_name(FilterType::Bandpass, 0.5, 30.0), "bandpass_0.5_30.0");
    }
}
