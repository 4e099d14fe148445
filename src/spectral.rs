//! Spectral estimation: Welch PSD, spectrogram and band power.
//!
//! All estimators follow `scipy.signal` conventions:
//!   • periodic Hann window, per-segment mean removed (`detrend='constant'`)
//!   • density scaling `|X|² / (fs · Σw²)`, one-sided (interior bins doubled)
//!   • frequency grid `k · fs / nperseg`, `k = 0..=nperseg/2`
//!
//! Band power integrates with Simpson's rule over the uniform frequency grid,
//! matching `scipy.integrate.simpson(psd, dx=freq_res)`.
use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use tracing::debug;

use crate::error::{Error, Result};
use crate::filter::{filter, FilterType};

/// Power spectral density restricted to a frequency band.
#[derive(Debug, Clone)]
pub struct Psd {
    pub freqs: Array1<f64>,
    pub psd: Array1<f64>,
}

/// Short-time power spectrum, `power` is `[freq, time]`.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub freqs: Array1<f64>,
    /// Segment centres in seconds.
    pub times: Array1<f64>,
    pub power: Array2<f64>,
}

/// A named frequency band `[low, high]` in Hz (both edges inclusive).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub low: f64,
    pub high: f64,
    pub name: &'static str,
}

impl Band {
    pub const fn new(low: f64, high: f64, name: &'static str) -> Self {
        Self { low, high, name }
    }

    fn contains(&self, f: f64) -> bool {
        f >= self.low && f <= self.high
    }
}

pub const DELTA: Band = Band::new(0.5, 4.0, "delta");
pub const THETA: Band = Band::new(5.0, 9.0, "theta");

/// Welch power spectrum of `signal`, band-limited and optionally relative.
///
/// The signal is first band-pass filtered to `band`, then averaged over
/// Hann-windowed segments of `win_sec · sf` samples with 50 % overlap. With
/// `relative`, the PSD is divided by its Simpson-integrated total over the
/// band so that it integrates to one.
pub fn spectrum(signal: &[f64], sf: f64, band: [f64; 2], relative: bool, win_sec: f64) -> Result<Psd> {
    if !win_sec.is_finite() || win_sec <= 0.0 {
        return Err(Error::param(format!("window length must be positive, got {win_sec} s")));
    }
    let (filtered, _) = filter(signal, sf, FilterType::Bandpass, band[0], band[1])?;
    let nperseg = (win_sec * sf) as usize;
    let (freqs, psd) = welch(&filtered, sf, nperseg)?;

    let keep: Vec<usize> = (0..freqs.len())
        .filter(|&i| freqs[i] >= band[0] && freqs[i] <= band[1])
        .collect();
    let freqs: Array1<f64> = keep.iter().map(|&i| freqs[i]).collect();
    let mut psd: Array1<f64> = keep.iter().map(|&i| psd[i]).collect();

    if relative {
        let res = freq_resolution(freqs.view())?;
        let total = simpson(psd.as_slice().unwrap_or(&[]), res);
        if total > 0.0 {
            psd.mapv_inplace(|v| v / total);
        }
    }
    Ok(Psd { freqs, psd })
}

/// Welch's averaged periodogram with 50 % overlap.
///
/// `nperseg` is clipped to the signal length, as scipy does.
pub fn welch(signal: &[f64], sf: f64, nperseg: usize) -> Result<(Array1<f64>, Array1<f64>)> {
    check_sf(sf)?;
    if signal.is_empty() || nperseg == 0 {
        return Err(Error::param("Welch PSD needs a non-empty signal and segment"));
    }
    let nperseg = nperseg.min(signal.len());
    let hop = nperseg - nperseg / 2;
    let est = SegmentEstimator::new(nperseg, sf);

    let mut accum = vec![0.0; est.n_freq()];
    let mut seg_psd = vec![0.0; est.n_freq()];
    let mut n_seg = 0usize;
    for start in segment_starts(signal.len(), nperseg, hop) {
        est.psd(&signal[start..start + nperseg], &mut seg_psd);
        accum.iter_mut().zip(&seg_psd).for_each(|(a, p)| *a += p);
        n_seg += 1;
    }
    let inv = 1.0 / n_seg as f64;
    let psd = accum.into_iter().map(|v| v * inv).collect();
    Ok((est.freqs(), psd))
}

/// Short-time Fourier power spectrogram.
///
/// Segments are `window · sf` samples long and advance by `step · sf`
/// samples (i.e. consecutive segments overlap by `(window - step) · sf`).
/// Rows outside `band` are dropped. With `norm`, every time column is
/// scaled independently to unit total power.
///
/// # Errors
///
/// [`Error::InvalidParameter`] when `step > window`, either is not
/// positive, or the signal is shorter than one segment.
pub fn spectrogram(
    signal: &[f64],
    sf: f64,
    band: [f64; 2],
    step: f64,
    window: f64,
    norm: bool,
) -> Result<Spectrogram> {
    check_sf(sf)?;
    if !(step > 0.0 && window > 0.0) {
        return Err(Error::param(format!(
            "step ({step} s) and window ({window} s) must be positive"
        )));
    }
    if step > window {
        return Err(Error::param(format!(
            "step ({step} s) must not exceed window ({window} s)"
        )));
    }
    let nperseg = (window * sf).round() as usize;
    let hop = ((step * sf).round() as usize).max(1);
    if nperseg < 2 || signal.len() < nperseg {
        return Err(Error::param(format!(
            "signal of {} samples is shorter than one {nperseg}-sample spectrogram segment",
            signal.len()
        )));
    }

    let est = SegmentEstimator::new(nperseg, sf);
    let all_freqs = est.freqs();
    let rows: Vec<usize> = (0..all_freqs.len())
        .filter(|&k| all_freqs[k] >= band[0] && all_freqs[k] <= band[1])
        .collect();

    let starts: Vec<usize> = segment_starts(signal.len(), nperseg, hop).collect();
    let mut power = Array2::<f64>::zeros((rows.len(), starts.len()));
    let mut seg_psd = vec![0.0; est.n_freq()];
    for (col, &start) in starts.iter().enumerate() {
        est.psd(&signal[start..start + nperseg], &mut seg_psd);
        for (row, &k) in rows.iter().enumerate() {
            power[[row, col]] = seg_psd[k];
        }
    }

    if norm {
        for mut column in power.columns_mut() {
            let total = column.sum();
            if total > 0.0 {
                column.mapv_inplace(|v| v / total);
            }
        }
    }

    let times = starts
        .iter()
        .map(|&s| (s as f64 + nperseg as f64 / 2.0) / sf)
        .collect();
    let freqs = rows.iter().map(|&k| all_freqs[k]).collect();
    debug!(nperseg, hop, n_freq = rows.len(), n_time = starts.len(), "spectrogram");
    Ok(Spectrogram { freqs, times, power })
}

/// Simpson-integrated power of `psd` inside each band.
///
/// With `relative`, each band power is divided by the Simpson-integrated
/// power of the whole `psd`. Empty bands integrate to zero.
pub fn band_power(psd: ArrayView1<'_, f64>, freqs: ArrayView1<'_, f64>, bands: &[Band], relative: bool) -> Result<Vec<f64>> {
    if psd.len() != freqs.len() {
        return Err(Error::shape(format!(
            "PSD has {} bins but frequency axis has {}",
            psd.len(),
            freqs.len()
        )));
    }
    let res = freq_resolution(freqs)?;
    let total = if relative { simpson(&psd.to_vec(), res) } else { 1.0 };

    Ok(bands
        .iter()
        .map(|band| {
            let sel: Vec<f64> = freqs
                .iter()
                .zip(psd.iter())
                .filter(|(&f, _)| band.contains(f))
                .map(|(_, &p)| p)
                .collect();
            let bp = simpson(&sel, res);
            if relative {
                if total > 0.0 { bp / total } else { 0.0 }
            } else {
                bp
            }
        })
        .collect())
}

/// Composite Simpson's rule on uniformly spaced samples.
///
/// For an even number of samples the last interval uses the
/// Cartwright correction, as `scipy.integrate.simpson` does.
pub fn simpson(y: &[f64], dx: f64) -> f64 {
    let n = y.len();
    match n {
        0 | 1 => 0.0,
        2 => 0.5 * dx * (y[0] + y[1]),
        _ if n % 2 == 1 => basic_simpson(y, dx),
        _ => {
            let head = basic_simpson(&y[..n - 1], dx);
            head + dx * (5.0 / 12.0 * y[n - 1] + 2.0 / 3.0 * y[n - 2] - 1.0 / 12.0 * y[n - 3])
        }
    }
}

fn basic_simpson(y: &[f64], dx: f64) -> f64 {
    let n = y.len();
    let inner: f64 = y[1..n - 1]
        .iter()
        .enumerate()
        .map(|(i, &v)| if i % 2 == 0 { 4.0 * v } else { 2.0 * v })
        .sum();
    dx / 3.0 * (y[0] + inner + y[n - 1])
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn check_sf(sf: f64) -> Result<()> {
    if sf.is_finite() && sf > 0.0 {
        Ok(())
    } else {
        Err(Error::param(format!("sampling frequency must be positive, got {sf}")))
    }
}

fn freq_resolution(freqs: ArrayView1<'_, f64>) -> Result<f64> {
    if freqs.len() < 2 {
        return Err(Error::param("band power needs at least two frequency bins"));
    }
    Ok(freqs[1] - freqs[0])
}

fn segment_starts(len: usize, nperseg: usize, hop: usize) -> impl Iterator<Item = usize> {
    let n = if len >= nperseg { (len - nperseg) / hop + 1 } else { 0 };
    (0..n).map(move |i| i * hop)
}

/// One-sided density periodogram of fixed-length segments.
struct SegmentEstimator {
    nperseg: usize,
    sf: f64,
    window: Vec<f64>,
    scale: f64,
    fft: Arc<dyn Fft<f64>>,
}

impl SegmentEstimator {
    fn new(nperseg: usize, sf: f64) -> Self {
        let window = hann_periodic(nperseg);
        let win_pow: f64 = window.iter().map(|w| w * w).sum();
        let mut planner: FftPlanner<f64> = FftPlanner::new();
        let fft = planner.plan_fft_forward(nperseg);
        Self { nperseg, sf, window, scale: 1.0 / (sf * win_pow), fft }
    }

    fn n_freq(&self) -> usize {
        self.nperseg / 2 + 1
    }

    fn freqs(&self) -> Array1<f64> {
        (0..self.n_freq())
            .map(|k| k as f64 * self.sf / self.nperseg as f64)
            .collect()
    }

    fn psd(&self, segment: &[f64], out: &mut [f64]) {
        let mean = segment.iter().sum::<f64>() / segment.len() as f64;
        let mut buf: Vec<Complex<f64>> = segment
            .iter()
            .zip(&self.window)
            .map(|(&v, &w)| Complex { re: (v - mean) * w, im: 0.0 })
            .collect();
        self.fft.process(&mut buf);

        let nyquist_bin = (self.nperseg % 2 == 0).then_some(self.nperseg / 2);
        for (k, o) in out.iter_mut().enumerate() {
            let mut v = buf[k].norm_sqr() * self.scale;
            if k != 0 && Some(k) != nyquist_bin {
                v *= 2.0;
            }
            *o = v;
        }
    }
}

fn hann_periodic(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, amp: f64, sf: f64, secs: f64) -> Vec<f64> {
        let n = (sf * secs) as usize;
        (0..n).map(|i| amp * (2.0 * PI * freq * i as f64 / sf).sin()).collect()
    }

    #[test]
    fn simpson_integrates_polynomials() {
        let dx = 0.5;
        let odd: Vec<f64> = (0..9).map(|i| (i as f64 * dx).powi(2)).collect();
        approx::assert_abs_diff_eq!(simpson(&odd, dx), 4.0_f64.powi(3) / 3.0, epsilon = 1e-12);
        let even: Vec<f64> = (0..10).map(|i| (i as f64 * dx).powi(2)).collect();
        approx::assert_abs_diff_eq!(simpson(&even, dx), 4.5_f64.powi(3) / 3.0, epsilon = 1e-12);
        assert_eq!(simpson(&[1.0], 1.0), 0.0);
    }

    #[test]
    fn welch_peak_at_signal_frequency() {
        let sf = 256.0;
        let x = sine(10.0, 1.0, sf, 30.0);
        let (f, p) = welch(&x, sf, 1024).unwrap();
        let peak = p.iter().enumerate().max_by(|a, b| a.1.total_cmp(b.1)).unwrap().0;
        approx::assert_abs_diff_eq!(f[peak], 10.0, epsilon = 0.25);
    }

    #[test]
    fn welch_power_matches_variance() {
        // Parseval: integrated PSD ≈ variance = amp² / 2.
        let sf = 200.0;
        let x = sine(12.5, 2.0, sf, 60.0);
        let (f, p) = welch(&x, sf, 400).unwrap();
        let total = simpson(p.as_slice().unwrap(), f[1] - f[0]);
        approx::assert_abs_diff_eq!(total, 2.0, epsilon = 0.05);
    }

    #[test]
    fn relative_spectrum_integrates_to_one() {
        let sf = 128.0;
        let x: Vec<f64> = sine(3.0, 1.0, sf, 60.0)
            .iter()
            .zip(sine(11.0, 0.5, sf, 60.0))
            .map(|(a, b)| a + b)
            .collect();
        let s = spectrum(&x, sf, [0.5, 30.0], true, 4.0).unwrap();
        assert!(s.freqs.iter().all(|&f| (0.5..=30.0).contains(&f)));
        let total = simpson(s.psd.as_slice().unwrap(), s.freqs[1] - s.freqs[0]);
        approx::assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn spectrogram_shape_and_columns() {
        let sf = 100.0;
        let x = sine(8.0, 1.0, sf, 20.0);
        let s = spectrogram(&x, sf, [0.5, 30.0], 1.0, 2.0, true).unwrap();
        // 2000 samples, 200-sample segments, 100-sample hop → 19 frames.
        assert_eq!(s.times.len(), 19);
        assert_eq!(s.power.dim(), (s.freqs.len(), 19));
        approx::assert_abs_diff_eq!(s.times[0], 1.0, epsilon = 1e-12);
        for column in s.power.columns() {
            approx::assert_abs_diff_eq!(column.sum(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn spectrogram_rejects_step_above_window() {
        let x = vec![0.0; 1000];
        assert!(matches!(
            spectrogram(&x, 100.0, [0.5, 30.0], 3.0, 2.0, false),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn band_power_relative_sums_below_one() {
        let sf = 128.0;
        let x = sine(2.0, 1.0, sf, 30.0);
        let (f, p) = welch(&x, sf, 512).unwrap();
        let bp = band_power(p.view(), f.view(), &[DELTA, THETA], true).unwrap();
        assert!(bp[0] > 0.9, "delta share {}", bp[0]);
        assert!(bp[1] < 0.01, "theta share {}", bp[1]);
    }
}
