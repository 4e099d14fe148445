mod common;
use approx::assert_abs_diff_eq;
use common::{add, noise, sine};
use hypno::spectral::{band_power, simpson, spectrogram, spectrum, welch, Band, DELTA, THETA};

const SF: f64 = 256.0;

#[test]
fn spectrogram_localises_a_burst_in_time_and_frequency() {
    // 12 Hz burst between 20 s and 25 s on top of weak noise.
    let mut x = noise((60.0 * SF) as usize, 0.05, 7);
    let burst = sine(12.0, 1.0, SF, 5.0);
    let at = (20.0 * SF) as usize;
    x[at..at + burst.len()].iter_mut().zip(&burst).for_each(|(v, b)| *v += b);

    let s = spectrogram(&x, SF, [10.0, 15.0], 0.5, 2.0, false).unwrap();
    assert!(s.freqs.iter().all(|&f| (10.0..=15.0).contains(&f)));

    let envelope: Vec<f64> = s.power.columns().into_iter().map(|c| c.sum()).collect();
    let loudest = envelope.iter().enumerate().max_by(|a, b| a.1.total_cmp(b.1)).unwrap().0;
    let t = s.times[loudest];
    assert!((20.0..=25.0).contains(&t), "loudest frame at {t} s");

    let quiet = s.times.iter().position(|&t| t > 40.0).unwrap();
    assert!(envelope[loudest] > 100.0 * envelope[quiet]);
}

#[test]
fn spectrogram_times_are_segment_centres() {
    let x = vec![0.0; (10.0 * SF) as usize];
    let s = spectrogram(&x, SF, [0.0, 128.0], 0.2, 2.0, false).unwrap();
    assert_abs_diff_eq!(s.times[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(s.times[1] - s.times[0], 0.2, epsilon = 1e-2);
    // Silence must not produce NaN columns even with normalisation.
    let n = spectrogram(&x, SF, [0.0, 128.0], 0.2, 2.0, true).unwrap();
    assert!(n.power.iter().all(|v| v.is_finite()));
}

#[test]
fn spectrogram_needs_one_full_segment() {
    let x = vec![0.0; 100];
    assert!(spectrogram(&x, SF, [0.5, 30.0], 1.0, 2.0, false).is_err());
}

#[test]
fn welch_clips_segment_to_signal() {
    let x = sine(10.0, 1.0, SF, 2.0);
    let (f, p) = welch(&x, SF, 4096).unwrap();
    // nperseg = 512 → bins 0..=256 at 0.5 Hz.
    assert_eq!(f.len(), 257);
    assert_eq!(p.len(), 257);
    assert_abs_diff_eq!(f[1], 0.5, epsilon = 1e-12);
}

#[test]
fn spectrum_band_limits_and_filters() {
    let x = add(&sine(2.0, 1.0, SF, 60.0), &sine(40.0, 1.0, SF, 60.0));
    let s = spectrum(&x, SF, [0.5, 30.0], false, 4.0).unwrap();
    assert_abs_diff_eq!(s.freqs[0], 0.5, epsilon = 1e-12);
    assert!(*s.freqs.last().unwrap() <= 30.0);
    let peak = s.psd.iter().enumerate().max_by(|a, b| a.1.total_cmp(b.1)).unwrap().0;
    assert_abs_diff_eq!(s.freqs[peak], 2.0, epsilon = 0.25);
}

#[test]
fn theta_tone_falls_in_theta_band() {
    let x = sine(7.0, 1.0, SF, 30.0);
    let (f, p) = welch(&x, SF, 1024).unwrap();
    let sigma = Band::new(10.0, 15.0, "sigma");
    let bp = band_power(p.view(), f.view(), &[DELTA, THETA, sigma], true).unwrap();
    assert!(bp[1] > 0.9, "theta share {}", bp[1]);
    assert!(bp[0] < 0.01 && bp[2] < 0.01);
}

#[test]
fn band_power_rejects_mismatched_axes() {
    let p = ndarray::Array1::<f64>::zeros(10);
    let f = ndarray::Array1::<f64>::zeros(9);
    assert!(band_power(p.view(), f.view(), &[DELTA], false).is_err());
}

#[test]
fn simpson_matches_trapezoid_on_lines() {
    let y: Vec<f64> = (0..11).map(|i| 2.0 * i as f64 + 1.0).collect();
    // ∫₀¹⁰ (2x + 1) dx = 110
    assert_abs_diff_eq!(simpson(&y, 1.0), 110.0, epsilon = 1e-10);
}
