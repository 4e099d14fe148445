mod common;
use approx::assert_abs_diff_eq;
use common::{add, max_abs_diff, noise, rms, sine};
use hypno::filter::{filter, filter_power_line_noise, FilterType, PowerLine};
use hypno::Error;

const SF: f64 = 256.0;

// ── Band filters ──────────────────────────────────────────────────────────────

#[test]
fn bandpass_keeps_passband_and_removes_out_of_band() {
    let x = add(&sine(10.0, 1.0, SF, 20.0), &sine(60.0, 1.0, SF, 20.0));
    let (y, name) = filter(&x, SF, FilterType::Bandpass, 0.5, 30.0).unwrap();
    assert_eq!(name, "bandpass_0.5_30.0");
    assert_eq!(y.len(), x.len());

    let margin = (2.0 * SF) as usize;
    let r = rms(&y, margin, y.len() - margin);
    assert!((r - std::f64::consts::FRAC_1_SQRT_2).abs() < 0.03, "rms {r}");
}

#[test]
fn filtering_is_zero_phase() {
    // A 5 Hz tone well inside a 30 Hz lowpass comes out unshifted.
    let x = sine(5.0, 1.0, SF, 10.0);
    let (y, _) = filter(&x, SF, FilterType::Lowpass, 0.0, 30.0).unwrap();
    let margin = SF as usize;
    let err = max_abs_diff(&x[margin..x.len() - margin], &y[margin..y.len() - margin]);
    assert!(err < 0.01, "max deviation {err}");
}

#[test]
fn constant_passes_lowpass_unchanged() {
    let x = vec![3.25; 1000];
    let (y, _) = filter(&x, SF, FilterType::Lowpass, 0.0, 20.0).unwrap();
    for v in y {
        assert_abs_diff_eq!(v, 3.25, epsilon = 1e-9);
    }
}

#[test]
fn highpass_removes_offset() {
    let x: Vec<f64> = sine(8.0, 1.0, SF, 20.0).iter().map(|v| v + 5.0).collect();
    let (y, name) = filter(&x, SF, FilterType::Highpass, 1.0, 0.0).unwrap();
    assert_eq!(name, "highpass_1.0");
    let margin = (4.0 * SF) as usize;
    let mid = &y[margin..y.len() - margin];
    let mean = mid.iter().sum::<f64>() / mid.len() as f64;
    assert!(mean.abs() < 0.05, "residual offset {mean}");
}

#[test]
fn short_signal_is_rejected() {
    let x = vec![0.0; 15];
    assert!(matches!(
        filter(&x, SF, FilterType::Bandpass, 0.5, 30.0),
        Err(Error::InvalidParameter(_))
    ));
}

#[test]
fn cutoff_at_nyquist_is_rejected() {
    let x = noise(2048, 1.0, 1);
    assert!(filter(&x, SF, FilterType::Lowpass, 0.0, 128.0).is_err());
    assert!(filter(&x, -1.0, FilterType::Lowpass, 0.0, 10.0).is_err());
}

#[test]
fn filter_type_parses_names() {
    assert_eq!("bandstop".parse::<FilterType>().unwrap(), FilterType::Bandstop);
    assert_eq!(FilterType::Highpass.to_string(), "highpass");
}

// ── Power-line notch chain ────────────────────────────────────────────────────

#[test]
fn mains_harmonics_are_removed() {
    let clean = sine(10.0, 1.0, SF, 20.0);
    let hum = add(&sine(50.0, 0.8, SF, 20.0), &sine(100.0, 0.5, SF, 20.0));
    let x = add(&clean, &hum);

    let y = filter_power_line_noise(&x, SF, PowerLine::Hz50).unwrap();
    let margin = (2.0 * SF) as usize;
    let err = max_abs_diff(&y[margin..y.len() - margin], &clean[margin..clean.len() - margin]);
    assert!(err < 0.05, "residual after notch {err}");
}

#[test]
fn sixty_hz_chain_leaves_fifty_hz() {
    let x = sine(50.0, 1.0, SF, 20.0);
    let y = filter_power_line_noise(&x, SF, PowerLine::Hz60).unwrap();
    let margin = (2.0 * SF) as usize;
    let r = rms(&y, margin, y.len() - margin);
    assert!(r > 0.6, "50 Hz tone attenuated by the 60 Hz chain: rms {r}");
}
