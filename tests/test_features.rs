mod common;
use approx::assert_abs_diff_eq;
use common::{add, noise, sine};
use hypno::epoch::split_window_data;
use hypno::features::{build_feature_table, feature_columns, perm_entropy, STD_CLAMP_QUANTILE};
use hypno::{Error, SleepState};

const SF: f64 = 128.0;

/// EEG whose amplitude ramps up over time, so every window has a distinct std.
fn ramp_eeg(secs: f64) -> Vec<f64> {
    let base = add(&sine(2.0, 1.0, SF, secs), &noise((secs * SF) as usize, 0.3, 11));
    base.iter()
        .enumerate()
        .map(|(i, v)| v * (1.0 + i as f64 / SF / 50.0))
        .collect()
}

fn table(eeg: &[f64], emg: &[f64]) -> hypno::Result<hypno::FeatureTable> {
    let init = SleepState::Init.code();
    build_feature_table(
        split_window_data(eeg, SF, init, 20, 5)?,
        split_window_data(emg, SF, init, 20, 5)?,
        SF,
        5,
    )
}

#[test]
fn table_layout() {
    let eeg = ramp_eeg(300.0);
    let emg = noise(eeg.len(), 1.0, 5);
    let t = table(&eeg, &emg).unwrap();

    // Starts 0, 5, …, 290.
    assert_eq!(t.n_windows(), 59);
    assert_eq!(t.columns[0], "label");
    assert_eq!(t.feature_names(), feature_columns().as_slice());
    assert_eq!(t.values.ncols(), 15);
    assert_eq!(t.features().ncols(), 14);
    assert!(t.labels().iter().all(|&l| l == SleepState::Init.code()));
}

#[test]
fn every_feature_column_is_zscored() {
    let eeg = ramp_eeg(300.0);
    let emg = noise(eeg.len(), 1.0, 5);
    let t = table(&eeg, &emg).unwrap();
    for (name, col) in t.feature_names().iter().zip(t.features().columns()) {
        let n = col.len() as f64;
        let mean = col.sum() / n;
        let std = (col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-9);
        assert!(
            (std - 1.0).abs() < 1e-9 || std == 0.0,
            "{name}: std {std}"
        );
    }
}

#[test]
fn std_column_is_clamped_at_upper_quantile() {
    let eeg = ramp_eeg(300.0);
    let emg = noise(eeg.len(), 1.0, 5);
    let t = table(&eeg, &emg).unwrap();
    let col = t.column("EEG_std").unwrap();
    let max = col.iter().copied().fold(f64::MIN, f64::max);
    // 59 windows: the 0.95 quantile sits between ranks 55 and 56, so the
    // three largest values collapse onto it.
    let at_max = col.iter().filter(|&&v| v == max).count();
    assert_eq!(at_max, 3, "clamp at q = {STD_CLAMP_QUANTILE}");
}

#[test]
fn flat_emg_gives_zero_columns() {
    let eeg = ramp_eeg(120.0);
    let emg = vec![0.0; eeg.len()];
    let t = table(&eeg, &emg).unwrap();
    for name in ["EMG_std", "EMG_zerocross", "EMG_hjorth_m", "EMG_hjorth_c", "EMG_perm_entropy"] {
        assert!(t.column(name).unwrap().iter().all(|&v| v == 0.0), "{name}");
    }
}

#[test]
fn channel_window_counts_must_agree() {
    let eeg = ramp_eeg(300.0);
    let emg = noise((200.0 * SF) as usize, 1.0, 5);
    assert!(matches!(table(&eeg, &emg), Err(Error::Shape(_))));
}

#[test]
fn recording_shorter_than_a_window_gives_empty_table() {
    let eeg = ramp_eeg(15.0);
    let emg = noise(eeg.len(), 1.0, 5);
    let t = table(&eeg, &emg).unwrap();
    assert_eq!(t.n_windows(), 0);
    assert_eq!(t.columns.len(), 15);
}

#[test]
fn perm_entropy_of_noise_approaches_log2_six() {
    let x = noise(20_000, 1.0, 9);
    let h = perm_entropy(&x, 3, 1);
    assert_abs_diff_eq!(h, 6f64.log2(), epsilon = 0.01);
}
