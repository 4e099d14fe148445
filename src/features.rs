//! Per-window features for the stage classifier.
//!
//! Only the first `feature_sec` seconds of each window are used (the
//! classifiers were trained that way).  For every channel role:
//!
//! | column              | definition                                            |
//! |---------------------|-------------------------------------------------------|
//! | `*_std`             | population standard deviation, 95th percentile clamp  |
//! | `*_zerocross`       | sign changes per sample                               |
//! | `*_hjorth_m/_c`     | Hjorth mobility and complexity                        |
//! | `*_perm_entropy`    | permutation entropy, order 3, delay 1, bits           |
//!
//! EEG additionally gets biased skewness, Fisher kurtosis, the delta/theta
//! power ratio and relative theta power, both from a 1 s spectrogram over
//! 0.5–30 Hz.  Every feature column is z-scored over all windows.
use ndarray::{s, Array2, Axis};
use tracing::{debug, warn};

use crate::epoch::LabeledWindow;
use crate::error::{Error, Result};
use crate::normalize::{clamp_upper_quantile_inplace, zscore_inplace};
use crate::spectral::{band_power, spectrogram, DELTA, THETA};

/// Quantile above which the `std` feature is clamped before z-scoring.
pub const STD_CLAMP_QUANTILE: f64 = 0.95;

/// Channel role; decides the feature set and the column prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRole {
    Eeg,
    Emg,
}

impl ChannelRole {
    pub fn prefix(self) -> &'static str {
        match self {
            ChannelRole::Eeg => "EEG",
            ChannelRole::Emg => "EMG",
        }
    }

    /// Feature column names for this role, in table order.
    pub fn feature_names(self) -> Vec<String> {
        let base = ["std", "zerocross", "hjorth_m", "hjorth_c", "perm_entropy"];
        let eeg_only = ["skew", "kurt", "delta_theta", "theta_rel"];
        let names = match self {
            ChannelRole::Eeg => base.iter().chain(eeg_only.iter()).copied().collect::<Vec<_>>(),
            ChannelRole::Emg => base.to_vec(),
        };
        names.into_iter().map(|n| format!("{}_{n}", self.prefix())).collect()
    }
}

/// Column order of the feature table fed to the classifiers
/// (excluding the leading `label` column).
pub fn feature_columns() -> Vec<String> {
    let mut cols = ChannelRole::Eeg.feature_names();
    cols.extend(ChannelRole::Emg.feature_names());
    cols
}

/// Z-scored features, one row per window.
///
/// Column 0 is the provisional `label` carried by the windows; the
/// remaining columns follow [`feature_columns`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl FeatureTable {
    pub fn n_windows(&self) -> usize {
        self.values.nrows()
    }

    /// Feature names, without the label column.
    pub fn feature_names(&self) -> &[String] {
        &self.columns[1..]
    }

    /// Feature matrix `[window, feature]`, without the label column.
    pub fn features(&self) -> ndarray::ArrayView2<'_, f64> {
        self.values.slice(s![.., 1..])
    }

    pub fn labels(&self) -> Vec<u8> {
        self.values.column(0).iter().map(|&v| v as u8).collect()
    }

    pub fn column(&self, name: &str) -> Option<ndarray::ArrayView1<'_, f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.values.column(idx))
    }
}

/// Build the combined EEG + EMG feature table.
///
/// # Errors
///
/// [`Error::Shape`] when the two channels yield a different number of
/// windows; spectral errors for windows too short to analyse.
pub fn build_feature_table<'a>(
    eeg: impl IntoIterator<Item = LabeledWindow<'a>>,
    emg: impl IntoIterator<Item = LabeledWindow<'a>>,
    sf: f64,
    feature_sec: usize,
) -> Result<FeatureTable> {
    let (labels, eeg_feat) = role_features(eeg, sf, feature_sec, ChannelRole::Eeg)?;
    let (_, emg_feat) = role_features(emg, sf, feature_sec, ChannelRole::Emg)?;
    if eeg_feat.nrows() != emg_feat.nrows() {
        return Err(Error::shape(format!(
            "EEG yields {} windows but EMG yields {}",
            eeg_feat.nrows(),
            emg_feat.nrows()
        )));
    }

    let n = labels.len();
    let mut values = Array2::<f64>::zeros((n, 1 + eeg_feat.ncols() + emg_feat.ncols()));
    for (row, &label) in labels.iter().enumerate() {
        values[[row, 0]] = f64::from(label);
    }
    values.slice_mut(s![.., 1..1 + eeg_feat.ncols()]).assign(&eeg_feat);
    values.slice_mut(s![.., 1 + eeg_feat.ncols()..]).assign(&emg_feat);

    let mut columns = vec!["label".to_string()];
    columns.extend(feature_columns());
    debug!(windows = n, columns = columns.len(), "feature table");
    Ok(FeatureTable { columns, values })
}

/// Raw features of one role, then clamped and z-scored per column.
fn role_features<'a>(
    windows: impl IntoIterator<Item = LabeledWindow<'a>>,
    sf: f64,
    feature_sec: usize,
    role: ChannelRole,
) -> Result<(Vec<u8>, Array2<f64>)> {
    if feature_sec == 0 {
        return Err(Error::param("feature slice must be at least one second"));
    }
    let n_feat = role.feature_names().len();
    let n_slice = (feature_sec as f64 * sf) as usize;

    let mut labels = Vec::new();
    let mut rows: Vec<f64> = Vec::new();
    for w in windows {
        let x = &w.signal[..n_slice.min(w.signal.len())];
        labels.push(w.state);

        let (mobility, complexity) = hjorth_params(x);
        rows.extend([std_dev(x), num_zerocross(x) as f64 / n_slice as f64, mobility, complexity, perm_entropy(x, 3, 1)]);
        if role == ChannelRole::Eeg {
            let (delta_theta, theta_rel) = delta_theta_ratio(x, sf)?;
            rows.extend([skewness(x), kurtosis(x), delta_theta, theta_rel]);
        }
    }

    let mut table = Array2::from_shape_vec((labels.len(), n_feat), rows)
        .map_err(|e| Error::shape(e.to_string()))?;
    clamp_upper_quantile_inplace(table.column_mut(0), STD_CLAMP_QUANTILE);
    for (name, column) in role.feature_names().iter().zip(table.axis_iter_mut(Axis(1))) {
        let (_, std) = zscore_inplace(column);
        if std == 0.0 && !labels.is_empty() {
            warn!(column = %name, "constant feature column, z-scored to zeros");
        }
    }
    Ok((labels, table))
}

// ── Statistics ───────────────────────────────────────────────────────────────

/// Population standard deviation (`ddof = 0`).
pub fn std_dev(x: &[f64]) -> f64 {
    central_moment(x, 2).sqrt()
}

/// Number of sign changes; `-0.0` counts as negative, as with `np.signbit`.
pub fn num_zerocross(x: &[f64]) -> usize {
    x.windows(2)
        .filter(|w| w[0].is_sign_negative() != w[1].is_sign_negative())
        .count()
}

/// Hjorth mobility and complexity.
///
///   mobility   = sqrt(var(x') / var(x))
///   complexity = sqrt(var(x'') / var(x')) / mobility
///
/// Degenerate (flat) inputs give zeros.
pub fn hjorth_params(x: &[f64]) -> (f64, f64) {
    let dx: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let ddx: Vec<f64> = dx.windows(2).map(|w| w[1] - w[0]).collect();
    let (var_x, var_dx, var_ddx) = (central_moment(x, 2), central_moment(&dx, 2), central_moment(&ddx, 2));
    if var_x == 0.0 || var_dx == 0.0 {
        return (0.0, 0.0);
    }
    let mobility = (var_dx / var_x).sqrt();
    let complexity = (var_ddx / var_dx).sqrt() / mobility;
    (mobility, complexity)
}

/// Permutation entropy in bits (not normalised).
///
/// Counts the ordinal patterns of `order` samples spaced `delay` apart.
/// Ties are ranked by position.
pub fn perm_entropy(x: &[f64], order: usize, delay: usize) -> f64 {
    if order < 2 || delay == 0 || x.len() <= (order - 1) * delay {
        return 0.0;
    }
    let span = (order - 1) * delay;
    let n = x.len() - span;
    let mut counts = vec![0usize; order.pow(order as u32)];
    let mut idx: Vec<usize> = (0..order).collect();
    for i in 0..n {
        idx.iter_mut().enumerate().for_each(|(k, v)| *v = k);
        idx.sort_by(|&a, &b| x[i + a * delay].total_cmp(&x[i + b * delay]));
        let hash: usize = idx.iter().rev().fold(0, |acc, &v| acc * order + v);
        counts[hash] += 1;
    }
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n as f64;
            -p * p.log2()
        })
        .sum()
}

/// Biased sample skewness `m3 / m2^1.5`.
pub fn skewness(x: &[f64]) -> f64 {
    let m2 = central_moment(x, 2);
    if m2 == 0.0 {
        return 0.0;
    }
    central_moment(x, 3) / m2.powf(1.5)
}

/// Biased Fisher kurtosis `m4 / m2² - 3`.
pub fn kurtosis(x: &[f64]) -> f64 {
    let m2 = central_moment(x, 2);
    if m2 == 0.0 {
        return 0.0;
    }
    central_moment(x, 4) / (m2 * m2) - 3.0
}

/// Delta/theta power ratio and relative theta power of `x`.
///
/// Uses a 1 s, non-overlapping spectrogram over 0.5–30 Hz summed over
/// time, integrated with Simpson's rule.
pub fn delta_theta_ratio(x: &[f64], sf: f64) -> Result<(f64, f64)> {
    let spec = spectrogram(x, sf, [0.5, 30.0], 1.0, 1.0, false)?;
    let psd = spec.power.sum_axis(Axis(1));
    let bp = band_power(psd.view(), spec.freqs.view(), &[DELTA, THETA], false)?;
    let theta_rel = band_power(psd.view(), spec.freqs.view(), &[THETA], true)?;
    let ratio = if bp[1] > 0.0 { bp[0] / bp[1] } else { 0.0 };
    Ok((ratio, theta_rel[0]))
}

fn central_moment(x: &[f64], k: i32) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    x.iter().map(|v| (v - mean).powi(k)).sum::<f64>() / n
}
