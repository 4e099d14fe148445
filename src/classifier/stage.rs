//! Automatic sleep staging.
//!
//! ```text
//! EEG, EMG  ──notch──▶ 20 s windows / 5 s stride ──▶ feature table
//!           ──classifier──▶ P[window, class]
//!           ──post_process──▶ window labels ──×stride──▶ per-second labels
//! ```
//!
//! Post-processing, in order:
//!   1. label = argmax(P) + 1
//!   2. REM override: `P[REM] > rem_threshold` forces REM
//!   3. optional: REM directly after Wake becomes NREM
//!   4. optional: a single window between two equal neighbours takes
//!      their label (applied left to right on the already-updated labels)
//!
//! The per-second output is `windows × stride_sec` long, which is up to
//! `window_sec - stride_sec` seconds shorter than the recording.
use std::borrow::Cow;

use ndarray::{Array2, ArrayView2};
use tracing::{debug, info};

use super::registry::{ModelKey, ModelRegistry};
use super::{check_features, StageClassifier};
use crate::annotation::SleepState;
use crate::config::StagingConfig;
use crate::epoch::split_window_data;
use crate::error::{Error, Result};
use crate::features::{build_feature_table, FeatureTable};
use crate::filter::filter_power_line_noise;

/// Output of the staging pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct StagingResult {
    /// Class probabilities `[window, class]`.
    pub probabilities: Array2<f64>,
    /// One state code per window after post-processing.
    pub window_labels: Vec<u8>,
    /// One state code per second.
    pub labels: Vec<u8>,
}

/// Stage a recording with the registered model for `key`.
///
/// # Errors
///
/// [`Error::MissingModel`] when no model is registered for `key`, plus
/// everything [`auto_stage_with`] returns.
pub fn auto_stage(
    eeg: &[f64],
    emg: &[f64],
    sf: f64,
    registry: &ModelRegistry,
    key: ModelKey,
    cfg: &StagingConfig,
) -> Result<StagingResult> {
    let model = registry.get(key)?;
    info!(model = %key, sf, seconds = eeg.len() as f64 / sf, "auto staging");
    auto_stage_with(eeg, emg, sf, model, cfg)
}

/// Stage a recording with an explicit classifier.
///
/// # Errors
///
/// [`Error::FeatureMismatch`] when the classifier expects other feature
/// columns; parameter and shape errors from windowing and features.
pub fn auto_stage_with(
    eeg: &[f64],
    emg: &[f64],
    sf: f64,
    classifier: &dyn StageClassifier,
    cfg: &StagingConfig,
) -> Result<StagingResult> {
    let (eeg, emg): (Cow<'_, [f64]>, Cow<'_, [f64]>) = match cfg.power_line {
        Some(line) => (
            filter_power_line_noise(eeg, sf, line)?.into(),
            filter_power_line_noise(emg, sf, line)?.into(),
        ),
        None => (eeg.into(), emg.into()),
    };

    let init = SleepState::Init.code();
    let table = build_feature_table(
        split_window_data(&eeg, sf, init, cfg.window_sec, cfg.stride_sec)?,
        split_window_data(&emg, sf, init, cfg.window_sec, cfg.stride_sec)?,
        sf,
        cfg.feature_sec,
    )?;
    stage_windows(&table, classifier, cfg)
}

/// Classify an already built feature table and post-process the result.
pub fn stage_windows(
    table: &FeatureTable,
    classifier: &dyn StageClassifier,
    cfg: &StagingConfig,
) -> Result<StagingResult> {
    check_features(classifier.feature_names(), table.feature_names())?;

    let n = table.n_windows();
    if n == 0 {
        info!("recording shorter than one window, nothing to stage");
        return Ok(StagingResult { probabilities: Array2::zeros((0, 0)), window_labels: vec![], labels: vec![] });
    }

    let probabilities = classifier.predict_proba(table.features())?;
    if probabilities.nrows() != n || probabilities.ncols() <= rem_column() {
        return Err(Error::shape(format!(
            "classifier returned {:?} probabilities for {n} windows",
            probabilities.dim()
        )));
    }

    let window_labels = post_process(probabilities.view(), cfg);
    let labels = expand_labels(&window_labels, cfg.stride_sec);
    info!(windows = n, seconds = labels.len(), "staging done");
    Ok(StagingResult { probabilities, window_labels, labels })
}

/// Turn class probabilities into window labels (steps 1–4 above).
pub fn post_process(probabilities: ArrayView2<'_, f64>, cfg: &StagingConfig) -> Vec<u8> {
    let mut labels: Vec<u8> = probabilities
        .rows()
        .into_iter()
        .map(|row| {
            let best = row
                .iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
                .0;
            best as u8 + 1
        })
        .collect();

    let forced = apply_rem_override(&mut labels, probabilities, cfg.rem_threshold);
    debug!(forced, threshold = cfg.rem_threshold, "REM override");
    if cfg.forbid_rem_after_wake {
        forbid_rem_after_wake(&mut labels);
    }
    if cfg.smooth_isolated {
        smooth_isolated(&mut labels);
    }
    labels
}

/// Force REM where its probability exceeds `threshold`.
///
/// Returns the number of labels that changed.
pub fn apply_rem_override(labels: &mut [u8], probabilities: ArrayView2<'_, f64>, threshold: f64) -> usize {
    let rem = SleepState::Rem.code();
    let mut changed = 0;
    for (label, row) in labels.iter_mut().zip(probabilities.rows()) {
        if row.get(rem_column()).is_some_and(|&p| p > threshold) && *label != rem {
            *label = rem;
            changed += 1;
        }
    }
    changed
}

/// Relabel REM that directly follows Wake as NREM.
pub fn forbid_rem_after_wake(labels: &mut [u8]) {
    let (wake, rem, nrem) = (SleepState::Wake.code(), SleepState::Rem.code(), SleepState::Nrem.code());
    for i in 1..labels.len() {
        if labels[i - 1] == wake && labels[i] == rem {
            labels[i] = nrem;
        }
    }
}

/// Absorb single windows flanked by two equal labels.
pub fn smooth_isolated(labels: &mut [u8]) {
    for i in 1..labels.len().saturating_sub(1) {
        if labels[i - 1] == labels[i + 1] {
            labels[i] = labels[i - 1];
        }
    }
}

/// Repeat each window label `stride_sec` times.
pub fn expand_labels(window_labels: &[u8], stride_sec: usize) -> Vec<u8> {
    window_labels
        .iter()
        .flat_map(|&l| std::iter::repeat(l).take(stride_sec))
        .collect()
}

fn rem_column() -> usize {
    usize::from(SleepState::Rem.code() - 1)
}
