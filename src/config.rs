//! Pipeline configuration.
//!
//! [`StagingConfig`] holds every tunable parameter of the automatic staging
//! pipeline, [`SpindleParams`] and [`SwaParams`] those of the two event
//! detectors.  All defaults match the values the pretrained classifiers were
//! trained with.
use serde::{Deserialize, Serialize};

use crate::filter::PowerLine;

/// Configuration for the automatic sleep-stage pipeline.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use hypno::StagingConfig;
///
/// let cfg = StagingConfig {
///     smooth_isolated: true,   // absorb single-window islands
///     ..StagingConfig::default()
/// };
/// assert_eq!(cfg.window_sec, 20);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Length of each classifier window in seconds.
    ///
    /// Default: `20` s.
    pub window_sec: usize,

    /// Hop between successive windows in seconds.
    ///
    /// Every window label is expanded to `stride_sec` per-second labels, so
    /// this is also the expansion factor of the output.
    ///
    /// Default: `5` s.
    pub stride_sec: usize,

    /// Leading part of each window used for the time-domain features.
    ///
    /// The classifiers were trained on the first 5 s of each 20 s window;
    /// changing this invalidates the pretrained models.
    ///
    /// Default: `5` s.
    pub feature_sec: usize,

    /// REM probability above which a window is forced to REM regardless of
    /// the arg-max class.
    ///
    /// REM is the least separable class, so a low threshold is used.
    ///
    /// Default: `0.1`.
    pub rem_threshold: f64,

    /// Absorb a single window whose two neighbours agree into the
    /// neighbours' label.
    ///
    /// Default: `false`.
    pub smooth_isolated: bool,

    /// Relabel a REM window that directly follows a Wake window as NREM.
    ///
    /// Default: `false`.
    pub forbid_rem_after_wake: bool,

    /// Notch out power-line harmonics before feature extraction.
    ///
    /// `None` skips the notch chain entirely.
    ///
    /// Default: `Some(PowerLine::Hz50)`.
    pub power_line: Option<PowerLine>,
}

impl Default for StagingConfig {
    /// Returns the training configuration:
    /// 20 s windows · 5 s stride · 5 s features · REM threshold 0.1.
    fn default() -> Self {
        Self {
            window_sec: 20,
            stride_sec: 5,
            feature_sec: 5,
            rem_threshold: 0.1,
            smooth_isolated: false,
            forbid_rem_after_wake: false,
            power_line: Some(PowerLine::Hz50),
        }
    }
}

impl StagingConfig {
    /// Number of samples in the feature slice of a window at `sf` Hz.
    ///
    /// ```
    /// use hypno::StagingConfig;
    /// assert_eq!(StagingConfig::default().feature_samples(256.0), 1280);
    /// ```
    pub fn feature_samples(&self, sf: f64) -> usize {
        (self.feature_sec as f64 * sf) as usize
    }
}

/// Parameters of the spindle detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpindleParams {
    /// Sigma band `[low, high]` in Hz.
    pub freq_band: [f64; 2],
    /// Peaks of the power envelope must exceed `mean + std_thresh · std`.
    pub std_thresh: f64,
    /// Events are bounded by the runs above `mean + duration_thresh · std`.
    pub duration_thresh: f64,
    /// Shorter events are discarded (seconds).
    pub min_duration: f64,
    /// Spectrogram hop in seconds.
    pub step: f64,
    /// Spectrogram segment length in seconds.
    pub window: f64,
    /// Offset added to every reported time, for analysing a cropped segment.
    pub start_time_sec: f64,
}

impl Default for SpindleParams {
    fn default() -> Self {
        Self {
            freq_band: [10.0, 15.0],
            std_thresh: 3.0,
            duration_thresh: 0.1,
            min_duration: 0.5,
            step: 0.2,
            window: 2.0,
            start_time_sec: 0.0,
        }
    }
}

/// Parameters of the slow-wave detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwaParams {
    /// Slow-wave band `[low, high]` in Hz; also bounds the accepted
    /// half-cycle frequency.
    pub freq_band: [f64; 2],
    /// Minimum absolute peak amplitude (signal units, typically µV).
    pub amp_min: f64,
    /// Optional maximum absolute peak amplitude.
    pub amp_max: Option<f64>,
    /// Offset added to every reported time.
    pub start_time_sec: f64,
}

impl Default for SwaParams {
    fn default() -> Self {
        Self {
            freq_band: [0.5, 4.0],
            amp_min: 75.0,
            amp_max: None,
            start_time_sec: 0.0,
        }
    }
}
