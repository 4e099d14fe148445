//! # hypno: sleep-stage scoring for EEG/EMG recordings in pure Rust
//!
//! `hypno` turns a multichannel rodent sleep recording into a hypnogram:
//! one NREM / REM / Wake label per second, plus spindle and slow-wave
//! events. The DSP matches SciPy conventions (Butterworth `filtfilt`,
//! Welch / spectrogram with density scaling, Simpson integration) so
//! classifiers trained on SciPy-derived features can be used unchanged.
//!
//! ## Pipeline overview
//!
//! ```text
//! recording.safetensors
//!   │
//!   ├─ io::load_recording()        channels, per-channel sf, start time
//!   ├─ filter (IIR notch chain)    50/60 Hz harmonics, zero-phase
//!   ├─ epoch::split_window_data    20 s windows, 5 s stride
//!   ├─ features                    9 EEG + 5 EMG statistics per window,
//!   │                              95th-percentile clamp, column z-score
//!   ├─ classifier                  gradient-boosted trees → P(NREM, REM, Wake)
//!   ├─ post-processing             arg-max, REM override, optional smoothing
//!   └─ expand × stride             one label per second
//!        │
//!        └─→ Annotation  ──▶  annotation::save()   run-length text file
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use hypno::{stage_recording, ModelKey, ModelRegistry, StagingConfig};
//! use hypno::io::load_recording;
//! use std::path::Path;
//!
//! let rec = load_recording(Path::new("data/mouse1.safetensors")).unwrap();
//! let registry = ModelRegistry::load_dir("models").unwrap();
//! let model = registry.get("parietal/adult".parse::<ModelKey>().unwrap()).unwrap();
//!
//! let cfg = StagingConfig::default();
//! let anno = stage_recording(&rec, "EEG", "EMG", model, &cfg).unwrap();
//! hypno::annotation::save(&anno, rec.start_time(), "mouse1.txt").unwrap();
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use hypno::filter::{filter, FilterType};
//! use hypno::spectral::spectrogram;
//! use hypno::detect::detect_spindles;
//! use hypno::SpindleParams;
//!
//! let eeg = vec![0.0f64; 256 * 60];
//!
//! // 0.5–30 Hz band-pass, zero phase
//! let (band, name) = filter(&eeg, 256.0, FilterType::Bandpass, 0.5, 30.0).unwrap();
//! assert_eq!(name, "bandpass_0.5_30.0");
//!
//! // 2 s segments every 0.2 s, 10–15 Hz rows only
//! let spec = spectrogram(&band, 256.0, [10.0, 15.0], 0.2, 2.0, false).unwrap();
//!
//! // Spindles straight from the raw channel
//! let spindles = detect_spindles(&eeg, 256.0, &SpindleParams::default()).unwrap();
//! ```

pub mod annotation;
pub mod classifier;
pub mod config;
pub mod detect;
pub mod epoch;
pub mod error;
pub mod features;
pub mod filter;
pub mod io;
pub mod normalize;
pub mod recording;
pub mod spectral;

use tracing::info;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `hypno::Foo` without having to know the internal module layout.

// config
pub use config::{SpindleParams, StagingConfig, SwaParams};

// error
pub use error::{Error, Result};

// recording
pub use recording::Recording;

// annotation: model, codec, persisted format
pub use annotation::{
    dense_to_intervals, intervals_to_dense, Annotation, Interval, Marker, SleepState, StartEnd,
    StateMap,
};

// classifier: trait, tree ensemble, registry, staging
pub use classifier::{
    auto_stage, auto_stage_with, AgeProfile, EegSite, GbdtModel, ModelKey, ModelRegistry,
    StageClassifier, StagingResult,
};

// detect
pub use detect::{detect_slow_waves, detect_spindles, SlowWave, Spindle};

// features
pub use features::{build_feature_table, FeatureTable};

// filter
pub use filter::{filter, filter_power_line_noise, FilterType, PowerLine};

// spectral
pub use spectral::{band_power, spectrogram, spectrum, welch, Band, Psd, Spectrogram};

/// Stage channels `eeg` and `emg` of `rec` and return a full-length
/// annotation.
///
/// Seconds after the last complete window stay `Init`.
///
/// # Errors
///
/// [`Error::UnknownChannel`] for a missing channel, [`Error::Shape`] when
/// the two channels have different sampling rates, plus everything
/// [`auto_stage_with`] returns.
///
/// # Examples
///
/// ```no_run
/// use hypno::{stage_recording, GbdtModel, Recording, StagingConfig};
///
/// # fn run(rec: &Recording) -> hypno::Result<()> {
/// let model = GbdtModel::load("models/frontal_adult.json")?;
/// let anno = stage_recording(rec, "EEG", "EMG", &model, &StagingConfig::default())?;
/// assert_eq!(anno.len(), rec.duration());
/// # Ok(())
/// # }
/// ```
pub fn stage_recording(
    rec: &Recording,
    eeg: &str,
    emg: &str,
    classifier: &dyn StageClassifier,
    cfg: &StagingConfig,
) -> Result<Annotation> {
    let (eeg_signal, eeg_sf) = rec.signal(eeg)?;
    let (emg_signal, emg_sf) = rec.signal(emg)?;
    if eeg_sf != emg_sf {
        return Err(Error::Shape(format!(
            "'{eeg}' is sampled at {eeg_sf} Hz but '{emg}' at {emg_sf} Hz"
        )));
    }

    let result = auto_stage_with(eeg_signal, emg_signal, eeg_sf, classifier, cfg)?;
    let mut anno = Annotation::new_init(rec.duration());
    anno.assign_labels(0, &result.labels)?;
    info!(
        seconds = rec.duration(),
        staged = result.labels.len(),
        "recording staged"
    );
    Ok(anno)
}
