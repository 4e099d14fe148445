//! Sleep-stage classification.
//!
//! - [`StageClassifier`]: the seam between the feature table and whatever
//!   model produces class probabilities.
//! - [`gbdt`]: gradient-boosted tree ensembles loaded from JSON.
//! - [`registry`]: models keyed by EEG site and age profile.
//! - [`stage`]: the windowing → features → probabilities → labels pipeline
//!   and its post-processing rules.

pub mod gbdt;
pub mod registry;
pub mod stage;

use ndarray::{Array2, ArrayView2};

use crate::error::{Error, Result};

pub use gbdt::GbdtModel;
pub use registry::{AgeProfile, EegSite, ModelKey, ModelRegistry};
pub use stage::{auto_stage, auto_stage_with, expand_labels, post_process, stage_windows, StagingResult};

/// A model mapping feature rows to per-class probabilities.
///
/// Class `k` of the output corresponds to state code `k + 1`
/// (NREM, REM, Wake, ...).
pub trait StageClassifier {
    /// Input columns the model expects, in order.
    fn feature_names(&self) -> &[String];

    /// Probabilities `[window, class]` for `features` `[window, feature]`.
    fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>>;
}

/// Fail with [`Error::FeatureMismatch`] unless `found` equals `expected`
/// exactly, order included.
pub fn check_features(expected: &[String], found: &[String]) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::FeatureMismatch { expected: expected.to_vec(), found: found.to_vec() })
    }
}
