//! Event detectors.
//!
//! Both detectors run independently of the stage classifier and report
//! "no events" as an empty `Vec`, never as an error.

pub mod peaks;
pub mod slow_wave;
pub mod spindle;

pub use slow_wave::{detect_slow_waves, SlowWave};
pub use spindle::{detect_spindles, Spindle};

/// Annotation label used for detected spindles.
pub const SPINDLE_LABEL: &str = "spindle";
/// Annotation label used for detected slow waves.
pub const SWA_LABEL: &str = "SWA";
