//! Signal conditioning.
//!
//! - [`design`]: 3rd-order Butterworth design, matching
//!   `scipy.signal.iirfilter(ftype='butter', output='ba')`.
//! - [`apply`]: zero-phase forward-backward filtering, matching
//!   `scipy.signal.filtfilt`.
//!
//! [`filter`] is the one-call entry point used by every other stage;
//! [`filter_power_line_noise`] chains bandstop stages over the mains
//! harmonics that lie below Nyquist.

pub mod apply;
pub mod design;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

pub use apply::{filtfilt, lfilter, lfilter_zi};
pub use design::{butter, filter_name, BaCoeffs, FilterType, BUTTER_ORDER};

/// Mains frequency family to notch out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerLine {
    /// 50 / 100 / 150 Hz.
    Hz50,
    /// 60 / 120 / 180 Hz.
    Hz60,
}

/// Filter `signal` with a zero-phase 3rd-order Butterworth filter.
///
/// Returns the filtered signal and the name suffix that identifies the
/// filter (e.g. `bandpass_0.5_30.0`), used when the result is stored as a
/// derived channel.
///
/// # Errors
///
/// [`Error::InvalidParameter`](crate::Error::InvalidParameter) when a cutoff
/// or `sf` is not a finite positive number, a cutoff is at or above Nyquist,
/// or the signal is too short for the edge padding.
pub fn filter(
    signal: &[f64],
    sf: f64,
    btype: FilterType,
    low: f64,
    high: f64,
) -> Result<(Vec<f64>, String)> {
    let ba = butter(BUTTER_ORDER, btype, low, high, sf)?;
    let filtered = filtfilt(&ba, signal)?;
    let name = filter_name(btype, low, high);
    debug!(filter = %name, sf, n = signal.len(), "filtered signal");
    Ok((filtered, name))
}

/// Bandstop stages applied for a given sampling rate.
///
/// Each stage is a ±3 Hz band around a harmonic. The number of stages
/// depends only on `sf`: a harmonic is notched only when its band lies
/// below Nyquist (`sf > 306 / 206 / 106 Hz` for 50 Hz mains,
/// `sf > 366 / 246 / 126 Hz` for 60 Hz mains).
pub fn power_line_stages(sf: f64, line: PowerLine) -> Vec<[f64; 2]> {
    let (bands, limits): ([[f64; 2]; 3], [f64; 3]) = match line {
        PowerLine::Hz50 => (
            [[47.0, 53.0], [97.0, 103.0], [147.0, 153.0]],
            [106.0, 206.0, 306.0],
        ),
        PowerLine::Hz60 => (
            [[57.0, 63.0], [117.0, 123.0], [177.0, 183.0]],
            [126.0, 246.0, 366.0],
        ),
    };
    let n_stages = limits.iter().filter(|&&limit| sf > limit).count();
    bands[..n_stages].to_vec()
}

/// Remove power-line interference with 1–3 chained bandstop stages.
///
/// Returns the signal unchanged (copied) when `sf` is too low for any stage.
pub fn filter_power_line_noise(signal: &[f64], sf: f64, line: PowerLine) -> Result<Vec<f64>> {
    let mut data = signal.to_vec();
    for [low, high] in power_line_stages(sf, line) {
        let (filtered, _) = filter(&data, sf, FilterType::Bandstop, low, high)?;
        data = filtered;
    }
    Ok(data)
}
