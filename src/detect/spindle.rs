//! Spindle detector on the sigma-band power envelope.
//!
//!   1. spectrogram restricted to `freq_band` (2 s segments, 0.2 s hop)
//!   2. envelope[t] = (Σ_f S[f, t])²
//!   3. no peak above `mean + std_thresh · std` anywhere means no spindles
//!   4. runs above `mean + duration_thresh · std` bound each event; a run
//!      starting at the first frame is ignored
//!   5. every run spanning at least `min_duration` seconds (segment centre
//!      to segment centre) becomes an event
//!
//! A signal shorter than one spectrogram segment has no spindles.
use serde::Serialize;
use tracing::debug;

use super::peaks::{find_peaks, runs_above};
use crate::config::SpindleParams;
use crate::error::Result;
use crate::spectral::spectrogram;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spindle {
    pub start: f64,
    pub end: f64,
    /// Time of the strongest envelope sample inside the event.
    pub peak_time: f64,
    pub peak_power: f64,
}

impl Spindle {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Detect spindles in `signal`. An empty `Vec` means no spindles.
pub fn detect_spindles(signal: &[f64], sf: f64, params: &SpindleParams) -> Result<Vec<Spindle>> {
    let nperseg = (params.window * sf).round() as usize;
    if signal.len() < nperseg && params.step > 0.0 && params.step <= params.window {
        debug!(samples = signal.len(), nperseg, "signal shorter than one segment, no spindles");
        return Ok(vec![]);
    }
    let spec = spectrogram(signal, sf, params.freq_band, params.step, params.window, false)?;
    let envelope: Vec<f64> = spec.power.columns().into_iter().map(|c| c.sum().powi(2)).collect();
    if envelope.is_empty() {
        return Ok(vec![]);
    }

    let n = envelope.len() as f64;
    let mean = envelope.iter().sum::<f64>() / n;
    let std = (envelope.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n).sqrt();
    let peaks = find_peaks(&envelope, Some(mean + params.std_thresh * std), None);
    if peaks.is_empty() {
        debug!("no spindle peaks");
        return Ok(vec![]);
    }

    let t = &spec.times;
    let offset = params.start_time_sec;
    let spindles: Vec<Spindle> = runs_above(&envelope, mean + params.duration_thresh * std)
        .into_iter()
        .filter(|&(start, _)| start != 0)
        .filter_map(|(start, end)| {
            let last = end - 1;
            let best = (start..end).max_by(|&a, &b| envelope[a].total_cmp(&envelope[b]))?;
            (t[last] - t[start] >= params.min_duration).then(|| Spindle {
                start: t[start] + offset,
                end: t[last] + offset,
                peak_time: t[best] + offset,
                peak_power: envelope[best],
            })
        })
        .collect();

    debug!(peaks = peaks.len(), spindles = spindles.len(), "spindle detection");
    Ok(spindles)
}
