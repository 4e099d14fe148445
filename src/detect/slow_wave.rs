//! Slow-wave (SWA) half-wave detector.
//!
//! On the band-passed signal, each accepted wave is the sequence
//!
//! ```text
//!   zero ─▶ negative peak ─▶ zero ─▶ positive peak ─▶ zero
//!   start       neg          middle       pos          end
//! ```
//!
//! Matching is a single forward sweep: for every negative peak take the
//! first zero crossing after it, then the first positive peak after that
//! crossing. A triple is kept when its middle crossing is not already used,
//! the signal stays negative from the negative peak to the crossing and
//! positive from the crossing to the positive peak. The outer crossings are
//! the last one before the negative peak and the first one at or after the
//! positive peak. Waves whose `1 / duration` falls outside the band are
//! dropped.
use serde::Serialize;
use tracing::debug;

use super::peaks::{find_peaks, zero_crossings};
use crate::config::SwaParams;
use crate::error::Result;
use crate::filter::{filter, FilterType};

/// One detected slow wave. Times are seconds (plus `start_time_sec`),
/// amplitudes are in signal units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowWave {
    pub start_time: f64,
    pub neg_time: f64,
    pub middle_time: f64,
    pub pos_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub neg_peak: f64,
    pub pos_peak: f64,
    pub peak_to_peak: f64,
    /// Peak-to-peak amplitude over the negative → positive peak time.
    pub slope: f64,
    pub frequency: f64,
}

/// Detect slow waves in `signal`. An empty `Vec` means no waves.
pub fn detect_slow_waves(signal: &[f64], sf: f64, params: &SwaParams) -> Result<Vec<SlowWave>> {
    let [low, high] = params.freq_band;
    let (band, _) = filter(signal, sf, FilterType::Bandpass, low, high)?;
    let inverted: Vec<f64> = band.iter().map(|v| -v).collect();

    let pos_peaks = find_peaks(&band, Some(params.amp_min), params.amp_max);
    let neg_peaks = find_peaks(&inverted, Some(params.amp_min), params.amp_max);
    let zc = zero_crossings(&band);

    let triples = match_half_waves(&band, &neg_peaks, &zc, &pos_peaks);
    let at = |idx: usize| idx as f64 / sf + params.start_time_sec;

    let mut waves = Vec::with_capacity(triples.len());
    for (neg, middle, pos) in triples {
        let before = zc.partition_point(|&z| z < neg);
        let after = zc.partition_point(|&z| z < pos);
        if before == 0 || after == zc.len() {
            continue;
        }
        let (start, end) = (zc[before - 1], zc[after]);

        let (start_time, end_time) = (at(start), at(end));
        let duration = end_time - start_time;
        let frequency = 1.0 / duration;
        if !(low..=high).contains(&frequency) {
            continue;
        }
        let (neg_time, pos_time) = (at(neg), at(pos));
        let peak_to_peak = band[pos] - band[neg];
        waves.push(SlowWave {
            start_time,
            neg_time,
            middle_time: at(middle),
            pos_time,
            end_time,
            duration,
            neg_peak: band[neg],
            pos_peak: band[pos],
            peak_to_peak,
            slope: peak_to_peak / (pos_time - neg_time),
            frequency,
        });
    }

    debug!(
        candidates = neg_peaks.len(),
        accepted = waves.len(),
        "slow-wave detection"
    );
    Ok(waves)
}

/// `(negative peak, middle crossing, positive peak)` index triples.
///
/// All three inputs are sorted, so one pointer per list suffices.
fn match_half_waves(x: &[f64], neg_peaks: &[usize], zc: &[usize], pos_peaks: &[usize]) -> Vec<(usize, usize, usize)> {
    let mut out = Vec::new();
    let (mut zi, mut pi) = (0, 0);
    let mut last_zero = None;
    for &neg in neg_peaks {
        while zi < zc.len() && zc[zi] <= neg {
            zi += 1;
        }
        let Some(&zero) = zc.get(zi) else { break };
        while pi < pos_peaks.len() && pos_peaks[pi] <= zero {
            pi += 1;
        }
        let Some(&pos) = pos_peaks.get(pi) else { break };
        if last_zero == Some(zero) {
            continue;
        }
        let falling_ok = x[neg..zero].iter().all(|&v| v < 0.0);
        let rising_ok = x[zero + 1..pos].iter().all(|&v| v > 0.0);
        if falling_ok && rising_ok {
            out.push((neg, zero, pos));
            last_zero = Some(zero);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_negative_peak_cannot_reuse_crossing() {
        // Two troughs before the same crossing: only the first is matched.
        let x = [0.5, -2.0, -1.0, -3.0, -1.0, 1.0, 4.0, 1.0, -0.5];
        let neg = [1, 3];
        let zc = zero_crossings(&x);
        let pos = [6];
        assert_eq!(match_half_waves(&x, &neg, &zc, &pos), vec![(1, 4, 6)]);
    }

    #[test]
    fn sign_violation_rejects_triple() {
        // The signal dips below zero between the crossing and the positive peak.
        let x = [1.0, -3.0, -1.0, 1.0, -0.2, 2.0, 5.0, 1.0, -1.0];
        let zc = zero_crossings(&x);
        assert_eq!(zc, vec![0, 2, 3, 4, 7]);
        assert!(match_half_waves(&x, &[1], &zc, &[6]).is_empty());
    }
}
