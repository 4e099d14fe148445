//! Per-hour sleep statistics.
//!
//! The state array is cut into 3600 s hours (the last one may be partial)
//! and each hour is run-length grouped on its own, so a bout crossing an
//! hour boundary counts once in each hour.
use std::collections::BTreeMap;

use super::codec::dense_to_intervals;
use super::StateMap;

pub const HOUR_SEC: usize = 3600;

/// Totals for one state within one hour.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StateStats {
    /// Seconds spent in the state.
    pub seconds: usize,
    /// Number of bouts (maximal runs) of the state.
    pub bouts: usize,
    /// Mean bout length in seconds, 0 without bouts.
    pub mean_bout: f64,
    /// Share of a full hour, in percent.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourStats {
    /// Zero-based hour index from recording start.
    pub hour: usize,
    /// Statistics for every code of the state map, in code order.
    pub states: BTreeMap<u8, StateStats>,
}

/// Per-hour statistics for every state in `state_map`.
pub fn hourly_stats(sleep_state: &[u8], state_map: &StateMap) -> Vec<HourStats> {
    sleep_state
        .chunks(HOUR_SEC)
        .enumerate()
        .map(|(hour, chunk)| {
            let mut states: BTreeMap<u8, StateStats> =
                state_map.codes().map(|c| (c, StateStats::default())).collect();
            for iv in dense_to_intervals(chunk) {
                let entry = states.entry(iv.value).or_default();
                entry.seconds += iv.len();
                entry.bouts += 1;
            }
            for s in states.values_mut() {
                s.mean_bout = if s.bouts > 0 { s.seconds as f64 / s.bouts as f64 } else { 0.0 };
                s.percentage = s.seconds as f64 / HOUR_SEC as f64 * 100.0;
            }
            HourStats { hour, states }
        })
        .collect()
}
