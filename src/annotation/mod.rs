//! Sleep annotation: per-second states plus marker and start-end events.
//!
//! - [`codec`]: dense ↔ run-length interval conversion.
//! - [`format`]: the persisted three-section text format.
//! - [`stats`]: per-hour state statistics.
//!
//! [`Annotation`] owns its arrays; every mutating method validates its
//! input before touching them, so a failed call leaves the annotation
//! unchanged.

pub mod codec;
pub mod format;
pub mod stats;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use codec::{dense_to_intervals, intervals_to_dense, Interval};
pub use format::{
    load, load_bio_annotation, load_or_create, parse, parse_bio_annotation, parse_start_time, save,
    write, TIME_FORMAT,
};
pub use stats::{hourly_stats, HourStats, StateStats};

/// Built-in state codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum SleepState {
    Nrem = 1,
    Rem = 2,
    Wake = 3,
    Init = 4,
}

impl SleepState {
    pub const ALL: [SleepState; 4] = [Self::Nrem, Self::Rem, Self::Wake, Self::Init];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Nrem => "NREM",
            Self::Rem => "REM",
            Self::Wake => "Wake",
            Self::Init => "INIT",
        }
    }
}

impl fmt::Display for SleepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// State code → human label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMap(BTreeMap<u8, String>);

impl Default for StateMap {
    fn default() -> Self {
        Self(SleepState::ALL.iter().map(|s| (s.code(), s.label().to_string())).collect())
    }
}

impl StateMap {
    pub fn new(map: BTreeMap<u8, String>) -> Self {
        Self(map)
    }

    pub fn contains(&self, code: u8) -> bool {
        self.0.contains_key(&code)
    }

    pub fn label(&self, code: u8) -> Option<&str> {
        self.0.get(&code).map(String::as_str)
    }

    pub fn codes(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.keys().copied()
    }

    fn check(&self, code: u8) -> Result<()> {
        if self.contains(code) {
            Ok(())
        } else {
            Err(Error::InvalidState(code))
        }
    }
}

/// A single-instant event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Seconds from recording start.
    pub time: f64,
    pub label: String,
}

/// A bounded event (spindle, slow wave, manual selection, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartEnd {
    pub start: f64,
    pub end: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    sleep_state: Vec<u8>,
    state_map: StateMap,
    markers: Vec<Marker>,
    start_end: Vec<StartEnd>,
}

impl Annotation {
    /// Build an annotation with the default state map.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] for a state code outside the map,
    /// [`Error::InvalidParameter`] for an event with `start > end`.
    pub fn new(sleep_state: Vec<u8>, markers: Vec<Marker>, start_end: Vec<StartEnd>) -> Result<Self> {
        Self::with_state_map(sleep_state, StateMap::default(), markers, start_end)
    }

    pub fn with_state_map(
        sleep_state: Vec<u8>,
        state_map: StateMap,
        markers: Vec<Marker>,
        start_end: Vec<StartEnd>,
    ) -> Result<Self> {
        for &code in &sleep_state {
            state_map.check(code)?;
        }
        for m in &markers {
            check_time(m.time)?;
        }
        for ev in &start_end {
            check_event(ev.start, ev.end)?;
        }
        Ok(Self { sleep_state, state_map, markers, start_end })
    }

    /// A fresh annotation of `duration` seconds, all `Init`.
    pub fn new_init(duration: usize) -> Self {
        Self {
            sleep_state: vec![SleepState::Init.code(); duration],
            state_map: StateMap::default(),
            markers: vec![],
            start_end: vec![],
        }
    }

    /// Number of annotated seconds.
    pub fn len(&self) -> usize {
        self.sleep_state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sleep_state.is_empty()
    }

    pub fn sleep_state(&self) -> &[u8] {
        &self.sleep_state
    }

    pub fn state_map(&self) -> &StateMap {
        &self.state_map
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn start_end(&self) -> &[StartEnd] {
        &self.start_end
    }

    /// Run-length view of the sleep states.
    pub fn intervals(&self) -> Vec<Interval> {
        dense_to_intervals(&self.sleep_state)
    }

    /// Set seconds `start..end` to `state`.
    pub fn assign_range(&mut self, start: usize, end: usize, state: u8) -> Result<()> {
        self.state_map.check(state)?;
        if start > end || end > self.len() {
            return Err(Error::param(format!(
                "range {start}..{end} is outside the annotation (0..{})",
                self.len()
            )));
        }
        self.sleep_state[start..end].fill(state);
        Ok(())
    }

    /// Overwrite seconds from `offset` on with `labels`.
    ///
    /// Labels running past the end of the annotation are an error.
    pub fn assign_labels(&mut self, offset: usize, labels: &[u8]) -> Result<()> {
        let end = offset + labels.len();
        if end > self.len() {
            return Err(Error::shape(format!(
                "{} labels at offset {offset} exceed the annotation length {}",
                labels.len(),
                self.len()
            )));
        }
        for &code in labels {
            self.state_map.check(code)?;
        }
        self.sleep_state[offset..end].copy_from_slice(labels);
        Ok(())
    }

    pub fn push_marker(&mut self, time: f64, label: impl Into<String>) -> Result<()> {
        check_time(time)?;
        self.markers.push(Marker { time, label: label.into() });
        Ok(())
    }

    pub fn push_start_end(&mut self, start: f64, end: f64, label: impl Into<String>) -> Result<()> {
        check_event(start, end)?;
        self.start_end.push(StartEnd { start, end, label: label.into() });
        Ok(())
    }
}

fn check_time(t: f64) -> Result<()> {
    if t.is_finite() && t >= 0.0 {
        Ok(())
    } else {
        Err(Error::param(format!("event time must be a non-negative number, got {t}")))
    }
}

fn check_event(start: f64, end: f64) -> Result<()> {
    check_time(start)?;
    check_time(end)?;
    if start > end {
        return Err(Error::param(format!("event starts at {start} s after it ends at {end} s")));
    }
    Ok(())
}
