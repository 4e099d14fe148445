//! Multichannel recording.
//!
//! Channels may have different sampling rates. At construction every
//! channel is truncated to the common whole-second duration
//! `min(floor(len / sf))`, and every mutating method keeps that invariant
//! (plus unique names and equal lengths of the per-channel lists) or
//! fails without changing anything.
use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info};

use crate::annotation::Annotation;
use crate::error::{Error, Result};
use crate::filter::{filter, FilterType};

/// Maximum drift, in seconds, between a new channel and the recording.
pub const DURATION_TOLERANCE_SEC: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    signals: Vec<Vec<f64>>,
    channels: Vec<String>,
    sf: Vec<f64>,
    start_time: NaiveDateTime,
    duration: usize,
}

impl Recording {
    /// # Errors
    ///
    /// [`Error::Shape`] when the three lists differ in length, are empty or
    /// contain duplicate names; [`Error::InvalidParameter`] for a
    /// non-positive sampling rate.
    pub fn new(
        signals: Vec<Vec<f64>>,
        channels: Vec<String>,
        sf: Vec<f64>,
        start_time: NaiveDateTime,
    ) -> Result<Self> {
        if signals.len() != channels.len() || signals.len() != sf.len() {
            return Err(Error::shape(format!(
                "{} signals, {} channel names and {} sampling rates",
                signals.len(),
                channels.len(),
                sf.len()
            )));
        }
        if signals.is_empty() {
            return Err(Error::shape("a recording needs at least one channel"));
        }
        sf.iter().try_for_each(|&f| check_sf(f))?;
        let mut seen = HashSet::new();
        if let Some(dup) = channels.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(Error::shape(format!("duplicate channel name '{dup}'")));
        }

        let duration = signals
            .iter()
            .zip(&sf)
            .map(|(s, &f)| whole_seconds(s.len(), f))
            .min()
            .unwrap_or(0);
        let mut rec = Self { signals, channels, sf, start_time, duration };
        rec.truncate_to(duration);
        debug!(channels = rec.channels.len(), duration, "recording");
        Ok(rec)
    }

    /// Common duration in whole seconds.
    pub fn duration(&self) -> usize {
        self.duration
    }

    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn sfreqs(&self) -> &[f64] {
        &self.sf
    }

    pub fn start_time(&self) -> NaiveDateTime {
        self.start_time
    }

    pub fn signals(&self) -> &[Vec<f64>] {
        &self.signals
    }

    pub fn channel_index(&self, name: &str) -> Result<usize> {
        self.channels
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::UnknownChannel(name.to_string()))
    }

    /// Samples and sampling rate of channel `name`.
    pub fn signal(&self, name: &str) -> Result<(&[f64], f64)> {
        let i = self.channel_index(name)?;
        Ok((&self.signals[i], self.sf[i]))
    }

    /// Append a channel.
    ///
    /// Its duration must be within 10 s of the recording's. When it is
    /// shorter, the whole recording is cut to the new common duration.
    pub fn add_channel(&mut self, signal: Vec<f64>, name: impl Into<String>, sf: f64) -> Result<()> {
        let name = name.into();
        check_sf(sf)?;
        if self.channels.contains(&name) {
            return Err(Error::shape(format!("duplicate channel name '{name}'")));
        }
        let new_duration = whole_seconds(signal.len(), sf);
        if new_duration.abs_diff(self.duration) > DURATION_TOLERANCE_SEC {
            return Err(Error::shape(format!(
                "channel '{name}' lasts {new_duration} s, the recording {} s",
                self.duration
            )));
        }
        self.signals.push(signal);
        self.channels.push(name);
        self.sf.push(sf);
        self.truncate_to(self.duration.min(new_duration));
        Ok(())
    }

    /// Remove channel `name`. The last channel cannot be removed.
    pub fn delete_channel(&mut self, name: &str) -> Result<()> {
        let i = self.channel_index(name)?;
        if self.channels.len() == 1 {
            return Err(Error::shape(format!("'{name}' is the last channel and cannot be deleted")));
        }
        self.signals.remove(i);
        self.channels.remove(i);
        self.sf.remove(i);
        Ok(())
    }

    /// Rename channels by an `old → new` mapping; all or nothing.
    pub fn rename_channels(&mut self, mapping: &HashMap<String, String>) -> Result<()> {
        let mut renamed = self.channels.clone();
        for (old, new) in mapping {
            let i = self.channel_index(old)?;
            renamed[i] = new.clone();
        }
        let mut seen = HashSet::new();
        if let Some(dup) = renamed.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(Error::shape(format!("renaming would duplicate channel name '{dup}'")));
        }
        self.channels = renamed;
        Ok(())
    }

    /// Filter each channel in `names` and append the result as
    /// `<channel>_<filter name>`. Returns the new channel names.
    pub fn filter_channels(&mut self, names: &[&str], btype: FilterType, low: f64, high: f64) -> Result<Vec<String>> {
        let mut derived = Vec::with_capacity(names.len());
        for &name in names {
            let (signal, sf) = self.signal(name)?;
            let (filtered, fname) = filter(signal, sf, btype, low, high)?;
            derived.push((filtered, format!("{name}_{fname}"), sf));
        }
        if let Some((_, dup, _)) = derived.iter().find(|(_, n, _)| self.channels.contains(n)) {
            return Err(Error::shape(format!("channel '{dup}' already exists")));
        }
        let mut seen = HashSet::new();
        if let Some((_, dup, _)) = derived.iter().find(|(_, n, _)| !seen.insert(n.as_str())) {
            return Err(Error::shape(format!("channel '{dup}' requested twice")));
        }
        let names: Vec<String> = derived.iter().map(|(_, n, _)| n.clone()).collect();
        for (signal, name, sf) in derived {
            self.add_channel(signal, name, sf)?;
        }
        info!(channels = ?names, "filtered channels added");
        Ok(names)
    }

    /// Append `a - b` as `<a>_<b>_diff`.
    pub fn differential(&mut self, a: &str, b: &str) -> Result<String> {
        let (xa, sfa) = self.signal(a)?;
        let (xb, sfb) = self.signal(b)?;
        if sfa != sfb || xa.len() != xb.len() {
            return Err(Error::shape(format!(
                "'{a}' ({} samples at {sfa} Hz) and '{b}' ({} samples at {sfb} Hz) differ",
                xa.len(),
                xb.len()
            )));
        }
        let diff: Vec<f64> = xa.iter().zip(xb).map(|(p, q)| p - q).collect();
        let name = format!("{a}_{b}_diff");
        self.add_channel(diff, name.clone(), sfa)?;
        Ok(name)
    }

    /// Copy of seconds `start..end`; `end` is clamped to the duration.
    pub fn crop(&self, start: usize, end: usize) -> Result<Recording> {
        let end = end.min(self.duration);
        if start >= end {
            return Err(Error::param(format!("crop start {start} s must be before end {end} s")));
        }
        let signals = self
            .signals
            .iter()
            .zip(&self.sf)
            .map(|(s, &f)| s[sample(start, f)..sample(end, f).min(s.len())].to_vec())
            .collect();
        let start_time = self.start_time + Duration::seconds(start as i64);
        Recording::new(signals, self.channels.clone(), self.sf.clone(), start_time)
    }

    /// Copy with only `names`, in that order. An empty list picks all.
    pub fn pick_channels(&self, names: &[&str]) -> Result<Recording> {
        if names.is_empty() {
            return Ok(self.clone());
        }
        let idx = names.iter().map(|n| self.channel_index(n)).collect::<Result<Vec<_>>>()?;
        Recording::new(
            idx.iter().map(|&i| self.signals[i].clone()).collect(),
            idx.iter().map(|&i| self.channels[i].clone()).collect(),
            idx.iter().map(|&i| self.sf[i]).collect(),
            self.start_time,
        )
    }

    /// For every channel, the concatenated samples of all seconds the
    /// annotation marks as `state`.
    pub fn state_signals(&self, annotation: &Annotation, state: u8) -> Result<Vec<Vec<f64>>> {
        if !annotation.state_map().contains(state) {
            return Err(Error::InvalidState(state));
        }
        let runs: Vec<_> = annotation.intervals().into_iter().filter(|iv| iv.value == state).collect();
        Ok(self
            .signals
            .iter()
            .zip(&self.sf)
            .map(|(s, &f)| {
                runs.iter()
                    .flat_map(|iv| {
                        let a = sample(iv.start, f).min(s.len());
                        let b = sample(iv.end, f).min(s.len());
                        s[a..b].iter().copied()
                    })
                    .collect()
            })
            .collect())
    }

    fn truncate_to(&mut self, duration: usize) {
        for (s, &f) in self.signals.iter_mut().zip(&self.sf) {
            s.truncate(sample(duration, f));
        }
        self.duration = duration;
    }
}

fn check_sf(sf: f64) -> Result<()> {
    if sf.is_finite() && sf > 0.0 {
        Ok(())
    } else {
        Err(Error::param(format!("sampling frequency must be positive, got {sf}")))
    }
}

fn whole_seconds(len: usize, sf: f64) -> usize {
    (len as f64 / sf).floor() as usize
}

fn sample(sec: usize, sf: f64) -> usize {
    (sec as f64 * sf) as usize
}
