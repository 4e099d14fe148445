//! Windowing and artifact-rejecting epoching.
//!
//! [`split_window_data`] slides a `window_sec` window with a `stride_sec`
//! hop over a single channel and tags each window with a state code:
//!   • window `k` starts at second `k · stride_sec`
//!   • start seconds run over `0 .. floor(len / sf) - stride_sec`
//!   • the last windows may be shorter than `window_sec` when they reach
//!     the end of the signal
//!
//! [`reject_artifact`] cuts the signal into 5 s epochs (the final partial
//! epoch included), scores each by its standard deviation on the
//! z-scored signal and drops those above `threshold ×` the mean epoch SD.
use tracing::debug;

use crate::error::{Error, Result};
use crate::normalize::zscore_slice_inplace;

/// Epoch length used for artifact scoring, in seconds.
pub const ARTIFACT_EPOCH_SEC: f64 = 5.0;

/// One window of signal plus the state it is labelled with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledWindow<'a> {
    pub signal: &'a [f64],
    pub state: u8,
}

/// Lazy, restartable (`Clone`) iterator over [`LabeledWindow`]s.
#[derive(Debug, Clone)]
pub struct WindowIter<'a> {
    signal: &'a [f64],
    sf: f64,
    state: u8,
    window_sec: usize,
    stride_sec: usize,
    next_sec: usize,
    end_sec: usize,
}

impl<'a> Iterator for WindowIter<'a> {
    type Item = LabeledWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_sec >= self.end_sec {
            return None;
        }
        let i = self.next_sec;
        self.next_sec += self.stride_sec;

        let start = (i as f64 * self.sf) as usize;
        let stop = (((i + self.window_sec) as f64 * self.sf) as usize).min(self.signal.len());
        Some(LabeledWindow { signal: &self.signal[start..stop], state: self.state })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end_sec.saturating_sub(self.next_sec).div_ceil(self.stride_sec);
        (n, Some(n))
    }
}

impl ExactSizeIterator for WindowIter<'_> {}

/// Split `signal` into overlapping labelled windows.
///
/// Yields nothing when the signal is shorter than `window_sec`.
///
/// # Errors
///
/// [`Error::InvalidParameter`] when `sf` is not positive or either length
/// is zero.
pub fn split_window_data(
    signal: &[f64],
    sf: f64,
    state: u8,
    window_sec: usize,
    stride_sec: usize,
) -> Result<WindowIter<'_>> {
    if !(sf.is_finite() && sf > 0.0) {
        return Err(Error::param(format!("sampling frequency must be positive, got {sf}")));
    }
    if window_sec == 0 || stride_sec == 0 {
        return Err(Error::param("window and stride lengths must be at least one second"));
    }
    let secs = signal.len() as f64 / sf;
    let end_sec = if secs < window_sec as f64 {
        0
    } else {
        (secs.floor() as usize).saturating_sub(stride_sec)
    };
    Ok(WindowIter { signal, sf, state, window_sec, stride_sec, next_sec: 0, end_sec })
}

/// Per-epoch artifact flags (`true` = artifact) for 5 s epochs.
///
/// The final partial epoch is scored like the others.
pub fn artifact_epochs(signal: &[f64], sf: f64, threshold: f64) -> Result<Vec<bool>> {
    let epoch_len = artifact_epoch_len(sf)?;
    if !(threshold.is_finite() && threshold > 0.0) {
        return Err(Error::param(format!("artifact threshold must be positive, got {threshold}")));
    }
    if signal.is_empty() {
        return Ok(vec![]);
    }

    let mut z = signal.to_vec();
    zscore_slice_inplace(&mut z);
    let sds: Vec<f64> = z.chunks(epoch_len).map(population_std).collect();
    let mean_sd = sds.iter().sum::<f64>() / sds.len() as f64;
    let limit = threshold * mean_sd;

    let flags: Vec<bool> = sds.iter().map(|&sd| sd > limit).collect();
    debug!(
        epochs = flags.len(),
        rejected = flags.iter().filter(|&&f| f).count(),
        threshold,
        "artifact scoring"
    );
    Ok(flags)
}

/// Drop 5 s artifact epochs and concatenate the survivors.
///
/// Surviving epochs keep their original samples and order; the result is
/// never longer than the input.
pub fn reject_artifact(signal: &[f64], sf: f64, threshold: f64) -> Result<Vec<f64>> {
    let flags = artifact_epochs(signal, sf, threshold)?;
    let epoch_len = artifact_epoch_len(sf)?;
    Ok(signal
        .chunks(epoch_len)
        .zip(flags)
        .filter(|(_, artifact)| !artifact)
        .flat_map(|(epoch, _)| epoch.iter().copied())
        .collect())
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn artifact_epoch_len(sf: f64) -> Result<usize> {
    let n = (ARTIFACT_EPOCH_SEC * sf) as usize;
    if !(sf.is_finite() && sf > 0.0) || n == 0 {
        return Err(Error::param(format!("sampling frequency must be positive, got {sf}")));
    }
    Ok(n)
}

fn population_std(x: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    (x.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n).sqrt()
}
