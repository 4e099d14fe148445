//! Run-length codec between the dense per-second state array and
//! `[start, end)` intervals.
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A maximal run of equal states, `start` inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: usize,
    pub end: usize,
    pub value: u8,
}

impl Interval {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Group consecutive equal values into intervals.
pub fn dense_to_intervals(dense: &[u8]) -> Vec<Interval> {
    let mut out: Vec<Interval> = Vec::new();
    for (i, &v) in dense.iter().enumerate() {
        match out.last_mut() {
            Some(last) if last.value == v => last.end = i + 1,
            _ => out.push(Interval { start: i, end: i + 1, value: v }),
        }
    }
    out
}

/// Expand intervals back into a dense array of `total_len` values.
///
/// The intervals must be non-empty, contiguous from 0 and cover exactly
/// `total_len` values.
///
/// # Errors
///
/// [`Error::Shape`] on a gap, overlap, empty interval or length mismatch.
pub fn intervals_to_dense(intervals: &[Interval], total_len: usize) -> Result<Vec<u8>> {
    let mut dense = Vec::with_capacity(total_len);
    for iv in intervals {
        if iv.start != dense.len() || iv.end <= iv.start {
            return Err(Error::shape(format!(
                "interval {}..{} does not continue at {}",
                iv.start,
                iv.end,
                dense.len()
            )));
        }
        if iv.end > total_len {
            return Err(Error::shape(format!(
                "interval {}..{} runs past the total length {total_len}",
                iv.start, iv.end
            )));
        }
        dense.resize(iv.end, iv.value);
    }
    if dense.len() != total_len {
        return Err(Error::shape(format!(
            "intervals cover {} values, expected {total_len}",
            dense.len()
        )));
    }
    Ok(dense)
}
