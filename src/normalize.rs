//! Z-score normalisation and outlier clamping.
//!
//! `zscore_inplace` matches `(x - np.mean(x)) / np.std(x)` (ddof=0):
//!   μ = mean(x),  σ = std(x)
//!   x = (x - μ) / σ
//! A constant column has σ = 0 and becomes all zeros instead of NaN.
//!
//! `quantile` matches `np.quantile(x, q)` with the default linear
//! interpolation between closest ranks.
use ndarray::{ArrayView1, ArrayViewMut1};

/// Z-score `data` in place. Returns the (mean, std) used.
pub fn zscore_inplace(mut data: ArrayViewMut1<'_, f64>) -> (f64, f64) {
    let n = data.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = data.sum() / n as f64;
    let var = data.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
    let std = var.sqrt();

    let first = data[0];
    if std == 0.0 || data.iter().all(|&v| v == first) {
        data.fill(0.0);
        return (mean, 0.0);
    }
    data.mapv_inplace(|v| (v - mean) / std);
    (mean, std)
}

/// Z-score a plain slice in place.
pub fn zscore_slice_inplace(data: &mut [f64]) -> (f64, f64) {
    zscore_inplace(ArrayViewMut1::from(data))
}

/// Linear-interpolated quantile, `q ∈ [0, 1]`. `None` for empty input.
pub fn quantile(data: ArrayView1<'_, f64>, q: f64) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Clamp every value at or above the `q`-quantile down to it.
///
/// Returns the clamp limit, or `None` when `data` is empty.
pub fn clamp_upper_quantile_inplace(mut data: ArrayViewMut1<'_, f64>, q: f64) -> Option<f64> {
    let limit = quantile(data.view(), q)?;
    data.mapv_inplace(|v| if v < limit { v } else { limit });
    Some(limit)
}
