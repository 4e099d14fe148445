//! Zero-phase IIR application.
//!
//! Matches `scipy.signal.filtfilt(b, a, x)` with its defaults:
//!   • odd extension of `3 · max(len(a), len(b))` samples on each side
//!   • forward pass started from the steady-state `zi · x[0]`
//!   • backward pass started from `zi · y[-1]`
//!   • padding stripped from the result
use crate::error::{Error, Result};
use crate::filter::design::BaCoeffs;

/// Zero-phase forward-backward filtering of a 1-D signal.
///
/// Returns a vector of the same length as `x`. The signal must be longer
/// than the edge padding (`3 · max(len(a), len(b))` samples).
pub fn filtfilt(ba: &BaCoeffs, x: &[f64]) -> Result<Vec<f64>> {
    let BaCoeffs { b, a } = normalise(ba)?;
    let n_x = x.len();
    let pad = 3 * a.len().max(b.len());
    if n_x <= pad {
        return Err(Error::param(format!(
            "signal of {n_x} samples is too short for zero-phase filtering (needs > {pad})"
        )));
    }

    let zi = lfilter_zi(&b, &a)?;
    let ext = odd_ext(x, pad);

    let z0: Vec<f64> = zi.iter().map(|v| v * ext[0]).collect();
    let mut y = lfilter(&b, &a, &ext, Some(&z0));

    y.reverse();
    let z0: Vec<f64> = zi.iter().map(|v| v * y[0]).collect();
    let mut y = lfilter(&b, &a, &y, Some(&z0));
    y.reverse();

    Ok(y[pad..pad + n_x].to_vec())
}

/// Direct-form II transposed IIR filter (`scipy.signal.lfilter`).
///
/// `zi`, when given, is the initial delay-line state of length
/// `max(len(a), len(b)) - 1`. Coefficients must already be normalised so
/// that `a[0] == 1` and both vectors have the same length.
pub fn lfilter(b: &[f64], a: &[f64], x: &[f64], zi: Option<&[f64]>) -> Vec<f64> {
    let n = b.len();
    let mut z = match zi {
        Some(zi) => zi.to_vec(),
        None => vec![0.0; n.saturating_sub(1)],
    };
    let mut y = Vec::with_capacity(x.len());
    for &xn in x {
        let yn = b[0] * xn + z.first().copied().unwrap_or(0.0);
        for i in 0..n.saturating_sub(2) {
            z[i] = b[i + 1] * xn + z[i + 1] - a[i + 1] * yn;
        }
        if n >= 2 {
            z[n - 2] = b[n - 1] * xn - a[n - 1] * yn;
        }
        y.push(yn);
    }
    y
}

/// Steady-state initial conditions for a step input (`scipy.signal.lfilter_zi`).
///
/// Solves `(I - companion(a)ᵀ) · zi = b[1:] - a[1:] · b[0]`.
pub fn lfilter_zi(b: &[f64], a: &[f64]) -> Result<Vec<f64>> {
    let n = b.len();
    if n < 2 {
        return Ok(vec![]);
    }
    let m = n - 1;
    let mut mat = vec![vec![0.0; m]; m];
    for (j, row) in mat.iter_mut().enumerate() {
        row[j] = 1.0;
        row[0] += a[j + 1];
        if j + 1 < m {
            row[j + 1] -= 1.0;
        }
    }
    let rhs: Vec<f64> = (1..n).map(|i| b[i] - a[i] * b[0]).collect();
    solve(mat, rhs)
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Scale so that `a[0] == 1` and zero-pad the shorter vector.
fn normalise(ba: &BaCoeffs) -> Result<BaCoeffs> {
    let a0 = ba.a.first().copied().unwrap_or(0.0);
    if a0 == 0.0 || ba.b.is_empty() {
        return Err(Error::param("filter denominator must start with a non-zero coefficient"));
    }
    let n = ba.a.len().max(ba.b.len());
    let scale = |c: &[f64]| -> Vec<f64> {
        let mut v: Vec<f64> = c.iter().map(|x| x / a0).collect();
        v.resize(n, 0.0);
        v
    };
    Ok(BaCoeffs { b: scale(&ba.b), a: scale(&ba.a) })
}

/// Odd extension (matches scipy's `odd_ext`).
///
/// Left:  `pad[i] = 2*x[0] - x[i]`       for i in n..=1
/// Right: `pad[i] = 2*x[-1] - x[-(i+1)]` for i in 1..=n
fn odd_ext(x: &[f64], n: usize) -> Vec<f64> {
    let len = x.len();
    let first = x[0];
    let last = x[len - 1];

    let mut out = Vec::with_capacity(len + 2 * n);
    for i in (1..=n).rev() {
        out.push(2.0 * first - x[i]);
    }
    out.extend_from_slice(x);
    for i in 1..=n {
        out.push(2.0 * last - x[len - 1 - i]);
    }
    out
}

/// Gaussian elimination with partial pivoting for the small zi systems.
fn solve(mut m: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Result<Vec<f64>> {
    let n = rhs.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))
            .unwrap_or(col);
        if m[pivot][col].abs() < 1e-300 {
            return Err(Error::param("singular system while computing filter initial state"));
        }
        m.swap(col, pivot);
        rhs.swap(col, pivot);
        for row in col + 1..n {
            let f = m[row][col] / m[col][col];
            if f == 0.0 {
                continue;
            }
            for k in col..n {
                m[row][k] -= f * m[col][k];
            }
            rhs[row] -= f * rhs[col];
        }
    }
    let mut out = vec![0.0; n];
    for row in (0..n).rev() {
        let acc: f64 = (row + 1..n).map(|k| m[row][k] * out[k]).sum();
        out[row] = (rhs[row] - acc) / m[row][row];
    }
    Ok(out)
}
