//! Peak, zero-crossing and threshold-run primitives.

/// Indices of local maxima, like `scipy.signal.find_peaks(x, height)`.
///
/// A flat top (plateau) yields its middle sample, rounded down. Edges are
/// never peaks. `min_height` / `max_height` bound the peak value
/// (inclusive).
pub fn find_peaks(x: &[f64], min_height: Option<f64>, max_height: Option<f64>) -> Vec<usize> {
    let n = x.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let mut i = 1;
    while i < n - 1 {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    peaks.retain(|&p| {
        min_height.map_or(true, |h| x[p] >= h) && max_height.map_or(true, |h| x[p] <= h)
    });
    peaks
}

/// Indices `i` where the sign bit of `x[i]` and `x[i + 1]` differ.
pub fn zero_crossings(x: &[f64]) -> Vec<usize> {
    x.windows(2)
        .enumerate()
        .filter(|(_, w)| w[0].is_sign_negative() != w[1].is_sign_negative())
        .map(|(i, _)| i)
        .collect()
}

/// Maximal runs `[start, end)` where `x > threshold`.
pub fn runs_above(x: &[f64], threshold: f64) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, &v) in x.iter().enumerate() {
        match (v > threshold, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, x.len()));
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_maxima_and_plateaus() {
        let x = [0.0, 2.0, 1.0, 3.0, 3.0, 3.0, 0.0, 5.0];
        assert_eq!(find_peaks(&x, None, None), vec![1, 4]);
        // A rising edge into the end is not a peak.
        assert_eq!(find_peaks(&[0.0, 1.0, 1.0], None, None), Vec::<usize>::new());
    }

    #[test]
    fn height_bounds() {
        let x = [0.0, 2.0, 0.0, 5.0, 0.0, 9.0, 0.0];
        assert_eq!(find_peaks(&x, Some(3.0), None), vec![3, 5]);
        assert_eq!(find_peaks(&x, Some(3.0), Some(6.0)), vec![3]);
    }

    #[test]
    fn sign_changes() {
        assert_eq!(zero_crossings(&[1.0, -1.0, -1.0, 2.0, 0.0]), vec![0, 2]);
    }

    #[test]
    fn runs() {
        let x = [2.0, 0.0, 3.0, 4.0, 0.0, 5.0];
        assert_eq!(runs_above(&x, 1.0), vec![(0, 1), (2, 4), (5, 6)]);
    }
}
