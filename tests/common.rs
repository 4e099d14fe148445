/// Shared helpers for synthetic test signals.
use std::f64::consts::PI;

#[allow(unused)]
/// Deterministic uniform noise in `[-amp, amp]` (64-bit LCG).
pub fn noise(n: usize, amp: f64, seed: u64) -> Vec<f64> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let u = (state >> 11) as f64 / (1u64 << 53) as f64;
            amp * (2.0 * u - 1.0)
        })
        .collect()
}

#[allow(unused)]
/// `amp · sin(2π f t)` sampled at `sf` for `secs` seconds.
pub fn sine(freq: f64, amp: f64, sf: f64, secs: f64) -> Vec<f64> {
    let n = (secs * sf) as usize;
    (0..n).map(|i| amp * (2.0 * PI * freq * i as f64 / sf).sin()).collect()
}

#[allow(unused)]
/// Element-wise sum of two equally long signals.
pub fn add(a: &[f64], b: &[f64]) -> Vec<f64> {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

#[allow(unused)]
/// Maximum absolute difference between two slices.
pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0_f64, f64::max)
}

#[allow(unused)]
/// Standard deviation (ddof = 0).
pub fn std_of(a: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean: f64 = a.iter().sum::<f64>() / n;
    let var: f64 = a.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

#[allow(unused)]
/// Root-mean-square of `a[from..to]`.
pub fn rms(a: &[f64], from: usize, to: usize) -> f64 {
    let s = &a[from..to];
    (s.iter().map(|v| v * v).sum::<f64>() / s.len() as f64).sqrt()
}
