use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};
use hypno::filter::{filter, filter_power_line_noise, FilterType, PowerLine};
use hypno::spectral::spectrogram;

const SF: f64 = 256.0;

/// Ten minutes of a 10 Hz tone plus deterministic noise.
fn signal() -> Vec<f64> {
    let mut state = 0x2545_f491_4f6c_dd1du64;
    (0..(600.0 * SF) as usize)
        .map(|i| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let u = (state >> 11) as f64 / (1u64 << 53) as f64;
            (2.0 * std::f64::consts::PI * 10.0 * i as f64 / SF).sin() + (u - 0.5)
        })
        .collect()
}

fn bench_bandpass(c: &mut Criterion) {
    let x = signal();
    c.bench_function("bandpass 0.5–30 Hz filtfilt [600 s @ 256 Hz]", |b| {
        b.iter(|| {
            let (y, _) = filter(black_box(&x), SF, FilterType::Bandpass, 0.5, 30.0).unwrap();
            black_box(y[0])
        })
    });
}

fn bench_notch_chain(c: &mut Criterion) {
    let x = signal();
    c.bench_function("50 Hz notch chain [600 s @ 256 Hz]", |b| {
        b.iter(|| {
            let y = filter_power_line_noise(black_box(&x), SF, PowerLine::Hz50).unwrap();
            black_box(y[0])
        })
    });
}

fn bench_spindle_spectrogram(c: &mut Criterion) {
    let x = signal();
    c.bench_function("spectrogram 2 s / 0.2 s, 10–15 Hz [600 s @ 256 Hz]", |b| {
        b.iter(|| {
            let s = spectrogram(black_box(&x), SF, [10.0, 15.0], 0.2, 2.0, false).unwrap();
            black_box(s.power.ncols())
        })
    });
}

criterion_group!(benches, bench_bandpass, bench_notch_chain, bench_spindle_spectrogram);
criterion_main!(benches);
