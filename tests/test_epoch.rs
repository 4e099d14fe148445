mod common;
use common::{noise, sine};
use hypno::epoch::{artifact_epochs, reject_artifact, split_window_data};
use hypno::SleepState;

#[test]
fn hour_long_recording_window_count() {
    let sf = 256.0;
    let x = vec![0.0; (3600.0 * sf) as usize];
    let it = split_window_data(&x, sf, SleepState::Init.code(), 20, 5).unwrap();
    // Starts 0, 5, …, 3590.
    assert_eq!(it.len(), 719);
    let windows: Vec<_> = it.collect();
    assert_eq!(windows[0].signal.len(), 5120);
    assert_eq!(windows.last().unwrap().signal.len(), (10.0 * sf) as usize);
}

#[test]
fn fractional_duration_is_floored() {
    // 61.5 s → start seconds 0..56 → 12 windows.
    let x = vec![0.0; 6150];
    let windows: Vec<_> = split_window_data(&x, 100.0, 1, 20, 5).unwrap().collect();
    assert_eq!(windows.len(), 12);
    // Window 0 covers samples [0, 2000).
    assert_eq!(windows[0].signal.len(), 2000);
    assert!(windows.iter().all(|w| w.state == 1));
}

#[test]
fn windows_share_the_signal_buffer() {
    let x: Vec<f64> = (0..3000).map(|i| i as f64).collect();
    let windows: Vec<_> = split_window_data(&x, 50.0, 2, 20, 5).unwrap().collect();
    for (k, w) in windows.iter().enumerate() {
        assert_eq!(w.signal[0], (k * 5 * 50) as f64);
    }
}

#[test]
fn invalid_sampling_rate_is_rejected() {
    assert!(split_window_data(&[0.0; 100], 0.0, 1, 20, 5).is_err());
    assert!(split_window_data(&[0.0; 100], f64::NAN, 1, 20, 5).is_err());
}

#[test]
fn partial_final_epoch_is_scored() {
    let sf = 10.0;
    let mut x = noise(120, 1.0, 3);
    // Blow up the trailing 2 s fragment.
    for v in &mut x[100..] {
        *v *= 40.0;
    }
    let flags = artifact_epochs(&x, sf, 2.0).unwrap();
    assert_eq!(flags, vec![false, false, true]);
    assert_eq!(reject_artifact(&x, sf, 2.0).unwrap(), x[..100].to_vec());
}

#[test]
fn flat_signal_keeps_everything() {
    let x = vec![5.0; 400];
    let flags = artifact_epochs(&x, 10.0, 1.5).unwrap();
    assert!(flags.iter().all(|&f| !f));
    assert_eq!(reject_artifact(&x, 10.0, 1.5).unwrap().len(), 400);
}

#[test]
fn clean_sine_survives_rejection() {
    let sf = 100.0;
    let x = sine(3.0, 1.0, sf, 60.0);
    assert_eq!(reject_artifact(&x, sf, 3.0).unwrap(), x);
    assert!(artifact_epochs(&x, sf, -1.0).is_err());
}
