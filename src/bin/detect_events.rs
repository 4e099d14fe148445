use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use hypno::annotation::{load_or_create, save};
use hypno::detect::{SPINDLE_LABEL, SWA_LABEL};
use hypno::io::load_recording;
use hypno::{detect_slow_waves, detect_spindles, SleepState, SlowWave, Spindle, SpindleParams, SwaParams};

/// Runs shorter than this are not searched.
const MIN_RUN_SEC: usize = 10;

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Spindle,
    Swa,
    Both,
}

#[derive(Parser)]
#[command(name = "detect_events", about = "Spindle and slow-wave detection into an annotation file")]
struct Args {
    /// Recording (.safetensors)
    #[arg(long)]
    input: PathBuf,

    /// Annotation file; detected events are appended as start-end events
    #[arg(long)]
    annotation: PathBuf,

    /// Channel to search
    #[arg(long, default_value = "EEG")]
    channel: String,

    #[arg(long, value_enum, default_value_t = Kind::Both)]
    kind: Kind,

    /// Only search runs of this state code (e.g. 1 for NREM); all seconds otherwise
    #[arg(long)]
    state: Option<u8>,

    /// Spindle peak threshold in standard deviations
    #[arg(long, default_value_t = 3.0)]
    std_thresh: f64,

    /// Minimum spindle duration in seconds
    #[arg(long, default_value_t = 0.5)]
    min_duration: f64,

    /// Minimum slow-wave peak amplitude (signal units)
    #[arg(long, default_value_t = 75.0)]
    amp_min: f64,

    /// Also write every event with all its measurements as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Default, Serialize)]
struct Report {
    spindles: Vec<Spindle>,
    slow_waves: Vec<SlowWave>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let rec = load_recording(&args.input)?;
    let (signal, sf) = rec.signal(&args.channel)?;
    let mut anno = load_or_create(&args.annotation, Some(rec.duration()))
        .with_context(|| format!("opening annotation {}", args.annotation.display()))?;

    // Seconds to search, as [start, end) runs.
    let runs: Vec<(usize, usize)> = match args.state {
        Some(state) => {
            if !anno.state_map().contains(state) {
                anyhow::bail!("state {state} is not in the annotation's state map");
            }
            anno.intervals()
                .into_iter()
                .filter(|iv| iv.value == state)
                .map(|iv| (iv.start, iv.end))
                .collect()
        }
        None => vec![(0, rec.duration())],
    };
    info!(
        channel = %args.channel,
        runs = runs.len(),
        state = ?args.state.and_then(SleepState::from_code),
        "searching"
    );

    let mut report = Report::default();
    for (start, end) in runs {
        if end - start < MIN_RUN_SEC {
            debug!(start, end, "run too short, skipped");
            continue;
        }
        let a = (start as f64 * sf) as usize;
        let b = ((end as f64 * sf) as usize).min(signal.len());
        let segment = &signal[a..b];

        if args.kind != Kind::Swa {
            let params = SpindleParams {
                std_thresh: args.std_thresh,
                min_duration: args.min_duration,
                start_time_sec: start as f64,
                ..SpindleParams::default()
            };
            report.spindles.extend(detect_spindles(segment, sf, &params)?);
        }
        if args.kind != Kind::Spindle {
            let params = SwaParams {
                amp_min: args.amp_min,
                start_time_sec: start as f64,
                ..SwaParams::default()
            };
            report.slow_waves.extend(detect_slow_waves(segment, sf, &params)?);
        }
    }

    for s in &report.spindles {
        anno.push_start_end(s.start, s.end, SPINDLE_LABEL)?;
    }
    for w in &report.slow_waves {
        anno.push_start_end(w.start_time, w.end_time, SWA_LABEL)?;
    }
    save(&anno, rec.start_time(), &args.annotation)?;

    if let Some(path) = &args.json {
        let f = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(f, &report)?;
    }

    println!(
        "{} spindles, {} slow waves → {}",
        report.spindles.len(),
        report.slow_waves.len(),
        args.annotation.display()
    );
    Ok(())
}
