use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hypno::annotation::{load_or_create, save};
use hypno::io::load_recording;
use hypno::{stage_recording, AgeProfile, EegSite, ModelKey, ModelRegistry, PowerLine, StagingConfig};

#[derive(Parser)]
#[command(name = "autostage", about = "Automatic NREM/REM/Wake staging of an EEG/EMG recording")]
struct Args {
    /// Recording (.safetensors)
    #[arg(long)]
    input: PathBuf,

    /// Annotation file; created when missing or empty, otherwise updated
    #[arg(long)]
    output: PathBuf,

    /// Directory holding <site>_<age>.json models
    #[arg(long)]
    models: PathBuf,

    /// EEG channel name
    #[arg(long, default_value = "EEG")]
    eeg: String,

    /// EMG channel name
    #[arg(long, default_value = "EMG")]
    emg: String,

    /// EEG electrode site: frontal (F) or parietal (P)
    #[arg(long, default_value = "parietal")]
    site: EegSite,

    /// Age profile: young, adult or aged
    #[arg(long, default_value = "adult")]
    age: AgeProfile,

    /// First second to stage (default: start of recording)
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// Last second to stage, exclusive (default: end of recording)
    #[arg(long)]
    end: Option<usize>,

    /// REM probability above which a window is forced to REM
    #[arg(long, default_value_t = 0.1)]
    rem_threshold: f64,

    /// Absorb isolated windows into their agreeing neighbours
    #[arg(long)]
    smooth: bool,

    /// Relabel REM directly after Wake as NREM
    #[arg(long)]
    forbid_rem_after_wake: bool,

    /// Mains frequency to notch out: 50, 60 or off
    #[arg(long, default_value = "50", value_parser = ["50", "60", "off"])]
    power_line: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let rec = load_recording(&args.input)?;
    info!(
        channels = ?rec.channels(),
        duration = rec.duration(),
        start = %rec.start_time(),
        "loaded recording"
    );

    let end = args.end.unwrap_or(rec.duration()).min(rec.duration());
    if args.start >= end {
        bail!("nothing to stage between {} s and {end} s", args.start);
    }
    let segment = rec.crop(args.start, end)?;

    let registry = ModelRegistry::load_dir(&args.models)?;
    let key = ModelKey::new(args.site, args.age);
    let model = registry.get(key)?;

    let cfg = StagingConfig {
        rem_threshold: args.rem_threshold,
        smooth_isolated: args.smooth,
        forbid_rem_after_wake: args.forbid_rem_after_wake,
        power_line: match args.power_line.as_str() {
            "60" => Some(PowerLine::Hz60),
            "off" => None,
            _ => Some(PowerLine::Hz50),
        },
        ..StagingConfig::default()
    };
    let staged = stage_recording(&segment, &args.eeg, &args.emg, model, &cfg)?;

    let mut anno = load_or_create(&args.output, Some(rec.duration()))
        .with_context(|| format!("opening annotation {}", args.output.display()))?;
    anno.assign_labels(args.start, staged.sleep_state())?;
    save(&anno, rec.start_time(), &args.output)?;

    println!(
        "Staged {}–{} s with {key} → {}",
        args.start,
        end,
        args.output.display()
    );
    Ok(())
}
