use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use somno::bdf::{BdfWriter, FileFormat};
use somno::synth::{demo_stages, synth_night};

#[derive(Parser)]
#[command(name = "synth_bdf", about = "Write a synthetic Mentalab-style night recording")]
struct Args {
    /// Output .bdf path
    output: PathBuf,

    /// Number of 30 s epochs
    #[arg(long, default_value_t = 120)]
    epochs: usize,

    /// Sampling rate in Hz
    #[arg(long, default_value_t = 250.0)]
    sfreq: f64,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let night = synth_night(&demo_stages(args.epochs), args.sfreq, args.seed);
    BdfWriter::new(FileFormat::Bdf).write(&args.output, &night.data, &night.labels, night.sfreq)?;

    let labels: Vec<&str> = night.stages.iter().map(|s| s.label()).collect();
    println!("Wrote {} epochs @ {} Hz → {}", night.stages.len(), night.sfreq, args.output.display());
    println!("Stages: {}", labels.join(" "));
    Ok(())
}
