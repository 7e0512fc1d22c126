use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use somno::{run_pipeline, ElectrodeSide, StagingConfig};

#[derive(Parser)]
#[command(name = "somno", version, about = "Automated sleep staging of a BDF/EDF night recording")]
struct Args {
    /// BDF or EDF recording (overrides the config file)
    input: Option<PathBuf>,

    /// JSON config; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Electrode side: left (Fp1/EOG1/EMG1, A2 reference) or right (Fp2/EOG2/EMG2)
    #[arg(long)]
    side: Option<ElectrodeSide>,

    /// Subject age in years
    #[arg(long)]
    age: Option<f64>,

    /// Subject sex: `--male true` or `--male false`
    #[arg(long)]
    male: Option<bool>,

    /// Hypnogram + spectrogram PNG
    #[arg(long)]
    hypnogram_plot: Option<PathBuf>,

    /// Sleep statistics CSV
    #[arg(long)]
    stats_csv: Option<PathBuf>,

    /// Per-epoch stages and probabilities CSV
    #[arg(long)]
    hypnogram_csv: Option<PathBuf>,

    /// Transition probabilities CSV
    #[arg(long)]
    transition_csv: Option<PathBuf>,

    /// Confidence-over-night PNG
    #[arg(long)]
    confidence_plot: Option<PathBuf>,

    /// Classifier coefficients (JSON)
    #[arg(long)]
    model: Option<PathBuf>,
}

impl Args {
    /// Override `cfg` with every flag that was given.
    fn apply_to(self, cfg: &mut StagingConfig) {
        if let Some(v) = self.input { cfg.input = v; }
        if let Some(v) = self.side { cfg.side = v; }
        if let Some(v) = self.age { cfg.age = v; }
        if let Some(v) = self.male { cfg.male = v; }
        if let Some(v) = self.hypnogram_plot { cfg.hypnogram_plot = v; }
        if let Some(v) = self.stats_csv { cfg.stats_csv = v; }
        if self.hypnogram_csv.is_some() { cfg.hypnogram_csv = self.hypnogram_csv; }
        if self.transition_csv.is_some() { cfg.transition_csv = self.transition_csv; }
        if self.confidence_plot.is_some() { cfg.confidence_plot = self.confidence_plot; }
        if self.model.is_some() { cfg.model = self.model; }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => StagingConfig::from_json_file(path)?,
        None => StagingConfig::default(),
    };
    args.apply_to(&mut cfg);

    let out = run_pipeline(&cfg)?;

    println!("{} epochs scored ({:.1} min)", out.hypnogram.len(), out.hypnogram.duration_minutes());
    println!("{}", out.stats);
    if let Some(tm) = &out.transition {
        println!("\nTransition probabilities (row = current stage):\n{tm}");
        println!("Sleep stability: {:.2}", tm.sleep_stability());
    }
    println!("Hypnogram plot → {}", cfg.hypnogram_plot.display());
    println!("Statistics     → {}", cfg.stats_csv.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("somno").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn male_flag_overrides_config_both_ways() {
        let mut cfg = StagingConfig { male: true, ..StagingConfig::default() };
        parse(&["night.bdf", "--male", "false"]).apply_to(&mut cfg);
        assert!(!cfg.male);

        parse(&["--male", "true"]).apply_to(&mut cfg);
        assert!(cfg.male);
    }

    #[test]
    fn absent_flags_keep_config_values() {
        let mut cfg = StagingConfig { male: true, age: 61.0, side: ElectrodeSide::Right, ..StagingConfig::default() };
        parse(&["night.bdf"]).apply_to(&mut cfg);
        assert!(cfg.male);
        assert_eq!(cfg.age, 61.0);
        assert_eq!(cfg.side, ElectrodeSide::Right);
        assert_eq!(cfg.input, PathBuf::from("night.bdf"));
    }

    #[test]
    fn side_and_age_parse() {
        let mut cfg = StagingConfig::default();
        parse(&["--side", "right", "--age", "45.5"]).apply_to(&mut cfg);
        assert_eq!(cfg.side, ElectrodeSide::Right);
        assert_eq!(cfg.age, 45.5);
        assert!(Args::try_parse_from(["somno", "--male", "maybe"]).is_err());
    }
}
