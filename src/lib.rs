//! # somno — automated sleep staging of BDF/EDF recordings in pure Rust
//!
//! `somno` reads a night of EEG/EOG/EMG, preprocesses it with ports of the
//! MNE-Python steps it needs (FFT resampling, zero-phase FIR band-pass,
//! re-referencing), scores 30 s epochs into W / N1 / N2 / N3 / REM and
//! summarises the night.
//!
//! ## Pipeline overview
//!
//! ```text
//! night.bdf
//!   │
//!   ├─ bdf::open_raw()             native BDF/EDF reader → Raw [C, T] volts
//!   ├─ drop / rename / pick        TimeStamp out, ch1..ch8 → A2, Fp1, …
//!   ├─ reference::set_reference()  left side: EEG re-referenced to A2
//!   ├─ Raw::resample()             FFT → 100 Hz
//!   ├─ Raw::filter()               FIR band-pass 0.1–45 Hz
//!   ├─ staging::SleepStaging       per-epoch features → StageClassifier
//!   │     └─→ Hypnogram, [E, 5] probabilities, confidence
//!   ├─ hypnogram::upsample_to_data one stage per sample
//!   ├─ plot::plot_spectrogram()    hypnogram + spectrogram PNG
//!   ├─ stats::sleep_statistics()   TIB, SPT, WASO, TST, … → CSV
//!   └─ transition::transition_matrix()
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use somno::{run_pipeline, StagingConfig};
//!
//! let cfg = StagingConfig { input: "night.bdf".into(), ..StagingConfig::default() };
//! let out = run_pipeline(&cfg).unwrap();
//! println!("TST = {:.1} min", out.stats.get("TST").unwrap());
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use somno::bdf::open_raw;
//! use somno::reference::set_reference;
//! use somno::staging::{Metadata, SleepStaging, SoftmaxModel};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut raw = open_raw("night.bdf", &["TimeStamp"])?;
//! set_reference(&mut raw, &["ch1"])?;
//! raw.resample(100.0)?;
//! raw.filter(Some(0.1), Some(45.0))?;
//!
//! let sls = SleepStaging::new(&raw, "ch2", Some("ch4"), Some("ch6"), Metadata::new(30.0, false)?)?;
//! let hypno = sls.predict(&SoftmaxModel::default())?;
//! let stats = somno::sleep_statistics(&hypno.as_ints(), hypno.sf_hyp())?;
//! # Ok(()) }
//! ```

pub mod bdf;
pub mod config;
pub mod epoch;
pub mod filter;
pub mod hypnogram;
pub mod normalize;
pub mod plot;
pub mod raw;
pub mod reference;
pub mod report;
pub mod resample;
pub mod spectral;
pub mod staging;
pub mod stats;
pub mod synth;
pub mod transition;

use anyhow::Result;
use ndarray::Array2;

// ── Crate-root re-exports ─────────────────────────────────────────────────

pub use bdf::{open_raw, read_header_from_path, BdfHeader, BdfWriter, FileFormat, SignalHeader};
pub use config::{ElectrodeSide, StagingConfig};
pub use hypnogram::{hypno_int_to_str, hypno_str_to_int, upsample_to_data, Hypnogram, SleepStage};
pub use plot::{plot_confidence, plot_spectrogram, SpectrogramOptions};
pub use raw::{ChannelKind, Raw};
pub use reference::set_reference;
pub use report::{write_hypnogram, write_sleep_statistics, write_transition_matrix};
pub use staging::{confidence, FeatureTable, Metadata, SleepStaging, SoftmaxModel, StageClassifier};
pub use stats::{sleep_statistics, SleepStatistics};
pub use transition::{transition_matrix, TransitionMatrix};

/// Everything the pipeline computed for one recording.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Recording after channel selection, referencing, resampling and filtering.
    pub raw:        Raw,
    pub hypnogram:  Hypnogram,
    /// Stage probabilities, `[n_epochs, 5]` (W, N1, N2, N3, REM).
    pub proba:      Array2<f64>,
    /// Probability of the predicted stage, per epoch.
    pub confidence: Vec<f64>,
    pub stats:      SleepStatistics,
    /// `None` for single-epoch recordings.
    pub transition: Option<TransitionMatrix>,
}

/// Bring a loaded recording into the shape the classifier expects: drop,
/// rename, retype and pick channels, re-reference, resample and filter.
pub fn preprocess(raw: &mut Raw, cfg: &StagingConfig) -> Result<()> {
    if !cfg.drop_channels.is_empty() {
        raw.drop_channels(&cfg.drop_channels)?;
    }
    raw.rename_channels(&cfg.rename)?;
    raw.set_channel_kinds(&cfg.channel_kinds)?;
    raw.pick_channels(&cfg.side.picks())?;
    if let Some(refs) = cfg.side.reference_channels() {
        set_reference(raw, &refs)?;
    }
    raw.resample(cfg.target_sfreq)?;
    raw.filter(cfg.l_freq, cfg.h_freq)?;
    Ok(())
}

/// Run the **full staging pipeline** described by `cfg` and write its
/// outputs.
///
/// # Steps
///
/// 1. Load [`StagingConfig::input`] and log its summary.
/// 2. [`preprocess`] it for [`StagingConfig::side`].
/// 3. Score 30 s epochs with the configured model (built-in by default).
/// 4. Convert stages to integer codes and upsample them to the data rate.
/// 5. Plot the hypnogram above the EEG spectrogram.
/// 6. Compute and write sleep statistics; compute the transition matrix.
/// 7. Write the optional hypnogram CSV, transition CSV and confidence plot.
///
/// # Errors
///
/// Invalid configuration, unreadable input, missing channels, recordings
/// shorter than one epoch, and any I/O failure while writing outputs.
pub fn run_pipeline(cfg: &StagingConfig) -> Result<PipelineOutput> {
    cfg.validate()?;

    let mut raw = bdf::open_raw(&cfg.input, &cfg.exclude_channels)?;
    log::info!("loaded recording\n{raw}");
    preprocess(&mut raw, cfg)?;
    log::info!("preprocessed recording\n{raw}");

    let model = match &cfg.model {
        Some(path) => SoftmaxModel::from_json_file(path)?,
        None => SoftmaxModel::default(),
    };
    let side = cfg.side;
    let sls = SleepStaging::new(&raw, side.eeg(), Some(side.eog()), Some(side.emg()), cfg.metadata()?)?;
    let proba = sls.predict_proba(&model)?;
    let hypnogram = Hypnogram::from_proba(&proba, sls.epoch_secs())?;
    let conf = confidence(&proba);

    let hypno_int = hypno_str_to_int(&hypnogram.labels())?;
    let hypno_up = upsample_to_data(&hypno_int, hypnogram.sf_hyp(), raw.sfreq as f64, raw.n_times())?;

    let eeg_uv: Vec<f32> = raw.channel_data(side.eeg())?.iter().map(|v| v * 1e6).collect();
    plot_spectrogram(&cfg.hypnogram_plot, &eeg_uv, raw.sfreq as f64, &hypno_up, &cfg.spectrogram_options())?;

    let stats = sleep_statistics(&hypno_int, hypnogram.sf_hyp())?;
    for (key, value) in stats.iter() {
        log::info!("{key:<8} {value:.2}");
    }
    write_sleep_statistics(&cfg.stats_csv, &stats)?;

    let transition = if hypno_int.len() >= 2 {
        let tm = transition_matrix(&hypno_int)?;
        log::info!("transition probabilities\n{tm}");
        log::info!("sleep stability: {:.3}", tm.sleep_stability());
        if let Some(path) = &cfg.transition_csv {
            write_transition_matrix(path, &tm)?;
        }
        Some(tm)
    } else {
        log::warn!("single epoch; no transition matrix");
        None
    };

    if let Some(path) = &cfg.hypnogram_csv {
        write_hypnogram(path, &hypnogram, &proba, raw.meas_date)?;
    }
    if let Some(path) = &cfg.confidence_plot {
        plot_confidence(path, &conf, hypnogram.epoch_secs)?;
    }

    Ok(PipelineOutput { raw, hypnogram, proba, confidence: conf, stats, transition })
}
