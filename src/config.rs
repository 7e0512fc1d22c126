//! Pipeline configuration.
//!
//! [`StagingConfig`] holds every tunable parameter of the staging pipeline.
//! All fields have defaults matching a Mentalab Explore night recording, so a
//! JSON config file only needs the fields it changes.
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::plot::SpectrogramOptions;
use crate::raw::ChannelKind;
use crate::staging::Metadata;

/// Which side of the head the scored electrodes sit on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectrodeSide {
    /// Fp1 / EOG1 / EMG1, re-referenced to the contralateral mastoid A2.
    #[default]
    Left,
    /// Fp2 / EOG2 / EMG2 against the system reference A1.
    Right,
}

impl ElectrodeSide {
    pub fn eeg(self) -> &'static str {
        match self {
            ElectrodeSide::Left => "Fp1",
            ElectrodeSide::Right => "Fp2",
        }
    }

    pub fn eog(self) -> &'static str {
        match self {
            ElectrodeSide::Left => "EOG1",
            ElectrodeSide::Right => "EOG2",
        }
    }

    pub fn emg(self) -> &'static str {
        match self {
            ElectrodeSide::Left => "EMG1",
            ElectrodeSide::Right => "EMG2",
        }
    }

    /// Channels kept for scoring.
    pub fn picks(self) -> Vec<&'static str> {
        match self {
            ElectrodeSide::Left => vec!["Fp1", "EOG1", "EMG1", "A2"],
            ElectrodeSide::Right => vec!["Fp2", "EOG2", "EMG2"],
        }
    }

    /// Reference to apply after picking; `None` keeps the system reference.
    pub fn reference_channels(self) -> Option<Vec<&'static str>> {
        match self {
            ElectrodeSide::Left => Some(vec!["A2"]),
            ElectrodeSide::Right => None,
        }
    }
}

impl FromStr for ElectrodeSide {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(ElectrodeSide::Left),
            "right" | "r" => Ok(ElectrodeSide::Right),
            other => bail!("electrode side must be 'left' or 'right', got '{other}'"),
        }
    }
}

impl fmt::Display for ElectrodeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ElectrodeSide::Left => "left",
            ElectrodeSide::Right => "right",
        })
    }
}

/// Mentalab Explore 8-channel montage: `ch1 → A2 … ch8 → FpZ`.
pub fn default_rename() -> BTreeMap<String, String> {
    [
        ("ch1", "A2"),
        ("ch2", "Fp1"),
        ("ch3", "Fp2"),
        ("ch4", "EOG1"),
        ("ch5", "EOG2"),
        ("ch6", "EMG1"),
        ("ch7", "EMG2"),
        ("ch8", "FpZ"),
    ]
    .into_iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect()
}

/// Configuration for the full staging pipeline.
///
/// ```
/// use somno::{ElectrodeSide, StagingConfig};
///
/// let cfg = StagingConfig {
///     input: "night.bdf".into(),
///     side:  ElectrodeSide::Right,
///     age:   52.0,
///     ..StagingConfig::default()
/// };
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// BDF or EDF recording.
    pub input: PathBuf,

    /// Hypnogram + spectrogram PNG.
    ///
    /// Default: `hypnogram.png`.
    pub hypnogram_plot: PathBuf,

    /// Sleep statistics as headerless `key,value` CSV.
    ///
    /// Default: `sleep_statistics.csv`.
    pub stats_csv: PathBuf,

    /// Per-epoch stages and probabilities.  Not written when unset.
    pub hypnogram_csv: Option<PathBuf>,

    /// Transition probabilities.  Not written when unset.
    pub transition_csv: Option<PathBuf>,

    /// Confidence-over-night PNG.  Not written when unset.
    pub confidence_plot: Option<PathBuf>,

    /// JSON coefficients for [`SoftmaxModel`](crate::SoftmaxModel); the
    /// built-in model is used when unset.
    pub model: Option<PathBuf>,

    /// Default: [`ElectrodeSide::Left`].
    pub side: ElectrodeSide,

    /// Subject age in years.  Default: `30`.
    pub age: f64,

    /// Default: `false`.
    pub male: bool,

    /// Channels never read from the file, e.g. one sampled at a different
    /// rate.  Default: empty.
    pub exclude_channels: Vec<String>,

    /// Channels dropped right after loading.  Every name must exist.
    ///
    /// Default: `["TimeStamp"]`.
    pub drop_channels: Vec<String>,

    /// Channel renames applied after dropping.
    ///
    /// Default: [`default_rename`].
    pub rename: BTreeMap<String, String>,

    /// Channel kinds to override after renaming (names after renaming).
    ///
    /// Every loaded channel is EEG, so re-referencing reaches EOG and EMG
    /// too unless they are retyped here.  Default: empty.
    pub channel_kinds: BTreeMap<String, ChannelKind>,

    /// Sampling rate after resampling, Hz.  Default: `100`.
    pub target_sfreq: f32,

    /// High-pass edge, Hz.  Default: `0.1`.
    pub l_freq: Option<f32>,

    /// Low-pass edge, Hz.  Default: `45`.
    pub h_freq: Option<f32>,

    /// Spectrogram frequency range, Hz.  Default: `0.5`–`25`.
    pub spec_fmin: f64,
    pub spec_fmax: f64,

    /// Spectrogram window, seconds.  Default: `30`.
    pub spec_win_sec: f64,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            hypnogram_plot: PathBuf::from("hypnogram.png"),
            stats_csv: PathBuf::from("sleep_statistics.csv"),
            hypnogram_csv: None,
            transition_csv: None,
            confidence_plot: None,
            model: None,
            side: ElectrodeSide::Left,
            age: 30.0,
            male: false,
            exclude_channels: Vec::new(),
            drop_channels: vec!["TimeStamp".to_string()],
            rename: default_rename(),
            channel_kinds: BTreeMap::new(),
            target_sfreq: 100.0,
            l_freq: Some(0.1),
            h_freq: Some(45.0),
            spec_fmin: 0.5,
            spec_fmax: 25.0,
            spec_win_sec: 30.0,
        }
    }
}

impl StagingConfig {
    /// Read a JSON config; missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg)
    }

    /// Check value ranges that would otherwise fail deep inside the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.input.as_os_str().is_empty() {
            bail!("no input recording given");
        }
        self.metadata()?;
        if !(self.target_sfreq > 0.0) {
            bail!("target_sfreq must be positive, got {}", self.target_sfreq);
        }
        let nyq = self.target_sfreq / 2.0;
        if let Some(l) = self.l_freq {
            if !(l > 0.0 && l < nyq) {
                bail!("l_freq {l} Hz must lie in (0, {nyq}) Hz");
            }
        }
        if let Some(h) = self.h_freq {
            if !(h > 0.0 && h < nyq) {
                bail!("h_freq {h} Hz must lie in (0, {nyq}) Hz");
            }
        }
        if let (Some(l), Some(h)) = (self.l_freq, self.h_freq) {
            if l >= h {
                bail!("l_freq {l} Hz must be below h_freq {h} Hz");
            }
        }
        if !(self.spec_fmin >= 0.0 && self.spec_fmin < self.spec_fmax) {
            bail!("spectrogram range {}–{} Hz is empty", self.spec_fmin, self.spec_fmax);
        }
        if !(self.spec_win_sec > 0.0) {
            bail!("spec_win_sec must be positive");
        }
        Ok(())
    }

    pub fn metadata(&self) -> Result<Metadata> {
        Metadata::new(self.age, self.male)
    }

    pub fn spectrogram_options(&self) -> SpectrogramOptions {
        SpectrogramOptions {
            fmin: self.spec_fmin,
            fmax: self.spec_fmax,
            win_sec: self.spec_win_sec,
            ..SpectrogramOptions::default()
        }
    }
}
