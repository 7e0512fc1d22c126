//! Sleep stages and hypnograms.
//!
//! Integer coding follows the AASM / YASA convention:
//!
//! ```text
//!  -2  Unscored   -1  Artefact
//!   0  Wake        1  N1   2  N2   3  N3   4  REM
//! ```
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use ndarray::Array2;

/// One scored epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SleepStage {
    Unscored,
    Artefact,
    Wake,
    N1,
    N2,
    N3,
    Rem,
}

impl SleepStage {
    /// The five stages a classifier emits, in probability-column order.
    pub const SCORED: [SleepStage; 5] = [
        SleepStage::Wake,
        SleepStage::N1,
        SleepStage::N2,
        SleepStage::N3,
        SleepStage::Rem,
    ];

    pub fn as_int(self) -> i8 {
        match self {
            SleepStage::Unscored => -2,
            SleepStage::Artefact => -1,
            SleepStage::Wake => 0,
            SleepStage::N1 => 1,
            SleepStage::N2 => 2,
            SleepStage::N3 => 3,
            SleepStage::Rem => 4,
        }
    }

    pub fn from_int(v: i8) -> Result<Self> {
        Ok(match v {
            -2 => SleepStage::Unscored,
            -1 => SleepStage::Artefact,
            0 => SleepStage::Wake,
            1 => SleepStage::N1,
            2 => SleepStage::N2,
            3 => SleepStage::N3,
            4 => SleepStage::Rem,
            other => bail!("invalid stage code {other} (expected -2..=4)"),
        })
    }

    /// Short label: `W`, `N1`, `N2`, `N3`, `R`, `Art`, `Uns`.
    pub fn label(self) -> &'static str {
        match self {
            SleepStage::Unscored => "Uns",
            SleepStage::Artefact => "Art",
            SleepStage::Wake => "W",
            SleepStage::N1 => "N1",
            SleepStage::N2 => "N2",
            SleepStage::N3 => "N3",
            SleepStage::Rem => "R",
        }
    }

    /// `true` for N1, N2, N3 and REM.
    #[inline]
    pub fn is_sleep(self) -> bool {
        matches!(self, SleepStage::N1 | SleepStage::N2 | SleepStage::N3 | SleepStage::Rem)
    }

    #[inline]
    pub fn is_nrem(self) -> bool {
        matches!(self, SleepStage::N1 | SleepStage::N2 | SleepStage::N3)
    }
}

impl FromStr for SleepStage {
    type Err = anyhow::Error;

    /// Case-insensitive; accepts the spellings common in scoring exports.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "W" | "WAKE" => Ok(SleepStage::Wake),
            "N1" | "S1" => Ok(SleepStage::N1),
            "N2" | "S2" => Ok(SleepStage::N2),
            "N3" | "S3" | "S4" => Ok(SleepStage::N3),
            "R" | "REM" => Ok(SleepStage::Rem),
            "ART" | "ARTEFACT" | "ARTIFACT" => Ok(SleepStage::Artefact),
            "UNS" | "UNSCORED" => Ok(SleepStage::Unscored),
            other => Err(anyhow!("unknown sleep stage '{other}'")),
        }
    }
}

impl fmt::Display for SleepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Convert string labels to integer codes.
pub fn hypno_str_to_int<S: AsRef<str>>(labels: &[S]) -> Result<Vec<i8>> {
    labels
        .iter()
        .map(|l| l.as_ref().parse::<SleepStage>().map(SleepStage::as_int))
        .collect()
}

/// Convert integer codes to string labels.
pub fn hypno_int_to_str(codes: &[i8]) -> Result<Vec<&'static str>> {
    codes
        .iter()
        .map(|&c| SleepStage::from_int(c).map(SleepStage::label))
        .collect()
}

/// Repeat each epoch of `hypno` so it has one value per data sample.
///
/// `sf_data / sf_hypno` must be a whole number.  The result is cropped, or
/// padded with the last stage, to exactly `n_samples`.
pub fn upsample_to_data(
    hypno: &[i8],
    sf_hypno: f64,
    sf_data: f64,
    n_samples: usize,
) -> Result<Vec<i8>> {
    if sf_hypno <= 0.0 || sf_data <= 0.0 {
        bail!("sampling rates must be positive");
    }
    let repeats_f = sf_data / sf_hypno;
    let repeats = repeats_f.round() as usize;
    if repeats == 0 || (repeats_f - repeats as f64).abs() > 1e-6 {
        bail!("sf_data / sf_hypno = {repeats_f} is not a whole number");
    }
    let Some(&last) = hypno.last() else {
        bail!("empty hypnogram");
    };

    let mut up: Vec<i8> = hypno
        .iter()
        .flat_map(|&s| std::iter::repeat(s).take(repeats))
        .collect();
    if up.len() > n_samples {
        log::warn!(
            "hypnogram is {} samples longer than data; cropping",
            up.len() - n_samples
        );
        up.truncate(n_samples);
    } else if up.len() < n_samples {
        log::debug!(
            "padding hypnogram with {} samples of its last stage",
            n_samples - up.len()
        );
        up.resize(n_samples, last);
    }
    Ok(up)
}

/// A sequence of fixed-length scored epochs.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypnogram {
    pub stages:     Vec<SleepStage>,
    /// Epoch length in seconds.
    pub epoch_secs: f64,
}

impl Hypnogram {
    pub fn new(stages: Vec<SleepStage>, epoch_secs: f64) -> Self {
        Self { stages, epoch_secs }
    }

    /// Arg-max of each row of a `[E, 5]` probability matrix whose columns
    /// follow [`SleepStage::SCORED`].
    pub fn from_proba(proba: &Array2<f64>, epoch_secs: f64) -> Result<Self> {
        if proba.ncols() != SleepStage::SCORED.len() {
            bail!("expected {} probability columns, got {}", SleepStage::SCORED.len(), proba.ncols());
        }
        let stages = proba
            .rows()
            .into_iter()
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |acc, (i, &p)| if p > acc.1 { (i, p) } else { acc });
                SleepStage::SCORED[best.0]
            })
            .collect();
        Ok(Self { stages, epoch_secs })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Hypnogram sampling rate in Hz (`1 / epoch_secs`).
    #[inline]
    pub fn sf_hyp(&self) -> f64 {
        1.0 / self.epoch_secs
    }

    pub fn as_ints(&self) -> Vec<i8> {
        self.stages.iter().map(|s| s.as_int()).collect()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.label()).collect()
    }

    /// Total duration in minutes.
    pub fn duration_minutes(&self) -> f64 {
        self.len() as f64 * self.epoch_secs / 60.0
    }

    /// Per-sample stage codes for data sampled at `sf_data`.
    pub fn upsample_to_data(&self, sf_data: f64, n_samples: usize) -> Result<Vec<i8>> {
        upsample_to_data(&self.as_ints(), self.sf_hyp(), sf_data, n_samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_to_int_mapping() {
        let codes = hypno_str_to_int(&["W", "n1", "N2", "N3", "R", "REM", "Wake", "Art", "UNS"]).unwrap();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 4, 0, -1, -2]);
    }

    #[test]
    fn unknown_label_is_error() {
        assert!(hypno_str_to_int(&["W", "N5"]).is_err());
        assert!(SleepStage::from_int(7).is_err());
    }

    #[test]
    fn int_to_str_mapping() {
        assert_eq!(hypno_int_to_str(&[0, 4, -1]).unwrap(), vec!["W", "R", "Art"]);
    }

    #[test]
    fn upsample_repeats_each_epoch() {
        let up = upsample_to_data(&[0, 2], 1.0 / 30.0, 100.0, 6000).unwrap();
        assert_eq!(up.len(), 6000);
        assert!(up[..3000].iter().all(|&s| s == 0));
        assert!(up[3000..].iter().all(|&s| s == 2));
    }

    #[test]
    fn upsample_pads_with_last_stage_and_crops() {
        let up = upsample_to_data(&[1, 3], 1.0 / 30.0, 100.0, 6150).unwrap();
        assert_eq!(up.len(), 6150);
        assert!(up[6000..].iter().all(|&s| s == 3));

        let up = upsample_to_data(&[1, 3], 1.0 / 30.0, 100.0, 4000).unwrap();
        assert_eq!(up.len(), 4000);
        assert_eq!(up[3999], 3);
    }

    #[test]
    fn upsample_rejects_fractional_ratio() {
        assert!(upsample_to_data(&[0], 1.0 / 30.0, 100.01, 10).is_err());
        assert!(upsample_to_data(&[], 1.0 / 30.0, 100.0, 10).is_err());
    }

    #[test]
    fn hypnogram_upsamples_its_own_codes() {
        let h = Hypnogram::new(vec![SleepStage::Wake, SleepStage::N3], 30.0);
        let up = h.upsample_to_data(2.0, 130).unwrap();
        assert_eq!(up.len(), 130);
        assert!(up[..60].iter().all(|&s| s == 0));
        assert!(up[60..].iter().all(|&s| s == 3));
    }

    #[test]
    fn nrem_excludes_rem_and_wake() {
        assert!(SleepStage::N1.is_nrem() && SleepStage::N3.is_nrem());
        assert!(!SleepStage::Rem.is_nrem());
        assert!(!SleepStage::Wake.is_nrem());
        assert!(SleepStage::Rem.is_sleep());
    }

    #[test]
    fn from_proba_takes_argmax() {
        let p = Array2::from_shape_vec(
            (2, 5),
            vec![0.1, 0.1, 0.6, 0.1, 0.1, 0.05, 0.05, 0.1, 0.1, 0.7],
        )
        .unwrap();
        let h = Hypnogram::from_proba(&p, 30.0).unwrap();
        assert_eq!(h.stages, vec![SleepStage::N2, SleepStage::Rem]);
        approx::assert_abs_diff_eq!(h.sf_hyp(), 1.0 / 30.0);
        assert_eq!(h.duration_minutes(), 1.0);
    }

    #[test]
    fn stage_ordering_follows_codes() {
        let mut v = vec![SleepStage::Rem, SleepStage::Wake, SleepStage::Artefact, SleepStage::N2];
        v.sort();
        assert_eq!(v, vec![SleepStage::Artefact, SleepStage::Wake, SleepStage::N2, SleepStage::Rem]);
    }
}
