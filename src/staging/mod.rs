//! Automatic sleep staging of 30 s epochs.
//!
//! ```no_run
//! use somno::staging::{Metadata, SleepStaging, SoftmaxModel};
//! # fn main() -> anyhow::Result<()> {
//! # let raw: somno::Raw = unimplemented!();
//! let sls = SleepStaging::new(&raw, "Fp1", Some("EOG1"), Some("EMG1"), Metadata::new(30.0, false)?)?;
//! let model = SoftmaxModel::default();
//! let proba = sls.predict_proba(&model)?;
//! let hypno = sls.predict(&model)?;
//! # Ok(()) }
//! ```
pub mod features;
pub mod model;

use anyhow::{bail, Result};
use ndarray::{Array1, Array2, Axis};

use crate::epoch::EPOCH_SECS;
use crate::hypnogram::Hypnogram;
use crate::raw::Raw;

pub use features::FeatureTable;
pub use model::{SoftmaxModel, StageClassifier, N_CLASSES};

/// Subject information the classifier conditions on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metadata {
    /// Age in years.
    pub age:  f64,
    pub male: bool,
}

impl Metadata {
    pub fn new(age: f64, male: bool) -> Result<Self> {
        if !(age > 0.0 && age < 120.0) {
            bail!("age must be in (0, 120) years, got {age}");
        }
        Ok(Self { age, male })
    }
}

/// Features of one recording, ready for classification.
#[derive(Debug, Clone)]
pub struct SleepStaging {
    features:   FeatureTable,
    metadata:   Metadata,
    epoch_secs: f64,
}

impl SleepStaging {
    /// Extract features from the named channels of `raw`.
    ///
    /// `raw` is expected in volts; features are computed in µV.
    pub fn new(
        raw: &Raw,
        eeg_name: &str,
        eog_name: Option<&str>,
        emg_name: Option<&str>,
        metadata: Metadata,
    ) -> Result<Self> {
        if raw.duration_secs() < EPOCH_SECS {
            bail!(
                "recording lasts {:.1} s; at least one {EPOCH_SECS} s epoch is required",
                raw.duration_secs()
            );
        }
        if raw.sfreq < 2.0 * 30.0 {
            log::warn!("sampling rate {} Hz is low for sleep staging; 100 Hz is expected", raw.sfreq);
        }
        let to_uv = |name: &str| -> Result<Array1<f32>> {
            Ok(raw.channel_data(name)?.mapv(|v| v * 1e6))
        };
        let eeg = to_uv(eeg_name)?;
        let eog = eog_name.map(to_uv).transpose()?;
        let emg = emg_name.map(to_uv).transpose()?;

        let features = features::compute(
            eeg.view(),
            eog.as_ref().map(|a| a.view()),
            emg.as_ref().map(|a| a.view()),
            raw.sfreq as f64,
            EPOCH_SECS,
        )?;
        log::info!(
            "staging {} epochs from {eeg_name} (EOG: {}, EMG: {})",
            features.n_epochs(),
            eog_name.unwrap_or("none"),
            emg_name.unwrap_or("none"),
        );
        Ok(Self { features, metadata, epoch_secs: EPOCH_SECS })
    }

    pub fn features(&self) -> &FeatureTable {
        &self.features
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[inline]
    pub fn n_epochs(&self) -> usize {
        self.features.n_epochs()
    }

    #[inline]
    pub fn epoch_secs(&self) -> f64 {
        self.epoch_secs
    }

    /// Per-epoch stage probabilities, `[n_epochs, 5]`.
    pub fn predict_proba(&self, clf: &dyn StageClassifier) -> Result<Array2<f64>> {
        let proba = clf.predict_proba(&self.features, &self.metadata)?;
        if proba.dim() != (self.n_epochs(), N_CLASSES) {
            bail!(
                "classifier returned {:?}, expected ({}, {N_CLASSES})",
                proba.dim(),
                self.n_epochs()
            );
        }
        for (e, row) in proba.axis_iter(Axis(0)).enumerate() {
            let s = row.sum();
            if !s.is_finite() || (s - 1.0).abs() > 1e-6 {
                bail!("probabilities of epoch {e} sum to {s}");
            }
        }
        Ok(proba)
    }

    /// Most likely stage of every epoch.
    pub fn predict(&self, clf: &dyn StageClassifier) -> Result<Hypnogram> {
        Hypnogram::from_proba(&self.predict_proba(clf)?, self.epoch_secs)
    }
}

/// Probability of the predicted stage, per epoch.
pub fn confidence(proba: &Array2<f64>) -> Vec<f64> {
    proba
        .axis_iter(Axis(0))
        .map(|row| row.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::ChannelKind;

    fn raw(n: usize) -> Raw {
        let data = Array2::from_shape_fn((2, n), |(c, t)| {
            let f = if c == 0 { 2.0 } else { 25.0 };
            (20e-6 * (2.0 * std::f32::consts::PI * f * t as f32 / 100.0).sin()) as f32
        });
        Raw::new(data, vec!["Fp1".into(), "EMG1".into()], vec![ChannelKind::Eeg; 2], 100.0).unwrap()
    }

    struct Uniform;

    impl StageClassifier for Uniform {
        fn predict_proba(&self, f: &FeatureTable, _: &Metadata) -> Result<Array2<f64>> {
            Ok(Array2::from_elem((f.n_epochs(), N_CLASSES), 0.2))
        }
    }

    struct WrongShape;

    impl StageClassifier for WrongShape {
        fn predict_proba(&self, _: &FeatureTable, _: &Metadata) -> Result<Array2<f64>> {
            Ok(Array2::from_elem((1, 3), 1.0 / 3.0))
        }
    }

    #[test]
    fn metadata_age_validated() {
        assert!(Metadata::new(0.0, true).is_err());
        assert!(Metadata::new(130.0, true).is_err());
        assert!(Metadata::new(f64::NAN, true).is_err());
        assert!(Metadata::new(42.0, true).is_ok());
    }

    #[test]
    fn epochs_counted_from_duration() {
        let sls = SleepStaging::new(&raw(3000 * 5 + 10), "Fp1", None, Some("EMG1"), Metadata::new(30.0, true).unwrap()).unwrap();
        assert_eq!(sls.n_epochs(), 5);
        let p = sls.predict_proba(&SoftmaxModel::default()).unwrap();
        assert_eq!(p.dim(), (5, N_CLASSES));
        assert_eq!(sls.predict(&SoftmaxModel::default()).unwrap().len(), 5);
    }

    #[test]
    fn short_recording_rejected() {
        let r = SleepStaging::new(&raw(2999), "Fp1", None, None, Metadata::new(30.0, true).unwrap());
        assert!(r.is_err());
    }

    #[test]
    fn missing_channel_rejected() {
        let r = SleepStaging::new(&raw(6000), "Fp1", Some("EOG1"), None, Metadata::new(30.0, true).unwrap());
        assert!(r.is_err());
    }

    #[test]
    fn custom_classifier_and_confidence() {
        let sls = SleepStaging::new(&raw(6000), "Fp1", None, None, Metadata::new(30.0, true).unwrap()).unwrap();
        let p = sls.predict_proba(&Uniform).unwrap();
        assert_eq!(confidence(&p), vec![0.2, 0.2]);
        assert!(sls.predict_proba(&WrongShape).is_err());
    }
}
