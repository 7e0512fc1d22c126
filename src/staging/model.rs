//! Stage classifiers.
//!
//! [`StageClassifier`] is the seam a trained model plugs into.  The crate
//! ships [`SoftmaxModel`], a multinomial logistic model over named features
//! whose built-in coefficients encode textbook stage signatures (delta for
//! N3, spindles for N2, alpha and muscle tone for wake, eye movements with
//! atonia for REM).  Coefficients can be replaced from a JSON file.
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::features::{is_known_feature, FeatureTable};
use super::Metadata;
use crate::hypnogram::SleepStage;

/// Number of scored classes (W, N1, N2, N3, REM).
pub const N_CLASSES: usize = SleepStage::SCORED.len();

/// Age around which the age term is centred, in years.
const AGE_CENTRE: f64 = 45.0;
const AGE_SCALE: f64 = 10.0;

/// Anything that turns a feature table into per-epoch stage probabilities.
pub trait StageClassifier {
    /// `[n_epochs, 5]`, columns W, N1, N2, N3, REM; each row sums to 1.
    fn predict_proba(&self, features: &FeatureTable, metadata: &Metadata) -> Result<Array2<f64>>;
}

/// Multinomial logistic regression.
///
/// `logit[k] = bias[k] + Σ_f weights[f][k]·x_f + age[k]·(age − 45)/10 + male[k]·male`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxModel {
    pub weights: BTreeMap<String, [f64; N_CLASSES]>,
    pub bias:    [f64; N_CLASSES],
    #[serde(default)]
    pub age:     [f64; N_CLASSES],
    #[serde(default)]
    pub male:    [f64; N_CLASSES],
}

impl Default for SoftmaxModel {
    fn default() -> Self {
        let weights = [
            ("eeg_delta_rel_c7min", [-1.2, -0.6, 0.3, 2.0, -0.6]),
            ("eeg_theta_rel_c7min", [-0.4, 0.8, 0.1, -0.2, 0.7]),
            ("eeg_alpha_rel_c7min", [1.2, 0.3, -0.4, -0.8, -0.2]),
            ("eeg_sigma_rel_c7min", [-0.5, -0.3, 1.2, 0.2, -0.6]),
            ("eeg_beta_rel_c7min", [1.0, 0.4, -0.4, -1.0, 0.2]),
            ("eog_slow_c7min", [0.8, 0.4, -0.6, -0.6, 0.9]),
            ("emg_high_c7min", [1.5, 0.2, -0.3, -0.4, -1.5]),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self {
            weights,
            bias: [0.0, -0.8, 0.6, -0.2, 0.0],
            age: [0.15, 0.05, 0.05, -0.3, -0.05],
            male: [0.05, 0.05, 0.05, -0.15, 0.0],
        }
    }
}

impl SoftmaxModel {
    /// Load coefficients from a JSON file and validate them.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading model {}", path.display()))?;
        let model: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing model {}", path.display()))?;
        model.validate()?;
        log::info!("loaded classifier with {} feature weights from {}", model.weights.len(), path.display());
        Ok(model)
    }

    /// Reject unknown feature names and non-finite coefficients.
    pub fn validate(&self) -> Result<()> {
        for (name, w) in &self.weights {
            if !is_known_feature(name) {
                bail!("model references unknown feature '{name}'");
            }
            if w.iter().any(|v| !v.is_finite()) {
                bail!("model weight for '{name}' is not finite");
            }
        }
        let terms = self.bias.iter().chain(&self.age).chain(&self.male);
        if terms.into_iter().any(|v| !v.is_finite()) {
            bail!("model bias/age/male terms must be finite");
        }
        Ok(())
    }
}

/// Row-wise numerically stable softmax.
fn softmax_inplace(logits: &mut [f64]) {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for l in logits.iter_mut() {
        *l = (*l - max).exp();
        sum += *l;
    }
    logits.iter_mut().for_each(|l| *l /= sum);
}

impl StageClassifier for SoftmaxModel {
    fn predict_proba(&self, features: &FeatureTable, metadata: &Metadata) -> Result<Array2<f64>> {
        self.validate()?;
        let n = features.n_epochs();
        let mut proba = Array2::<f64>::zeros((n, N_CLASSES));

        let age = (metadata.age - AGE_CENTRE) / AGE_SCALE;
        let male = if metadata.male { 1.0 } else { 0.0 };
        let mut base = [0.0; N_CLASSES];
        for k in 0..N_CLASSES {
            base[k] = self.bias[k] + self.age[k] * age + self.male[k] * male;
        }

        let mut columns = Vec::with_capacity(self.weights.len());
        for (name, w) in &self.weights {
            match features.column(name) {
                Some(col) => columns.push((col, w)),
                None => log::debug!("feature '{name}' not available; its weight is ignored"),
            }
        }

        for (e, mut row) in proba.rows_mut().into_iter().enumerate() {
            let mut logits = base;
            for (col, w) in &columns {
                let x = col[e];
                for k in 0..N_CLASSES {
                    logits[k] += w[k] * x;
                }
            }
            softmax_inplace(&mut logits);
            for (dst, &p) in row.iter_mut().zip(&logits) {
                *dst = p;
            }
        }
        Ok(proba)
    }
}
