//! Per-epoch features for sleep staging.
//!
//! Computed on signals in µV, one row per 30 s epoch:
//!
//! ```text
//! eeg_{delta,theta,alpha,sigma,beta}       log10 absolute band power
//! eeg_{delta,theta,alpha,sigma,beta}_rel   band power / 0.5–30 Hz power
//! eeg_std                                  log10 standard deviation
//! eog_slow                                 log10 0.3–2 Hz power      (if EOG)
//! emg_high                                 log10 20–45 Hz power      (if EMG)
//! ```
//!
//! Every raw feature also gets a `_c7min` companion: z-scored across the
//! night, then smoothed with a centred 7.5-minute triangular window.
use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView1, Axis};

use crate::epoch::{epoch_rows, epoch_samples, n_epochs};
use crate::normalize::{smooth_triangular_centered, zscore_columns_inplace};
use crate::spectral::{bandpower, welch};

/// EEG bands in Hz.
pub const EEG_BANDS: [(&str, f64, f64); 5] = [
    ("delta", 0.5, 4.0),
    ("theta", 4.0, 8.0),
    ("alpha", 8.0, 12.0),
    ("sigma", 12.0, 16.0),
    ("beta", 16.0, 30.0),
];

pub const EOG_SLOW_BAND: (f64, f64) = (0.3, 2.0);
pub const EMG_HIGH_BAND: (f64, f64) = (20.0, 45.0);

/// Welch segment length in seconds.
pub const WELCH_SECS: f64 = 4.0;

/// Length of the centred smoothing window in minutes.
pub const SMOOTH_MINUTES: f64 = 7.5;

/// Suffix of the normalised, smoothed feature columns.
pub const SMOOTH_SUFFIX: &str = "_c7min";

/// Smallest power fed to `log10`, in µV².
const POWER_FLOOR: f64 = 1e-12;

/// Names of the raw features that exist for a given channel set, in
/// column order.
pub fn raw_feature_names(has_eog: bool, has_emg: bool) -> Vec<String> {
    let mut names: Vec<String> = EEG_BANDS.iter().map(|(b, _, _)| format!("eeg_{b}")).collect();
    names.extend(EEG_BANDS.iter().map(|(b, _, _)| format!("eeg_{b}_rel")));
    names.push("eeg_std".into());
    if has_eog {
        names.push("eog_slow".into());
    }
    if has_emg {
        names.push("emg_high".into());
    }
    names
}

/// `true` if `name` is a feature [`compute`] can produce for some channel set.
pub fn is_known_feature(name: &str) -> bool {
    let base = name.strip_suffix(SMOOTH_SUFFIX).unwrap_or(name);
    raw_feature_names(true, true).iter().any(|n| n == base)
}

/// Smoothing window in epochs (odd).
pub fn smoothing_epochs(epoch_secs: f64) -> usize {
    let m = ((SMOOTH_MINUTES * 60.0) / epoch_secs).round().max(1.0) as usize;
    if m % 2 == 0 { m + 1 } else { m }
}

/// Named feature columns, `[n_epochs, n_features]`.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    names:  Vec<String>,
    values: Array2<f64>,
}

impl FeatureTable {
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if names.len() != values.ncols() {
            bail!("{} feature names for {} columns", names.len(), values.ncols());
        }
        Ok(Self { names, values })
    }

    #[inline]
    pub fn n_epochs(&self) -> usize {
        self.values.nrows()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        let j = self.names.iter().position(|n| n == name)?;
        Some(self.values.column(j))
    }
}

/// Band powers of one epoch.
fn epoch_features(
    eeg: ArrayView1<f32>,
    eog: Option<ArrayView1<f32>>,
    emg: Option<ArrayView1<f32>>,
    sfreq: f64,
    nperseg: usize,
    out: &mut Vec<f64>,
) -> Result<()> {
    let eeg = eeg.to_vec();
    let (f, p) = welch(&eeg, sfreq, nperseg)?;
    let bands: Vec<f64> = EEG_BANDS
        .iter()
        .map(|&(_, lo, hi)| bandpower(&f, &p, lo, hi))
        .collect();
    let total = bandpower(&f, &p, EEG_BANDS[0].1, EEG_BANDS[4].2).max(POWER_FLOOR);
    out.extend(bands.iter().map(|bp| bp.max(POWER_FLOOR).log10()));
    out.extend(bands.iter().map(|bp| bp / total));

    let n = eeg.len() as f64;
    let mean = eeg.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = eeg.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
    out.push(var.sqrt().max(POWER_FLOOR).log10());

    if let Some(eog) = eog {
        let (f, p) = welch(&eog.to_vec(), sfreq, nperseg)?;
        out.push(bandpower(&f, &p, EOG_SLOW_BAND.0, EOG_SLOW_BAND.1).max(POWER_FLOOR).log10());
    }
    if let Some(emg) = emg {
        let (f, p) = welch(&emg.to_vec(), sfreq, nperseg)?;
        let hi = EMG_HIGH_BAND.1.min(sfreq / 2.0);
        out.push(bandpower(&f, &p, EMG_HIGH_BAND.0, hi).max(POWER_FLOOR).log10());
    }
    Ok(())
}

/// Compute the feature table from single-channel signals in µV.
///
/// The optional channels must have the same length as `eeg`.
pub fn compute(
    eeg: ArrayView1<f32>,
    eog: Option<ArrayView1<f32>>,
    emg: Option<ArrayView1<f32>>,
    sfreq: f64,
    epoch_secs: f64,
) -> Result<FeatureTable> {
    for (name, len) in [("EOG", eog.map(|c| c.len())), ("EMG", emg.map(|c| c.len()))] {
        if let Some(len) = len {
            if len != eeg.len() {
                bail!("{name} has {len} samples, EEG has {}", eeg.len());
            }
        }
    }
    let ep = epoch_samples(epoch_secs, sfreq as f32);
    let n_e = n_epochs(eeg.len(), ep);
    if n_e == 0 {
        bail!(
            "recording of {:.1} s is shorter than one {epoch_secs} s epoch",
            eeg.len() as f64 / sfreq
        );
    }
    let nperseg = ((WELCH_SECS * sfreq).round() as usize).min(ep);

    let eeg_ep = epoch_rows(eeg, ep);
    let eog_ep = eog.map(|x| epoch_rows(x, ep));
    let emg_ep = emg.map(|x| epoch_rows(x, ep));

    let raw_names = raw_feature_names(eog.is_some(), emg.is_some());
    let n_raw = raw_names.len();
    let mut flat = Vec::with_capacity(n_e * n_raw);
    for e in 0..n_e {
        epoch_features(
            eeg_ep.row(e),
            eog_ep.as_ref().map(|a| a.row(e)),
            emg_ep.as_ref().map(|a| a.row(e)),
            sfreq,
            nperseg,
            &mut flat,
        )?;
    }
    let raw = Array2::from_shape_vec((n_e, n_raw), flat)?;

    let mut norm = raw.clone();
    zscore_columns_inplace(&mut norm);
    let m = smoothing_epochs(epoch_secs);
    let mut values = Array2::<f64>::zeros((n_e, 2 * n_raw));
    values.slice_mut(ndarray::s![.., ..n_raw]).assign(&raw);
    for (j, col) in norm.axis_iter(Axis(1)).enumerate() {
        values
            .column_mut(n_raw + j)
            .assign(&smooth_triangular_centered(col, m));
    }

    let mut names = raw_names.clone();
    names.extend(raw_names.iter().map(|n| format!("{n}{SMOOTH_SUFFIX}")));
    log::debug!("computed {} features over {n_e} epochs (smoothing {m} epochs)", names.len());
    FeatureTable::new(names, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use std::f64::consts::PI;

    fn tone(freq: f64, amp: f64, sfreq: f64, n: usize) -> Array1<f32> {
        Array1::from_shape_fn(n, |i| (amp * (2.0 * PI * freq * i as f64 / sfreq).sin()) as f32)
    }

    #[test]
    fn names_depend_on_channels() {
        assert_eq!(raw_feature_names(false, false).len(), 11);
        assert_eq!(raw_feature_names(true, true).len(), 13);
        assert!(is_known_feature("emg_high_c7min"));
        assert!(is_known_feature("eeg_sigma_rel"));
        assert!(!is_known_feature("eeg_gamma"));
    }

    #[test]
    fn smoothing_window_is_fifteen_epochs() {
        assert_eq!(smoothing_epochs(30.0), 15);
        assert_eq!(smoothing_epochs(20.0), 23);
    }

    #[test]
    fn dominant_band_has_largest_relative_power() {
        let sfreq = 100.0;
        let n = 3000 * 4;
        let eeg = tone(2.0, 50.0, sfreq, n);
        let t = compute(eeg.view(), None, None, sfreq, 30.0).unwrap();
        assert_eq!(t.n_epochs(), 4);
        assert_eq!(t.names().len(), 22);
        let delta = t.column("eeg_delta_rel").unwrap();
        let alpha = t.column("eeg_alpha_rel").unwrap();
        assert!(delta[0] > 0.9);
        assert!(alpha[0] < 0.05);
    }

    #[test]
    fn smoothed_columns_are_centred() {
        let sfreq = 100.0;
        let n = 3000 * 20;
        // Amplitude grows over the night so the raw features vary.
        let eeg = Array1::from_shape_fn(n, |i| {
            let a = 10.0 + i as f64 / n as f64 * 40.0;
            (a * (2.0 * PI * 10.0 * i as f64 / sfreq).sin()) as f32
        });
        let emg = tone(30.0, 5.0, sfreq, n);
        let t = compute(eeg.view(), None, Some(emg.view()), sfreq, 30.0).unwrap();
        let c = t.column("eeg_std_c7min").unwrap();
        assert!(c[0] < 0.0 && c[19] > 0.0);
        assert!(t.column("emg_high").is_some());
        assert!(t.column("eog_slow").is_none());
    }

    #[test]
    fn short_or_mismatched_input_rejected() {
        let eeg = tone(2.0, 1.0, 100.0, 2999);
        assert!(compute(eeg.view(), None, None, 100.0, 30.0).is_err());
        let eeg = tone(2.0, 1.0, 100.0, 3000);
        let eog = tone(2.0, 1.0, 100.0, 2000);
        assert!(compute(eeg.view(), Some(eog.view()), None, 100.0, 30.0).is_err());
        assert!(compute(eeg.view(), None, Some(eog.view()), 100.0, 30.0).is_err());

        // EOG and EMG borrowed from separate arrays.
        let eog = tone(0.5, 1.0, 100.0, 3000);
        let emg = tone(30.0, 1.0, 100.0, 3000);
        assert!(compute(eeg.view(), Some(eog.view()), Some(emg.view()), 100.0, 30.0).is_ok());
    }
}
