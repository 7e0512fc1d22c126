//! EEG re-referencing.
//!
//! [`set_reference`] matches `mne.set_eeg_reference(raw, ref_channels=[…])`:
//! the mean of the reference channels is subtracted from every EEG-kind
//! channel at each time point.  Reference channels that are themselves EEG
//! become flat zero; EOG/EMG/stim channels are untouched.  A single
//! `"average"` entry selects the common average over all EEG channels.
//!
//! `data`: [C, T]  →  `data[c, t] -= mean(data[refs, t])` for EEG `c`.
use anyhow::{bail, Result};
use ndarray::{Array1, Array2, Axis};

use crate::raw::{ChannelKind, Raw};

/// Keyword selecting the common average reference.
pub const AVERAGE: &str = "average";

/// Subtract the per-timepoint channel mean (common average reference).
pub fn average_reference_inplace(data: &mut Array2<f32>) {
    let Some(means) = data.mean_axis(Axis(0)) else { return }; // shape [T]
    for mut row in data.rows_mut() {
        row -= &means;
    }
}

/// Re-reference the EEG channels of `raw` to `ref_channels`.
pub fn set_reference<S: AsRef<str>>(raw: &mut Raw, ref_channels: &[S]) -> Result<()> {
    if ref_channels.is_empty() {
        bail!("no reference channels given");
    }
    let eeg_rows: Vec<usize> = (0..raw.n_channels())
        .filter(|&i| raw.ch_kinds[i] == ChannelKind::Eeg)
        .collect();
    if eeg_rows.is_empty() {
        bail!("recording has no EEG channels to re-reference");
    }

    if ref_channels.len() == 1 && ref_channels[0].as_ref() == AVERAGE {
        let mut eeg = raw.data.select(Axis(0), &eeg_rows);
        average_reference_inplace(&mut eeg);
        for (k, &row) in eeg_rows.iter().enumerate() {
            raw.data.row_mut(row).assign(&eeg.row(k));
        }
        log::info!("applied common average reference over {} EEG channels", eeg_rows.len());
        return Ok(());
    }

    let mut ref_rows = Vec::with_capacity(ref_channels.len());
    for name in ref_channels {
        let name = name.as_ref();
        match raw.channel_index(name) {
            Some(i) => ref_rows.push(i),
            None => bail!("reference channel '{name}' not found"),
        }
    }
    let reference: Array1<f32> = raw
        .data
        .select(Axis(0), &ref_rows)
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(raw.n_times()));

    for &row in &eeg_rows {
        let mut r = raw.data.row_mut(row);
        r -= &reference;
    }

    let names: Vec<&str> = ref_channels.iter().map(|s| s.as_ref()).collect();
    log::info!(
        "re-referenced {} EEG channels to {}",
        eeg_rows.len(),
        names.join(" + ")
    );
    Ok(())
}
