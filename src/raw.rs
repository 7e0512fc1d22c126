//! In-memory continuous recording — the counterpart of MNE's `Raw` with
//! `preload=True`.
//!
//! `data` is `[C, T]` in volts.  Channel operations (drop, rename, pick)
//! follow MNE's error semantics: naming a channel that does not exist is an
//! error rather than a silent no-op.
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDateTime;
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::filter::{apply_fir_zero_phase, design_bandpass, design_highpass, design_lowpass};
use crate::resample::resample;

/// Channel type, used to decide which channels a reference or filter touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Eeg,
    Eog,
    Emg,
    Stim,
    Misc,
}

impl ChannelKind {
    /// Data channels carry physiological signal (everything but stim).
    #[inline]
    pub fn is_data(self) -> bool {
        self != ChannelKind::Stim
    }
}

impl FromStr for ChannelKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "eeg" => Ok(ChannelKind::Eeg),
            "eog" => Ok(ChannelKind::Eog),
            "emg" => Ok(ChannelKind::Emg),
            "stim" => Ok(ChannelKind::Stim),
            "misc" => Ok(ChannelKind::Misc),
            other => bail!("unknown channel kind '{other}'"),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelKind::Eeg => "eeg",
            ChannelKind::Eog => "eog",
            ChannelKind::Emg => "emg",
            ChannelKind::Stim => "stim",
            ChannelKind::Misc => "misc",
        };
        f.write_str(s)
    }
}

/// A loaded recording.
#[derive(Debug, Clone)]
pub struct Raw {
    /// Signal, `[C, T]`, volts.
    pub data:      Array2<f32>,
    pub ch_names:  Vec<String>,
    pub ch_kinds:  Vec<ChannelKind>,
    /// Sampling rate in Hz.
    pub sfreq:     f32,
    /// Recording start, if the file carried one.
    pub meas_date: Option<NaiveDateTime>,
    /// Band-pass applied so far, `(highpass, lowpass)` in Hz.
    pub highpass:  Option<f32>,
    pub lowpass:   Option<f32>,
}

impl Raw {
    pub fn new(
        data: Array2<f32>,
        ch_names: Vec<String>,
        ch_kinds: Vec<ChannelKind>,
        sfreq: f32,
    ) -> Result<Self> {
        if data.nrows() != ch_names.len() || ch_names.len() != ch_kinds.len() {
            bail!(
                "shape mismatch: {} data rows, {} names, {} kinds",
                data.nrows(),
                ch_names.len(),
                ch_kinds.len()
            );
        }
        if sfreq <= 0.0 {
            bail!("sampling rate must be positive, got {sfreq}");
        }
        let mut seen = HashSet::new();
        for name in &ch_names {
            if !seen.insert(name.as_str()) {
                bail!("duplicate channel name '{name}'");
            }
        }
        Ok(Self {
            data,
            ch_names,
            ch_kinds,
            sfreq,
            meas_date: None,
            highpass: None,
            lowpass: None,
        })
    }

    /// Attach a measurement date.
    pub fn with_meas_date(mut self, date: Option<NaiveDateTime>) -> Self {
        self.meas_date = date;
        self
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.n_times() as f64 / self.sfreq as f64
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.ch_names.iter().position(|n| n == name)
    }

    fn require_index(&self, name: &str) -> Result<usize> {
        self.channel_index(name).ok_or_else(|| {
            anyhow!("channel '{name}' not found (have: {})", self.ch_names.join(", "))
        })
    }

    /// Borrow one channel's samples.
    pub fn channel_data(&self, name: &str) -> Result<ArrayView1<'_, f32>> {
        let idx = self.require_index(name)?;
        Ok(self.data.row(idx))
    }

    /// Remove the named channels.  Every name must exist.
    pub fn drop_channels<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let mut drop = HashSet::new();
        for name in names {
            drop.insert(self.require_index(name.as_ref())?);
        }
        let keep: Vec<usize> = (0..self.n_channels()).filter(|i| !drop.contains(i)).collect();
        self.retain(&keep);
        Ok(())
    }

    /// Keep only the named channels, in their original file order.
    pub fn pick_channels<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let mut wanted = HashSet::new();
        for name in names {
            wanted.insert(self.require_index(name.as_ref())?);
        }
        let keep: Vec<usize> = (0..self.n_channels()).filter(|i| wanted.contains(i)).collect();
        self.retain(&keep);
        Ok(())
    }

    /// Rename channels `old → new`.  Every `old` must exist and the resulting
    /// names must be unique.
    pub fn rename_channels(&mut self, mapping: &BTreeMap<String, String>) -> Result<()> {
        let mut names = self.ch_names.clone();
        for (old, new) in mapping {
            let idx = self.require_index(old)?;
            names[idx] = new.clone();
        }
        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                bail!("renaming produces duplicate channel name '{name}'");
            }
        }
        self.ch_names = names;
        Ok(())
    }

    /// Override channel kinds by name.
    pub fn set_channel_kinds(&mut self, mapping: &BTreeMap<String, ChannelKind>) -> Result<()> {
        for (name, kind) in mapping {
            let idx = self.require_index(name)?;
            self.ch_kinds[idx] = *kind;
        }
        Ok(())
    }

    fn retain(&mut self, keep: &[usize]) {
        self.data = self.data.select(Axis(0), keep);
        self.ch_names = keep.iter().map(|&i| self.ch_names[i].clone()).collect();
        self.ch_kinds = keep.iter().map(|&i| self.ch_kinds[i]).collect();
    }

    /// Resample every channel to `target` Hz.  No-op within 1 mHz.
    pub fn resample(&mut self, target: f32) -> Result<()> {
        if (self.sfreq - target).abs() <= 1e-3 {
            return Ok(());
        }
        log::debug!("resampling {} Hz → {target} Hz", self.sfreq);
        self.data = resample(&self.data, self.sfreq, target)?;
        self.sfreq = target;
        // Anti-aliasing: nothing above the new Nyquist survives.
        let nyq = target / 2.0;
        self.lowpass = Some(self.lowpass.map_or(nyq, |lp| lp.min(nyq)));
        Ok(())
    }

    /// Zero-phase FIR filter of all data channels.
    ///
    /// `(Some(l), Some(h))` band-pass, `(Some(l), None)` highpass,
    /// `(None, Some(h))` lowpass, `(None, None)` does nothing.
    pub fn filter(&mut self, l_freq: Option<f32>, h_freq: Option<f32>) -> Result<()> {
        let h = match (l_freq, h_freq) {
            (Some(l), Some(h)) => design_bandpass(l, h, self.sfreq)?,
            (Some(l), None) => design_highpass(l, self.sfreq)?,
            (None, Some(h)) => design_lowpass(h, self.sfreq)?,
            (None, None) => return Ok(()),
        };
        log::debug!(
            "filtering {l_freq:?}–{h_freq:?} Hz with {} taps ({:.2} s)",
            h.len(),
            h.len() as f32 / self.sfreq
        );
        if h.len() > self.n_times() {
            log::warn!(
                "filter length {} exceeds signal length {}; edges will ring",
                h.len(),
                self.n_times()
            );
        }
        let rows: Vec<usize> = (0..self.n_channels())
            .filter(|&i| self.ch_kinds[i].is_data())
            .collect();
        apply_fir_zero_phase(&mut self.data, &h, &rows)?;
        if let Some(l) = l_freq {
            self.highpass = Some(l);
        }
        if let Some(h) = h_freq {
            self.lowpass = Some(h);
        }
        Ok(())
    }
}

impl fmt::Display for Raw {
    /// Summary in the spirit of `print(raw.info)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<Raw | {} ch × {} samples>", self.n_channels(), self.n_times())?;
        writeln!(f, "  sfreq:     {} Hz", self.sfreq)?;
        writeln!(f, "  duration:  {:.1} s", self.duration_secs())?;
        match self.meas_date {
            Some(d) => writeln!(f, "  meas_date: {d}")?,
            None => writeln!(f, "  meas_date: unspecified")?,
        }
        let band = |v: Option<f32>| v.map_or("—".to_string(), |x| format!("{x} Hz"));
        writeln!(f, "  highpass:  {}", band(self.highpass))?;
        writeln!(f, "  lowpass:   {}", band(self.lowpass))?;
        let chans: Vec<String> = self
            .ch_names
            .iter()
            .zip(&self.ch_kinds)
            .map(|(n, k)| format!("{n} ({k})"))
            .collect();
        write!(f, "  channels:  {}", chans.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw3() -> Raw {
        let data = Array2::from_shape_fn((3, 10), |(c, t)| (c * 100 + t) as f32);
        Raw::new(
            data,
            vec!["ch1".into(), "ch2".into(), "TimeStamp".into()],
            vec![ChannelKind::Eeg; 3],
            250.0,
        )
        .unwrap()
    }

    #[test]
    fn drop_keeps_remaining_rows() {
        let mut raw = raw3();
        raw.drop_channels(&["TimeStamp"]).unwrap();
        assert_eq!(raw.ch_names, vec!["ch1", "ch2"]);
        assert_eq!(raw.data[[1, 3]], 103.0);
    }

    #[test]
    fn drop_unknown_channel_is_error() {
        let mut raw = raw3();
        assert!(raw.drop_channels(&["nope"]).is_err());
        assert_eq!(raw.n_channels(), 3);
    }

    #[test]
    fn pick_preserves_file_order() {
        let mut raw = raw3();
        raw.pick_channels(&["TimeStamp", "ch1"]).unwrap();
        assert_eq!(raw.ch_names, vec!["ch1", "TimeStamp"]);
        assert_eq!(raw.data[[1, 0]], 200.0);
    }

    #[test]
    fn rename_rejects_duplicates() {
        let mut raw = raw3();
        let map: BTreeMap<String, String> =
            [("ch1".to_string(), "ch2".to_string())].into_iter().collect();
        assert!(raw.rename_channels(&map).is_err());
        assert_eq!(raw.ch_names[0], "ch1");
    }

    #[test]
    fn rename_swaps_names() {
        let mut raw = raw3();
        let map: BTreeMap<String, String> = [
            ("ch1".to_string(), "ch2".to_string()),
            ("ch2".to_string(), "ch1".to_string()),
        ]
        .into_iter()
        .collect();
        raw.rename_channels(&map).unwrap();
        assert_eq!(raw.ch_names, vec!["ch2", "ch1", "TimeStamp"]);
    }

    #[test]
    fn duplicate_names_rejected_at_construction() {
        let data = Array2::zeros((2, 4));
        let r = Raw::new(data, vec!["a".into(), "a".into()], vec![ChannelKind::Eeg; 2], 100.0);
        assert!(r.is_err());
    }

    #[test]
    fn resample_updates_rate_and_length() {
        let mut raw = raw3();
        raw.data = Array2::zeros((3, 2500));
        raw.resample(100.0).unwrap();
        assert_eq!(raw.sfreq, 100.0);
        assert_eq!(raw.n_times(), 1000);
        assert_eq!(raw.lowpass, Some(50.0));
    }

    #[test]
    fn filter_skips_stim_channels() {
        let data = Array2::from_elem((2, 2000), 1.0_f32);
        let mut raw = Raw::new(
            data,
            vec!["Fp1".into(), "Status".into()],
            vec![ChannelKind::Eeg, ChannelKind::Stim],
            100.0,
        )
        .unwrap();
        raw.filter(Some(1.0), Some(30.0)).unwrap();
        assert!(raw.data.row(1).iter().all(|&v| v == 1.0));
        assert!(raw.data[[0, 1000]].abs() < 1e-3);
        assert_eq!(raw.highpass, Some(1.0));
        assert_eq!(raw.lowpass, Some(30.0));
    }

    #[test]
    fn highpass_only_rejects_nonpositive_edge() {
        let mut raw = raw3();
        let before = raw.data.clone();
        assert!(raw.filter(Some(0.0), None).is_err());
        assert!(raw.filter(Some(-1.0), None).is_err());
        assert_eq!(raw.data, before);
        assert_eq!(raw.highpass, None);
    }

    #[test]
    fn display_lists_channels() {
        let s = raw3().to_string();
        assert!(s.contains("3 ch × 10 samples"));
        assert!(s.contains("TimeStamp (eeg)"));
    }
}
