//! FIR filter design matching MNE / `scipy.signal.firwin`.
//!
//! Transition bandwidths follow MNE's `'auto'` rules:
//!   • highpass edge:  `l_trans = min(max(0.25 · l_freq, 2), l_freq)`
//!   • lowpass edge:   `h_trans = min(max(0.25 · h_freq, 2), sfreq/2 − h_freq)`
//!   • filter length   `N = ⌈3.3 / min(trans) · sfreq⌉`, rounded up to odd
//!   • cutoffs sit at the midpoint of each transition band (−6 dB point)
//!
//! All kernels are Hamming-windowed sincs.  Band-pass is the difference of
//! two lowpass kernels of equal length, so it has exactly zero DC gain.
use anyhow::{bail, Result};
use std::f64::consts::PI;

/// MNE transition bandwidth for a highpass edge.
///
/// Rule: `min(max(0.25 * l_freq, 2.0), l_freq)`
pub fn auto_trans_bandwidth(l_freq: f32) -> f32 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// MNE transition bandwidth for a lowpass edge.
///
/// Rule: `min(max(0.25 * h_freq, 2.0), sfreq / 2 - h_freq)`
pub fn auto_trans_bandwidth_high(h_freq: f32, sfreq: f32) -> f32 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq)
}

/// Number of FIR taps for a given transition bandwidth, always odd.
///
/// Formula: `ceil(3.3 / trans_bw * sfreq)` rounded up to odd.  Evaluated in
/// f64 so that e.g. 0.1 Hz at 100 Hz gives MNE's 3301 taps.
pub fn auto_filter_length(trans_bw: f32, sfreq: f32) -> usize {
    let n_raw = (3.3 / trans_bw as f64 * sfreq as f64).ceil() as usize;
    if n_raw % 2 == 0 { n_raw + 1 } else { n_raw }
}

/// Zero-phase highpass.
///
/// Matches `mne.filter.create_filter(l_freq=l_freq, h_freq=None,
///   fir_window='hamming', fir_design='firwin', phase='zero')`.
pub fn design_highpass(l_freq: f32, sfreq: f32) -> Result<Vec<f32>> {
    check_highpass_edge(l_freq)?;
    if l_freq >= sfreq / 2.0 {
        bail!("highpass edge {l_freq} Hz must lie below Nyquist ({} Hz)", sfreq / 2.0);
    }
    let trans_bw = auto_trans_bandwidth(l_freq);
    let n = auto_filter_length(trans_bw, sfreq);
    let cutoff_hz = l_freq - trans_bw / 2.0;
    let h = firwin(n, cutoff_hz, sfreq, false);
    Ok(h.iter().map(|&v| v as f32).collect())
}

/// Zero-phase lowpass.  Fails if `h_freq` is not below Nyquist.
pub fn design_lowpass(h_freq: f32, sfreq: f32) -> Result<Vec<f32>> {
    check_below_nyquist(h_freq, sfreq)?;
    let trans_bw = auto_trans_bandwidth_high(h_freq, sfreq);
    let n = auto_filter_length(trans_bw, sfreq);
    let cutoff_hz = h_freq + trans_bw / 2.0;
    let h = firwin(n, cutoff_hz, sfreq, true);
    Ok(h.iter().map(|&v| v as f32).collect())
}

/// Zero-phase band-pass `[l_freq, h_freq]`.
///
/// At the staging defaults (0.1–45 Hz @ 100 Hz) the highpass edge dominates:
/// `l_trans = 0.1 Hz` gives a 3 301-tap (33 s) kernel.
pub fn design_bandpass(l_freq: f32, h_freq: f32, sfreq: f32) -> Result<Vec<f32>> {
    check_highpass_edge(l_freq)?;
    if l_freq >= h_freq {
        bail!("highpass edge {l_freq} Hz must lie below lowpass edge {h_freq} Hz");
    }
    check_below_nyquist(h_freq, sfreq)?;

    let l_trans = auto_trans_bandwidth(l_freq);
    let h_trans = auto_trans_bandwidth_high(h_freq, sfreq);
    let n = auto_filter_length(l_trans.min(h_trans), sfreq);

    let lo = firwin(n, l_freq - l_trans / 2.0, sfreq, true);
    let hi = firwin(n, h_freq + h_trans / 2.0, sfreq, true);
    Ok(hi.iter().zip(&lo).map(|(&a, &b)| (a - b) as f32).collect())
}

fn check_highpass_edge(l_freq: f32) -> Result<()> {
    if !(l_freq > 0.0) {
        bail!("highpass edge must be positive, got {l_freq} Hz");
    }
    Ok(())
}

fn check_below_nyquist(h_freq: f32, sfreq: f32) -> Result<()> {
    if h_freq >= sfreq / 2.0 {
        bail!("lowpass edge {h_freq} Hz must lie below Nyquist ({} Hz)", sfreq / 2.0);
    }
    Ok(())
}

/// Hamming-windowed sinc lowpass (or highpass with `pass_zero = false`).
///
/// `cutoff_hz` is the −6 dB point.
pub fn firwin(n: usize, cutoff_hz: f32, sfreq: f32, pass_zero: bool) -> Vec<f64> {
    assert!(n % 2 == 1, "firwin requires odd N for linear-phase filter");
    let alpha = (n - 1) as f64 / 2.0;
    let nyq = sfreq as f64 / 2.0;
    let fc = cutoff_hz as f64 / nyq;

    let win = hamming(n);

    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            // lim_{x→0} sin(π·fc·x) / (π·x) = fc
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();

    // Unit DC gain.
    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);

    if !pass_zero {
        // Spectral inversion.
        h.iter_mut().for_each(|v| *v = -*v);
        h[n / 2] += 1.0;
    }

    h
}

/// Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Magnitude response of `h` at `freq` Hz (direct DTFT evaluation).
pub fn gain_at(h: &[f32], freq: f32, sfreq: f32) -> f64 {
    let w = 2.0 * PI * freq as f64 / sfreq as f64;
    let (re, im) = h.iter().enumerate().fold((0.0, 0.0), |(re, im), (k, &c)| {
        let phi = w * k as f64;
        (re + c as f64 * phi.cos(), im - c as f64 * phi.sin())
    });
    (re * re + im * im).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_length_is_odd() {
        for l_freq in [0.1_f32, 0.5, 1.0, 2.0, 5.0] {
            let tb = auto_trans_bandwidth(l_freq);
            let n  = auto_filter_length(tb, 100.0);
            assert!(n % 2 == 1, "N={n} is even for l_freq={l_freq}");
        }
    }

    #[test]
    fn highpass_known_length_256hz() {
        // At 256 Hz / 0.5 Hz: MNE produces 1691 taps.
        assert_eq!(design_highpass(0.5, 256.0).unwrap().len(), 1691);
    }

    #[test]
    fn highpass_edge_outside_band_rejected() {
        assert!(design_highpass(0.0, 100.0).is_err());
        assert!(design_highpass(-1.0, 100.0).is_err());
        assert!(design_highpass(f32::NAN, 100.0).is_err());
        assert!(design_highpass(50.0, 100.0).is_err());
    }

    #[test]
    fn bandpass_known_length_100hz() {
        // 0.1–45 Hz @ 100 Hz: l_trans = 0.1, h_trans = 5 → 3301 taps.
        assert_eq!(design_bandpass(0.1, 45.0, 100.0).unwrap().len(), 3301);
    }

    #[test]
    fn highpass_sum_near_zero() {
        let h = design_highpass(0.5, 256.0).unwrap();
        let s: f32 = h.iter().sum();
        assert!(s.abs() < 1e-5, "highpass sum = {s}");
    }

    #[test]
    fn bandpass_is_symmetric_with_zero_dc() {
        let h = design_bandpass(0.3, 35.0, 100.0).unwrap();
        let n = h.len();
        for i in 0..n / 2 {
            approx::assert_abs_diff_eq!(h[i], h[n - 1 - i], epsilon = 1e-7_f32);
        }
        let s: f32 = h.iter().sum();
        assert!(s.abs() < 1e-5, "bandpass DC gain = {s}");
    }

    #[test]
    fn bandpass_passes_mid_band_and_stops_edges() {
        let h = design_bandpass(1.0, 30.0, 100.0).unwrap();
        approx::assert_abs_diff_eq!(gain_at(&h, 10.0, 100.0), 1.0, epsilon = 1e-2);
        assert!(gain_at(&h, 45.0, 100.0) < 1e-2);
        assert!(gain_at(&h, 0.0, 100.0) < 1e-4);
    }

    #[test]
    fn lowpass_half_gain_at_cutoff() {
        let h = design_lowpass(20.0, 100.0).unwrap();
        // cutoff sits half a transition band above h_freq: 20 + 5/2
        approx::assert_abs_diff_eq!(gain_at(&h, 22.5, 100.0), 0.5, epsilon = 2e-2);
    }

    #[test]
    fn rejects_edges_at_or_above_nyquist() {
        assert!(design_lowpass(50.0, 100.0).is_err());
        assert!(design_bandpass(0.1, 55.0, 100.0).is_err());
        assert!(design_bandpass(20.0, 10.0, 100.0).is_err());
    }

    #[test]
    fn lowpass_dc_gain_unity() {
        let h = firwin(101, 10.0, 256.0, true);
        let dc: f64 = h.iter().sum();
        approx::assert_abs_diff_eq!(dc, 1.0, epsilon = 1e-9);
    }
}
