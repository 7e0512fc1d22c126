//! Power spectral estimates.
//!
//! - [`welch`]: Welch PSD with a periodic Hann window, 50 % overlap,
//!   constant detrend and density scaling (`scipy.signal.welch` defaults).
//! - [`bandpower`]: trapezoidal integral of a PSD over `[lo, hi]`.
//! - [`spectrogram`]: non-overlapping Hann windows, one-sided density in dB.
use anyhow::{bail, Result};
use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// Periodic Hann window (`scipy.signal.get_window('hann', n)`).
pub fn hann(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

/// Frequencies of a one-sided spectrum of length `n / 2 + 1`.
pub fn rfft_freqs(n: usize, sfreq: f64) -> Vec<f64> {
    (0..=n / 2).map(|k| k as f64 * sfreq / n as f64).collect()
}

/// Reusable single-segment periodogram.
struct Periodogram {
    n:      usize,
    window: Vec<f64>,
    scale:  f64,
    fft:    std::sync::Arc<dyn rustfft::Fft<f64>>,
    buf:    Vec<Complex<f64>>,
}

impl Periodogram {
    fn new(n: usize, sfreq: f64) -> Self {
        let window = hann(n);
        let wss: f64 = window.iter().map(|w| w * w).sum();
        let mut planner = FftPlanner::<f64>::new();
        Self {
            n,
            scale: 1.0 / (sfreq * wss),
            window,
            fft: planner.plan_fft_forward(n),
            buf: vec![Complex::default(); n],
        }
    }

    /// Add this segment's one-sided density to `acc` (length `n / 2 + 1`).
    fn accumulate(&mut self, seg: &[f32], acc: &mut [f64]) {
        let mean = seg.iter().map(|&v| v as f64).sum::<f64>() / self.n as f64;
        for ((b, &x), &w) in self.buf.iter_mut().zip(seg).zip(&self.window) {
            *b = Complex { re: (x as f64 - mean) * w, im: 0.0 };
        }
        self.fft.process(&mut self.buf);
        let last = self.n / 2;
        for (k, a) in acc.iter_mut().enumerate() {
            let mut p = self.buf[k].norm_sqr() * self.scale;
            // Fold negative frequencies in, except DC and (even n) Nyquist.
            if k != 0 && !(self.n % 2 == 0 && k == last) {
                p *= 2.0;
            }
            *a += p;
        }
    }
}

/// Welch power spectral density of `x`.
///
/// `nperseg` is clipped to the signal length.  Returns `(freqs, psd)` with
/// `psd` in `unit² / Hz`.
pub fn welch(x: &[f32], sfreq: f64, nperseg: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    if x.is_empty() {
        bail!("welch: empty signal");
    }
    let nperseg = nperseg.clamp(1, x.len());
    let step = (nperseg - nperseg / 2).max(1);
    let mut pg = Periodogram::new(nperseg, sfreq);
    let mut psd = vec![0.0; nperseg / 2 + 1];
    let mut n_seg = 0usize;
    let mut start = 0usize;
    while start + nperseg <= x.len() {
        pg.accumulate(&x[start..start + nperseg], &mut psd);
        n_seg += 1;
        start += step;
    }
    psd.iter_mut().for_each(|p| *p /= n_seg as f64);
    Ok((rfft_freqs(nperseg, sfreq), psd))
}

/// Integrate `psd` over `[lo, hi]` Hz with the trapezoid rule.
pub fn bandpower(freqs: &[f64], psd: &[f64], lo: f64, hi: f64) -> f64 {
    let mut total = 0.0;
    for k in 1..freqs.len() {
        let (f0, f1) = (freqs[k - 1], freqs[k]);
        if f0 >= lo && f1 <= hi {
            total += 0.5 * (psd[k - 1] + psd[k]) * (f1 - f0);
        }
    }
    total
}

/// Time–frequency power map.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    /// Bin centre frequencies (Hz), length F.
    pub freqs:    Vec<f64>,
    /// Window centre times (s), length N.
    pub times:    Vec<f64>,
    /// Power in dB, `[F, N]`.
    pub power_db: Array2<f64>,
}

impl Spectrogram {
    /// Keep only frequency bins within `[fmin, fmax]`.
    pub fn crop_freqs(&self, fmin: f64, fmax: f64) -> Spectrogram {
        let keep: Vec<usize> = self
            .freqs
            .iter()
            .enumerate()
            .filter(|(_, f)| **f >= fmin && **f <= fmax)
            .map(|(i, _)| i)
            .collect();
        Spectrogram {
            freqs: keep.iter().map(|&i| self.freqs[i]).collect(),
            times: self.times.clone(),
            power_db: self.power_db.select(ndarray::Axis(0), &keep),
        }
    }

    /// Value at percentile `q` (0–100) of all finite cells, linear
    /// interpolation between order statistics.
    pub fn percentile(&self, q: f64) -> f64 {
        let mut v: Vec<f64> = self.power_db.iter().copied().filter(|x| x.is_finite()).collect();
        if v.is_empty() {
            return f64::NAN;
        }
        v.sort_by(|a, b| a.total_cmp(b));
        let pos = (q / 100.0).clamp(0.0, 1.0) * (v.len() - 1) as f64;
        let (lo, hi) = (pos.floor() as usize, pos.ceil() as usize);
        v[lo] + (v[hi] - v[lo]) * (pos - lo as f64)
    }
}

/// Spectrogram with non-overlapping windows of `win_sec` seconds.
pub fn spectrogram(x: &[f32], sfreq: f64, win_sec: f64) -> Result<Spectrogram> {
    let nperseg = (win_sec * sfreq).round() as usize;
    if nperseg < 2 {
        bail!("spectrogram window of {win_sec} s at {sfreq} Hz is shorter than 2 samples");
    }
    if x.len() < nperseg {
        bail!(
            "signal of {} samples is shorter than one {win_sec} s window",
            x.len()
        );
    }
    let n_win = x.len() / nperseg;
    let n_freq = nperseg / 2 + 1;
    let mut pg = Periodogram::new(nperseg, sfreq);
    let mut power_db = Array2::<f64>::zeros((n_freq, n_win));
    let mut col = vec![0.0; n_freq];
    for j in 0..n_win {
        col.iter_mut().for_each(|c| *c = 0.0);
        pg.accumulate(&x[j * nperseg..(j + 1) * nperseg], &mut col);
        for (i, &p) in col.iter().enumerate() {
            power_db[[i, j]] = 10.0 * p.max(f64::MIN_POSITIVE).log10();
        }
    }
    let times = (0..n_win)
        .map(|j| (j as f64 + 0.5) * nperseg as f64 / sfreq)
        .collect();
    Ok(Spectrogram { freqs: rfft_freqs(nperseg, sfreq), times, power_db })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, amp: f64, sfreq: f64, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (amp * (2.0 * PI * freq * i as f64 / sfreq).sin()) as f32)
            .collect()
    }

    #[test]
    fn welch_integrates_to_signal_power() {
        // A sine of amplitude A has power A² / 2.
        let x = sine(10.0, 2.0, 100.0, 3000);
        let (f, p) = welch(&x, 100.0, 400).unwrap();
        let total = bandpower(&f, &p, 0.0, 50.0);
        approx::assert_abs_diff_eq!(total, 2.0, epsilon = 0.05);
    }

    #[test]
    fn welch_peak_at_tone_frequency() {
        let x = sine(6.0, 1.0, 100.0, 3000);
        let (f, p) = welch(&x, 100.0, 400).unwrap();
        let k = p
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        approx::assert_abs_diff_eq!(f[k], 6.0, epsilon = 0.25);
    }

    #[test]
    fn bandpower_separates_bands() {
        let x: Vec<f32> = sine(2.0, 1.0, 100.0, 3000)
            .iter()
            .zip(sine(20.0, 0.5, 100.0, 3000))
            .map(|(a, b)| a + b)
            .collect();
        let (f, p) = welch(&x, 100.0, 400).unwrap();
        let delta = bandpower(&f, &p, 0.5, 4.0);
        let beta = bandpower(&f, &p, 16.0, 30.0);
        approx::assert_abs_diff_eq!(delta, 0.5, epsilon = 0.05);
        approx::assert_abs_diff_eq!(beta, 0.125, epsilon = 0.02);
    }

    #[test]
    fn spectrogram_shape_and_crop() {
        let x = sine(10.0, 1.0, 100.0, 100 * 95);
        let s = spectrogram(&x, 100.0, 30.0).unwrap();
        assert_eq!(s.times.len(), 3);
        assert_eq!(s.freqs.len(), 1501);
        assert_eq!(s.power_db.dim(), (1501, 3));
        let c = s.crop_freqs(0.5, 25.0);
        assert!(c.freqs.first().unwrap() >= &0.5);
        assert!(c.freqs.last().unwrap() <= &25.0);
        assert_eq!(c.power_db.nrows(), c.freqs.len());
    }

    #[test]
    fn percentile_interpolates() {
        let s = Spectrogram {
            freqs: vec![1.0],
            times: vec![0.0, 1.0, 2.0, 3.0, 4.0],
            power_db: Array2::from_shape_vec((1, 5), vec![4.0, 0.0, 1.0, 3.0, 2.0]).unwrap(),
        };
        assert_eq!(s.percentile(50.0), 2.0);
        assert_eq!(s.percentile(0.0), 0.0);
        assert_eq!(s.percentile(100.0), 4.0);
        approx::assert_abs_diff_eq!(s.percentile(12.5), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn short_signal_rejected() {
        assert!(spectrogram(&[0.0; 100], 100.0, 30.0).is_err());
        assert!(welch(&[], 100.0, 10).is_err());
    }
}
