//! FFT resampling, numerically equivalent to MNE's `resample(method='fft')`.
//!
//! Each row is extended by odd reflection to a power-of-two friendly length,
//! transformed, cut or zero-extended in the frequency domain, transformed
//! back and trimmed to `round(n · ratio)` samples:
//!
//! ```text
//! x ──pad──▶ X = FFT(x_ext) ──nyquist fix, × n'/n──▶ IFFT_{n'} ──trim──▶ y
//! ```
//!
//! The Nyquist bin of the shorter spectrum is doubled when downsampling and
//! halved when upsampling, matching `scipy.fft.irfft` on a half spectrum.
use std::sync::Arc;

use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView1};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::filter::apply::reflect_limited_pad;

/// MNE's `npad='auto'`: enough samples to reach the next power of two, with
/// at least `2·min(n/8, 100)` added.  Returned as `(left, right)`.
pub fn auto_npad(n: usize) -> (usize, usize) {
    let min_add = (n / 8).min(100) * 2;
    let target = (n + min_add).next_power_of_two();
    let total = target - n;
    (total / 2, total - total / 2)
}

/// Resampler for rows of one fixed length; the FFT plans are shared by all
/// rows.
pub struct FftResampler {
    ratio:   f64,
    n_in:    usize,
    n_out:   usize,
    pad:     (usize, usize),
    ext_out: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl FftResampler {
    /// Plan resampling of `n_in`-sample rows by `ratio = dst / src`.
    pub fn new(n_in: usize, ratio: f64) -> Result<Self> {
        if n_in == 0 {
            bail!("cannot resample an empty signal");
        }
        if !(ratio > 0.0 && ratio.is_finite()) {
            bail!("resampling ratio must be positive, got {ratio}");
        }
        let (l, r) = auto_npad(n_in);
        // Reflection cannot reach further than the signal itself.
        let pad = (l.min(n_in - 1), r.min(n_in - 1));
        let ext_in = n_in + pad.0 + pad.1;
        let ext_out = (ratio * ext_in as f64).round() as usize;
        if ext_out == 0 {
            bail!("resampling {n_in} samples by {ratio} leaves nothing");
        }
        let mut planner = FftPlanner::<f64>::new();
        Ok(Self {
            ratio,
            n_in,
            n_out: (ratio * n_in as f64).round() as usize,
            pad,
            ext_out,
            forward: planner.plan_fft_forward(ext_in),
            inverse: planner.plan_fft_inverse(ext_out),
        })
    }

    /// Output length per row.
    #[inline]
    pub fn output_len(&self) -> usize {
        self.n_out
    }

    /// Resample one row.
    pub fn process(&self, x: ArrayView1<f32>) -> Result<Vec<f32>> {
        if x.len() != self.n_in {
            bail!("planned for {} samples, got {}", self.n_in, x.len());
        }
        let samples: Vec<f32> = x.iter().copied().collect();
        let ext = reflect_limited_pad(&samples, self.pad.0, self.pad.1);
        let ext_in = ext.len();
        let ext_out = self.ext_out;

        let mut spec: Vec<Complex<f64>> = ext.iter().map(|&v| Complex::new(v as f64, 0.0)).collect();
        self.forward.process(&mut spec);

        // Work on the half spectrum, as irfft would see it.
        let mut half: Vec<Complex<f64>> = spec[..ext_in / 2 + 1].to_vec();
        let downsampling = ext_out < ext_in;
        let shorter = ext_out.min(ext_in);
        if shorter % 2 == 0 {
            if let Some(bin) = half.get_mut(shorter / 2) {
                *bin *= if downsampling { 2.0 } else { 0.5 };
            }
        }
        let gain = ext_out as f64 / ext_in as f64;

        // Hermitian spectrum of the output length.
        let out_half = ext_out / 2 + 1;
        let mut full = vec![Complex::<f64>::default(); ext_out];
        for (k, bin) in half.iter().take(out_half).enumerate() {
            full[k] = *bin * gain;
        }
        for k in 1..out_half {
            let mirror = ext_out - k;
            if mirror >= out_half {
                full[mirror] = full[k].conj();
            }
        }
        self.inverse.process(&mut full);

        let norm = 1.0 / ext_out as f64;
        let skip = ((self.ratio * self.pad.0 as f64).round() as usize).min(ext_out);
        let end = (skip + self.n_out).min(ext_out);
        let mut y: Vec<f32> = full[skip..end].iter().map(|c| (c.re * norm) as f32).collect();
        y.resize(self.n_out, 0.0);
        Ok(y)
    }
}

/// Resample every row of `data` (`[C, T]`) from `src_sfreq` to `dst_sfreq`.
pub fn resample(data: &Array2<f32>, src_sfreq: f32, dst_sfreq: f32) -> Result<Array2<f32>> {
    if (src_sfreq - dst_sfreq).abs() < 1e-6 {
        return Ok(data.clone());
    }
    if data.ncols() == 0 {
        return Ok(Array2::zeros((data.nrows(), 0)));
    }
    let resampler = FftResampler::new(data.ncols(), dst_sfreq as f64 / src_sfreq as f64)?;
    let mut out = Array2::<f32>::zeros((data.nrows(), resampler.output_len()));
    for (row, mut dst) in data.rows().into_iter().zip(out.rows_mut()) {
        let y = resampler.process(row)?;
        dst.assign(&ArrayView1::from(&y));
    }
    Ok(out)
}
