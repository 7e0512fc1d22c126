//! Zero-phase FIR filtering by FFT overlap-add, equivalent to MNE's
//! `_overlap_add_filter`.
//!
//! The kernel is odd and symmetric, so delaying the causal convolution by
//! `(N − 1)/2` samples gives zero phase in a single pass (no filtfilt).  Each
//! row is first extended by `N − 1` samples of odd reflection on both sides
//! to tame the edge transient, and the extension is cut off afterwards.
use std::sync::Arc;

use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView1};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// A kernel prepared for rows of one length: block size, kernel spectrum
/// and FFT plans are computed once.
pub struct OverlapAdd {
    n_taps:   usize,
    n_x:      usize,
    n_fft:    usize,
    spectrum: Vec<Complex<f32>>,
    forward:  Arc<dyn Fft<f32>>,
    inverse:  Arc<dyn Fft<f32>>,
}

impl OverlapAdd {
    pub fn new(h: &[f32], n_x: usize) -> Result<Self> {
        if h.len() % 2 == 0 {
            bail!("zero-phase filtering needs an odd kernel, got {} taps", h.len());
        }
        let ext_len = n_x + 2 * (h.len() - 1);
        let n_fft = fft_block_len(h.len(), ext_len);
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(n_fft);
        let inverse = planner.plan_fft_inverse(n_fft);

        let mut spectrum = vec![Complex::<f32>::default(); n_fft];
        for (b, &c) in spectrum.iter_mut().zip(h) {
            b.re = c;
        }
        forward.process(&mut spectrum);
        Ok(Self { n_taps: h.len(), n_x, n_fft, spectrum, forward, inverse })
    }

    /// Filter one row of the planned length.
    pub fn process(&self, x: &[f32]) -> Result<Vec<f32>> {
        if x.len() != self.n_x {
            bail!("filter planned for {} samples, got {}", self.n_x, x.len());
        }
        if x.is_empty() {
            return Ok(Vec::new());
        }
        let edge = self.n_taps - 1;
        let delay = edge / 2;
        let ext = reflect_limited_pad(x, edge, edge);
        let block = self.n_fft - self.n_taps + 1;
        let scale = 1.0 / self.n_fft as f32;

        let mut acc = vec![0.0_f32; ext.len()];
        let mut buf = vec![Complex::<f32>::default(); self.n_fft];
        for start in (0..ext.len()).step_by(block) {
            let stop = (start + block).min(ext.len());
            buf.fill(Complex::default());
            for (b, &v) in buf.iter_mut().zip(&ext[start..stop]) {
                b.re = v;
            }
            self.forward.process(&mut buf);
            for (b, h) in buf.iter_mut().zip(&self.spectrum) {
                *b *= *h;
            }
            self.inverse.process(&mut buf);

            // Output sample o receives convolution sample o + delay.
            let first = start.saturating_sub(delay);
            let offset = delay.saturating_sub(start);
            for (o, b) in acc[first..].iter_mut().zip(&buf[offset..]) {
                *o += b.re * scale;
            }
        }
        Ok(acc[edge..edge + self.n_x].to_vec())
    }
}

/// Filter the rows of `data` (`[C, T]`) listed in `rows` in place.
pub fn apply_fir_zero_phase(data: &mut Array2<f32>, h: &[f32], rows: &[usize]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let ola = OverlapAdd::new(h, data.ncols())?;
    for &r in rows {
        if r >= data.nrows() {
            bail!("row {r} out of range for {} channels", data.nrows());
        }
        let x = data.row(r).to_vec();
        let y = ola.process(&x)?;
        data.row_mut(r).assign(&ArrayView1::from(&y));
    }
    Ok(())
}

/// Filter a single signal; same length out as in.
pub fn filter_1d(x: &[f32], h: &[f32]) -> Result<Vec<f32>> {
    OverlapAdd::new(h, x.len())?.process(x)
}

/// Odd reflection about the end samples (MNE's `_smart_pad`):
/// `2·x[0] − x[i]` on the left, `2·x[n−1] − x[n−1−i]` on the right.
/// Padding requested beyond `n − 1` samples is zero.
pub(crate) fn reflect_limited_pad(x: &[f32], n_l: usize, n_r: usize) -> Vec<f32> {
    let n = x.len();
    if n == 0 {
        return vec![0.0; n_l + n_r];
    }
    let refl_l = n_l.min(n - 1);
    let refl_r = n_r.min(n - 1);
    let (first, last) = (x[0], x[n - 1]);

    let mut out = Vec::with_capacity(n_l + n + n_r);
    out.resize(n_l - refl_l, 0.0);
    out.extend((1..=refl_l).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=refl_r).map(|i| 2.0 * last - x[n - 1 - i]));
    out.resize(out.len() + (n_r - refl_r), 0.0);
    out
}

/// Power-of-two block size minimising MNE's overlap-add cost model:
/// `⌈n_x / (N − n_h + 1)⌉ · N · (log2 N + 1) + 4e-5 · N · n_x`.
fn fft_block_len(n_h: usize, n_x: usize) -> usize {
    let min_pow = (2 * n_h - 1).next_power_of_two().trailing_zeros();
    let max_pow = n_x.next_power_of_two().trailing_zeros() + 1;
    (min_pow..=max_pow.max(min_pow))
        .map(|p| {
            let n = 1usize << p;
            let blocks = (n_x as f64 / (n - n_h + 1) as f64).ceil();
            let cost = blocks * n as f64 * (p as f64 + 1.0) + 4e-5 * n as f64 * n_x as f64;
            (n, cost)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(1 << min_pow, |(n, _)| n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::design::{design_bandpass, design_highpass};

    #[test]
    fn filter_preserves_length() {
        let x: Vec<f32> = (0..1024).map(|i| (i as f32 / 1024.0).sin()).collect();
        let h = design_highpass(0.5, 256.0).unwrap();
        let y = filter_1d(&x, &h).unwrap();
        assert_eq!(y.len(), x.len());
    }

    #[test]
    fn filter_removes_dc() {
        // A constant signal should become zero after band-pass filtering.
        let x = vec![1.0_f32; 4096];
        let h = design_bandpass(0.5, 30.0, 100.0).unwrap();
        let y = filter_1d(&x, &h).unwrap();
        // Skip edges (transient region = filter length).
        let n_h = h.len();
        let interior = &y[n_h..y.len() - n_h];
        let max_val: f32 = interior.iter().map(|v| v.abs()).fold(0.0_f32, f32::max);
        assert!(max_val < 1e-3, "DC not removed: max={max_val}");
    }

    #[test]
    fn reflect_limited_left_pad() {
        let x = [1.0_f32, 2.0, 3.0, 4.0, 5.0];
        let padded = reflect_limited_pad(&x, 3, 0);
        // left pad: 2*1 - x[3]=4 → -2, 2*1 - x[2]=3 → -1, 2*1 - x[1]=2 → 0
        assert_eq!(&padded[..3], &[-2.0_f32, -1.0, 0.0]);
        assert_eq!(&padded[3..], &x[..]);
    }

    #[test]
    fn reflect_limited_pad_zero_fills_past_signal() {
        let x = [1.0_f32, 2.0, 3.0];
        let padded = reflect_limited_pad(&x, 4, 3);
        // 2 reflected samples per side, the rest zeros.
        assert_eq!(padded, vec![0.0, 0.0, -1.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 0.0]);
    }

    #[test]
    fn block_len_fits_kernel() {
        let n = fft_block_len(3301, 100_000);
        assert!(n.is_power_of_two());
        assert!(n >= 2 * 3301 - 1);
    }

    #[test]
    fn even_kernel_rejected() {
        assert!(filter_1d(&[1.0; 16], &[0.5, 0.5]).is_err());
    }

    #[test]
    fn identity_kernel_is_passthrough() {
        let x: Vec<f32> = (0..300).map(|i| (i as f32 * 0.37).sin()).collect();
        let y = filter_1d(&x, &[0.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
        for (a, b) in x.iter().zip(&y) {
            approx::assert_abs_diff_eq!(a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn apply_touches_only_listed_rows() {
        let mut data = Array2::from_elem((2, 2048), 1.0_f32);
        let h = design_highpass(1.0, 100.0).unwrap();
        apply_fir_zero_phase(&mut data, &h, &[0]).unwrap();
        assert!(data[[0, 1024]].abs() < 1e-3);
        assert!(data.row(1).iter().all(|&v| v == 1.0));
    }
}
