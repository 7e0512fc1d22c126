//! Fixed-length epoching.
//!
//! Splits a continuous signal into non-overlapping windows of
//! `epoch_samples` samples, dropping any trailing incomplete window.  Sleep
//! scoring uses 30 s windows.
use ndarray::{s, Array2, ArrayView1};

/// Standard sleep-scoring epoch length in seconds.
pub const EPOCH_SECS: f64 = 30.0;

/// Number of samples in one epoch of `epoch_secs` at `sfreq`.
pub fn epoch_samples(epoch_secs: f64, sfreq: f32) -> usize {
    (epoch_secs * sfreq as f64).round() as usize
}

/// Number of complete epochs in `n_times` samples.
#[inline]
pub fn n_epochs(n_times: usize, epoch_samples: usize) -> usize {
    if epoch_samples == 0 { 0 } else { n_times / epoch_samples }
}

/// Cut `signal` into a `[E, epoch_samples]` array, one row per epoch.
pub fn epoch_rows(signal: ArrayView1<f32>, epoch_samples: usize) -> Array2<f32> {
    let n_e = n_epochs(signal.len(), epoch_samples);
    let mut out = Array2::<f32>::zeros((n_e, epoch_samples));
    for e in 0..n_e {
        let start = e * epoch_samples;
        out.row_mut(e).assign(&signal.slice(s![start..start + epoch_samples]));
    }
    out
}
