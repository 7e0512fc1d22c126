//! Feature normalisation across the night.
//!
//! `zscore_columns_inplace` — per column: `(x − μ) / σ` with `ddof = 0`.
//! Constant columns are centred but not scaled.
//!
//! `smooth_triangular_centered` — centred rolling mean with triangular
//! weights; at the edges only the available samples contribute and the
//! weights are renormalised (pandas `rolling(win_type='triang',
//! center=True, min_periods=1)`).
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Z-score every column of `values` ([N, F]) in place.
/// Returns the `(mean, std)` of each column before normalisation.
pub fn zscore_columns_inplace(values: &mut Array2<f64>) -> Vec<(f64, f64)> {
    let mut params = Vec::with_capacity(values.ncols());
    for mut col in values.axis_iter_mut(Axis(1)) {
        let n = col.len() as f64;
        if n == 0.0 {
            params.push((0.0, 0.0));
            continue;
        }
        let mean = col.sum() / n;
        let var = col.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n;
        let std = var.sqrt();
        if std > 0.0 {
            col.mapv_inplace(|v| (v - mean) / std);
        } else {
            col.mapv_inplace(|v| v - mean);
        }
        params.push((mean, std));
    }
    params
}

/// Triangular window of odd length `m` (scipy `triang`).
pub fn triangular_window(m: usize) -> Vec<f64> {
    let m = m.max(1);
    let half = (m + 1) as f64 / 2.0;
    let mid = (m - 1) as f64 / 2.0;
    (0..m).map(|n| 1.0 - (n as f64 - mid).abs() / half).collect()
}

/// Centred triangular rolling mean of `x` with an odd window of `m` samples.
pub fn smooth_triangular_centered(x: ArrayView1<f64>, m: usize) -> Array1<f64> {
    let m = if m % 2 == 0 { m + 1 } else { m };
    let w = triangular_window(m);
    let half = m / 2;
    let n = x.len();
    Array1::from_shape_fn(n, |i| {
        let (mut acc, mut wsum) = (0.0, 0.0);
        for (k, &wk) in w.iter().enumerate() {
            let j = i as isize + k as isize - half as isize;
            if j >= 0 && (j as usize) < n {
                acc += wk * x[j as usize];
                wsum += wk;
            }
        }
        acc / wsum
    })
}
