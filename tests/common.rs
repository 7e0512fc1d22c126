/// Shared helpers for integration tests: synthetic signals and temporary
/// BDF/EDF files.
use ndarray::Array2;
use somno::bdf::{BdfWriter, FileFormat};
use somno::synth::{demo_stages, synth_night};
use std::path::{Path, PathBuf};

#[allow(unused)]
pub fn sine(freq: f64, amp: f64, sfreq: f64, n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| (amp * (2.0 * std::f64::consts::PI * freq * i as f64 / sfreq).sin()) as f32)
        .collect()
}

#[allow(unused)]
pub fn rms(x: &[f32]) -> f32 {
    (x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32).sqrt()
}

#[allow(unused)]
/// Maximum absolute difference between two slices.
pub fn max_abs_diff(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0_f32, f32::max)
}

#[allow(unused)]
/// Write `data` (`[C, T]` volts) to `dir/name`.
pub fn write_file(
    dir: &Path,
    name: &str,
    format: FileFormat,
    data: &Array2<f32>,
    labels: &[&str],
    sfreq: f64,
) -> PathBuf {
    let path = dir.join(name);
    BdfWriter::new(format).write(&path, data, labels, sfreq).unwrap();
    path
}

#[allow(unused)]
/// Synthetic Mentalab-style night of `n_epochs` epochs as a BDF file.
pub fn write_synth_night(dir: &Path, n_epochs: usize, sfreq: f64) -> PathBuf {
    let night = synth_night(&demo_stages(n_epochs), sfreq, 11);
    let path = dir.join("night.bdf");
    BdfWriter::new(FileFormat::Bdf)
        .write(&path, &night.data, &night.labels, night.sfreq)
        .unwrap();
    path
}

#[allow(unused)]
/// Overwrite `value` (space-padded) at byte `offset` of an existing file.
pub fn patch_header(path: &Path, offset: usize, width: usize, value: &str) {
    let mut bytes = std::fs::read(path).unwrap();
    let mut field = value.as_bytes().to_vec();
    field.resize(width, b' ');
    bytes[offset..offset + width].copy_from_slice(&field);
    std::fs::write(path, bytes).unwrap();
}
