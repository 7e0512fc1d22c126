//! PNG figures: hypnogram + spectrogram, and classifier confidence.
//!
//! Built on the `plotters` bitmap backend.  Axis text needs a font backend
//! and is only drawn with the `fonts` feature; without it the label areas
//! are left out, so figures render on headless machines without fontconfig.
use std::path::Path;

use anyhow::{anyhow, bail, Result};
use plotters::prelude::*;

use crate::spectral::spectrogram;

/// Options for [`plot_spectrogram`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrogramOptions {
    /// Lowest frequency shown, Hz.
    pub fmin:    f64,
    /// Highest frequency shown, Hz.
    pub fmax:    f64,
    /// Spectrogram window, seconds.
    pub win_sec: f64,
    /// Image size in pixels.
    pub size:    (u32, u32),
}

impl Default for SpectrogramOptions {
    fn default() -> Self {
        Self { fmin: 0.5, fmax: 25.0, win_sec: 30.0, size: (1400, 800) }
    }
}

const DRAW_TEXT: bool = cfg!(feature = "fonts");

/// Label area size, zero when no text can be drawn.
fn label_area(px: u32) -> u32 {
    if DRAW_TEXT { px } else { 0 }
}

/// Stages from the top of the hypnogram panel to the bottom.
const HYPNO_ROWS: [(i8, &str); 5] = [(0, "W"), (4, "REM"), (1, "N1"), (2, "N2"), (3, "N3")];

/// Vertical position of a stage code, `None` for artefact / unscored.
fn hypno_level(code: i8) -> Option<f64> {
    HYPNO_ROWS
        .iter()
        .position(|&(c, _)| c == code)
        .map(|row| (HYPNO_ROWS.len() - 1 - row) as f64)
}

fn plot_err<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("plotting failed: {e}")
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Reversed red–blue diverging map: 0 → blue, 0.5 → white, 1 → red.
pub fn rdbu_r(x: f64) -> RGBColor {
    const LOW: (f64, f64, f64) = (33.0, 102.0, 172.0);
    const MID: (f64, f64, f64) = (247.0, 247.0, 247.0);
    const HIGH: (f64, f64, f64) = (178.0, 24.0, 43.0);
    let x = if x.is_finite() { x.clamp(0.0, 1.0) } else { 0.5 };
    let (a, b, t) = if x < 0.5 { (LOW, MID, x * 2.0) } else { (MID, HIGH, (x - 0.5) * 2.0) };
    let lerp = |u: f64, v: f64| (u + (v - u) * t).round() as u8;
    RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

/// Constant-stage runs `(start, end, code)` in sample indices.
fn runs(hypno: &[i8]) -> Vec<(usize, usize, i8)> {
    let mut out = Vec::new();
    let mut start = 0;
    for i in 1..=hypno.len() {
        if i == hypno.len() || hypno[i] != hypno[start] {
            out.push((start, i, hypno[start]));
            start = i;
        }
    }
    out
}

/// Hypnogram panel above an EEG spectrogram.
///
/// `eeg_uv` is the EEG channel in µV at `sfreq`; `hypno_up` holds one stage
/// code per sample of `eeg_uv`.  Colour limits are the 2.5th and 97.5th
/// percentiles of the power in dB.
pub fn plot_spectrogram<P: AsRef<Path>>(
    path: P,
    eeg_uv: &[f32],
    sfreq: f64,
    hypno_up: &[i8],
    opts: &SpectrogramOptions,
) -> Result<()> {
    let path = path.as_ref();
    if hypno_up.len() != eeg_uv.len() {
        bail!(
            "hypnogram has {} samples but the EEG has {}; upsample it to the data first",
            hypno_up.len(),
            eeg_uv.len()
        );
    }
    if !(opts.fmin < opts.fmax) {
        bail!("fmin {} must be below fmax {}", opts.fmin, opts.fmax);
    }
    let spec = spectrogram(eeg_uv, sfreq, opts.win_sec)?.crop_freqs(opts.fmin, opts.fmax);
    if spec.freqs.is_empty() {
        bail!("no spectrogram bins between {} and {} Hz", opts.fmin, opts.fmax);
    }
    let (vmin, vmax) = (spec.percentile(2.5), spec.percentile(97.5));
    let hours = eeg_uv.len() as f64 / sfreq / 3600.0;
    ensure_parent(path)?;

    let root = BitMapBackend::new(path, opts.size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let (top, bottom) = root.split_vertically(opts.size.1 / 3);

    // Hypnogram.
    let mut chart = ChartBuilder::on(&top)
        .margin(10)
        .x_label_area_size(label_area(30))
        .y_label_area_size(label_area(50))
        .build_cartesian_2d(0f64..hours, -0.5f64..4.5f64)
        .map_err(plot_err)?;
    let stage_label = |v: &f64| {
        let row = HYPNO_ROWS.len() as i64 - 1 - v.round() as i64;
        usize::try_from(row)
            .ok()
            .and_then(|r| HYPNO_ROWS.get(r))
            .map_or(String::new(), |(_, l)| l.to_string())
    };
    let mut mesh = chart.configure_mesh();
    mesh.disable_x_mesh();
    if DRAW_TEXT {
        mesh.y_labels(HYPNO_ROWS.len()).y_label_formatter(&stage_label).y_desc("Stage");
    }
    mesh.draw().map_err(plot_err)?;

    let to_h = |i: usize| i as f64 / sfreq / 3600.0;
    let mut trace: Vec<Vec<(f64, f64)>> = vec![Vec::new()];
    let mut rem = Vec::new();
    for (a, b, code) in runs(hypno_up) {
        match hypno_level(code) {
            Some(y) => {
                if let Some(seg) = trace.last_mut() {
                    seg.push((to_h(a), y));
                    seg.push((to_h(b), y));
                }
                if code == 4 {
                    rem.push([(to_h(a), y), (to_h(b), y)]);
                }
            }
            None => trace.push(Vec::new()),
        }
    }
    for seg in trace.into_iter().filter(|s| !s.is_empty()) {
        chart
            .draw_series(LineSeries::new(seg, BLACK.stroke_width(2)))
            .map_err(plot_err)?;
    }
    chart
        .draw_series(rem.into_iter().map(|seg| PathElement::new(seg.to_vec(), RED.stroke_width(4))))
        .map_err(plot_err)?;

    // Spectrogram.
    let (f_lo, f_hi) = (spec.freqs[0], spec.freqs[spec.freqs.len() - 1]);
    let df = if spec.freqs.len() > 1 { spec.freqs[1] - spec.freqs[0] } else { 1.0 };
    let mut chart = ChartBuilder::on(&bottom)
        .margin(10)
        .x_label_area_size(label_area(40))
        .y_label_area_size(label_area(50))
        .build_cartesian_2d(0f64..hours, (f_lo - df / 2.0)..(f_hi + df / 2.0))
        .map_err(plot_err)?;
    let mut mesh = chart.configure_mesh();
    mesh.disable_mesh();
    if DRAW_TEXT {
        mesh.x_desc("Time [hrs]").y_desc("Frequency [Hz]");
    }
    mesh.draw().map_err(plot_err)?;

    let span = (vmax - vmin).max(f64::EPSILON);
    let win_h = opts.win_sec / 3600.0;
    let cells = spec.power_db.indexed_iter().map(|((i, j), &db)| {
        let f = spec.freqs[i];
        let t0 = j as f64 * win_h;
        Rectangle::new(
            [(t0, f - df / 2.0), (t0 + win_h, f + df / 2.0)],
            rdbu_r((db - vmin) / span).filled(),
        )
    });
    chart.draw_series(cells).map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    log::info!("wrote hypnogram and spectrogram to {}", path.display());
    Ok(())
}

/// Confidence of the predicted stage across the night.
pub fn plot_confidence<P: AsRef<Path>>(path: P, confidence: &[f64], epoch_secs: f64) -> Result<()> {
    let path = path.as_ref();
    if confidence.is_empty() {
        bail!("no epochs to plot");
    }
    ensure_parent(path)?;
    let hours = confidence.len() as f64 * epoch_secs / 3600.0;

    let root = BitMapBackend::new(path, (1200, 400)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(label_area(40))
        .y_label_area_size(label_area(50))
        .build_cartesian_2d(0f64..hours, 0f64..1f64)
        .map_err(plot_err)?;
    let mut mesh = chart.configure_mesh();
    if DRAW_TEXT {
        mesh.x_desc("Time [hrs]").y_desc("Confidence");
    }
    mesh.draw().map_err(plot_err)?;
    chart
        .draw_series(LineSeries::new(
            confidence
                .iter()
                .enumerate()
                .map(|(e, &c)| ((e as f64 + 0.5) * epoch_secs / 3600.0, c)),
            BLUE.stroke_width(2),
        ))
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    log::info!("wrote confidence plot to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colormap_endpoints() {
        assert_eq!(rdbu_r(0.0), RGBColor(33, 102, 172));
        assert_eq!(rdbu_r(0.5), RGBColor(247, 247, 247));
        assert_eq!(rdbu_r(1.0), RGBColor(178, 24, 43));
        assert_eq!(rdbu_r(f64::NAN), RGBColor(247, 247, 247));
    }

    #[test]
    fn wake_on_top_n3_at_bottom() {
        assert_eq!(hypno_level(0), Some(4.0));
        assert_eq!(hypno_level(4), Some(3.0));
        assert_eq!(hypno_level(3), Some(0.0));
        assert_eq!(hypno_level(-1), None);
    }

    #[test]
    fn runs_cover_sequence() {
        assert_eq!(runs(&[0, 0, 2, 2, 2, 4]), vec![(0, 2, 0), (2, 5, 2), (5, 6, 4)]);
        assert!(runs(&[]).is_empty());
    }

    #[test]
    fn writes_png_files() {
        let dir = tempfile::tempdir().unwrap();
        let sfreq = 100.0;
        let n = 3000 * 6;
        let eeg: Vec<f32> = (0..n)
            .map(|i| (30.0 * (2.0 * std::f64::consts::PI * 2.0 * i as f64 / sfreq).sin()) as f32)
            .collect();
        let hypno: Vec<i8> = (0..n).map(|i| [0, 1, 2, 3, 4, -1][i / 3000]).collect();
        let png = dir.path().join("sub").join("hypno.png");
        let opts = SpectrogramOptions { size: (400, 300), ..Default::default() };
        plot_spectrogram(&png, &eeg, sfreq, &hypno, &opts).unwrap();
        assert!(png.exists());

        let conf = dir.path().join("conf.png");
        plot_confidence(&conf, &[0.5, 0.9, 0.7], 30.0).unwrap();
        assert!(conf.exists());
    }

    #[test]
    fn length_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let r = plot_spectrogram(dir.path().join("x.png"), &[0.0; 3000], 100.0, &[0; 10], &SpectrogramOptions::default());
        assert!(r.is_err());
    }
}
