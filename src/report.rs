//! CSV exports.
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDateTime};
use ndarray::Array2;

use crate::hypnogram::{Hypnogram, SleepStage};
use crate::staging::confidence;
use crate::stats::SleepStatistics;
use crate::transition::TransitionMatrix;

fn create_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }
    Ok(())
}

/// NaN and infinities become an empty field.
fn field(v: f64) -> String {
    if v.is_finite() { v.to_string() } else { String::new() }
}

/// `key,value` rows without a header.
pub fn write_sleep_statistics<P: AsRef<Path>>(path: P, stats: &SleepStatistics) -> Result<()> {
    let path = path.as_ref();
    create_parent(path)?;
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for (key, value) in stats.iter() {
        w.write_record([key, field(value).as_str()])?;
    }
    w.flush()?;
    log::info!("wrote sleep statistics to {}", path.display());
    Ok(())
}

/// One row per epoch: onset, wall-clock time (when `start` is known),
/// stage, confidence and the per-stage probabilities.
pub fn write_hypnogram<P: AsRef<Path>>(
    path: P,
    hypnogram: &Hypnogram,
    proba: &Array2<f64>,
    start: Option<NaiveDateTime>,
) -> Result<()> {
    let path = path.as_ref();
    if proba.nrows() != hypnogram.len() {
        bail!("{} probability rows for {} epochs", proba.nrows(), hypnogram.len());
    }
    create_parent(path)?;
    let mut w = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;

    let mut header = vec!["epoch", "onset_s", "time", "stage", "confidence"];
    header.extend(SleepStage::SCORED.iter().map(|s| s.label()));
    w.write_record(&header)?;

    let conf = confidence(proba);
    for (e, stage) in hypnogram.stages.iter().enumerate() {
        let onset = e as f64 * hypnogram.epoch_secs;
        let clock = start
            .map(|t| (t + Duration::milliseconds((onset * 1000.0) as i64)).format("%H:%M:%S").to_string())
            .unwrap_or_default();
        let mut row = vec![e.to_string(), onset.to_string(), clock, stage.label().to_string(), field(conf[e])];
        row.extend(proba.row(e).iter().map(|&p| field(p)));
        w.write_record(&row)?;
    }
    w.flush()?;
    log::info!("wrote {} epochs to {}", hypnogram.len(), path.display());
    Ok(())
}

/// Transition probabilities; first column is the current stage.
pub fn write_transition_matrix<P: AsRef<Path>>(path: P, tm: &TransitionMatrix) -> Result<()> {
    let path = path.as_ref();
    create_parent(path)?;
    let mut w = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;

    let mut header = vec!["from".to_string()];
    header.extend(tm.stages.iter().map(|s| s.label().to_string()));
    w.write_record(&header)?;
    for (i, stage) in tm.stages.iter().enumerate() {
        let mut row = vec![stage.label().to_string()];
        row.extend(tm.probs.row(i).iter().map(|&p| field(p)));
        w.write_record(&row)?;
    }
    w.flush()?;
    log::info!("wrote transition matrix to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::sleep_statistics;
    use crate::transition::transition_matrix;

    #[test]
    fn stats_csv_has_no_header_and_blank_nan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("stats.csv");
        let stats = sleep_statistics(&[0, 2, 2, 0], 1.0 / 30.0).unwrap();
        write_sleep_statistics(&path, &stats).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 21);
        assert_eq!(lines[0], "TIB,2");
        assert!(lines.contains(&"Lat_REM,"));
    }

    #[test]
    fn hypnogram_csv_rows_and_clock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hypno.csv");
        let h = Hypnogram::new(vec![SleepStage::Wake, SleepStage::N2], 30.0);
        let p = Array2::from_shape_vec((2, 5), vec![0.6, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.5, 0.2, 0.1]).unwrap();
        let start = chrono::NaiveDate::from_ymd_opt(2023, 5, 1)
            .unwrap()
            .and_hms_opt(23, 59, 45)
            .unwrap();
        write_hypnogram(&path, &h, &p, Some(start)).unwrap();

        let mut r = csv::Reader::from_path(&path).unwrap();
        let headers = r.headers().unwrap().clone();
        assert_eq!(headers.len(), 10);
        assert_eq!(&headers[5], "W");
        let rows: Vec<csv::StringRecord> = r.records().map(|x| x.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][2], "00:00:15");
        assert_eq!(&rows[1][3], "N2");
        assert_eq!(&rows[1][4], "0.5");
    }

    #[test]
    fn hypnogram_csv_rejects_mismatched_rows() {
        let dir = tempfile::tempdir().unwrap();
        let h = Hypnogram::new(vec![SleepStage::Wake], 30.0);
        let p = Array2::from_elem((2, 5), 0.2);
        assert!(write_hypnogram(dir.path().join("h.csv"), &h, &p, None).is_err());
    }

    #[test]
    fn transition_csv_is_square() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tm.csv");
        let tm = transition_matrix(&[0, 0, 2, 2, 4]).unwrap();
        write_transition_matrix(&path, &tm).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "from,W,N2,R");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "R,,,");
    }
}
