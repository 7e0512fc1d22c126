//! BDF / EDF writer.
//!
//! Writes `[C, T]` volts with one signal per row.  Physical range is chosen
//! per channel from the data (symmetric, rounded up to a whole unit) so the
//! full digital range is used.  Channels whose peak stays below 0.1 V are
//! stored in `uV`, anything larger (counters, timestamps) in `V`.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use ndarray::Array2;

use super::header::FileFormat;

#[derive(Debug, Clone)]
pub struct BdfWriter {
    format:          FileFormat,
    record_duration: f64,
    patient:         String,
    recording:       String,
    start:           NaiveDateTime,
}

impl BdfWriter {
    pub fn new(format: FileFormat) -> Self {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(22, 0, 0))
            .unwrap_or_default();
        Self {
            format,
            record_duration: 1.0,
            patient: "X X X X".into(),
            recording: "Startdate X X X X".into(),
            start,
        }
    }

    pub fn record_duration(mut self, secs: f64) -> Self {
        self.record_duration = secs;
        self
    }

    pub fn start(mut self, start: NaiveDateTime) -> Self {
        self.start = start;
        self
    }

    pub fn patient(mut self, patient: &str) -> Self {
        self.patient = patient.to_string();
        self
    }

    /// Write `data` (`[C, T]`, volts) sampled at `sfreq` Hz.
    ///
    /// The last record is zero-padded when `T` is not a whole number of
    /// records.
    pub fn write<P: AsRef<Path>, S: AsRef<str>>(
        &self,
        path: P,
        data: &Array2<f32>,
        labels: &[S],
        sfreq: f64,
    ) -> Result<()> {
        let path = path.as_ref();
        let (n_ch, n_t) = data.dim();
        if labels.len() != n_ch {
            bail!("{} labels for {n_ch} channels", labels.len());
        }
        let spr_f = sfreq * self.record_duration;
        let spr = spr_f.round() as usize;
        if spr == 0 || (spr_f - spr as f64).abs() > 1e-6 {
            bail!(
                "{sfreq} Hz × {} s is not a whole number of samples per record",
                self.record_duration
            );
        }
        let n_records = n_t.div_ceil(spr);
        let (dmin, dmax) = self.format.digital_range();

        // Per-channel physical ranges.
        let channels: Vec<ChannelScale> = data
            .rows()
            .into_iter()
            .map(|row| {
                let peak = row.iter().fold(0.0_f64, |m, &v| m.max((v as f64).abs()));
                let (dim, scale) = if peak < 0.1 { ("uV", 1e6) } else { ("V", 1.0) };
                let pmax = (peak * scale).ceil().max(1.0);
                ChannelScale { dim, scale, pmin: -pmax, pmax }
            })
            .collect();

        let mut hdr: Vec<u8> = Vec::with_capacity(256 * (n_ch + 1));
        match self.format {
            FileFormat::Bdf => {
                hdr.push(0xFF);
                put(&mut hdr, "BIOSEMI", 7);
            }
            FileFormat::Edf => put(&mut hdr, "0", 8),
        }
        put(&mut hdr, &self.patient, 80);
        put(&mut hdr, &self.recording, 80);
        put(&mut hdr, &self.start.format("%d.%m.%y").to_string(), 8);
        put(&mut hdr, &self.start.format("%H.%M.%S").to_string(), 8);
        put(&mut hdr, &(256 * (n_ch + 1)).to_string(), 8);
        put(&mut hdr, if self.format == FileFormat::Bdf { "24BIT" } else { "" }, 44);
        put(&mut hdr, &n_records.to_string(), 8);
        put(&mut hdr, &fmt_num(self.record_duration, 8)?, 8);
        put(&mut hdr, &n_ch.to_string(), 4);

        for l in labels {
            put(&mut hdr, l.as_ref(), 16);
        }
        for _ in 0..n_ch {
            put(&mut hdr, "", 80);
        }
        for c in &channels {
            put(&mut hdr, c.dim, 8);
        }
        for c in &channels {
            put(&mut hdr, &fmt_num(c.pmin, 8)?, 8);
        }
        for c in &channels {
            put(&mut hdr, &fmt_num(c.pmax, 8)?, 8);
        }
        for _ in 0..n_ch {
            put(&mut hdr, &dmin.to_string(), 8);
        }
        for _ in 0..n_ch {
            put(&mut hdr, &dmax.to_string(), 8);
        }
        for _ in 0..n_ch {
            put(&mut hdr, "", 80);
        }
        for _ in 0..n_ch {
            put(&mut hdr, &spr.to_string(), 8);
        }
        for _ in 0..n_ch {
            put(&mut hdr, "", 32);
        }

        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let mut w = BufWriter::new(file);
        w.write_all(&hdr)?;

        let bps = self.format.bytes_per_sample();
        let mut record = Vec::with_capacity(n_ch * spr * bps);
        for r in 0..n_records {
            record.clear();
            for (ch, c) in channels.iter().enumerate() {
                let gain = (c.pmax - c.pmin) / (dmax as f64 - dmin as f64);
                for k in 0..spr {
                    let t = r * spr + k;
                    let v = if t < n_t { data[[ch, t]] as f64 * c.scale } else { 0.0 };
                    let d = ((v - c.pmin) / gain + dmin as f64)
                        .round()
                        .clamp(dmin as f64, dmax as f64) as i32;
                    record.extend_from_slice(&d.to_le_bytes()[..bps]);
                }
            }
            w.write_all(&record)?;
        }
        w.flush()?;

        log::debug!(
            "wrote {}: {n_ch} ch × {n_records} records of {spr} samples",
            path.display()
        );
        Ok(())
    }
}

struct ChannelScale {
    dim:   &'static str,
    scale: f64,
    pmin:  f64,
    pmax:  f64,
}

/// Append `s` truncated or space-padded to exactly `width` bytes.
fn put(buf: &mut Vec<u8>, s: &str, width: usize) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(width);
    buf.extend_from_slice(&bytes[..n]);
    buf.extend(std::iter::repeat(b' ').take(width - n));
}

/// Shortest decimal rendering of `v` that fits `width` characters.
fn fmt_num(v: f64, width: usize) -> Result<String> {
    let plain = format!("{v}");
    if plain.len() <= width {
        return Ok(plain);
    }
    for prec in (0..width).rev() {
        let s = format!("{v:.prec$}");
        if s.len() <= width {
            return Ok(s);
        }
    }
    bail!("value {v} does not fit a {width}-character header field")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_pads_and_truncates() {
        let mut b = Vec::new();
        put(&mut b, "Fp1", 5);
        put(&mut b, "toolongvalue", 4);
        assert_eq!(&b, b"Fp1  tool");
    }

    #[test]
    fn fmt_num_fits_width() {
        assert_eq!(fmt_num(1.0, 8).unwrap(), "1");
        assert_eq!(fmt_num(-400000.0, 8).unwrap(), "-400000");
        assert_eq!(fmt_num(0.123456789, 8).unwrap(), "0.123457");
        assert!(fmt_num(1e12, 8).is_err());
    }
}
