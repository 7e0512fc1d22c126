//! Data-record reader — the Rust counterpart of `mne.io.read_raw_bdf` /
//! `read_raw_edf` with `preload=True`.
//!
//! # Algorithm
//! 1. Parse the header (see [`super::header`]).
//! 2. Resolve the record count (`-1` → derived from the file size).
//! 3. Select channels: drop annotation channels and `exclude`.
//! 4. Walk every data record; within a record each signal's block of
//!    `samples_per_record` samples is stored contiguously, in signal order.
//! 5. Convert digital → physical → volts.
//!
//! # Calibration
//! ```text
//! volts[ch, t] = (digital · gain + offset) × unit_scale
//! gain   = (pmax − pmin) / (dmax − dmin)
//! offset = pmin − gain · dmin
//! ```
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::Array2;

use super::header::{read_header, BdfHeader, FileFormat, BDF_STATUS};
use crate::raw::{ChannelKind, Raw};

/// Read only the header of a BDF/EDF file.
pub fn read_header_from_path<P: AsRef<Path>>(path: P) -> Result<BdfHeader> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    read_header(&mut reader).with_context(|| format!("parse header of {}", path.display()))
}

/// Load a BDF/EDF recording into memory.
///
/// Channels listed in `exclude` are skipped at read time; this is how callers
/// leave out auxiliary channels recorded at a different sampling rate.  All
/// remaining channels must share one rate.
pub fn open_raw<P: AsRef<Path>, S: AsRef<str>>(path: P, exclude: &[S]) -> Result<Raw> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    // 1. Header --------------------------------------------------------------
    let header = read_header(&mut reader)
        .with_context(|| format!("parse header of {}", path.display()))?;

    // 2. Record count --------------------------------------------------------
    let record_bytes = header.record_bytes();
    if record_bytes == 0 {
        bail!("data records are empty (all signals have 0 samples per record)");
    }
    let available = file_len.saturating_sub(header.header_bytes as u64) / record_bytes as u64;
    let n_records = if header.n_records < 0 {
        log::debug!("record count unknown; {available} complete records on disk");
        available as usize
    } else {
        let declared = header.n_records as usize;
        if (available as usize) < declared {
            bail!(
                "{} is truncated: header declares {declared} records, file holds {available}",
                path.display()
            );
        }
        declared
    };

    // 3. Channel selection ---------------------------------------------------
    for name in exclude {
        if header.signal_index(name.as_ref()).is_none() {
            log::warn!("exclude: channel '{}' not in file", name.as_ref());
        }
    }
    let picks: Vec<usize> = header
        .signals
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.is_annotation())
        .filter(|(_, s)| !exclude.iter().any(|e| e.as_ref() == s.label))
        .map(|(i, _)| i)
        .collect();
    if picks.is_empty() {
        bail!("no data channels left after excluding annotations and {} names", exclude.len());
    }

    let spr = header.signals[picks[0]].samples_per_record;
    for &i in &picks[1..] {
        let s = &header.signals[i];
        if s.samples_per_record != spr {
            bail!(
                "channel '{}' is sampled at {} Hz but '{}' at {} Hz; exclude one of them",
                s.label,
                s.sfreq(header.record_duration),
                header.signals[picks[0]].label,
                header.signals[picks[0]].sfreq(header.record_duration),
            );
        }
    }
    let sfreq = header.signals[picks[0]].sfreq(header.record_duration);

    // 4. Records ---------------------------------------------------------------
    let bps = header.format.bytes_per_sample();
    let mut sig_offsets = Vec::with_capacity(header.n_signals());
    let mut acc = 0usize;
    for s in &header.signals {
        sig_offsets.push(acc);
        acc += s.samples_per_record * bps;
    }
    let scales: Vec<(f64, f64)> = picks
        .iter()
        .map(|&i| {
            let s = &header.signals[i];
            (s.gain() * s.unit_scale(), s.offset() * s.unit_scale())
        })
        .collect();

    reader
        .seek(SeekFrom::Start(header.header_bytes as u64))
        .context("seek to first data record")?;

    let n_times = n_records * spr;
    let mut out = Array2::<f32>::zeros((picks.len(), n_times));
    let mut record = vec![0u8; record_bytes];

    for r in 0..n_records {
        reader
            .read_exact(&mut record)
            .with_context(|| format!("read data record {r}"))?;
        for (row, (&sig, &(gain, offset))) in picks.iter().zip(&scales).enumerate() {
            let block = &record[sig_offsets[sig]..sig_offsets[sig] + spr * bps];
            let t0 = r * spr;
            for (k, b) in block.chunks_exact(bps).enumerate() {
                let digital = decode_sample(header.format, b);
                out[[row, t0 + k]] = (digital as f64 * gain + offset) as f32;
            }
        }
    }

    // 5. Assemble ---------------------------------------------------------------
    let ch_names: Vec<String> = picks.iter().map(|&i| header.signals[i].label.clone()).collect();
    let ch_kinds: Vec<ChannelKind> = ch_names
        .iter()
        .map(|n| if n == BDF_STATUS { ChannelKind::Stim } else { ChannelKind::Eeg })
        .collect();

    log::info!(
        "read {}: {} ch × {} samples @ {} Hz ({:?})",
        path.display(),
        ch_names.len(),
        n_times,
        sfreq,
        header.format
    );

    Ok(Raw::new(out, ch_names, ch_kinds, sfreq as f32)?.with_meas_date(header.start))
}

/// Decode one little-endian two's-complement sample.
#[inline]
pub(crate) fn decode_sample(format: FileFormat, b: &[u8]) -> i32 {
    match format {
        FileFormat::Edf => i16::from_le_bytes([b[0], b[1]]) as i32,
        FileFormat::Bdf => {
            let v = (b[0] as i32) | ((b[1] as i32) << 8) | ((b[2] as i32) << 16);
            // sign-extend bit 23
            (v << 8) >> 8
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bdf_sample_sign_extension() {
        assert_eq!(decode_sample(FileFormat::Bdf, &[0xFF, 0xFF, 0xFF]), -1);
        assert_eq!(decode_sample(FileFormat::Bdf, &[0x00, 0x00, 0x80]), -8_388_608);
        assert_eq!(decode_sample(FileFormat::Bdf, &[0xFF, 0xFF, 0x7F]), 8_388_607);
        assert_eq!(decode_sample(FileFormat::Bdf, &[0x01, 0x02, 0x03]), 0x030201);
    }

    #[test]
    fn edf_sample_little_endian() {
        assert_eq!(decode_sample(FileFormat::Edf, &[0x00, 0x80]), -32768);
        assert_eq!(decode_sample(FileFormat::Edf, &[0x34, 0x12]), 0x1234);
    }
}
