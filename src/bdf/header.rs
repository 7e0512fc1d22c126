//! BDF / EDF header parsing.
//!
//! Both formats share one layout: a fixed 256-byte record followed by
//! `ns × 256` bytes of per-signal fields.  The per-signal block is stored
//! field-major (all labels, then all transducers, …).  Every field is
//! space-padded ASCII.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │   8  version          "0" (EDF)  |  0xFF "BIOSEMI" (BDF)     │
//! │  80  patient id                                              │
//! │  80  recording id                                            │
//! │   8  start date       dd.mm.yy                               │
//! │   8  start time       hh.mm.ss                               │
//! │   8  header bytes     256 · (ns + 1)                         │
//! │  44  reserved         "24BIT" / "EDF+C" / "EDF+D"            │
//! │   8  n data records   -1 when unknown                        │
//! │   8  record duration  seconds                                │
//! │   4  ns               number of signals                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ns × (16 label, 80 transducer, 8 dim, 8 pmin, 8 pmax,       │
//! │        8 dmin, 8 dmax, 80 prefilter, 8 n_samples, 32 rsvd)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
use std::fmt::Display;
use std::io::Read;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Size of the fixed part of the header.
pub const FIXED_HEADER_BYTES: usize = 256;
/// Size of one signal's share of the per-signal header block.
pub const SIGNAL_HEADER_BYTES: usize = 256;

/// Label EDF+ uses for its annotation pseudo-channel.
pub const EDF_ANNOTATIONS: &str = "EDF Annotations";
/// Label BDF+ uses for its annotation pseudo-channel.
pub const BDF_ANNOTATIONS: &str = "BDF Annotations";
/// BioSemi trigger/status channel.
pub const BDF_STATUS: &str = "Status";

/// On-disk sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// European Data Format: 16-bit little-endian two's complement.
    Edf,
    /// BioSemi Data Format: 24-bit little-endian two's complement.
    Bdf,
}

impl FileFormat {
    #[inline]
    pub fn bytes_per_sample(self) -> usize {
        match self {
            FileFormat::Edf => 2,
            FileFormat::Bdf => 3,
        }
    }

    /// Full digital range of the encoding, `(min, max)`.
    pub fn digital_range(self) -> (i32, i32) {
        match self {
            FileFormat::Edf => (i16::MIN as i32, i16::MAX as i32),
            FileFormat::Bdf => (-(1 << 23), (1 << 23) - 1),
        }
    }
}

/// Per-signal header fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalHeader {
    pub label:              String,
    pub transducer:         String,
    /// Physical dimension, e.g. `uV`.
    pub physical_dim:       String,
    pub physical_min:       f64,
    pub physical_max:       f64,
    pub digital_min:        i32,
    pub digital_max:        i32,
    pub prefiltering:       String,
    pub samples_per_record: usize,
}

impl SignalHeader {
    /// Sampling rate in Hz given the record duration in seconds.
    #[inline]
    pub fn sfreq(&self, record_duration: f64) -> f64 {
        self.samples_per_record as f64 / record_duration
    }

    /// Physical units per digital step.
    pub fn gain(&self) -> f64 {
        (self.physical_max - self.physical_min)
            / (self.digital_max as f64 - self.digital_min as f64)
    }

    /// Digital → physical conversion is `d · gain + offset`.
    pub fn offset(&self) -> f64 {
        self.physical_min - self.gain() * self.digital_min as f64
    }

    /// Factor that converts the physical dimension to SI volts.
    ///
    /// Unknown or empty dimensions are treated as already being in volts,
    /// matching MNE's behaviour for non-voltage channels.
    pub fn unit_scale(&self) -> f64 {
        match self.physical_dim.trim() {
            "uV" | "µV" | "μV" | "microV" => 1e-6,
            "mV" => 1e-3,
            "nV" => 1e-9,
            _ => 1.0,
        }
    }

    /// `true` for EDF+/BDF+ annotation pseudo-channels.
    pub fn is_annotation(&self) -> bool {
        self.label == EDF_ANNOTATIONS || self.label == BDF_ANNOTATIONS
    }
}

/// Parsed file header.
#[derive(Debug, Clone)]
pub struct BdfHeader {
    pub format:          FileFormat,
    pub patient:         String,
    pub recording:       String,
    /// Recording start, if the date/time fields parse.
    pub start:           Option<NaiveDateTime>,
    pub header_bytes:    usize,
    /// Reserved field (`24BIT`, `EDF+C`, …).
    pub reserved:        String,
    /// Number of data records; `-1` if the writer did not know.
    pub n_records:       i64,
    /// Duration of one data record in seconds.
    pub record_duration: f64,
    pub signals:         Vec<SignalHeader>,
}

impl BdfHeader {
    /// Number of signals, annotation channels included.
    #[inline]
    pub fn n_signals(&self) -> usize {
        self.signals.len()
    }

    /// Size in bytes of one data record.
    pub fn record_bytes(&self) -> usize {
        let bps = self.format.bytes_per_sample();
        self.signals.iter().map(|s| s.samples_per_record * bps).sum()
    }

    /// Index of the signal labelled `label`.
    pub fn signal_index(&self, label: &str) -> Option<usize> {
        self.signals.iter().position(|s| s.label == label)
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────

/// Read the fixed header and every signal header from `reader`.
///
/// `reader` must be positioned at byte 0.  On return it points at the first
/// byte after the per-signal block, which is the first data record for any
/// well-formed file.
pub fn read_header<R: Read>(reader: &mut R) -> Result<BdfHeader> {
    let mut version = [0u8; 8];
    reader.read_exact(&mut version).context("read version field")?;
    let format = match version[0] {
        0xFF => FileFormat::Bdf,
        b'0' => FileFormat::Edf,
        other => bail!("not a BDF/EDF file (version byte {other:#04x})"),
    };

    let patient   = read_field(reader, 80)?;
    let recording = read_field(reader, 80)?;
    let date      = read_field(reader, 8)?;
    let time      = read_field(reader, 8)?;
    let header_bytes: usize = parse_field(&read_field(reader, 8)?, "header bytes")?;
    let reserved  = read_field(reader, 44)?;
    let n_records: i64 = parse_field(&read_field(reader, 8)?, "number of data records")?;
    let record_duration: f64 = parse_field(&read_field(reader, 8)?, "record duration")?;
    let ns: usize = parse_field(&read_field(reader, 4)?, "number of signals")?;

    if ns == 0 {
        bail!("file declares zero signals");
    }
    if record_duration <= 0.0 {
        bail!("record duration must be positive, got {record_duration}");
    }
    let expected = FIXED_HEADER_BYTES + ns * SIGNAL_HEADER_BYTES;
    if header_bytes != expected {
        log::warn!("header size field says {header_bytes} bytes, layout implies {expected}");
    }

    let labels      = read_fields(reader, ns, 16)?;
    let transducers = read_fields(reader, ns, 80)?;
    let dims        = read_fields(reader, ns, 8)?;
    let pmins       = read_fields(reader, ns, 8)?;
    let pmaxs       = read_fields(reader, ns, 8)?;
    let dmins       = read_fields(reader, ns, 8)?;
    let dmaxs       = read_fields(reader, ns, 8)?;
    let prefilters  = read_fields(reader, ns, 80)?;
    let n_samps     = read_fields(reader, ns, 8)?;
    let _reserved   = read_fields(reader, ns, 32)?;

    let mut signals = Vec::with_capacity(ns);
    for i in 0..ns {
        let sig = SignalHeader {
            label:              labels[i].clone(),
            transducer:         transducers[i].clone(),
            physical_dim:       dims[i].clone(),
            physical_min:       parse_field(&pmins[i], "physical minimum")?,
            physical_max:       parse_field(&pmaxs[i], "physical maximum")?,
            digital_min:        parse_field(&dmins[i], "digital minimum")?,
            digital_max:        parse_field(&dmaxs[i], "digital maximum")?,
            prefiltering:       prefilters[i].clone(),
            samples_per_record: parse_field(&n_samps[i], "samples per record")?,
        };
        if sig.digital_max <= sig.digital_min {
            bail!("signal '{}': digital max {} <= digital min {}",
                sig.label, sig.digital_max, sig.digital_min);
        }
        signals.push(sig);
    }

    let start = parse_start(&date, &time);
    if start.is_none() {
        log::debug!("unparseable start date/time '{date}' '{time}'");
    }

    log::debug!(
        "{format:?} header: {ns} signals, {n_records} records × {record_duration} s",
    );

    Ok(BdfHeader {
        format,
        patient,
        recording,
        start,
        header_bytes,
        reserved,
        n_records,
        record_duration,
        signals,
    })
}

/// Read one fixed-width ASCII field and trim its padding.
fn read_field<R: Read>(reader: &mut R, width: usize) -> Result<String> {
    let mut buf = vec![0u8; width];
    reader
        .read_exact(&mut buf)
        .with_context(|| format!("read {width}-byte header field"))?;
    Ok(String::from_utf8_lossy(&buf).trim().to_string())
}

fn read_fields<R: Read>(reader: &mut R, n: usize, width: usize) -> Result<Vec<String>> {
    (0..n).map(|_| read_field(reader, width)).collect()
}

fn parse_field<T>(s: &str, what: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    s.trim()
        .parse::<T>()
        .map_err(|e| anyhow!("invalid {what} '{s}': {e}"))
}

/// Parse `dd.mm.yy` + `hh.mm.ss`.  Years 85–99 map to 19xx, the rest to 20xx
/// (the EDF clipping-date convention).
fn parse_start(date: &str, time: &str) -> Option<NaiveDateTime> {
    let d: Vec<u32> = date.split('.').map(|p| p.parse().ok()).collect::<Option<_>>()?;
    let t: Vec<u32> = time.split('.').map(|p| p.parse().ok()).collect::<Option<_>>()?;
    if d.len() != 3 || t.len() != 3 {
        return None;
    }
    let year = if d[2] >= 85 { 1900 + d[2] } else { 2000 + d[2] };
    let date = NaiveDate::from_ymd_opt(year as i32, d[1], d[0])?;
    let time = NaiveTime::from_hms_opt(t[0], t[1], t[2])?;
    Some(NaiveDateTime::new(date, time))
}
