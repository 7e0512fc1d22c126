//! BDF / EDF file format reader and writer.
//!
//! Reads `.bdf` (BioSemi 24-bit, as written by Mentalab Explore and BioSemi
//! ActiveTwo) and `.edf` (16-bit) recordings into a [`Raw`](crate::Raw).
//!
//! # Quick start
//! ```no_run
//! use somno::bdf::open_raw;
//!
//! let raw = open_raw("night.bdf", &["TimeStamp"]).unwrap();
//! println!("{} channels @ {} Hz", raw.n_channels(), raw.sfreq);
//! ```
pub mod header;
pub mod reader;
pub mod writer;

pub use header::{read_header, BdfHeader, FileFormat, SignalHeader};
pub use reader::{open_raw, read_header_from_path};
pub use writer::BdfWriter;
