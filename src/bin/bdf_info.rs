use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use somno::read_header_from_path;

#[derive(Parser)]
#[command(name = "bdf_info", about = "Print the header of a BDF/EDF file")]
struct Args {
    /// BDF or EDF file
    input: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let hdr = read_header_from_path(&args.input)?;

    println!("File:      {}", args.input.display());
    println!("Format:    {:?}", hdr.format);
    println!("Patient:   {}", hdr.patient);
    println!("Recording: {}", hdr.recording);
    match hdr.start {
        Some(t) => println!("Start:     {t}"),
        None => println!("Start:     unspecified"),
    }
    println!(
        "Records:   {} × {} s  ({:.1} min)",
        hdr.n_records,
        hdr.record_duration,
        hdr.n_records as f64 * hdr.record_duration / 60.0
    );
    println!();
    println!("{:<4} {:<16} {:>9} {:>6} {:>12} {:>12}  prefilter", "#", "label", "sfreq", "unit", "phys min", "phys max");
    for (i, s) in hdr.signals.iter().enumerate() {
        println!(
            "{:<4} {:<16} {:>9.2} {:>6} {:>12.3} {:>12.3}  {}",
            i,
            s.label,
            s.sfreq(hdr.record_duration),
            s.physical_dim,
            s.physical_min,
            s.physical_max,
            s.prefiltering
        );
    }
    Ok(())
}
