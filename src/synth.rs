//! Synthetic night recordings.
//!
//! Produces an 8-channel Mentalab Explore style recording (`ch1 … ch8` plus
//! a `TimeStamp` counter) whose content follows a given stage sequence:
//!
//! ```text
//! W    alpha 10 Hz + beta, slow eye movements, high muscle tone
//! N1   theta 6 Hz, slow rolling eye movements, lower tone
//! N2   spindle bursts 13 Hz over delta/theta
//! N3   large 1 Hz delta
//! REM  low-voltage theta, rapid eye movements, atonia
//! ```
//!
//! Every channel is recorded against A1, so the `ch1` (A2) signal is mixed
//! into all of them; re-referencing to A2 removes it.
use std::f64::consts::PI;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::epoch::EPOCH_SECS;
use crate::hypnogram::SleepStage;

/// Labels in file order.
pub const LABELS: [&str; 9] = ["ch1", "ch2", "ch3", "ch4", "ch5", "ch6", "ch7", "ch8", "TimeStamp"];

/// A generated recording, `[9, T]` volts.
#[derive(Debug, Clone)]
pub struct SynthNight {
    pub data:   Array2<f32>,
    pub labels: Vec<String>,
    pub sfreq:  f64,
    pub stages: Vec<SleepStage>,
}

/// Per-stage amplitudes in µV.
struct Profile {
    delta:   f64,
    theta:   f64,
    alpha:   f64,
    spindle: f64,
    beta:    f64,
    /// Eye movement amplitude and rate (Hz).
    eog:     (f64, f64),
    emg:     f64,
}

fn profile(stage: SleepStage) -> Profile {
    match stage {
        SleepStage::Wake => Profile { delta: 5.0, theta: 5.0, alpha: 25.0, spindle: 0.0, beta: 10.0, eog: (40.0, 0.4), emg: 25.0 },
        SleepStage::N1 => Profile { delta: 8.0, theta: 25.0, alpha: 6.0, spindle: 0.0, beta: 4.0, eog: (30.0, 0.2), emg: 10.0 },
        SleepStage::N2 => Profile { delta: 20.0, theta: 12.0, alpha: 3.0, spindle: 25.0, beta: 3.0, eog: (4.0, 0.1), emg: 7.0 },
        SleepStage::N3 => Profile { delta: 90.0, theta: 10.0, alpha: 2.0, spindle: 5.0, beta: 2.0, eog: (4.0, 0.1), emg: 5.0 },
        SleepStage::Rem => Profile { delta: 6.0, theta: 15.0, alpha: 4.0, spindle: 0.0, beta: 6.0, eog: (60.0, 1.0), emg: 1.5 },
        SleepStage::Artefact | SleepStage::Unscored => Profile { delta: 50.0, theta: 20.0, alpha: 20.0, spindle: 0.0, beta: 20.0, eog: (50.0, 0.5), emg: 40.0 },
    }
}

/// A plausible stage sequence of `n_epochs` 30 s epochs: wake, descent
/// into N3, then repeating N2 / N3 / REM cycles.
pub fn demo_stages(n_epochs: usize) -> Vec<SleepStage> {
    use SleepStage::*;
    let onset = [Wake, Wake, Wake, Wake, N1, N1];
    let cycle = [N2, N2, N2, N2, N3, N3, N3, N3, N3, N3, N2, N2, Rem, Rem, Rem, Rem, Rem, Rem, Wake, N1];
    onset
        .iter()
        .chain(cycle.iter().cycle())
        .take(n_epochs)
        .copied()
        .collect()
}

/// Generate a recording at `sfreq` Hz following `stages`.
pub fn synth_night(stages: &[SleepStage], sfreq: f64, seed: u64) -> SynthNight {
    let mut rng = StdRng::seed_from_u64(seed);
    let ep = (EPOCH_SECS * sfreq).round() as usize;
    let n = stages.len() * ep;
    let mut data = Array2::<f32>::zeros((LABELS.len(), n));
    let mut noise = |amp: f64| amp * rng.gen_range(-1.0..1.0);
    let uv = 1e-6;

    for t in 0..n {
        let s = t as f64 / sfreq;
        let p = profile(stages[t / ep]);
        let sin = |f: f64, phase: f64| (2.0 * PI * f * s + phase).sin();

        // Spindles: 1 s bursts every 4 s.
        let spindle = if (s % 4.0) < 1.0 { p.spindle * sin(13.0, 0.0) * sin(0.5, 0.0).abs() } else { 0.0 };
        let brain = p.delta * sin(1.0, 0.3)
            + p.theta * sin(6.0, 1.1)
            + p.alpha * sin(10.0, 0.7)
            + spindle
            + p.beta * sin(20.0, 2.0);
        let eyes = p.eog.0 * sin(p.eog.1, 0.0);

        let a2 = 15.0 * sin(0.3, 0.0) + noise(3.0);
        let fp1 = brain + noise(4.0) + 0.2 * eyes;
        let fp2 = brain + noise(4.0) - 0.2 * eyes;
        let fpz = brain + noise(4.0);
        let eog1 = eyes + 0.3 * brain + noise(3.0);
        let eog2 = -eyes + 0.3 * brain + noise(3.0);
        let emg1 = noise(p.emg * 1.7);
        let emg2 = noise(p.emg * 1.7);

        // Everything is measured against A1, so A2 leaks into every channel.
        let row = [a2, fp1 + a2, fp2 + a2, eog1 + a2, eog2 + a2, emg1 + a2, emg2 + a2, fpz + a2];
        for (c, v) in row.iter().enumerate() {
            data[[c, t]] = (v * uv) as f32;
        }
        data[[8, t]] = s as f32;
    }

    SynthNight {
        data,
        labels: LABELS.iter().map(|l| l.to_string()).collect(),
        sfreq,
        stages: stages.to_vec(),
    }
}
