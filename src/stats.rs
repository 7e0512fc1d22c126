//! Summary statistics of a hypnogram.
//!
//! Durations are in minutes, `%X` are percentages of TST, `SE` and `SME`
//! are percentages of TIB and SPT respectively.
//!
//! ```text
//! TIB   time in bed               whole hypnogram
//! SPT   sleep period time         first sleep epoch → last sleep epoch
//! WASO  wake after sleep onset    W inside SPT
//! TST   total sleep time          N1+N2+N3+REM inside SPT
//! SOL   sleep onset latency       start → first sleep epoch
//! Lat_X latency of stage X        start → first X epoch
//! ```
//!
//! Artefact and unscored epochs inside SPT count towards neither TST nor
//! WASO.  Undefined values are NaN.
use std::fmt;

use anyhow::{bail, Result};

use crate::hypnogram::SleepStage;

/// Statistic names in output order.
pub const KEYS: [&str; 21] = [
    "TIB", "SPT", "WASO", "TST", "N1", "N2", "N3", "REM", "NREM", "SOL", "Lat_N1", "Lat_N2",
    "Lat_N3", "Lat_REM", "%N1", "%N2", "%N3", "%REM", "%NREM", "SE", "SME",
];

/// Ordered key → value statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct SleepStatistics {
    entries: Vec<(&'static str, f64)>,
}

impl SleepStatistics {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for SleepStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{k:<8} {v:>8.2}")?;
        }
        Ok(())
    }
}

/// Compute sleep statistics from integer stage codes sampled at `sf_hyp` Hz
/// (`1/30` for 30 s epochs).
pub fn sleep_statistics(hypno: &[i8], sf_hyp: f64) -> Result<SleepStatistics> {
    if hypno.is_empty() {
        bail!("empty hypnogram");
    }
    if !(sf_hyp > 0.0) {
        bail!("sf_hyp must be positive, got {sf_hyp}");
    }
    let stages: Vec<SleepStage> = hypno
        .iter()
        .map(|&c| SleepStage::from_int(c))
        .collect::<Result<_>>()?;
    let minutes = |n: usize| n as f64 / sf_hyp / 60.0;

    let tib = minutes(stages.len());
    let first = stages.iter().position(|s| s.is_sleep());
    let last = stages.iter().rposition(|s| s.is_sleep());
    let spt_slice: &[SleepStage] = match (first, last) {
        (Some(a), Some(b)) => &stages[a..=b],
        _ => &[],
    };
    let count = |stage: SleepStage| spt_slice.iter().filter(|&&s| s == stage).count();
    let latency = |stage: SleepStage| {
        stages
            .iter()
            .position(|&s| s == stage)
            .map_or(f64::NAN, minutes)
    };

    let spt = minutes(spt_slice.len());
    let waso = minutes(count(SleepStage::Wake));
    let n1 = minutes(count(SleepStage::N1));
    let n2 = minutes(count(SleepStage::N2));
    let n3 = minutes(count(SleepStage::N3));
    let rem = minutes(count(SleepStage::Rem));
    let nrem = minutes(spt_slice.iter().filter(|s| s.is_nrem()).count());
    let tst = nrem + rem;
    let sol = first.map_or(f64::NAN, minutes);

    let pct = |v: f64, of: f64| if of > 0.0 { v / of * 100.0 } else { f64::NAN };

    let values = [
        tib,
        spt,
        waso,
        tst,
        n1,
        n2,
        n3,
        rem,
        nrem,
        sol,
        latency(SleepStage::N1),
        latency(SleepStage::N2),
        latency(SleepStage::N3),
        latency(SleepStage::Rem),
        pct(n1, tst),
        pct(n2, tst),
        pct(n3, tst),
        pct(rem, tst),
        pct(nrem, tst),
        pct(tst, tib),
        pct(tst, spt),
    ];
    Ok(SleepStatistics { entries: KEYS.iter().copied().zip(values).collect() })
}
