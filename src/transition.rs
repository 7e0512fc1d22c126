//! First-order stage transition matrix.
//!
//! `counts[i, j]` is the number of times stage `stages[i]` is immediately
//! followed by `stages[j]`; `probs[i, j] = counts[i, j] / Σ_j counts[i, j]`,
//! i.e. given that the current stage is `i`, the probability that the next
//! one is `j`.  Rows of stages that never have a successor (only seen at
//! the very end) are NaN.
use std::fmt;

use anyhow::{bail, Result};
use ndarray::Array2;

use crate::hypnogram::SleepStage;

#[derive(Debug, Clone)]
pub struct TransitionMatrix {
    /// Observed stages, sorted by integer code.
    pub stages: Vec<SleepStage>,
    pub counts: Array2<usize>,
    pub probs:  Array2<f64>,
}

impl TransitionMatrix {
    fn index(&self, stage: SleepStage) -> Option<usize> {
        self.stages.iter().position(|&s| s == stage)
    }

    /// `P(next = to | current = from)`, `None` if either stage never occurs.
    pub fn prob(&self, from: SleepStage, to: SleepStage) -> Option<f64> {
        Some(self.probs[[self.index(from)?, self.index(to)?]])
    }

    /// Mean probability of staying in N2, N3 or REM, over those of the
    /// three that occur.  NaN if none do.
    pub fn sleep_stability(&self) -> f64 {
        let diag: Vec<f64> = [SleepStage::N2, SleepStage::N3, SleepStage::Rem]
            .into_iter()
            .filter_map(|s| self.index(s))
            .map(|i| self.probs[[i, i]])
            .filter(|p| p.is_finite())
            .collect();
        if diag.is_empty() {
            f64::NAN
        } else {
            diag.iter().sum::<f64>() / diag.len() as f64
        }
    }
}

impl fmt::Display for TransitionMatrix {
    /// Probabilities rounded to two decimals, rows = current stage.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>6}", "")?;
        for s in &self.stages {
            write!(f, "{:>6}", s.label())?;
        }
        for (i, s) in self.stages.iter().enumerate() {
            writeln!(f)?;
            write!(f, "{:>6}", s.label())?;
            for j in 0..self.stages.len() {
                write!(f, "{:>6.2}", self.probs[[i, j]])?;
            }
        }
        Ok(())
    }
}

/// Transition counts and probabilities of a hypnogram given as integer codes.
pub fn transition_matrix(hypno: &[i8]) -> Result<TransitionMatrix> {
    if hypno.len() < 2 {
        bail!("need at least two epochs for a transition matrix, got {}", hypno.len());
    }
    let seq: Vec<SleepStage> = hypno
        .iter()
        .map(|&c| SleepStage::from_int(c))
        .collect::<Result<_>>()?;
    let mut stages = seq.clone();
    stages.sort();
    stages.dedup();

    let n = stages.len();
    let pos = |s: SleepStage| stages.iter().position(|&x| x == s).unwrap_or(0);
    let mut counts = Array2::<usize>::zeros((n, n));
    for w in seq.windows(2) {
        counts[[pos(w[0]), pos(w[1])]] += 1;
    }

    let mut probs = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        let total: usize = counts.row(i).sum();
        for j in 0..n {
            probs[[i, j]] = if total == 0 {
                f64::NAN
            } else {
                counts[[i, j]] as f64 / total as f64
            };
        }
    }
    Ok(TransitionMatrix { stages, counts, probs })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_probabilities() {
        // W W N1 N2 N2 N2 W
        let tm = transition_matrix(&[0, 0, 1, 2, 2, 2, 0]).unwrap();
        assert_eq!(tm.stages, vec![SleepStage::Wake, SleepStage::N1, SleepStage::N2]);
        assert_eq!(tm.counts[[0, 0]], 1);
        assert_eq!(tm.counts[[0, 1]], 1);
        assert_eq!(tm.counts[[2, 2]], 2);
        assert_eq!(tm.counts.sum(), 6);
        approx::assert_abs_diff_eq!(tm.prob(SleepStage::N2, SleepStage::N2).unwrap(), 2.0 / 3.0);
        approx::assert_abs_diff_eq!(tm.prob(SleepStage::N2, SleepStage::Wake).unwrap(), 1.0 / 3.0);
        assert!(tm.prob(SleepStage::Rem, SleepStage::N2).is_none());
    }

    #[test]
    fn stage_only_at_end_has_nan_row() {
        let tm = transition_matrix(&[2, 2, 4]).unwrap();
        assert!(tm.prob(SleepStage::Rem, SleepStage::N2).unwrap().is_nan());
        approx::assert_abs_diff_eq!(tm.sleep_stability(), 0.5);
    }

    #[test]
    fn stability_averages_deep_and_rem_diagonal() {
        let tm = transition_matrix(&[2, 2, 3, 3, 3, 4, 4, 2]).unwrap();
        // N2: 1/2, N3: 2/3, REM: 1/2
        let expected = (0.5 + 2.0 / 3.0 + 0.5) / 3.0;
        approx::assert_abs_diff_eq!(tm.sleep_stability(), expected, epsilon = 1e-12);
    }

    #[test]
    fn display_rounds_to_two_decimals() {
        let tm = transition_matrix(&[0, 0, 1, 2, 2, 2, 0]).unwrap();
        let s = tm.to_string();
        assert!(s.contains("0.67"));
        assert!(s.contains("0.33"));
        assert_eq!(s.lines().count(), 4);
    }

    #[test]
    fn too_short_rejected() {
        assert!(transition_matrix(&[0]).is_err());
        assert!(transition_matrix(&[0, 8]).is_err());
    }
}
