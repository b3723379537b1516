//! Reporting utilities: holdout miss rankings and formatted terminal output.

pub mod format;

pub use format::*;

use crate::fit::HoldoutPrediction;

/// Largest holdout misses of one model (top-N each side).
#[derive(Debug, Clone, PartialEq)]
pub struct Misses {
    /// Actual above predicted (positive residual).
    pub under: Vec<HoldoutPrediction>,
    /// Actual below predicted (negative residual).
    pub over: Vec<HoldoutPrediction>,
}

/// Rank the most under- and over-predicted evaluation rows by residual.
pub fn rank_misses(predictions: &[HoldoutPrediction], top_n: usize) -> Misses {
    let mut sorted = predictions.to_vec();
    sorted.sort_by(|a, b| b.residual.total_cmp(&a.residual));
    let under = sorted.iter().filter(|p| p.residual > 0.0).take(top_n).cloned().collect();
    let over = sorted.iter().rev().filter(|p| p.residual < 0.0).take(top_n).cloned().collect();
    Misses { under, over }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(state: &str, residual: f64) -> HoldoutPrediction {
        HoldoutPrediction {
            state: state.to_string(),
            year: 2021,
            actual: 180.0 + residual,
            predicted: 180.0,
            residual,
        }
    }

    #[test]
    fn rank_misses_splits_by_sign() {
        let preds = vec![p("A", 0.0), p("B", 12.0), p("C", -7.0), p("D", 3.0), p("E", -20.0)];
        let misses = rank_misses(&preds, 1);
        assert_eq!(misses.under.len(), 1);
        assert_eq!(misses.under[0].state, "B");
        assert_eq!(misses.over.len(), 1);
        assert_eq!(misses.over[0].state, "E");

        let all = rank_misses(&preds, 10);
        assert_eq!(all.under.len(), 2);
        assert_eq!(all.over.len(), 2);
    }
}
