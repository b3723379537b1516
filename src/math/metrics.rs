//! Regression error metrics.

use crate::domain::Metrics;

/// Compute MAE, RMSE and R² of `predicted` against `actual`.
///
/// R² is reported as 0 when the actual values have zero variance.
/// Returns `None` for empty or mismatched inputs.
pub fn regression_metrics(actual: &[f64], predicted: &[f64]) -> Option<Metrics> {
    if actual.is_empty() || actual.len() != predicted.len() {
        return None;
    }
    let n = actual.len();
    let n_f = n as f64;

    let mean = actual.iter().sum::<f64>() / n_f;
    let mut abs_sum = 0.0;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (&a, &p) in actual.iter().zip(predicted) {
        let r = a - p;
        abs_sum += r.abs();
        ss_res += r * r;
        ss_tot += (a - mean) * (a - mean);
    }

    let r2 = if ss_tot == 0.0 { 0.0 } else { 1.0 - ss_res / ss_tot };

    Some(Metrics {
        mae: abs_sum / n_f,
        rmse: (ss_res / n_f).sqrt(),
        r2,
        n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_match_hand_computation() {
        let actual = [3.0, 5.0, 7.0];
        let predicted = [2.0, 5.0, 9.0];
        let m = regression_metrics(&actual, &predicted).unwrap();

        assert!((m.mae - 1.0).abs() < 1e-12);
        assert!((m.rmse - (5.0_f64 / 3.0).sqrt()).abs() < 1e-12);
        // ss_res = 5, ss_tot = 8
        assert!((m.r2 - (1.0 - 5.0 / 8.0)).abs() < 1e-12);
        assert_eq!(m.n, 3);
    }

    #[test]
    fn r2_is_zero_for_constant_actuals() {
        let m = regression_metrics(&[4.0, 4.0], &[3.0, 5.0]).unwrap();
        assert_eq!(m.r2, 0.0);
        assert!((m.rmse - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_or_mismatched_inputs_yield_none() {
        assert!(regression_metrics(&[], &[]).is_none());
        assert!(regression_metrics(&[1.0], &[1.0, 2.0]).is_none());
    }
}
