//! Model comparison on the evaluation partition.
//!
//! Every handle is scored with MAE, RMSE and R² against the held-out yields.
//! Ranking rules:
//! 1. Lower RMSE first
//! 2. Ties broken by lower MAE
//! 3. Remaining ties keep bank (insertion) order
//!
//! Handles are only read; the comparison owns its own copies of the metrics.

use std::cmp::Ordering;

use tracing::info;

use crate::domain::{Metrics, ModelKind, TrainingRow};
use crate::error::PipelineError;
use crate::fit::bank::ModelHandle;
use crate::math::regression_metrics;

/// One line of the comparison table.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    /// 1-based rank.
    pub rank: usize,
    /// Position of the model in the evaluated list.
    pub index: usize,
    pub name: String,
    pub kind: ModelKind,
    pub metrics: Metrics,
}

/// Totally ordered comparison table (best first).
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub rows: Vec<ComparisonRow>,
}

impl Comparison {
    /// Top-ranked row; `None` only for an empty table.
    pub fn best(&self) -> Option<&ComparisonRow> {
        self.rows.first()
    }

    pub fn get(&self, name: &str) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.name == name)
    }

    /// Model names in rank order.
    pub fn ranked_names(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.name.clone()).collect()
    }
}

/// Actual vs predicted for one evaluation row.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldoutPrediction {
    pub state: String,
    pub year: i32,
    pub actual: f64,
    pub predicted: f64,
    pub residual: f64,
}

/// Score every handle on `eval_rows` and rank them.
pub fn evaluate(handles: &[ModelHandle], eval_rows: &[TrainingRow]) -> Result<Comparison, PipelineError> {
    if handles.is_empty() {
        return Err(PipelineError::InsufficientData("no models to evaluate".into()));
    }
    if eval_rows.is_empty() {
        return Err(PipelineError::InsufficientData("evaluation partition is empty".into()));
    }

    let actual: Vec<f64> = eval_rows.iter().map(|r| r.yield_bu_per_acre).collect();
    let mut scored = Vec::with_capacity(handles.len());
    for h in handles {
        let predicted: Vec<f64> = eval_rows.iter().map(|r| h.predict_row(r)).collect();
        if predicted.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::Fit(format!("{} produced a non-finite prediction", h.name)));
        }
        let metrics = regression_metrics(&actual, &predicted)
            .ok_or_else(|| PipelineError::InsufficientData("evaluation partition is empty".into()))?;
        scored.push((h.name.clone(), h.kind, metrics));
    }

    let comparison = rank_models(scored);
    if let Some(best) = comparison.best() {
        info!(
            best = %best.name,
            rmse = best.metrics.rmse,
            mae = best.metrics.mae,
            r2 = best.metrics.r2,
            "ranked models on evaluation partition"
        );
    }
    Ok(comparison)
}

/// Rank pre-computed metrics (insertion order = slice order).
pub fn rank_models(scored: Vec<(String, ModelKind, Metrics)>) -> Comparison {
    let mut rows: Vec<ComparisonRow> = scored
        .into_iter()
        .enumerate()
        .map(|(index, (name, kind, metrics))| ComparisonRow {
            rank: 0,
            index,
            name,
            kind,
            metrics,
        })
        .collect();

    // Stable sort keeps insertion order for full ties.
    rows.sort_by(|a, b| compare_metrics(&a.metrics, &b.metrics));
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
    Comparison { rows }
}

fn compare_metrics(a: &Metrics, b: &Metrics) -> Ordering {
    a.rmse.total_cmp(&b.rmse).then_with(|| a.mae.total_cmp(&b.mae))
}

/// Per-row predictions of one model on the evaluation partition.
pub fn holdout_predictions(handle: &ModelHandle, eval_rows: &[TrainingRow]) -> Vec<HoldoutPrediction> {
    eval_rows
        .iter()
        .map(|r| {
            let predicted = handle.predict_row(r);
            HoldoutPrediction {
                state: r.state.clone(),
                year: r.year,
                actual: r.yield_bu_per_acre,
                predicted,
                residual: r.yield_bu_per_acre - predicted,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PipelineConfig;
    use crate::fit::bank::ModelBank;

    fn metrics(rmse: f64, mae: f64) -> Metrics {
        Metrics {
            mae,
            rmse,
            r2: 0.0,
            n: 10,
        }
    }

    #[test]
    fn rmse_tie_is_broken_by_mae() {
        let cmp = rank_models(vec![
            ("a".into(), ModelKind::Linear, metrics(5.0, 4.0)),
            ("b".into(), ModelKind::Ridge, metrics(5.0, 3.0)),
        ]);
        assert_eq!(cmp.best().unwrap().name, "b");
        assert_eq!(cmp.rows[1].name, "a");
        assert_eq!(cmp.rows[1].rank, 2);
    }

    #[test]
    fn empty_ranking_has_no_best_model() {
        let cmp = rank_models(Vec::new());
        assert!(cmp.best().is_none());
        assert!(cmp.ranked_names().is_empty());
    }

    #[test]
    fn full_tie_keeps_insertion_order() {
        let cmp = rank_models(vec![
            ("first".into(), ModelKind::Linear, metrics(5.0, 3.0)),
            ("second".into(), ModelKind::Ridge, metrics(5.0, 3.0)),
            ("best".into(), ModelKind::RandomForest, metrics(1.0, 9.0)),
        ]);
        assert_eq!(cmp.ranked_names(), vec!["best", "first", "second"]);
        assert_eq!(cmp.get("second").unwrap().index, 1);
    }

    fn row(state: &str, year: i32, temp: f64, y: f64) -> TrainingRow {
        TrainingRow {
            state: state.to_string(),
            year,
            avg_temp_season: temp,
            total_rainfall_season: 500.0 + temp,
            yield_bu_per_acre: y,
        }
    }

    #[test]
    fn evaluate_scores_every_model_without_mutating_handles() {
        let train: Vec<TrainingRow> = (0..20)
            .map(|i| row("IOWA", 2000 + i, 15.0 + (i % 6) as f64, 250.0 - 4.0 * (15.0 + (i % 6) as f64)))
            .collect();
        let eval: Vec<TrainingRow> = (0..4)
            .map(|i| row("IOWA", 2020 + i, 16.0 + i as f64, 250.0 - 4.0 * (16.0 + i as f64)))
            .collect();

        let config = PipelineConfig {
            tree_count: 5,
            tree_depth: 2,
            ..PipelineConfig::default()
        };
        let bank = ModelBank::new(&train, &config).unwrap();
        let handles = bank.fit_all(&train).unwrap();
        let before: Vec<Metrics> = handles.iter().map(|h| h.metrics).collect();

        let cmp = evaluate(&handles, &eval).unwrap();
        assert_eq!(cmp.rows.len(), 4);
        assert_eq!(cmp.best().unwrap().name, "linear");
        assert!(cmp.get("mean_baseline").unwrap().metrics.rmse > 1.0);
        let after: Vec<Metrics> = handles.iter().map(|h| h.metrics).collect();
        assert_eq!(before, after);

        let preds = holdout_predictions(&handles[1], &eval);
        assert_eq!(preds.len(), 4);
        assert!(preds.iter().all(|p| p.residual.abs() < 1e-6));
    }

    #[test]
    fn empty_evaluation_partition_is_insufficient() {
        let train = vec![row("IOWA", 2000, 20.0, 180.0)];
        let bank = ModelBank::new(&train, &PipelineConfig::default()).unwrap();
        let handles = vec![bank.fit(ModelKind::MeanBaseline, &train).unwrap()];
        assert!(matches!(evaluate(&handles, &[]), Err(PipelineError::InsufficientData(_))));
    }
}
