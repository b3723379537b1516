//! The model bank: every regression strategy fitted against the same training
//! partition through one shared encoder.
//!
//! Responsibilities:
//!
//! - fit the [`FeatureEncoder`] once on the training rows
//! - encode the training table once and share it read-only
//! - fit each strategy (in parallel) and wrap it in a [`ModelHandle`]

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{Metrics, ModelKind, PipelineConfig, TrainingRow};
use crate::error::PipelineError;
use crate::math::regression_metrics;
use crate::models::{EncodedTable, Estimator, FeatureEncoder, ForestParams, LinearModel, MeanModel, RandomForest};

/// A fitted model plus the encoder it was trained with.
///
/// `metrics` are in-sample (training partition) metrics; holdout metrics are
/// produced by the evaluator without touching the handle.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    pub name: String,
    pub kind: ModelKind,
    pub estimator: Estimator,
    pub encoder: Arc<FeatureEncoder>,
    pub metrics: Metrics,
}

impl ModelHandle {
    /// Predict one observation (encoding with the shared encoder).
    pub fn predict(&self, state: &str, year: i32, avg_temp: f64, total_rainfall: f64) -> f64 {
        let features = self.encoder.encode(state, year, avg_temp, total_rainfall);
        self.estimator.predict(&features)
    }

    pub fn predict_row(&self, row: &TrainingRow) -> f64 {
        self.predict(&row.state, row.year, row.avg_temp_season, row.total_rainfall_season)
    }

    /// Named feature importances, highest first (forest only).
    pub fn feature_importances(&self) -> Option<Vec<(String, f64)>> {
        let values = self.estimator.importances()?;
        let mut named: Vec<(String, f64)> = self.encoder.column_names().into_iter().zip(values.iter().copied()).collect();
        named.sort_by(|a, b| b.1.total_cmp(&a.1));
        Some(named)
    }
}

/// Hyperparameters for the bank, taken from [`PipelineConfig`].
#[derive(Debug, Clone, Copy)]
pub struct BankOptions {
    pub ridge_alpha: f64,
    pub tree_count: usize,
    pub tree_depth: usize,
    pub seed: u64,
}

impl From<&PipelineConfig> for BankOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            ridge_alpha: config.ridge_alpha,
            tree_count: config.tree_count,
            tree_depth: config.tree_depth,
            seed: config.random_seed,
        }
    }
}

pub struct ModelBank {
    encoder: Arc<FeatureEncoder>,
    options: BankOptions,
}

impl ModelBank {
    /// Fit the shared encoder on the training rows.
    pub fn new(training_rows: &[TrainingRow], config: &PipelineConfig) -> Result<Self, PipelineError> {
        let encoder = FeatureEncoder::fit(training_rows, config.year_trend)?;
        debug!(columns = encoder.width(), states = encoder.states().len(), "fitted feature encoder");
        Ok(Self {
            encoder: Arc::new(encoder),
            options: BankOptions::from(config),
        })
    }

    pub fn encoder(&self) -> &Arc<FeatureEncoder> {
        &self.encoder
    }

    /// Fit a single strategy.
    pub fn fit(&self, kind: ModelKind, training_rows: &[TrainingRow]) -> Result<ModelHandle, PipelineError> {
        let table = self.encode_training(training_rows)?;
        self.fit_encoded(kind, &table)
    }

    /// Fit every strategy in bank order. Fits run in parallel over the shared,
    /// immutable encoded table; the returned order is always [`ModelKind::ALL`].
    pub fn fit_all(&self, training_rows: &[TrainingRow]) -> Result<Vec<ModelHandle>, PipelineError> {
        let table = self.encode_training(training_rows)?;
        let handles = ModelKind::ALL
            .par_iter()
            .map(|&kind| self.fit_encoded(kind, &table))
            .collect::<Result<Vec<_>, _>>()?;
        info!(models = handles.len(), rows = table.y.len(), "fitted model bank");
        Ok(handles)
    }

    fn encode_training(&self, training_rows: &[TrainingRow]) -> Result<EncodedTable, PipelineError> {
        if training_rows.is_empty() {
            return Err(PipelineError::Fit("training set is empty".into()));
        }
        self.encoder.encode_rows(training_rows)
    }

    fn fit_encoded(&self, kind: ModelKind, table: &EncodedTable) -> Result<ModelHandle, PipelineError> {
        let opts = &self.options;
        let estimator = match kind {
            ModelKind::MeanBaseline => Estimator::Mean(
                MeanModel::fit(&table.y).ok_or_else(|| PipelineError::Fit("training set is empty".into()))?,
            ),
            ModelKind::Linear => Estimator::Linear(LinearModel::fit_ols(&table.x, &table.y)?),
            ModelKind::Ridge => Estimator::Linear(LinearModel::fit_ridge(&table.x, &table.y, opts.ridge_alpha)?),
            ModelKind::RandomForest => Estimator::Forest(RandomForest::fit(
                &table.x,
                &table.y,
                ForestParams {
                    tree_count: opts.tree_count,
                    max_depth: opts.tree_depth,
                    min_samples_leaf: 1,
                    seed: opts.seed,
                },
            )?),
        };

        let fitted: Vec<f64> = (0..table.x.nrows())
            .map(|i| {
                let row: Vec<f64> = table.x.row(i).iter().copied().collect();
                estimator.predict(&row)
            })
            .collect();
        if fitted.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::Fit(format!("{} produced non-finite fitted values", kind.name())));
        }
        let metrics = regression_metrics(&table.y, &fitted)
            .ok_or_else(|| PipelineError::Fit("training set is empty".into()))?;

        debug!(model = kind.name(), rmse = metrics.rmse, r2 = metrics.r2, "fitted model");
        Ok(ModelHandle {
            name: kind.name().to_string(),
            kind,
            estimator,
            encoder: Arc::clone(&self.encoder),
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(state: &str, year: i32, temp: f64, rain: f64, y: f64) -> TrainingRow {
        TrainingRow {
            state: state.to_string(),
            year,
            avg_temp_season: temp,
            total_rainfall_season: rain,
            yield_bu_per_acre: y,
        }
    }

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            tree_count: 10,
            tree_depth: 4,
            ..PipelineConfig::default()
        }
    }

    fn linear_world() -> Vec<TrainingRow> {
        // yield = 300 - 5 * temp + 0.1 * rain + state offset
        let mut rows = Vec::new();
        for (state, offset) in [("IOWA", 20.0), ("OHIO", 0.0), ("KANSAS", -30.0)] {
            for (i, year) in (2000..2012).enumerate() {
                let temp = 18.0 + (i % 5) as f64;
                let rain = 400.0 + 25.0 * (i % 7) as f64;
                rows.push(row(state, year, temp, rain, 300.0 - 5.0 * temp + 0.1 * rain + offset));
            }
        }
        rows
    }

    #[test]
    fn fit_all_returns_models_in_bank_order_sharing_one_encoder() {
        let rows = linear_world();
        let bank = ModelBank::new(&rows, &small_config()).unwrap();
        let handles = bank.fit_all(&rows).unwrap();

        let names: Vec<&str> = handles.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["mean_baseline", "linear", "ridge", "random_forest"]);
        for h in &handles {
            assert!(Arc::ptr_eq(&h.encoder, bank.encoder()));
        }
    }

    #[test]
    fn linear_model_fits_a_linear_world_exactly() {
        let rows = linear_world();
        let bank = ModelBank::new(&rows, &small_config()).unwrap();
        let linear = bank.fit(ModelKind::Linear, &rows).unwrap();

        assert!(linear.metrics.rmse < 1e-6, "rmse={}", linear.metrics.rmse);
        let expected = 300.0 - 5.0 * 20.0 + 0.1 * 500.0 + 20.0;
        assert!((linear.predict("iowa", 2030, 20.0, 500.0) - expected).abs() < 1e-6);
    }

    #[test]
    fn mean_baseline_predicts_training_mean() {
        let rows = vec![row("IOWA", 2019, 20.0, 500.0, 180.0), row("OHIO", 2019, 21.0, 450.0, 160.0)];
        let bank = ModelBank::new(&rows, &small_config()).unwrap();
        let h = bank.fit(ModelKind::MeanBaseline, &rows).unwrap();
        assert_eq!(h.predict("TEXAS", 2040, 35.0, 10.0), 170.0);
    }

    #[test]
    fn parallel_fit_is_reproducible() {
        let rows = linear_world();
        let bank = ModelBank::new(&rows, &small_config()).unwrap();
        let a = bank.fit_all(&rows).unwrap();
        let b = bank.fit_all(&rows).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.estimator, y.estimator);
        }
    }

    #[test]
    fn empty_or_non_finite_training_is_a_fit_error() {
        let rows = linear_world();
        let bank = ModelBank::new(&rows, &small_config()).unwrap();
        assert!(matches!(bank.fit(ModelKind::Linear, &[]), Err(PipelineError::Fit(_))));

        let bad = vec![row("IOWA", 2019, 20.0, f64::INFINITY, 180.0)];
        assert!(matches!(bank.fit_all(&bad), Err(PipelineError::Fit(_))));
        assert!(matches!(ModelBank::new(&[], &small_config()), Err(PipelineError::Fit(_))));
    }

    #[test]
    fn forest_reports_named_importances() {
        let rows = linear_world();
        let bank = ModelBank::new(&rows, &small_config()).unwrap();
        let forest = bank.fit(ModelKind::RandomForest, &rows).unwrap();
        let imp = forest.feature_importances().unwrap();

        assert_eq!(imp.len(), bank.encoder().width());
        assert!(imp.windows(2).all(|w| w[0].1 >= w[1].1));
        let linear = bank.fit(ModelKind::Linear, &rows).unwrap();
        assert!(linear.feature_importances().is_none());
    }
}
