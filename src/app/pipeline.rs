//! Shared pipeline logic used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load -> seasonal aggregation -> merge -> split -> fit bank -> evaluate
//!
//! The subcommands then focus on presentation and exports.

use std::path::Path;

use tracing::info;

use crate::domain::{PipelineConfig, WeatherRecord, YieldRecord};
use crate::error::PipelineError;
use crate::fit::{evaluate, holdout_predictions, plan_split, Comparison, HoldoutPrediction, ModelBank, ModelHandle, Split};
use crate::io::{load_weather, load_yields, RowError};
use crate::predictor::Predictor;
use crate::prep::{aggregate_seasons, merge, MergedDataset, SeasonalAggregation};

/// Modeling table plus the audit trail of how it was built.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub aggregation: SeasonalAggregation,
    pub dataset: MergedDataset,
    /// Yield rows dropped at ingest (empty when records came from memory).
    pub yield_row_errors: Vec<RowError>,
}

/// Fitted models and their evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub split: Split,
    pub handles: Vec<ModelHandle>,
    pub comparison: Comparison,
    /// Holdout predictions of the top-ranked model.
    pub holdout: Vec<HoldoutPrediction>,
}

impl Evaluation {
    pub fn best_handle(&self) -> Option<&ModelHandle> {
        let best = &self.comparison.best()?.name;
        self.handles.iter().find(|h| &h.name == best)
    }

    pub fn predictor(&self) -> Result<Predictor, PipelineError> {
        Predictor::new(self.handles.clone(), &self.comparison)
    }
}

/// All computed outputs of a single `cy run`.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub prepared: PreparedData,
    pub evaluation: Evaluation,
}

/// Aggregate weather into seasons and join with yields.
pub fn prepare(
    weather: &[WeatherRecord],
    yields: &[YieldRecord],
    config: &PipelineConfig,
) -> Result<PreparedData, PipelineError> {
    let aggregation = aggregate_seasons(weather, config.skip_incomplete_seasons)?;
    info!(
        seasons = aggregation.features.len(),
        skipped = aggregation.skipped.len(),
        "aggregated growing seasons"
    );

    let dataset = merge(&aggregation.features, yields)?;
    if dataset.is_empty() {
        return Err(PipelineError::InsufficientData(
            "no (state, year) has both a complete season and a yield".into(),
        ));
    }

    Ok(PreparedData {
        aggregation,
        dataset,
        yield_row_errors: Vec::new(),
    })
}

/// Load both raw tables from disk and prepare the modeling table.
pub fn load_and_prepare(weather: &Path, yields: &Path, config: &PipelineConfig) -> Result<PreparedData, PipelineError> {
    let weather = load_weather(weather)?;
    let yields = load_yields(yields)?;
    let mut prepared = prepare(&weather, &yields.records, config)?;
    prepared.yield_row_errors = yields.row_errors;
    Ok(prepared)
}

/// Split, fit every model and rank them on the evaluation partition.
pub fn fit_and_evaluate(dataset: &MergedDataset, config: &PipelineConfig) -> Result<Evaluation, PipelineError> {
    config.validate()?;

    let split = plan_split(dataset.rows(), config)?;
    let bank = ModelBank::new(&split.train, config)?;
    let handles = bank.fit_all(&split.train)?;
    let comparison = evaluate(&handles, &split.eval)?;

    let holdout = comparison
        .best()
        .and_then(|best| handles.iter().find(|h| h.name == best.name))
        .map(|h| holdout_predictions(h, &split.eval))
        .unwrap_or_default();

    Ok(Evaluation {
        split,
        handles,
        comparison,
        holdout,
    })
}

/// Execute the full pipeline on in-memory tables.
pub fn run_pipeline(
    weather: &[WeatherRecord],
    yields: &[YieldRecord],
    config: &PipelineConfig,
) -> Result<RunOutput, PipelineError> {
    config.validate()?;
    let prepared = prepare(weather, yields, config)?;
    let evaluation = fit_and_evaluate(&prepared.dataset, config)?;
    Ok(RunOutput { prepared, evaluation })
}

/// Execute the full pipeline on CSV inputs.
pub fn load_and_run(weather: &Path, yields: &Path, config: &PipelineConfig) -> Result<RunOutput, PipelineError> {
    config.validate()?;
    let prepared = load_and_prepare(weather, yields, config)?;
    let evaluation = fit_and_evaluate(&prepared.dataset, config)?;
    Ok(RunOutput { prepared, evaluation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{generate_sample, SampleConfig};
    use crate::domain::{ModelKind, SplitPolicy, GROWING_MONTHS};

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            tree_count: 20,
            tree_depth: 4,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn synthetic_sample_runs_end_to_end() {
        let sample = generate_sample(&SampleConfig {
            start_year: 2005,
            end_year: 2023,
            ..SampleConfig::default()
        })
        .unwrap();
        let config = PipelineConfig {
            year_trend: true,
            ..small_config()
        };
        let out = run_pipeline(&sample.weather, &sample.yields, &config).unwrap();

        assert_eq!(out.prepared.dataset.len(), 6 * 19);
        assert!(out.evaluation.split.train.iter().all(|r| r.year < 2020));
        assert!(out.evaluation.split.eval.iter().all(|r| r.year >= 2020));
        assert_eq!(out.evaluation.comparison.rows.len(), ModelKind::ALL.len());
        assert_eq!(out.evaluation.holdout.len(), out.evaluation.split.eval.len());

        // Every informed model should beat predicting the training mean.
        let baseline = out.evaluation.comparison.get("mean_baseline").unwrap().metrics.rmse;
        assert_ne!(out.evaluation.comparison.best().unwrap().name, "mean_baseline");
        assert!(out.evaluation.comparison.best().unwrap().metrics.rmse < baseline);

        // Least squares has the smallest training error of the linear family.
        let training_rmse = |name: &str| {
            out.evaluation
                .handles
                .iter()
                .find(|h| h.name == name)
                .map(|h| h.metrics.rmse)
                .unwrap()
        };
        assert!(training_rmse("linear") <= training_rmse("ridge") + 1e-9);

        let predictor = out.evaluation.predictor().unwrap();
        let y = predictor.predict("Iowa", 2024, 21.0, 600.0, None).unwrap();
        assert!(y.is_finite() && y > 0.0);
    }

    #[test]
    fn pipeline_is_deterministic_for_a_seed() {
        let sample = generate_sample(&SampleConfig::default()).unwrap();
        let config = PipelineConfig {
            split_policy: SplitPolicy::RandomHoldout,
            ..small_config()
        };
        let a = run_pipeline(&sample.weather, &sample.yields, &config).unwrap();
        let b = run_pipeline(&sample.weather, &sample.yields, &config).unwrap();
        assert_eq!(a.evaluation.split, b.evaluation.split);
        assert_eq!(a.evaluation.comparison, b.evaluation.comparison);
    }

    #[test]
    fn iowa_2021_single_season() {
        let temps = [15.0, 18.0, 22.0, 25.0, 24.0, 20.0];
        // April, June and September have 30 days; the rest 31. 100 mm per month.
        let weather: Vec<WeatherRecord> = GROWING_MONTHS
            .iter()
            .zip(temps)
            .map(|(&month, t)| {
                let days = if matches!(month, 4 | 6 | 9) { 30.0 } else { 31.0 };
                WeatherRecord {
                    state: "Iowa".into(),
                    year: 2021,
                    month,
                    avg_temperature: t,
                    precip_rate: 100.0 / days,
                }
            })
            .collect();
        let yields = vec![YieldRecord {
            state: "IOWA".into(),
            year: 2021,
            yield_bu_per_acre: 190.0,
        }];

        let prepared = prepare(&weather, &yields, &PipelineConfig::default()).unwrap();
        let rows = prepared.dataset.rows();
        assert_eq!(rows.len(), 1);
        assert!((rows[0].avg_temp_season - 20.67).abs() < 0.01);
        assert!((rows[0].total_rainfall_season - 600.0).abs() < 1e-9);

        let bank = ModelBank::new(rows, &PipelineConfig::default()).unwrap();
        let baseline = bank.fit(ModelKind::MeanBaseline, rows).unwrap();
        assert_eq!(baseline.predict("IOWA", 2021, 20.67, 600.0), 190.0);
    }

    #[test]
    fn single_year_cannot_be_split_by_year() {
        let sample = generate_sample(&SampleConfig {
            start_year: 2015,
            end_year: 2015,
            ..SampleConfig::default()
        })
        .unwrap();
        let err = run_pipeline(&sample.weather, &sample.yields, &small_config()).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn csv_inputs_match_in_memory_run() {
        let sample = generate_sample(&SampleConfig {
            start_year: 2012,
            end_year: 2022,
            ..SampleConfig::default()
        })
        .unwrap();
        let dir = std::env::temp_dir().join(format!("cy-pipeline-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let weather_path = dir.join("weather.csv");
        let yield_path = dir.join("yield.csv");
        crate::io::write_weather_file(&weather_path, &sample.weather).unwrap();
        crate::io::write_yields_file(&yield_path, &sample.yields).unwrap();

        let from_files = load_and_run(&weather_path, &yield_path, &small_config()).unwrap();
        let in_memory = run_pipeline(&sample.weather, &sample.yields, &small_config()).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(from_files.prepared.dataset.len(), in_memory.prepared.dataset.len());
        assert_eq!(
            from_files.evaluation.comparison.ranked_names(),
            in_memory.evaluation.comparison.ranked_names()
        );
        assert!(from_files.prepared.yield_row_errors.is_empty());
    }
}
