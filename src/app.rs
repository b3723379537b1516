//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs the pipeline for the chosen subcommand
//! - prints reports and writes optional exports

use std::fs;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, InputArgs, MergeArgs, ModelArgs, PredictArgs, RankArgs, RunArgs, SynthArgs};
use crate::domain::PipelineConfig;
use crate::error::{AppError, PipelineError};
use crate::predictor::PredictionRequest;

pub mod pipeline;

use pipeline::{Evaluation, PreparedData};

/// Entry point for the `cy` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Rank(args) => handle_rank(args),
        Command::Merge(args) => handle_merge(args),
        Command::Predict(args) => handle_predict(args),
        Command::Synth(args) => handle_synth(args),
    }
}

/// Logs go to stderr so stdout carries only the report.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber may already be installed (e.g. when embedded); keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = pipeline_config_from_args(&args.model);
    config.validate()?;
    let (prepared, evaluation) = prepare_and_evaluate(&args.input, &config)?;

    println!("{}", crate::report::format_run_summary(&prepared, &evaluation, &config));
    println!("{}", crate::report::format_merge_audit(&prepared));
    if args.top > 0 {
        let misses = crate::report::rank_misses(&evaluation.holdout, args.top);
        println!("{}", crate::report::format_misses(&misses));
    }

    if args.input.dataset.is_none() {
        let path = &args.export_dataset;
        crate::io::write_dataset_file(path, &prepared.dataset)?;
        info!(path = %path.display(), "wrote merged dataset");
    }

    // Optional exports.
    if let Some(path) = &args.export_comparison {
        crate::io::write_comparison_file(path, &evaluation.comparison)?;
        info!(path = %path.display(), "wrote comparison table");
    }
    if let (Some(path), Some(best)) = (&args.export_predictions, evaluation.comparison.best()) {
        crate::io::write_predictions_file(path, &best.name, &evaluation.holdout)?;
        info!(path = %path.display(), "wrote holdout predictions");
    }
    if let Some(path) = &args.export_bundle {
        let bundle = crate::io::ModelBundle::new(&config, &evaluation.handles, &evaluation.comparison)?;
        crate::io::write_bundle_file(path, &bundle)?;
        info!(path = %path.display(), "wrote model bundle");
    }

    Ok(())
}

fn handle_rank(args: RankArgs) -> Result<(), AppError> {
    let config = pipeline_config_from_args(&args.model);
    config.validate()?;
    let (_, evaluation) = prepare_and_evaluate(&args.input, &config)?;
    print!("{}", crate::report::format_comparison(&evaluation.comparison));
    Ok(())
}

fn handle_merge(args: MergeArgs) -> Result<(), AppError> {
    let config = PipelineConfig {
        skip_incomplete_seasons: args.skip_incomplete_seasons,
        ..PipelineConfig::default()
    };
    let prepared = pipeline::load_and_prepare(&args.weather, &args.yields, &config)?;
    crate::io::write_dataset_file(&args.out, &prepared.dataset)?;

    print!("{}", crate::report::format_dataset_summary(&prepared.dataset));
    print!("{}", crate::report::format_merge_audit(&prepared));
    println!("Wrote {}", args.out.display());
    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let bundle = crate::io::read_bundle_file(&args.bundle)?;
    let predictor = bundle.into_predictor()?;

    let request = PredictionRequest {
        state: args.state,
        year: args.year,
        avg_temperature: args.avg_temp,
        total_rainfall: args.rainfall,
    };
    let prediction = predictor.predict_request(&request, args.model.as_deref())?;
    print!("{}", crate::report::format_prediction(&request, &prediction));
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let mut sample_config = crate::data::SampleConfig {
        start_year: args.start_year,
        end_year: args.end_year,
        seed: args.seed,
        ..crate::data::SampleConfig::default()
    };
    if !args.states.is_empty() {
        sample_config.states = args.states;
    }
    let sample = crate::data::generate_sample(&sample_config)?;

    fs::create_dir_all(&args.out_dir).map_err(|e| PipelineError::io(&args.out_dir, e))?;
    let weather_path = args.out_dir.join("weather.csv");
    let yield_path = args.out_dir.join("yield.csv");
    crate::io::write_weather_file(&weather_path, &sample.weather)?;
    crate::io::write_yields_file(&yield_path, &sample.yields)?;

    println!(
        "Wrote {} weather rows to {} and {} yield rows to {}",
        sample.weather.len(),
        weather_path.display(),
        sample.yields.len(),
        yield_path.display()
    );
    Ok(())
}

/// Load inputs (raw tables or a persisted dataset) and run split/fit/evaluate.
fn prepare_and_evaluate(input: &InputArgs, config: &PipelineConfig) -> Result<(PreparedData, Evaluation), PipelineError> {
    let prepared = match (&input.dataset, &input.weather, &input.yields) {
        (Some(dataset), _, _) => PreparedData {
            aggregation: Default::default(),
            dataset: crate::io::load_merged_dataset(dataset)?,
            yield_row_errors: Vec::new(),
        },
        (None, Some(weather), Some(yields)) => pipeline::load_and_prepare(weather, yields, config)?,
        _ => {
            return Err(PipelineError::Config(
                "provide --weather and --yields, or --dataset".into(),
            ));
        }
    };
    let evaluation = pipeline::fit_and_evaluate(&prepared.dataset, config)?;
    Ok((prepared, evaluation))
}

pub fn pipeline_config_from_args(args: &ModelArgs) -> PipelineConfig {
    PipelineConfig {
        split_policy: args.split_policy,
        holdout_cutoff_year: args.holdout_cutoff_year,
        random_seed: args.seed,
        test_fraction: args.test_fraction,
        tree_count: args.tree_count,
        tree_depth: args.tree_depth,
        ridge_alpha: args.ridge_alpha,
        year_trend: args.year_trend,
        skip_incomplete_seasons: args.skip_incomplete_seasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    #[test]
    fn model_args_map_onto_pipeline_config() {
        let cli = Cli::try_parse_from(["cy", "rank", "--dataset", "d.csv", "--ridge-alpha", "2.5", "--year-trend"]).unwrap();
        let Command::Rank(args) = cli.command else {
            panic!("expected rank");
        };
        let config = pipeline_config_from_args(&args.model);
        assert_eq!(config.ridge_alpha, 2.5);
        assert!(config.year_trend);
        assert_eq!(
            PipelineConfig {
                ridge_alpha: 1.0,
                year_trend: false,
                ..config
            },
            PipelineConfig::default()
        );
    }

    #[test]
    fn missing_dataset_file_maps_to_exit_code_2() {
        let input = InputArgs {
            weather: None,
            yields: None,
            dataset: Some("/nonexistent/dataset.csv".into()),
        };
        let err = prepare_and_evaluate(&input, &PipelineConfig::default()).unwrap_err();
        assert_eq!(AppError::from(err).exit_code(), 2);
    }
}
