//! Command-line parsing for the corn yield model comparison tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code. Every pipeline option can also be set
//! through a `CY_*` environment variable (or a `.env` file).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::SplitPolicy;

/// Where `cy run` persists the merged dataset unless told otherwise.
pub const DEFAULT_DATASET_OUT: &str = "merged_dataset.csv";

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cy", version, about = "Corn yield from growing-season weather: build, compare and apply models")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the dataset, fit every model, print the comparison, and optionally export.
    Run(RunArgs),
    /// Print the ranked comparison table only (useful for scripting).
    Rank(RankArgs),
    /// Aggregate weather, join with yields and write the merged dataset CSV.
    Merge(MergeArgs),
    /// Predict yield for one state-season from a saved model bundle.
    Predict(PredictArgs),
    /// Write a synthetic weather/yield sample for demos and testing.
    Synth(SynthArgs),
}

/// Where the modeling table comes from.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Monthly weather CSV (state, year, month, avg_temperature, precip_rate).
    #[arg(long, env = "CY_WEATHER", requires = "yields", required_unless_present = "dataset")]
    pub weather: Option<PathBuf>,

    /// Annual yield CSV (state, year, yield_bu_per_acre).
    #[arg(long, env = "CY_YIELDS", requires = "weather")]
    pub yields: Option<PathBuf>,

    /// Previously merged dataset CSV; skips aggregation and merge.
    #[arg(long, env = "CY_DATASET", conflicts_with_all = ["weather", "yields"])]
    pub dataset: Option<PathBuf>,
}

/// Options that shape the split and the models.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// How rows are partitioned into training and evaluation.
    #[arg(long, value_enum, env = "CY_SPLIT_POLICY", default_value_t = SplitPolicy::YearHoldout)]
    pub split_policy: SplitPolicy,

    /// First evaluation year under `year_holdout`.
    #[arg(long, env = "CY_HOLDOUT_CUTOFF_YEAR", default_value_t = 2020)]
    pub holdout_cutoff_year: i32,

    /// Seed for the random split and the forest.
    #[arg(long, env = "CY_RANDOM_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Share of each state's rows held out under `random_holdout`.
    #[arg(long, env = "CY_TEST_FRACTION", default_value_t = 0.2)]
    pub test_fraction: f64,

    /// Number of trees in the random forest.
    #[arg(long, env = "CY_TREE_COUNT", default_value_t = 200)]
    pub tree_count: usize,

    /// Maximum depth of each forest tree.
    #[arg(long, env = "CY_TREE_DEPTH", default_value_t = 8)]
    pub tree_depth: usize,

    /// L2 penalty of the ridge model.
    #[arg(long, env = "CY_RIDGE_ALPHA", default_value_t = 1.0)]
    pub ridge_alpha: f64,

    /// Add the year as a numeric trend feature.
    #[arg(long, env = "CY_YEAR_TREND")]
    pub year_trend: bool,

    /// Drop seasons missing a growing month instead of failing.
    #[arg(long, env = "CY_SKIP_INCOMPLETE_SEASONS")]
    pub skip_incomplete_seasons: bool,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Show the top-N under- and over-predicted holdout rows of the best model.
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Merged dataset CSV written on every run built from raw tables
    /// (runs started from `--dataset` leave it untouched).
    #[arg(long = "export-dataset", value_name = "CSV", env = "CY_DATASET_OUT", default_value = DEFAULT_DATASET_OUT)]
    pub export_dataset: PathBuf,

    /// Write the comparison table CSV.
    #[arg(long = "export-comparison", value_name = "CSV")]
    pub export_comparison: Option<PathBuf>,

    /// Write holdout predictions of the best model to CSV.
    #[arg(long = "export-predictions", value_name = "CSV")]
    pub export_predictions: Option<PathBuf>,

    /// Write the model bundle JSON used by `cy predict`.
    #[arg(long = "export-bundle", value_name = "JSON", env = "CY_BUNDLE")]
    pub export_bundle: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct RankArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Debug, Args, Clone)]
pub struct MergeArgs {
    /// Monthly weather CSV.
    #[arg(long, env = "CY_WEATHER")]
    pub weather: PathBuf,

    /// Annual yield CSV.
    #[arg(long, env = "CY_YIELDS")]
    pub yields: PathBuf,

    /// Output path of the merged dataset CSV.
    #[arg(long, short = 'o', env = "CY_DATASET")]
    pub out: PathBuf,

    /// Drop seasons missing a growing month instead of failing.
    #[arg(long, env = "CY_SKIP_INCOMPLETE_SEASONS")]
    pub skip_incomplete_seasons: bool,
}

#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    /// Model bundle JSON produced by `cy run --export-bundle`.
    #[arg(long, env = "CY_BUNDLE", value_name = "JSON")]
    pub bundle: PathBuf,

    #[arg(long)]
    pub state: String,

    #[arg(long)]
    pub year: i32,

    /// Growing-season mean temperature (°C).
    #[arg(long = "avg-temp", allow_negative_numbers = true)]
    pub avg_temp: f64,

    /// Growing-season total rainfall (mm).
    #[arg(long)]
    pub rainfall: f64,

    /// Model name (defaults to the top-ranked model in the bundle).
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Directory for `weather.csv` and `yield.csv` (created if missing).
    #[arg(long = "out-dir", value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Comma-separated state names (defaults to six Corn Belt states).
    #[arg(long, value_delimiter = ',')]
    pub states: Vec<String>,

    #[arg(long, default_value_t = 2000)]
    pub start_year: i32,

    /// Last year (inclusive).
    #[arg(long, default_value_t = 2023)]
    pub end_year: i32,

    #[arg(long, env = "CY_RANDOM_SEED", default_value_t = 42)]
    pub seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_accepts_raw_tables() {
        let cli = Cli::try_parse_from([
            "cy",
            "run",
            "--weather",
            "w.csv",
            "--yields",
            "y.csv",
            "--split-policy",
            "random_holdout",
            "--tree-count",
            "10",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.input.weather, Some(PathBuf::from("w.csv")));
        assert_eq!(args.model.split_policy, SplitPolicy::RandomHoldout);
        assert_eq!(args.model.tree_count, 10);
        assert_eq!(args.model.holdout_cutoff_year, 2020);
        assert_eq!(args.export_dataset, PathBuf::from(DEFAULT_DATASET_OUT));
    }

    #[test]
    fn dataset_conflicts_with_raw_tables() {
        let res = Cli::try_parse_from(["cy", "rank", "--dataset", "d.csv", "--weather", "w.csv", "--yields", "y.csv"]);
        assert!(res.is_err());
    }

    #[test]
    fn predict_accepts_negative_temperature() {
        let cli = Cli::try_parse_from([
            "cy", "predict", "--bundle", "b.json", "--state", "Iowa", "--year", "2021", "--avg-temp", "-3.5",
            "--rainfall", "600",
        ])
        .unwrap();
        let Command::Predict(args) = cli.command else {
            panic!("expected predict");
        };
        assert_eq!(args.avg_temp, -3.5);
        assert!(args.model.is_none());
    }
}
