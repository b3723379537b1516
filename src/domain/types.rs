//! Shared domain types.
//!
//! Row types are plain structs with one field per column so that every stage
//! works against a fixed schema. They derive `Serialize`/`Deserialize` so the
//! same types are used for CSV export and for the model bundle.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Corn growing season: April through September inclusive.
pub const GROWING_MONTHS: [u32; 6] = [4, 5, 6, 7, 8, 9];

/// One monthly weather observation for a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub state: String,
    pub year: i32,
    pub month: u32,
    /// Mean 2m air temperature (°C).
    pub avg_temperature: f64,
    /// Precipitation as a daily rate (mm/day).
    pub precip_rate: f64,
}

/// Growing-season aggregate for one (state, year).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalFeature {
    pub state: String,
    pub year: i32,
    pub avg_temp_season: f64,
    /// Total growing-season rainfall (mm).
    pub total_rainfall_season: f64,
}

/// Annual state-level corn yield.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldRecord {
    pub state: String,
    pub year: i32,
    pub yield_bu_per_acre: f64,
}

/// One row of the merged modeling table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub state: String,
    pub year: i32,
    pub avg_temp_season: f64,
    pub total_rainfall_season: f64,
    pub yield_bu_per_acre: f64,
}

impl TrainingRow {
    pub fn key(&self) -> (&str, i32) {
        (&self.state, self.year)
    }
}

/// Train/evaluation partitioning policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SplitPolicy {
    /// Stratified (by state) seeded random row split.
    #[value(name = "random_holdout", alias = "random-holdout")]
    RandomHoldout,
    /// Years at or after the cutoff are held out for evaluation.
    #[value(name = "year_holdout", alias = "year-holdout")]
    YearHoldout,
}

/// Regression strategies in the model bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    MeanBaseline,
    Linear,
    Ridge,
    RandomForest,
}

impl ModelKind {
    /// Every model, in bank (insertion) order.
    pub const ALL: [ModelKind; 4] = [
        ModelKind::MeanBaseline,
        ModelKind::Linear,
        ModelKind::Ridge,
        ModelKind::RandomForest,
    ];

    /// Stable identifier used on the command line and in exports.
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::MeanBaseline => "mean_baseline",
            ModelKind::Linear => "linear",
            ModelKind::Ridge => "ridge",
            ModelKind::RandomForest => "random_forest",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::MeanBaseline => "Mean baseline",
            ModelKind::Linear => "Linear regression",
            ModelKind::Ridge => "Ridge regression",
            ModelKind::RandomForest => "Random forest",
        }
    }
}

/// Regression error metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
    pub n: usize,
}

/// Everything the pipeline needs to know for one run.
///
/// Built from CLI flags / environment, and stored in the model bundle so a
/// later `predict` can report how its models were trained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub split_policy: SplitPolicy,
    pub holdout_cutoff_year: i32,
    pub random_seed: u64,
    /// Share of each state's rows held out under `random_holdout`.
    pub test_fraction: f64,
    pub tree_count: usize,
    pub tree_depth: usize,
    pub ridge_alpha: f64,
    /// Add the year as a numeric trend feature.
    pub year_trend: bool,
    /// Drop incomplete (state, year) seasons instead of failing.
    pub skip_incomplete_seasons: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            split_policy: SplitPolicy::YearHoldout,
            holdout_cutoff_year: 2020,
            random_seed: 42,
            test_fraction: 0.2,
            tree_count: 200,
            tree_depth: 8,
            ridge_alpha: 1.0,
            year_trend: false,
            skip_incomplete_seasons: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.test_fraction.is_finite() && self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PipelineError::Config(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.tree_count == 0 {
            return Err(PipelineError::Config("tree_count must be >= 1".into()));
        }
        if self.tree_depth == 0 {
            return Err(PipelineError::Config("tree_depth must be >= 1".into()));
        }
        if !(self.ridge_alpha.is_finite() && self.ridge_alpha > 0.0) {
            return Err(PipelineError::Config(format!(
                "ridge_alpha must be finite and > 0, got {}",
                self.ridge_alpha
            )));
        }
        Ok(())
    }
}

/// Canonical state spelling: trimmed, inner whitespace collapsed, uppercase.
pub fn normalize_state(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_state_ignores_case_and_spacing() {
        assert_eq!(normalize_state("  new   york "), "NEW YORK");
        assert_eq!(normalize_state("Iowa"), normalize_state("IOWA\t"));
    }

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_non_positive_ridge_alpha() {
        let config = PipelineConfig {
            ridge_alpha: 0.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }
}
