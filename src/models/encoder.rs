//! Feature encoding shared by training and prediction.
//!
//! Column layout (fixed at fit time):
//!
//! ```text
//! [ state=<S1> .. state=<Sk> | state=<unknown> | avg_temp_season | total_rainfall_season | (year) ]
//! ```
//!
//! State columns follow the sorted list of training states. A state never seen
//! during fitting activates the `unknown` column instead of failing. Numeric
//! columns are standardized with training-set mean and standard deviation.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::domain::{normalize_state, TrainingRow};
use crate::error::PipelineError;

pub const UNKNOWN_STATE: &str = "<unknown>";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub name: String,
    pub mean: f64,
    pub scale: f64,
}

impl NumericColumn {
    fn fit(name: &str, values: &[f64]) -> Self {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        let sd = var.sqrt();
        Self {
            name: name.to_string(),
            mean,
            scale: if sd > 1e-12 { sd } else { 1.0 },
        }
    }

    fn apply(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }
}

/// Fitted encoder; one instance is shared by every model in a bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    states: Vec<String>,
    temperature: NumericColumn,
    rainfall: NumericColumn,
    year: Option<NumericColumn>,
}

/// Encoded design matrix and target.
#[derive(Debug, Clone)]
pub struct EncodedTable {
    pub x: DMatrix<f64>,
    pub y: Vec<f64>,
}

impl FeatureEncoder {
    /// Learn state vocabulary and numeric scaling from training rows.
    pub fn fit(rows: &[TrainingRow], year_trend: bool) -> Result<Self, PipelineError> {
        if rows.is_empty() {
            return Err(PipelineError::Fit("cannot fit encoder on an empty training set".into()));
        }
        check_finite(rows)?;

        let mut states: Vec<String> = rows.iter().map(|r| normalize_state(&r.state)).collect();
        states.sort();
        states.dedup();

        let temps: Vec<f64> = rows.iter().map(|r| r.avg_temp_season).collect();
        let rains: Vec<f64> = rows.iter().map(|r| r.total_rainfall_season).collect();
        let year = year_trend.then(|| {
            let years: Vec<f64> = rows.iter().map(|r| r.year as f64).collect();
            NumericColumn::fit("year", &years)
        });

        Ok(Self {
            states,
            temperature: NumericColumn::fit("avg_temp_season", &temps),
            rainfall: NumericColumn::fit("total_rainfall_season", &rains),
            year,
        })
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn uses_year(&self) -> bool {
        self.year.is_some()
    }

    /// Number of encoded columns.
    pub fn width(&self) -> usize {
        self.states.len() + 1 + 2 + usize::from(self.year.is_some())
    }

    /// Human-readable column names, in encoded order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.states.iter().map(|s| format!("state={s}")).collect();
        names.push(format!("state={UNKNOWN_STATE}"));
        names.push(self.temperature.name.clone());
        names.push(self.rainfall.name.clone());
        if let Some(year) = &self.year {
            names.push(year.name.clone());
        }
        names
    }

    /// Whether `state` (any spelling) was present at fit time.
    pub fn is_known_state(&self, state: &str) -> bool {
        self.state_index(state).is_some()
    }

    fn state_index(&self, state: &str) -> Option<usize> {
        self.states.binary_search(&normalize_state(state)).ok()
    }

    /// Encode one observation into a feature vector.
    pub fn encode(&self, state: &str, year: i32, avg_temp: f64, total_rainfall: f64) -> Vec<f64> {
        let mut out = vec![0.0; self.width()];
        let k = self.states.len();
        match self.state_index(state) {
            Some(i) => out[i] = 1.0,
            None => out[k] = 1.0,
        }
        out[k + 1] = self.temperature.apply(avg_temp);
        out[k + 2] = self.rainfall.apply(total_rainfall);
        if let Some(col) = &self.year {
            out[k + 3] = col.apply(year as f64);
        }
        out
    }

    pub fn encode_row(&self, row: &TrainingRow) -> Vec<f64> {
        self.encode(&row.state, row.year, row.avg_temp_season, row.total_rainfall_season)
    }

    /// Encode a table of rows into a design matrix plus target vector.
    pub fn encode_rows(&self, rows: &[TrainingRow]) -> Result<EncodedTable, PipelineError> {
        check_finite(rows)?;
        let width = self.width();
        let mut x = DMatrix::<f64>::zeros(rows.len(), width);
        for (i, row) in rows.iter().enumerate() {
            for (j, v) in self.encode_row(row).into_iter().enumerate() {
                x[(i, j)] = v;
            }
        }
        let y = rows.iter().map(|r| r.yield_bu_per_acre).collect();
        Ok(EncodedTable { x, y })
    }
}

fn check_finite(rows: &[TrainingRow]) -> Result<(), PipelineError> {
    for r in rows {
        let values = [r.avg_temp_season, r.total_rainfall_season, r.yield_bu_per_acre];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::Fit(format!(
                "non-finite value in training row {} {}",
                r.state, r.year
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(state: &str, year: i32, temp: f64, rain: f64) -> TrainingRow {
        TrainingRow {
            state: state.to_string(),
            year,
            avg_temp_season: temp,
            total_rainfall_season: rain,
            yield_bu_per_acre: 150.0,
        }
    }

    fn training() -> Vec<TrainingRow> {
        vec![
            row("OHIO", 2019, 20.0, 400.0),
            row("IOWA", 2019, 22.0, 600.0),
            row("IOWA", 2020, 24.0, 500.0),
        ]
    }

    #[test]
    fn columns_are_sorted_states_then_unknown_then_numeric() {
        let enc = FeatureEncoder::fit(&training(), false).unwrap();
        assert_eq!(
            enc.column_names(),
            vec![
                "state=IOWA",
                "state=OHIO",
                "state=<unknown>",
                "avg_temp_season",
                "total_rainfall_season"
            ]
        );
        assert_eq!(enc.width(), 5);
    }

    #[test]
    fn encoding_is_case_insensitive_and_standardized() {
        let enc = FeatureEncoder::fit(&training(), false).unwrap();
        let v = enc.encode(" ohio", 2019, 22.0, 500.0);
        assert_eq!(&v[..3], &[0.0, 1.0, 0.0]);
        // 22 and 500 are the training means.
        assert!(v[3].abs() < 1e-12);
        assert!(v[4].abs() < 1e-12);
    }

    #[test]
    fn unseen_state_activates_unknown_column() {
        let enc = FeatureEncoder::fit(&training(), false).unwrap();
        assert!(!enc.is_known_state("Nebraska"));
        let v = enc.encode("Nebraska", 2021, 21.0, 450.0);
        assert_eq!(&v[..3], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn year_trend_adds_a_column() {
        let enc = FeatureEncoder::fit(&training(), true).unwrap();
        assert_eq!(enc.width(), 6);
        assert_eq!(enc.column_names().last().unwrap(), "year");
    }

    #[test]
    fn fit_rejects_empty_and_non_finite() {
        assert!(matches!(FeatureEncoder::fit(&[], false), Err(PipelineError::Fit(_))));
        let bad = vec![row("IOWA", 2020, f64::NAN, 500.0)];
        assert!(matches!(FeatureEncoder::fit(&bad, false), Err(PipelineError::Fit(_))));
    }

    #[test]
    fn encoder_round_trips_through_json() {
        let enc = FeatureEncoder::fit(&training(), true).unwrap();
        let json = serde_json::to_string(&enc).unwrap();
        let back: FeatureEncoder = serde_json::from_str(&json).unwrap();
        assert_eq!(enc, back);
        assert_eq!(
            enc.encode("IOWA", 2021, 23.0, 550.0),
            back.encode("IOWA", 2021, 23.0, 550.0)
        );
    }
}
