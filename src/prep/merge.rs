//! Join of seasonal weather features with yield records.
//!
//! The merger owns the canonical modeling table. Keys are compared after state
//! normalization, output is sorted by (state, year), and every key that fails to
//! find a partner is recorded for audit rather than silently disappearing.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::domain::{normalize_state, SeasonalFeature, TrainingRow, YieldRecord};
use crate::error::PipelineError;

/// Which side of the join lacked a partner for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MissingSide {
    /// Weather exists but no yield was reported.
    Yield,
    /// Yield exists but no complete weather season.
    Weather,
}

/// A (state, year) key dropped by the inner join.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DroppedKey {
    pub state: String,
    pub year: i32,
    pub missing: MissingSide,
}

/// Merged modeling table plus the join audit.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedDataset {
    rows: Vec<TrainingRow>,
    dropped: Vec<DroppedKey>,
}

impl MergedDataset {
    /// Wrap rows that were already merged (e.g. re-read from the persisted CSV).
    ///
    /// Rows are re-normalized, checked for duplicate keys and sorted so the
    /// invariants match a fresh merge.
    pub fn from_rows(rows: Vec<TrainingRow>) -> Result<Self, PipelineError> {
        let mut by_key: BTreeMap<(String, i32), TrainingRow> = BTreeMap::new();
        for mut row in rows {
            row.state = normalize_state(&row.state);
            check_finite_row(&row)?;
            let key = (row.state.clone(), row.year);
            if by_key.insert(key, row).is_some() {
                return Err(PipelineError::Data("duplicate (state, year) in merged dataset".into()));
            }
        }
        Ok(Self {
            rows: by_key.into_values().collect(),
            dropped: Vec::new(),
        })
    }

    pub fn rows(&self) -> &[TrainingRow] {
        &self.rows
    }

    /// Keys present on only one side of the join.
    pub fn dropped(&self) -> &[DroppedKey] {
        &self.dropped
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct states in the table, sorted.
    pub fn states(&self) -> Vec<String> {
        let mut states: Vec<String> = self.rows.iter().map(|r| r.state.clone()).collect();
        states.dedup();
        states
    }

    /// Inclusive (min, max) year range, if any rows exist.
    pub fn year_range(&self) -> Option<(i32, i32)> {
        let min = self.rows.iter().map(|r| r.year).min()?;
        let max = self.rows.iter().map(|r| r.year).max()?;
        Some((min, max))
    }
}

/// Inner-join seasonal features with yields on normalized (state, year).
pub fn merge(features: &[SeasonalFeature], yields: &[YieldRecord]) -> Result<MergedDataset, PipelineError> {
    let mut weather: BTreeMap<(String, i32), &SeasonalFeature> = BTreeMap::new();
    for f in features {
        if !(f.avg_temp_season.is_finite() && f.total_rainfall_season.is_finite()) {
            return Err(PipelineError::Data(format!(
                "non-finite seasonal feature for {} {}",
                f.state, f.year
            )));
        }
        let key = (normalize_state(&f.state), f.year);
        if weather.insert(key.clone(), f).is_some() {
            return Err(PipelineError::Data(format!(
                "duplicate seasonal feature for {} {}",
                key.0, key.1
            )));
        }
    }

    let mut reported: BTreeMap<(String, i32), &YieldRecord> = BTreeMap::new();
    for y in yields {
        if !(y.yield_bu_per_acre.is_finite() && y.yield_bu_per_acre >= 0.0) {
            return Err(PipelineError::Data(format!(
                "invalid yield {} for {} {}",
                y.yield_bu_per_acre, y.state, y.year
            )));
        }
        let key = (normalize_state(&y.state), y.year);
        if reported.insert(key.clone(), y).is_some() {
            return Err(PipelineError::Data(format!("duplicate yield record for {} {}", key.0, key.1)));
        }
    }

    let mut rows = Vec::new();
    let mut dropped = Vec::new();

    for ((state, year), f) in &weather {
        match reported.get(&(state.clone(), *year)) {
            Some(y) => rows.push(TrainingRow {
                state: state.clone(),
                year: *year,
                avg_temp_season: f.avg_temp_season,
                total_rainfall_season: f.total_rainfall_season,
                yield_bu_per_acre: y.yield_bu_per_acre,
            }),
            None => dropped.push(DroppedKey {
                state: state.clone(),
                year: *year,
                missing: MissingSide::Yield,
            }),
        }
    }
    for (state, year) in reported.keys() {
        if !weather.contains_key(&(state.clone(), *year)) {
            dropped.push(DroppedKey {
                state: state.clone(),
                year: *year,
                missing: MissingSide::Weather,
            });
        }
    }
    dropped.sort();

    if !dropped.is_empty() {
        warn!(dropped = dropped.len(), "join dropped keys without a partner");
    }
    info!(rows = rows.len(), "merged seasonal weather with yields");

    Ok(MergedDataset { rows, dropped })
}

fn check_finite_row(row: &TrainingRow) -> Result<(), PipelineError> {
    let values = [row.avg_temp_season, row.total_rainfall_season, row.yield_bu_per_acre];
    if values.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::Data(format!(
            "non-finite value in merged row {} {}",
            row.state, row.year
        )));
    }
    if row.yield_bu_per_acre < 0.0 {
        return Err(PipelineError::Data(format!(
            "negative yield in merged row {} {}",
            row.state, row.year
        )));
    }
    Ok(())
}
