//! Growing-season aggregation.
//!
//! Reduces monthly weather records to one feature vector per (state, year):
//! mean temperature and total rainfall over April–September. A season is only
//! aggregated when all six months are present; partial seasons are either an
//! error or (when configured) excluded entirely.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::domain::{normalize_state, SeasonalFeature, WeatherRecord, GROWING_MONTHS};
use crate::error::PipelineError;
use crate::prep::units::monthly_rainfall;

/// A (state, year) excluded because growing months were missing.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSeason {
    pub state: String,
    pub year: i32,
    pub missing: Vec<u32>,
}

/// Aggregation output: one feature per complete season + audit of skipped ones.
#[derive(Debug, Clone, Default)]
pub struct SeasonalAggregation {
    pub features: Vec<SeasonalFeature>,
    pub skipped: Vec<SkippedSeason>,
}

#[derive(Debug, Clone, Copy)]
struct MonthValues {
    temperature: f64,
    rainfall_mm: f64,
}

/// Aggregate monthly weather into growing-season features.
///
/// With `skip_incomplete = false` the first incomplete season fails the whole
/// aggregation with [`PipelineError::IncompleteSeason`].
pub fn aggregate_seasons(
    records: &[WeatherRecord],
    skip_incomplete: bool,
) -> Result<SeasonalAggregation, PipelineError> {
    let mut groups: BTreeMap<(String, i32), BTreeMap<u32, MonthValues>> = BTreeMap::new();

    for r in records {
        if !r.avg_temperature.is_finite() {
            return Err(PipelineError::Data(format!(
                "non-finite temperature for {} {}-{:02}",
                r.state, r.year, r.month
            )));
        }
        // Validates month range and rate sign for every record, in-season or not.
        let rainfall_mm = monthly_rainfall(r.year, r.month, r.precip_rate)?;

        let state = normalize_state(&r.state);
        if state.is_empty() {
            return Err(PipelineError::Data(format!(
                "empty state name in weather record for {}-{:02}",
                r.year, r.month
            )));
        }
        let months = groups.entry((state, r.year)).or_default();
        let previous = months.insert(
            r.month,
            MonthValues {
                temperature: r.avg_temperature,
                rainfall_mm,
            },
        );
        if previous.is_some() {
            return Err(PipelineError::Data(format!(
                "duplicate weather record for {} {}-{:02}",
                normalize_state(&r.state),
                r.year,
                r.month
            )));
        }
    }

    let mut out = SeasonalAggregation::default();
    for ((state, year), months) in groups {
        let missing: Vec<u32> = GROWING_MONTHS
            .iter()
            .copied()
            .filter(|m| !months.contains_key(m))
            .collect();

        if !missing.is_empty() {
            if skip_incomplete {
                warn!(%state, year, ?missing, "skipping incomplete growing season");
                out.skipped.push(SkippedSeason { state, year, missing });
                continue;
            }
            return Err(PipelineError::IncompleteSeason { state, year, missing });
        }

        let season: Vec<MonthValues> = GROWING_MONTHS.iter().map(|m| months[m]).collect();
        let avg_temp_season = season.iter().map(|v| v.temperature).sum::<f64>() / season.len() as f64;
        let total_rainfall_season = season.iter().map(|v| v.rainfall_mm).sum::<f64>();

        out.features.push(SeasonalFeature {
            state,
            year,
            avg_temp_season,
            total_rainfall_season,
        });
    }

    debug!(
        seasons = out.features.len(),
        skipped = out.skipped.len(),
        "aggregated growing seasons"
    );
    Ok(out)
}
