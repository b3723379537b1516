//! Synthetic weather and yield tables.
//!
//! Produces raw tables in the same shape as real inputs (monthly weather,
//! annual yields) so the full pipeline can run without downloads. Output is
//! deterministic for a given seed.

use std::f64::consts::PI;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{normalize_state, WeatherRecord, YieldRecord, GROWING_MONTHS};
use crate::error::PipelineError;
use crate::prep::monthly_rainfall;

/// Growing-season temperature with the best yield response (°C).
const OPTIMAL_SEASON_TEMP: f64 = 21.0;
/// Growing-season rainfall with the best yield response (mm).
const OPTIMAL_SEASON_RAIN: f64 = 600.0;
/// National yield trend (bu/acre per year).
const YIELD_TREND: f64 = 1.9;
const BASE_YIELD: f64 = 135.0;
/// Longest year span a sample may cover.
pub const MAX_SAMPLE_YEARS: usize = 500;

pub const DEFAULT_STATES: [&str; 6] = ["IOWA", "ILLINOIS", "NEBRASKA", "MINNESOTA", "INDIANA", "OHIO"];

#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    pub states: Vec<String>,
    pub start_year: i32,
    /// Inclusive.
    pub end_year: i32,
    pub seed: u64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            states: DEFAULT_STATES.iter().map(|s| s.to_string()).collect(),
            start_year: 2000,
            end_year: 2023,
            seed: 42,
        }
    }
}

/// Per-state climate and productivity level.
#[derive(Debug, Clone, Copy)]
struct StateProfile {
    annual_mean_temp: f64,
    seasonal_amplitude: f64,
    base_precip_rate: f64,
    yield_level: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleData {
    pub weather: Vec<WeatherRecord>,
    pub yields: Vec<YieldRecord>,
}

pub fn generate_sample(config: &SampleConfig) -> Result<SampleData, PipelineError> {
    if config.states.is_empty() {
        return Err(PipelineError::Config("sample needs at least one state".into()));
    }
    if config.end_year < config.start_year {
        return Err(PipelineError::Config(format!(
            "sample end year {} is before start year {}",
            config.end_year, config.start_year
        )));
    }

    let span = i64::from(config.end_year) - i64::from(config.start_year) + 1;
    let n_years = usize::try_from(span)
        .ok()
        .filter(|n| *n <= MAX_SAMPLE_YEARS)
        .ok_or_else(|| {
            PipelineError::Config(format!(
                "sample covers {span} years; at most {MAX_SAMPLE_YEARS} are supported"
            ))
        })?;

    let mut states: Vec<String> = config.states.iter().map(|s| normalize_state(s)).collect();
    if states.iter().any(String::is_empty) {
        return Err(PipelineError::Config("sample state names must not be empty".into()));
    }
    states.sort();
    states.dedup();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise = |sd: f64| Normal::new(0.0, sd).map_err(|e| PipelineError::Config(format!("noise distribution error: {e}")));
    let temp_noise = noise(1.2)?;
    let year_anomaly = noise(0.8)?;
    let precip_noise = noise(0.7)?;
    let yield_noise = noise(6.0)?;
    let level_noise = noise(12.0)?;

    let profiles: Vec<StateProfile> = states
        .iter()
        .map(|_| StateProfile {
            annual_mean_temp: rng.gen_range(8.0..12.0),
            seasonal_amplitude: rng.gen_range(12.0..15.0),
            base_precip_rate: rng.gen_range(2.0..3.5),
            yield_level: level_noise.sample(&mut rng),
        })
        .collect();

    let mut weather = Vec::with_capacity(states.len() * n_years * 12);
    let mut yields = Vec::with_capacity(states.len() * n_years);

    for (state, profile) in states.iter().zip(&profiles) {
        for year in config.start_year..=config.end_year {
            let anomaly = year_anomaly.sample(&mut rng);
            let mut season_temp = 0.0;
            let mut season_rain = 0.0;

            for month in 1..=12u32 {
                // Coldest in January, warmest in July.
                let phase = -(2.0 * PI * (month as f64 - 1.0) / 12.0).cos();
                let avg_temperature =
                    profile.annual_mean_temp + profile.seasonal_amplitude * phase + anomaly + temp_noise.sample(&mut rng);
                let precip_rate =
                    (profile.base_precip_rate + 0.8 * phase + precip_noise.sample(&mut rng)).max(0.0);

                if GROWING_MONTHS.contains(&month) {
                    season_temp += avg_temperature;
                    season_rain += monthly_rainfall(year, month, precip_rate)?;
                }
                weather.push(WeatherRecord {
                    state: state.clone(),
                    year,
                    month,
                    avg_temperature,
                    precip_rate,
                });
            }

            season_temp /= GROWING_MONTHS.len() as f64;
            let value = BASE_YIELD
                + YIELD_TREND * (year - config.start_year) as f64
                + profile.yield_level
                + weather_response(season_temp, season_rain)
                + yield_noise.sample(&mut rng);
            yields.push(YieldRecord {
                state: state.clone(),
                year,
                yield_bu_per_acre: value.max(0.0),
            });
        }
    }

    Ok(SampleData { weather, yields })
}

/// Yield penalty for departures from the optimal season (bu/acre, <= 0).
fn weather_response(season_temp: f64, season_rain: f64) -> f64 {
    let dt = season_temp - OPTIMAL_SEASON_TEMP;
    let dr = (season_rain - OPTIMAL_SEASON_RAIN) / 100.0;
    -2.2 * dt * dt - 3.0 * dr * dr
}
