//! Train/evaluation partitioning.
//!
//! `year_holdout` is the leakage-safe policy: every evaluation row is at least
//! as recent as every training row. `random_holdout` is kept for comparison
//! with row-level splits and stratifies by state so each state trains.

use std::collections::BTreeMap;

use rand::prelude::*;
use rand::rngs::StdRng;
use tracing::info;

use crate::domain::{PipelineConfig, SplitPolicy, TrainingRow};
use crate::error::PipelineError;

/// Training and evaluation partitions (copies of the canonical rows).
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub policy: SplitPolicy,
    pub train: Vec<TrainingRow>,
    pub eval: Vec<TrainingRow>,
}

/// Partition `rows` according to the configured policy.
pub fn plan_split(rows: &[TrainingRow], config: &PipelineConfig) -> Result<Split, PipelineError> {
    let (train, eval) = match config.split_policy {
        SplitPolicy::YearHoldout => year_holdout(rows, config.holdout_cutoff_year),
        SplitPolicy::RandomHoldout => random_holdout(rows, config.test_fraction, config.random_seed)?,
    };

    if train.is_empty() {
        return Err(PipelineError::InsufficientData(format!(
            "training partition is empty ({:?}, {} rows)",
            config.split_policy,
            rows.len()
        )));
    }
    if eval.is_empty() {
        return Err(PipelineError::InsufficientData(format!(
            "evaluation partition is empty ({:?}, {} rows)",
            config.split_policy,
            rows.len()
        )));
    }

    info!(
        policy = ?config.split_policy,
        train = train.len(),
        eval = eval.len(),
        "planned split"
    );
    Ok(Split {
        policy: config.split_policy,
        train,
        eval,
    })
}

fn year_holdout(rows: &[TrainingRow], cutoff: i32) -> (Vec<TrainingRow>, Vec<TrainingRow>) {
    rows.iter().cloned().partition(|r| r.year < cutoff)
}

fn random_holdout(
    rows: &[TrainingRow],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<TrainingRow>, Vec<TrainingRow>), PipelineError> {
    if !(test_fraction.is_finite() && test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::Config(format!(
            "test_fraction must be in (0, 1), got {test_fraction}"
        )));
    }

    // Group row indices by state; BTreeMap keeps the RNG draw order stable.
    let mut by_state: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, r) in rows.iter().enumerate() {
        by_state.entry(r.state.as_str()).or_default().push(idx);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut eval_idx = Vec::new();
    let mut train_idx = Vec::new();

    for (_, mut idx) in by_state {
        idx.shuffle(&mut rng);
        let n = idx.len();
        // Every state keeps at least one training row.
        let n_eval = ((n as f64 * test_fraction).round() as usize).min(n - 1);
        eval_idx.extend_from_slice(&idx[..n_eval]);
        train_idx.extend_from_slice(&idx[n_eval..]);
    }

    eval_idx.sort_unstable();
    train_idx.sort_unstable();

    Ok((
        train_idx.into_iter().map(|i| rows[i].clone()).collect(),
        eval_idx.into_iter().map(|i| rows[i].clone()).collect(),
    ))
}
