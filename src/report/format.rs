//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the pipeline code stays free of presentation details
//! - output changes are localized

use crate::app::pipeline::{Evaluation, PreparedData};
use crate::domain::{PipelineConfig, SplitPolicy};
use crate::fit::{Comparison, HoldoutPrediction, ModelHandle};
use crate::predictor::{Prediction, PredictionRequest};
use crate::prep::{MergedDataset, MissingSide};
use crate::report::Misses;

/// Audit lists longer than this are summarized.
const MAX_AUDIT_LINES: usize = 10;

/// Format the full run summary (dataset + split + comparison + chosen model).
pub fn format_run_summary(prepared: &PreparedData, evaluation: &Evaluation, config: &PipelineConfig) -> String {
    let mut out = String::new();

    out.push_str("=== cy - corn yield model comparison ===\n");
    out.push_str(&format_dataset_summary(&prepared.dataset));
    out.push_str(&format!(
        "Seasons: aggregated={} skipped={} | join dropped={}\n",
        prepared.aggregation.features.len(),
        prepared.aggregation.skipped.len(),
        prepared.dataset.dropped().len(),
    ));

    let split = &evaluation.split;
    let policy = match split.policy {
        SplitPolicy::YearHoldout => format!("year_holdout (eval years >= {})", config.holdout_cutoff_year),
        SplitPolicy::RandomHoldout => format!(
            "random_holdout (fraction={:.2}, seed={})",
            config.test_fraction, config.random_seed
        ),
    };
    out.push_str(&format!(
        "Split: {policy} | train={} eval={}\n",
        split.train.len(),
        split.eval.len()
    ));
    out.push_str(&format!(
        "Models: ridge_alpha={} | forest trees={} depth={} | year_trend={}\n",
        config.ridge_alpha, config.tree_count, config.tree_depth, config.year_trend
    ));

    out.push_str("\nHoldout comparison:\n");
    out.push_str(&format_comparison(&evaluation.comparison));

    if let Some(best) = evaluation.best_handle() {
        out.push_str("\nChosen model:\n");
        out.push_str(&format!("- {} ({})\n", best.kind.display_name(), best.name));
        out.push_str(&format!(
            "- training fit: RMSE={:.3} MAE={:.3} R2={:.3}\n",
            best.metrics.rmse, best.metrics.mae, best.metrics.r2
        ));
    }
    if let Some(forest) = evaluation.handles.iter().find(|h| h.estimator.importances().is_some()) {
        out.push('\n');
        out.push_str(&format_importances(forest));
    }
    out.push('\n');

    out
}

/// One-line description of the modeling table.
pub fn format_dataset_summary(dataset: &MergedDataset) -> String {
    let years = match dataset.year_range() {
        Some((lo, hi)) => format!("{lo}-{hi}"),
        None => "-".to_string(),
    };
    let (mut t_min, mut t_max, mut r_min, mut r_max, mut y_min, mut y_max) = (
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::INFINITY,
        f64::NEG_INFINITY,
    );
    for r in dataset.rows() {
        t_min = t_min.min(r.avg_temp_season);
        t_max = t_max.max(r.avg_temp_season);
        r_min = r_min.min(r.total_rainfall_season);
        r_max = r_max.max(r.total_rainfall_season);
        y_min = y_min.min(r.yield_bu_per_acre);
        y_max = y_max.max(r.yield_bu_per_acre);
    }

    let mut out = format!(
        "Dataset: n={} | states={} | years={years}\n",
        dataset.len(),
        dataset.states().len()
    );
    if !dataset.is_empty() {
        out.push_str(&format!(
            "Ranges: temp=[{t_min:.2}, {t_max:.2}]C | rain=[{r_min:.1}, {r_max:.1}]mm | yield=[{y_min:.1}, {y_max:.1}]bu/ac\n"
        ));
    }
    out
}

/// Format the ranked comparison table.
pub fn format_comparison(comparison: &Comparison) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>4} {:<18} {:>10} {:>10} {:>8} {:>5}\n",
            "rank", "model", "rmse", "mae", "r2", "n"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<4} {:-<18} {:-<10} {:-<10} {:-<8} {:-<5}", "", "", "", "", "", "").trim_end());
    out.push('\n');

    for row in &comparison.rows {
        let m = &row.metrics;
        let chosen = if row.rank == 1 { "*" } else { " " };
        out.push_str(
            format!(
                "{:>3}{chosen} {:<18} {:>10.3} {:>10.3} {:>8.3} {:>5}\n",
                row.rank,
                truncate(&row.name, 18),
                m.rmse,
                m.mae,
                m.r2,
                m.n
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Format named feature importances of a model that provides them.
pub fn format_importances(handle: &ModelHandle) -> String {
    let Some(importances) = handle.feature_importances() else {
        return format!("{}: no feature importances\n", handle.name);
    };

    let mut out = format!("Feature importances ({}):\n", handle.name);
    for (name, value) in importances.iter().filter(|(_, v)| *v > 0.0) {
        let bar = "#".repeat((value * 40.0).round() as usize);
        out.push_str(format!("  {:<24} {:>6.3} {bar}", truncate(name, 24), value).trim_end());
        out.push('\n');
    }
    out
}

/// Format what the aggregation, join and yield ingest dropped.
pub fn format_merge_audit(prepared: &PreparedData) -> String {
    let mut out = String::new();
    let dropped = prepared.dataset.dropped();
    let skipped = &prepared.aggregation.skipped;
    let row_errors = &prepared.yield_row_errors;

    if dropped.is_empty() && skipped.is_empty() && row_errors.is_empty() {
        out.push_str("Merge audit: every key matched\n");
        return out;
    }

    out.push_str("Merge audit:\n");
    for s in skipped.iter().take(MAX_AUDIT_LINES) {
        out.push_str(&format!(
            "  skipped season {} {} (missing months {:?})\n",
            s.state, s.year, s.missing
        ));
    }
    push_more(&mut out, skipped.len());

    for d in dropped.iter().take(MAX_AUDIT_LINES) {
        let reason = match d.missing {
            MissingSide::Yield => "no yield",
            MissingSide::Weather => "no complete season",
        };
        out.push_str(&format!("  dropped {} {} ({reason})\n", d.state, d.year));
    }
    push_more(&mut out, dropped.len());

    for e in row_errors.iter().take(MAX_AUDIT_LINES) {
        out.push_str(&format!("  yield line {}: {}\n", e.line, e.message));
    }
    push_more(&mut out, row_errors.len());

    out
}

/// Format the largest holdout misses.
pub fn format_misses(misses: &Misses) -> String {
    let mut out = String::new();
    out.push_str("Most under-predicted (actual > predicted):\n");
    out.push_str(&format_prediction_table(&misses.under));
    out.push('\n');
    out.push_str("Most over-predicted (actual < predicted):\n");
    out.push_str(&format_prediction_table(&misses.over));
    out
}

/// Format a single prediction.
pub fn format_prediction(request: &PredictionRequest, prediction: &Prediction) -> String {
    let mut out = format!(
        "{} {}: {:.1} bu/acre (model={}, temp={:.2}C, rain={:.1}mm)\n",
        request.state.trim(),
        request.year,
        prediction.yield_bu_per_acre,
        prediction.model,
        request.avg_temperature,
        request.total_rainfall
    );
    if !prediction.known_state {
        out.push_str("note: state was not in the training data; no state effect applied\n");
    }
    out
}

fn format_prediction_table(rows: &[HoldoutPrediction]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<16} {:>6} {:>10} {:>10} {:>10}\n",
            "state", "year", "actual", "predicted", "residual"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<16} {:-<6} {:-<10} {:-<10} {:-<10}", "", "", "", "", "").trim_end());
    out.push('\n');
    for p in rows {
        out.push_str(
            format!(
                "{:<16} {:>6} {:>10.1} {:>10.1} {:>10.1}\n",
                truncate(&p.state, 16),
                p.year,
                p.actual,
                p.predicted,
                p.residual
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

fn push_more(out: &mut String, total: usize) {
    if total > MAX_AUDIT_LINES {
        out.push_str(&format!("  ... and {} more\n", total - MAX_AUDIT_LINES));
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
