//! CSV exports: raw weather/yield tables, the merged modeling table, the
//! comparison table and holdout predictions.
//!
//! Writers are generic over `io::Write` so tests can target a buffer; the
//! `*_file` wrappers create the file and attach the path to any error.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::{WeatherRecord, YieldRecord};
use crate::error::PipelineError;
use crate::fit::{Comparison, HoldoutPrediction};
use crate::prep::MergedDataset;

/// Column order of the persisted merged dataset.
pub const DATASET_HEADER: [&str; 5] = [
    "state",
    "year",
    "avg_temp_season",
    "total_rainfall_season",
    "yield_bu_per_acre",
];

/// Write rows whose field names match the raw table headers.
pub fn write_records_csv<W: Write, T: Serialize>(writer: W, records: &[T]) -> Result<(), PipelineError> {
    let mut w = csv::Writer::from_writer(writer);
    for r in records {
        w.serialize(r).map_err(csv_error)?;
    }
    w.flush().map_err(|e| PipelineError::Data(format!("failed to flush CSV: {e}")))?;
    Ok(())
}

pub fn write_dataset_csv<W: Write>(writer: W, dataset: &MergedDataset) -> Result<(), PipelineError> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(DATASET_HEADER).map_err(csv_error)?;
    for row in dataset.rows() {
        w.write_record([
            row.state.clone(),
            row.year.to_string(),
            row.avg_temp_season.to_string(),
            row.total_rainfall_season.to_string(),
            row.yield_bu_per_acre.to_string(),
        ])
        .map_err(csv_error)?;
    }
    w.flush().map_err(|e| PipelineError::Data(format!("failed to flush CSV: {e}")))?;
    Ok(())
}

pub fn write_comparison_csv<W: Write>(writer: W, comparison: &Comparison) -> Result<(), PipelineError> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(["rank", "model", "mae", "rmse", "r2", "n"]).map_err(csv_error)?;
    for row in &comparison.rows {
        let m = &row.metrics;
        w.write_record([
            row.rank.to_string(),
            row.name.clone(),
            format!("{:.6}", m.mae),
            format!("{:.6}", m.rmse),
            format!("{:.6}", m.r2),
            m.n.to_string(),
        ])
        .map_err(csv_error)?;
    }
    w.flush().map_err(|e| PipelineError::Data(format!("failed to flush CSV: {e}")))?;
    Ok(())
}

pub fn write_predictions_csv<W: Write>(
    writer: W,
    model: &str,
    predictions: &[HoldoutPrediction],
) -> Result<(), PipelineError> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(["model", "state", "year", "actual", "predicted", "residual"])
        .map_err(csv_error)?;
    for p in predictions {
        w.write_record([
            model.to_string(),
            p.state.clone(),
            p.year.to_string(),
            format!("{:.4}", p.actual),
            format!("{:.4}", p.predicted),
            format!("{:.4}", p.residual),
        ])
        .map_err(csv_error)?;
    }
    w.flush().map_err(|e| PipelineError::Data(format!("failed to flush CSV: {e}")))?;
    Ok(())
}

pub fn write_weather_file(path: &Path, records: &[WeatherRecord]) -> Result<(), PipelineError> {
    write_records_csv(create(path)?, records).map_err(|e| attach_path(path, e))
}

pub fn write_yields_file(path: &Path, records: &[YieldRecord]) -> Result<(), PipelineError> {
    write_records_csv(create(path)?, records).map_err(|e| attach_path(path, e))
}

pub fn write_dataset_file(path: &Path, dataset: &MergedDataset) -> Result<(), PipelineError> {
    write_dataset_csv(create(path)?, dataset).map_err(|e| attach_path(path, e))
}

pub fn write_comparison_file(path: &Path, comparison: &Comparison) -> Result<(), PipelineError> {
    write_comparison_csv(create(path)?, comparison).map_err(|e| attach_path(path, e))
}

pub fn write_predictions_file(path: &Path, model: &str, predictions: &[HoldoutPrediction]) -> Result<(), PipelineError> {
    write_predictions_csv(create(path)?, model, predictions).map_err(|e| attach_path(path, e))
}

fn create(path: &Path) -> Result<File, PipelineError> {
    File::create(path).map_err(|e| PipelineError::io(path, e))
}

fn csv_error(e: csv::Error) -> PipelineError {
    PipelineError::Data(format!("failed to write CSV row: {e}"))
}

fn attach_path(path: &Path, e: PipelineError) -> PipelineError {
    match e {
        PipelineError::Data(message) => PipelineError::io(path, message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Metrics, ModelKind, TrainingRow};
    use crate::fit::rank_models;
    use crate::io::{read_merged_dataset, read_weather, read_yields};

    #[test]
    fn dataset_csv_reads_back_identically() {
        let rows = vec![
            TrainingRow {
                state: "OHIO".into(),
                year: 2019,
                avg_temp_season: 21.25,
                total_rainfall_season: 512.5,
                yield_bu_per_acre: 164.0,
            },
            TrainingRow {
                state: "IOWA".into(),
                year: 2021,
                avg_temp_season: 20.666667,
                total_rainfall_season: 600.0,
                yield_bu_per_acre: 190.0,
            },
        ];
        let dataset = MergedDataset::from_rows(rows).unwrap();

        let mut buf = Vec::new();
        write_dataset_csv(&mut buf, &dataset).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("state,year,avg_temp_season,total_rainfall_season,yield_bu_per_acre\n"));

        let back = read_merged_dataset(buf.as_slice()).unwrap();
        assert_eq!(back, dataset);
    }

    #[test]
    fn aggregated_dataset_keeps_full_precision_on_disk() {
        use crate::domain::GROWING_MONTHS;
        use crate::prep::{aggregate_seasons, merge};

        let temps = [14.9, 18.3, 22.1, 25.4, 24.2, 19.1];
        let rates = [3.1, 3.7, 4.3, 3.3, 2.9, 2.45];
        let weather: Vec<WeatherRecord> = GROWING_MONTHS
            .iter()
            .zip(temps.iter().zip(rates))
            .map(|(&month, (&t, r))| WeatherRecord {
                state: "Iowa".into(),
                year: 2021,
                month,
                avg_temperature: t,
                precip_rate: r,
            })
            .collect();
        let yields = vec![YieldRecord {
            state: "IOWA".into(),
            year: 2021,
            yield_bu_per_acre: 191.3,
        }];
        let seasons = aggregate_seasons(&weather, false).unwrap();
        let dataset = merge(&seasons.features, &yields).unwrap();

        let mut buf = Vec::new();
        write_dataset_csv(&mut buf, &dataset).unwrap();
        let back = read_merged_dataset(buf.as_slice()).unwrap();
        assert_eq!(back.rows(), dataset.rows());
    }

    #[test]
    fn raw_tables_are_written_with_ingest_headers() {
        let weather = vec![WeatherRecord {
            state: "IOWA".into(),
            year: 2021,
            month: 7,
            avg_temperature: 25.0,
            precip_rate: 3.2,
        }];
        let yields = vec![YieldRecord {
            state: "IOWA".into(),
            year: 2021,
            yield_bu_per_acre: 190.0,
        }];

        let mut buf = Vec::new();
        write_records_csv(&mut buf, &weather).unwrap();
        assert!(buf.starts_with(b"state,year,month,avg_temperature,precip_rate\n"));
        assert_eq!(read_weather(buf.as_slice()).unwrap(), weather);

        let mut buf = Vec::new();
        write_records_csv(&mut buf, &yields).unwrap();
        assert_eq!(read_yields(buf.as_slice()).unwrap().records, yields);
    }

    #[test]
    fn comparison_csv_lists_models_in_rank_order() {
        let m = |rmse: f64| Metrics {
            mae: rmse / 2.0,
            rmse,
            r2: 0.5,
            n: 3,
        };
        let cmp = rank_models(vec![
            ("linear".into(), ModelKind::Linear, m(4.0)),
            ("ridge".into(), ModelKind::Ridge, m(2.0)),
        ]);
        let mut buf = Vec::new();
        write_comparison_csv(&mut buf, &cmp).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "rank,model,mae,rmse,r2,n");
        assert!(lines[1].starts_with("1,ridge,"));
        assert!(lines[2].starts_with("2,linear,"));
    }
}
