//! CSV ingest for the raw weather and yield tables and the persisted dataset.
//!
//! Design goals:
//! - **Strict schema**: required columns must exist (header aliases allowed)
//! - **Strict weather rows**: a malformed weather row aborts the load
//! - **Lenient yield values**: suppressed or non-numeric yields (e.g. `(D)`) are
//!   skipped and reported, not guessed
//! - **No modeling logic here**

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::domain::{normalize_state, TrainingRow, WeatherRecord, YieldRecord};
use crate::error::PipelineError;
use crate::prep::MergedDataset;

const STATE: &[&str] = &["state"];
const YEAR: &[&str] = &["year"];
const MONTH: &[&str] = &["month"];
const AVG_TEMPERATURE: &[&str] = &["avg_temperature", "t2m"];
const PRECIP_RATE: &[&str] = &["precip_rate", "prectotcorr"];
const YIELD: &[&str] = &["yield_bu_per_acre", "corn_yield_bu_acre", "value"];
const AVG_TEMP_SEASON: &[&str] = &["avg_temp_season"];
const TOTAL_RAINFALL_SEASON: &[&str] = &["total_rainfall_season"];

/// A row skipped during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// 1-based line number in the file (header is line 1).
    pub line: usize,
    pub message: String,
}

/// Yield ingest output: clean records plus the rows that were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct YieldIngest {
    pub records: Vec<YieldRecord>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Read a weather table. Every row must parse.
pub fn read_weather<R: Read>(reader: R) -> Result<Vec<WeatherRecord>, PipelineError> {
    let mut reader = csv_reader(reader);
    let header_map = read_header_map(&mut reader)?;

    let cols = WeatherColumns {
        state: resolve_column(&header_map, STATE)?,
        year: resolve_column(&header_map, YEAR)?,
        month: resolve_column(&header_map, MONTH)?,
        temperature: resolve_column(&header_map, AVG_TEMPERATURE)?,
        precip: resolve_column(&header_map, PRECIP_RATE)?,
    };

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header, and lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| PipelineError::Data(format!("line {line}: CSV parse error: {e}")))?;
        let row = parse_weather_row(&record, &cols)
            .map_err(|message| PipelineError::Data(format!("line {line}: {message}")))?;
        records.push(row);
    }

    info!(rows = records.len(), "loaded weather table");
    Ok(records)
}

/// Read a yield table.
///
/// Rows whose yield value is missing or non-numeric are skipped into
/// `row_errors`; a repeated (state, year) keeps the first occurrence. A negative
/// yield is a data error.
pub fn read_yields<R: Read>(reader: R) -> Result<YieldIngest, PipelineError> {
    let mut reader = csv_reader(reader);
    let header_map = read_header_map(&mut reader)?;

    let state = resolve_column(&header_map, STATE)?;
    let year = resolve_column(&header_map, YEAR)?;
    let value = resolve_column(&header_map, YIELD)?;

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut seen: HashSet<(String, i32)> = HashSet::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;
        let record = result.map_err(|e| PipelineError::Data(format!("line {line}: CSV parse error: {e}")))?;

        let state_value = get_required(&record, state, "state")
            .and_then(parse_state)
            .map_err(|m| PipelineError::Data(format!("line {line}: {m}")))?;
        let year_value = get_required(&record, year, "year")
            .and_then(|s| parse_int::<i32>(s, "year"))
            .map_err(|m| PipelineError::Data(format!("line {line}: {m}")))?;

        let yield_value = match get_optional(&record, value).map(parse_yield_value) {
            Some(Some(v)) => v,
            Some(None) | None => {
                row_errors.push(RowError {
                    line,
                    message: format!(
                        "no numeric yield for {state_value} {year_value} ('{}')",
                        get_optional(&record, value).unwrap_or("")
                    ),
                });
                continue;
            }
        };
        if yield_value < 0.0 {
            return Err(PipelineError::Data(format!(
                "line {line}: negative yield {yield_value} for {state_value} {year_value}"
            )));
        }

        if !seen.insert((state_value.clone(), year_value)) {
            row_errors.push(RowError {
                line,
                message: format!("duplicate yield for {state_value} {year_value}; keeping the first"),
            });
            continue;
        }

        records.push(YieldRecord {
            state: state_value,
            year: year_value,
            yield_bu_per_acre: yield_value,
        });
    }

    if !row_errors.is_empty() {
        warn!(skipped = row_errors.len(), "skipped yield rows without a usable value");
        for e in &row_errors {
            debug!(line = e.line, "{}", e.message);
        }
    }
    info!(rows = records.len(), rows_read, "loaded yield table");

    Ok(YieldIngest {
        records,
        row_errors,
        rows_read,
    })
}

/// Read a merged dataset previously written by `write_dataset_csv`.
pub fn read_merged_dataset<R: Read>(reader: R) -> Result<MergedDataset, PipelineError> {
    let mut reader = csv_reader(reader);
    let header_map = read_header_map(&mut reader)?;

    let cols = DatasetColumns {
        state: resolve_column(&header_map, STATE)?,
        year: resolve_column(&header_map, YEAR)?,
        temperature: resolve_column(&header_map, AVG_TEMP_SEASON)?,
        rainfall: resolve_column(&header_map, TOTAL_RAINFALL_SEASON)?,
        value: resolve_column(&header_map, &YIELD[..1])?,
    };

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| PipelineError::Data(format!("line {line}: CSV parse error: {e}")))?;
        let row = parse_dataset_row(&record, &cols)
            .map_err(|message| PipelineError::Data(format!("line {line}: {message}")))?;
        rows.push(row);
    }

    let dataset = MergedDataset::from_rows(rows)?;
    info!(rows = dataset.len(), "loaded merged dataset");
    Ok(dataset)
}

pub fn load_weather(path: &Path) -> Result<Vec<WeatherRecord>, PipelineError> {
    read_weather(open(path)?)
}

pub fn load_yields(path: &Path) -> Result<YieldIngest, PipelineError> {
    read_yields(open(path)?)
}

pub fn load_merged_dataset(path: &Path) -> Result<MergedDataset, PipelineError> {
    read_merged_dataset(open(path)?)
}

fn open(path: &Path) -> Result<File, PipelineError> {
    File::open(path).map_err(|e| PipelineError::io(path, e))
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn read_header_map<R: Read>(reader: &mut csv::Reader<R>) -> Result<HashMap<String, usize>, PipelineError> {
    let headers = reader
        .headers()
        .map_err(|e| PipelineError::Schema(format!("failed to read CSV headers: {e}")))?;
    Ok(build_header_map(headers))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // First occurrence wins for repeated header names.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').trim().to_ascii_lowercase()
}

/// Index of the first header matching `names` (canonical name first).
fn resolve_column(header_map: &HashMap<String, usize>, names: &[&str]) -> Result<usize, PipelineError> {
    names
        .iter()
        .find_map(|n| header_map.get(*n).copied())
        .ok_or_else(|| {
            let aliases = if names.len() > 1 {
                format!(" (or alias {})", names[1..].join(", "))
            } else {
                String::new()
            };
            PipelineError::Schema(format!("missing required column `{}`{aliases}", names[0]))
        })
}

struct WeatherColumns {
    state: usize,
    year: usize,
    month: usize,
    temperature: usize,
    precip: usize,
}

struct DatasetColumns {
    state: usize,
    year: usize,
    temperature: usize,
    rainfall: usize,
    value: usize,
}

fn parse_weather_row(record: &StringRecord, cols: &WeatherColumns) -> Result<WeatherRecord, String> {
    let month = parse_int::<u32>(get_required(record, cols.month, "month")?, "month")?;
    if !(1..=12).contains(&month) {
        return Err(format!("month {month} is outside 1-12"));
    }
    let precip_rate = parse_finite(get_required(record, cols.precip, "precip_rate")?, "precip_rate")?;
    if precip_rate < 0.0 {
        return Err(format!("negative precipitation rate {precip_rate}"));
    }

    Ok(WeatherRecord {
        state: parse_state(get_required(record, cols.state, "state")?)?,
        year: parse_int::<i32>(get_required(record, cols.year, "year")?, "year")?,
        month,
        avg_temperature: parse_finite(get_required(record, cols.temperature, "avg_temperature")?, "avg_temperature")?,
        precip_rate,
    })
}

fn parse_dataset_row(record: &StringRecord, cols: &DatasetColumns) -> Result<TrainingRow, String> {
    Ok(TrainingRow {
        state: parse_state(get_required(record, cols.state, "state")?)?,
        year: parse_int::<i32>(get_required(record, cols.year, "year")?, "year")?,
        avg_temp_season: parse_finite(get_required(record, cols.temperature, "avg_temp_season")?, "avg_temp_season")?,
        total_rainfall_season: parse_finite(
            get_required(record, cols.rainfall, "total_rainfall_season")?,
            "total_rainfall_season",
        )?,
        yield_bu_per_acre: parse_finite(get_required(record, cols.value, "yield_bu_per_acre")?, "yield_bu_per_acre")?,
    })
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, String> {
    get_optional(record, idx).ok_or_else(|| format!("missing value for `{name}`"))
}

fn get_optional(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_state(raw: &str) -> Result<String, String> {
    let state = normalize_state(raw);
    if state.is_empty() {
        return Err("empty state".to_string());
    }
    Ok(state)
}

fn parse_int<T: std::str::FromStr>(s: &str, name: &str) -> Result<T, String> {
    s.parse::<T>().map_err(|_| format!("invalid `{name}` value '{s}'"))
}

fn parse_finite(s: &str, name: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("invalid `{name}` value '{s}'")),
    }
}

/// Survey yields may carry thousands separators (`"1,234"`) or suppression
/// markers (`(D)`, `(NA)`); the latter yield `None`.
fn parse_yield_value(s: &str) -> Option<f64> {
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    let v = cleaned.trim().parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}
