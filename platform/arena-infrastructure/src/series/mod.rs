use arena_domain::repositories::series::{SeriesData, SeriesReader};
use arena_domain::value_objects::equity_point::EquityPoint;
use arena_domain::value_objects::fill::Fill;
use arena_domain::value_objects::side::Side;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use std::time::Instant;

const TIMESTAMP_COLUMNS: [&str; 5] = ["timestamp", "timestamp_utc", "date", "datetime", "time"];
const RETURN_COLUMNS: [&str; 2] = ["return", "returns"];

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemSeriesReader;

impl FilesystemSeriesReader {
    pub fn new() -> Self {
        Self
    }
}

fn record_read_metrics<T>(kind: &'static str, start: Instant, result: &Result<T, String>) {
    let result_label = if result.is_ok() { "ok" } else { "err" };
    metrics::counter!(
        "arena.infra.series.read.calls_total",
        "kind" => kind,
        "result" => result_label
    )
    .increment(1);
    metrics::histogram!("arena.infra.series.read_ms", "kind" => kind, "result" => result_label)
        .record(start.elapsed().as_millis() as f64);
}

fn open(path: &Path, kind: &str) -> Result<csv::Reader<File>, String> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|err| format!("failed to open {kind} csv {}: {}", path.display(), err))
}

fn headers(reader: &mut csv::Reader<File>, path: &Path) -> Result<Vec<String>, String> {
    Ok(reader
        .headers()
        .map_err(|err| format!("failed to read csv headers {}: {}", path.display(), err))?
        .iter()
        .map(|h| h.to_lowercase())
        .collect())
}

fn find_column(headers: &[String], names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|name| h == name))
}

/// Epoch seconds, RFC3339, `%Y-%m-%d %H:%M:%S` (UTC) or a bare date.
pub fn parse_timestamp(value: &str) -> Result<i64, String> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<i64>() {
        return Ok(seconds);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive).timestamp());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive).timestamp());
        }
    }
    Err(format!("unsupported timestamp format: {value}"))
}

/// Blank and `nan`/`null` cells read as NaN.
fn parse_cell(value: &str, column: &str, row: usize) -> Result<f64, String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") || value.eq_ignore_ascii_case("null") {
        return Ok(f64::NAN);
    }
    value
        .parse::<f64>()
        .map_err(|_| format!("row {row}: column {column} is not a number: {value}"))
}

fn read_returns(path: &Path) -> Result<Vec<f64>, String> {
    let mut reader = open(path, "returns")?;
    let headers = headers(&mut reader, path)?;
    let records = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("failed to parse returns csv {}: {}", path.display(), err))?;

    let column = match find_column(&headers, &RETURN_COLUMNS) {
        Some(idx) => idx,
        None => headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !TIMESTAMP_COLUMNS.contains(&h.as_str()))
            .map(|(idx, _)| idx)
            .find(|idx| {
                records
                    .first()
                    .and_then(|record| record.get(*idx))
                    .map(|cell| cell.parse::<f64>().is_ok())
                    .unwrap_or(false)
            })
            .ok_or_else(|| format!("returns csv {} has no numeric column", path.display()))?,
    };

    records
        .iter()
        .enumerate()
        .map(|(row, record)| parse_cell(record.get(column).unwrap_or(""), &headers[column], row + 1))
        .collect()
}

fn read_equity(path: &Path) -> Result<Vec<EquityPoint>, String> {
    let mut reader = open(path, "equity")?;
    let headers = headers(&mut reader, path)?;
    let equity_col = find_column(&headers, &["equity"])
        .ok_or_else(|| format!("equity csv {} has no equity column", path.display()))?;
    let ts_col = find_column(&headers, &TIMESTAMP_COLUMNS);

    let mut points = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result
            .map_err(|err| format!("failed to parse equity csv {}: {}", path.display(), err))?;
        let timestamp = match ts_col {
            Some(idx) => parse_timestamp(record.get(idx).unwrap_or(""))
                .map_err(|err| format!("row {}: {err}", row + 1))?,
            None => row as i64,
        };
        let equity = parse_cell(record.get(equity_col).unwrap_or(""), "equity", row + 1)?;
        points.push(EquityPoint { timestamp, equity });
    }
    Ok(points)
}

#[derive(Debug, Deserialize)]
struct FillRecord {
    timestamp: String,
    symbol: String,
    side: String,
    quantity: f64,
    price: f64,
    #[serde(default)]
    fee: Option<f64>,
}

fn read_fills(path: &Path) -> Result<Vec<Fill>, String> {
    let mut reader = open(path, "trades")?;
    let mut fills = Vec::new();
    for (row, result) in reader.deserialize::<FillRecord>().enumerate() {
        let record = result
            .map_err(|err| format!("failed to parse trade record {}: {}", path.display(), err))?;
        fills.push(Fill {
            timestamp: parse_timestamp(&record.timestamp)
                .map_err(|err| format!("row {}: {err}", row + 1))?,
            symbol: record.symbol,
            side: Side::parse(&record.side).map_err(|err| format!("row {}: {err}", row + 1))?,
            quantity: record.quantity,
            price: record.price,
            fee: record.fee.unwrap_or(0.0),
        });
    }
    Ok(fills)
}

fn has_equity_column(path: &Path) -> Result<bool, String> {
    let mut reader = open(path, "series")?;
    let headers = headers(&mut reader, path)?;
    Ok(find_column(&headers, &["equity"]).is_some())
}

impl SeriesReader for FilesystemSeriesReader {
    fn read_returns_csv(&self, path: &Path) -> Result<Vec<f64>, String> {
        let start = Instant::now();
        let result = read_returns(path);
        record_read_metrics("returns_csv", start, &result);
        result
    }

    fn read_equity_csv(&self, path: &Path) -> Result<Vec<EquityPoint>, String> {
        let start = Instant::now();
        let result = read_equity(path);
        record_read_metrics("equity_csv", start, &result);
        result
    }

    fn read_fills_csv(&self, path: &Path) -> Result<Vec<Fill>, String> {
        let start = Instant::now();
        let result = read_fills(path);
        record_read_metrics("trades_csv", start, &result);
        result
    }

    fn read_series_csv(&self, path: &Path) -> Result<SeriesData, String> {
        let start = Instant::now();
        let result = has_equity_column(path).and_then(|equity| {
            if equity {
                read_equity(path).map(SeriesData::Equity)
            } else {
                read_returns(path).map(SeriesData::Returns)
            }
        });
        record_read_metrics("series_csv", start, &result);
        result
    }
}
