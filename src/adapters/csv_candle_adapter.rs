//! CSV candle importer.
//!
//! Expects a header row and columns timestamp,open,high,low,close,volume.
//! Timestamps are `YYYY-MM-DD HH:MM:SS` in UTC.

use crate::domain::candle::{Candle, Timeframe};
use crate::domain::error::CycletraderError;
use chrono::NaiveDateTime;
use std::path::Path;

const CSV_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn column<'a>(
    record: &'a csv::StringRecord,
    idx: usize,
    name: &str,
) -> Result<&'a str, CycletraderError> {
    record.get(idx).ok_or_else(|| CycletraderError::Database {
        reason: format!("missing {name} column"),
    })
}

fn parse_f64(value: &str, name: &str) -> Result<f64, CycletraderError> {
    value.parse().map_err(|e| CycletraderError::Database {
        reason: format!("invalid {name} value: {e}"),
    })
}

/// Read candles for one symbol/timeframe from a CSV file, sorted by time.
pub fn read_candles(
    path: &Path,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<Vec<Candle>, CycletraderError> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| CycletraderError::Database {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    let mut candles = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| CycletraderError::Database {
            reason: format!("CSV parse error: {e}"),
        })?;

        let ts_str = column(&record, 0, "timestamp")?;
        let timestamp = NaiveDateTime::parse_from_str(ts_str, CSV_TS_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|e| CycletraderError::Database {
                reason: format!("invalid timestamp format: {e}"),
            })?;

        candles.push(Candle {
            symbol: symbol.to_string(),
            timeframe,
            timestamp,
            open: parse_f64(column(&record, 1, "open")?, "open")?,
            high: parse_f64(column(&record, 2, "high")?, "high")?,
            low: parse_f64(column(&record, 3, "low")?, "low")?,
            close: parse_f64(column(&record, 4, "close")?, "close")?,
            volume: parse_f64(column(&record, 5, "volume")?, "volume")?,
        });
    }

    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}
