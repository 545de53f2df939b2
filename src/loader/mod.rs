//! CSV loading with header validation at the boundary.
//!
//! Every file is resolved against a [`schema::ColumnSpec`] table before any row
//! is read, so downstream code only ever sees typed records.

pub mod schema;
pub mod sentiment;
pub mod timestamp;
pub mod trades;

pub use sentiment::{load_sentiment, load_sentiment_path};
pub use trades::{load_trades, load_trades_path};

use chrono_tz::Tz;
use csv::StringRecord;
use serde::Serialize;
use std::io::Read;
use tracing::{debug, warn};

use crate::error::{AnalyticsError, Result};
use schema::{ColumnSpec, Schema};

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Skip rows that fail to parse instead of failing the whole file.
    pub lenient: bool,
    /// Zone for naive trade timestamps. `None` means UTC, or IST for a
    /// `Timestamp IST` column.
    pub timezone: Option<Tz>,
}

/// Typed rows from one file plus what was dropped on the way.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset<T> {
    pub source: String,
    pub records: Vec<T>,
    pub skipped_rows: usize,
    pub relabeled_rows: usize,
}

impl<T> Dataset<T> {
    pub fn new(source: impl Into<String>, records: Vec<T>) -> Self {
        Self {
            source: source.into(),
            records,
            skipped_rows: 0,
            relabeled_rows: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Same source and load counts, keeping only the records that pass `keep`.
    pub fn filtered(&self, mut keep: impl FnMut(&T) -> bool) -> Dataset<T>
    where
        T: Clone,
    {
        Dataset {
            source: self.source.clone(),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
            skipped_rows: self.skipped_rows,
            relabeled_rows: self.relabeled_rows,
        }
    }
}

/// Rows that parsed, each with its 1-based file line.
pub(crate) struct ParsedRows<T> {
    pub rows: Vec<(u64, T)>,
    pub skipped: usize,
}

/// Shared read loop: resolve the header, then hand each non-blank row to `parse_row`.
pub(crate) fn read_rows<R, T, F>(
    reader: R,
    source: &str,
    specs: &[ColumnSpec],
    opts: &LoadOptions,
    mut parse_row: F,
) -> Result<(Schema, ParsedRows<T>)>
where
    R: Read,
    F: FnMut(&Schema, &StringRecord, u64) -> Result<T>,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let schema = Schema::resolve(&headers, specs, source)?;
    debug!("{}: {} columns, header {:?}", source, headers.len(), headers);

    let mut rows = Vec::new();
    let mut skipped = 0;

    for result in csv_reader.records() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        match parse_row(&schema, &record, line) {
            Ok(row) => rows.push((line, row)),
            Err(e @ AnalyticsError::Parse { .. }) if opts.lenient => {
                warn!("Skipping row: {}", e);
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok((schema, ParsedRows { rows, skipped }))
}

/// Reads a required cell, failing with the file's own header name.
pub(crate) fn required<'r>(
    schema: &Schema,
    record: &'r StringRecord,
    name: &'static str,
    source: &str,
    line: u64,
) -> Result<&'r str> {
    schema
        .get(record, name)
        .ok_or_else(|| AnalyticsError::parse(source, line, schema.header(name), "missing value"))
}

/// Parses a finite float, tolerating thousands separators and a leading `$`.
pub(crate) fn parse_number(
    raw: &str,
    schema: &Schema,
    name: &'static str,
    source: &str,
    line: u64,
) -> Result<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(AnalyticsError::parse(
            source,
            line,
            schema.header(name),
            format!("not a number: '{}'", raw),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &[ColumnSpec] = &[ColumnSpec::required("value", &["value"])];

    #[test]
    fn blank_lines_are_ignored() {
        let data = "value\n1\n\n,\n2\n";
        let (_, parsed) = read_rows(data.as_bytes(), "t.csv", SPECS, &LoadOptions::default(), |s, r, l| {
            parse_number(required(s, r, "value", "t.csv", l)?, s, "value", "t.csv", l)
        })
        .unwrap();
        let values: Vec<f64> = parsed.rows.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn lenient_mode_counts_skipped_rows() {
        let data = "value\n1\nabc\n3\n";
        let opts = LoadOptions {
            lenient: true,
            ..Default::default()
        };
        let (_, parsed) = read_rows(data.as_bytes(), "t.csv", SPECS, &opts, |s, r, l| {
            parse_number(required(s, r, "value", "t.csv", l)?, s, "value", "t.csv", l)
        })
        .unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.skipped, 1);
    }

    #[test]
    fn strict_mode_reports_line() {
        let data = "value\n1\nabc\n";
        let err = read_rows(data.as_bytes(), "t.csv", SPECS, &LoadOptions::default(), |s, r, l| {
            parse_number(required(s, r, "value", "t.csv", l)?, s, "value", "t.csv", l)
        })
        .err()
        .unwrap();
        match err {
            AnalyticsError::Parse { line, column, .. } => {
                assert_eq!(line, 3);
                assert_eq!(column, "value");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn number_cleanup() {
        let headers = StringRecord::from(vec!["value"]);
        let schema = Schema::resolve(&headers, SPECS, "t.csv").unwrap();
        assert_eq!(parse_number("$1,234.5", &schema, "value", "t.csv", 2).unwrap(), 1234.5);
        assert!(parse_number("NaN", &schema, "value", "t.csv", 2).is_err());
    }
}
