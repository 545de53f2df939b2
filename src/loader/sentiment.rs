use chrono::NaiveDate;
use csv::StringRecord;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

use super::schema::{ColumnSpec, Schema};
use super::timestamp::parse_date;
use super::{parse_number, read_rows, required, Dataset, LoadOptions};
use crate::error::{AnalyticsError, Result};
use crate::models::{SentimentClass, SentimentRecord};
use crate::models::sentiment::MAX_SCORE;

const COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::optional("date", &["date", "day"]),
    ColumnSpec::optional("timestamp", &["timestamp", "unix"]),
    ColumnSpec::required("value", &["value", "score", "fear_greed_index", "index"]),
    ColumnSpec::optional(
        "classification",
        &["classification", "value_classification", "sentiment", "label"],
    ),
];

struct ParsedSentiment {
    record: SentimentRecord,
    relabeled: bool,
}

pub fn load_sentiment_path(path: impl AsRef<Path>, opts: &LoadOptions) -> Result<Dataset<SentimentRecord>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    load_sentiment(BufReader::new(file), &path.display().to_string(), opts)
}

/// Loads a Fear & Greed index export (`timestamp,value,classification,date`).
pub fn load_sentiment<R: Read>(
    reader: R,
    source: &str,
    opts: &LoadOptions,
) -> Result<Dataset<SentimentRecord>> {
    let (schema, parsed) = read_rows(reader, source, COLUMNS, opts, |schema, record, line| {
        parse_row(schema, record, source, line)
    })?;

    if !schema.has("date") && !schema.has("timestamp") {
        return Err(AnalyticsError::MissingColumn {
            source_name: source.to_string(),
            column: "date".to_string(),
        });
    }

    let mut rows = parsed.rows;
    let mut skipped = parsed.skipped;
    rows.sort_by_key(|(_, p)| p.record.date);

    // One record per day.
    let mut records: Vec<SentimentRecord> = Vec::with_capacity(rows.len());
    let mut relabeled = 0;
    let mut last_date: Option<NaiveDate> = None;
    for (line, p) in rows {
        if last_date == Some(p.record.date) {
            if opts.lenient {
                warn!("{}: duplicate date {} on line {}, keeping first", source, p.record.date, line);
                skipped += 1;
                continue;
            }
            return Err(AnalyticsError::parse(
                source,
                line,
                schema.header(date_column(&schema)),
                format!("duplicate date {}", p.record.date),
            ));
        }
        last_date = Some(p.record.date);
        if p.relabeled {
            relabeled += 1;
        }
        records.push(p.record);
    }

    if records.is_empty() {
        return Err(AnalyticsError::EmptyDataset {
            source_name: source.to_string(),
        });
    }

    if relabeled > 0 {
        warn!(
            "{}: {} rows had a classification label that disagrees with their score",
            source, relabeled
        );
    }
    info!(
        "Loaded {} sentiment days from {} ({} skipped)",
        records.len(),
        source,
        skipped
    );

    Ok(Dataset {
        source: source.to_string(),
        records,
        skipped_rows: skipped,
        relabeled_rows: relabeled,
    })
}

fn date_column(schema: &Schema) -> &'static str {
    if schema.has("date") {
        "date"
    } else {
        "timestamp"
    }
}

fn parse_row(schema: &Schema, record: &StringRecord, source: &str, line: u64) -> Result<ParsedSentiment> {
    if !schema.has("date") && !schema.has("timestamp") {
        return Err(AnalyticsError::MissingColumn {
            source_name: source.to_string(),
            column: "date".to_string(),
        });
    }
    let date_col = date_column(schema);
    let raw_date = required(schema, record, date_col, source, line)?;
    let date = parse_date(raw_date).ok_or_else(|| {
        AnalyticsError::parse(
            source,
            line,
            schema.header(date_col),
            format!("unrecognised date '{}'", raw_date),
        )
    })?;

    let raw_value = required(schema, record, "value", source, line)?;
    let value = parse_number(raw_value, schema, "value", source, line)?;
    let sentiment = Some(value)
        .filter(|v| v.fract() == 0.0 && *v >= 0.0 && *v <= MAX_SCORE as f64)
        .and_then(|v| SentimentRecord::new(date, v as u8))
        .ok_or_else(|| {
            AnalyticsError::parse(
                source,
                line,
                schema.header("value"),
                format!("score must be an integer in 0..=100, got '{}'", raw_value),
            )
        })?;

    let relabeled = match schema.get(record, "classification") {
        Some(label) => match SentimentClass::from_str_loose(label) {
            Some(class) if class != sentiment.classification => {
                debug!(
                    "{}:{}: label '{}' differs from derived '{}' for score {}",
                    source, line, label, sentiment.classification, sentiment.score
                );
                true
            }
            Some(_) => false,
            None => {
                return Err(AnalyticsError::parse(
                    source,
                    line,
                    schema.header("classification"),
                    format!("unknown classification '{}'", label),
                ))
            }
        },
        None => false,
    };

    Ok(ParsedSentiment {
        record: sentiment,
        relabeled,
    })
}
