use serde::Serialize;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{AnalyticsError, Result};
use crate::report::AnalysisReport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(AnalyticsError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Writes rows as CSV with a header, or as a pretty JSON array. Non-finite
/// floats come out as `NaN` in CSV and `null` in JSON.
pub fn export_records<W: Write, T: Serialize>(
    writer: W,
    records: &[T],
    format: ExportFormat,
) -> Result<()> {
    match format {
        ExportFormat::Csv => {
            let mut w = csv::Writer::from_writer(writer);
            for r in records {
                w.serialize(r)?;
            }
            w.flush()?;
        }
        ExportFormat::Json => {
            let mut w = BufWriter::new(writer);
            serde_json::to_writer_pretty(&mut w, records)?;
            writeln!(w)?;
            w.flush()?;
        }
    }
    Ok(())
}

/// Writes `<dir>/<name>.<ext>` and returns its path.
pub fn export_table<T: Serialize>(
    dir: &Path,
    name: &str,
    records: &[T],
    format: ExportFormat,
) -> Result<PathBuf> {
    let path = dir.join(format!("{}.{}", name, format.extension()));
    export_records(File::create(&path)?, records, format)?;
    debug!("Wrote {} rows to {}", records.len(), path.display());
    Ok(path)
}

/// One file per report table plus the text summary. JSON exports also get
/// the whole report as `report.json`.
pub fn export_report(
    dir: impl AsRef<Path>,
    report: &AnalysisReport,
    format: ExportFormat,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut written = vec![
        export_table(dir, "by_classification", &report.by_classification, format)?,
        export_table(dir, "by_month", &report.by_month, format)?,
        export_table(dir, "daily", &report.daily, format)?,
        export_table(dir, "correlations", &report.correlations, format)?,
        export_table(dir, "rolling_correlation", &report.rolling, format)?,
        export_table(dir, "category_tests", &report.category_tests, format)?,
    ];
    if let Some(g) = &report.by_group {
        written.push(export_table(dir, &format!("by_{}", g.key), &g.metrics, format)?);
    }

    if format == ExportFormat::Json {
        let path = dir.join("report.json");
        let mut w = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut w, report)?;
        w.flush()?;
        written.push(path);
    }

    let summary = dir.join("summary.txt");
    report.save_summary(&summary)?;
    written.push(summary);

    info!("Exported {} files to {}", written.len(), dir.display());
    Ok(written)
}
