//! Pearson correlation between the daily index value and daily performance.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::daily::DailyAggregate;
use super::stats::student_t_two_tailed;
use crate::error::{AnalyticsError, Result};

pub const MIN_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    /// Pearson r in [-1, 1], NaN when either side has no variance.
    pub coefficient: f64,
    /// Two-tailed p-value from Student's t with n - 2 degrees of freedom.
    pub p_value: f64,
    pub sample_size: usize,
}

impl Correlation {
    pub fn undefined(sample_size: usize) -> Self {
        Self {
            coefficient: f64::NAN,
            p_value: f64::NAN,
            sample_size,
        }
    }

    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }

    pub fn strength(&self) -> &'static str {
        let r = self.coefficient.abs();
        if r.is_nan() {
            "undefined"
        } else if r >= 0.7 {
            "strong"
        } else if r >= 0.3 {
            "moderate"
        } else if r >= 0.1 {
            "weak"
        } else {
            "negligible"
        }
    }
}

/// Raw coefficient; NaN on fewer than two points or zero variance.
pub fn pearson_coefficient(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    let mut sq_x = 0.0;
    let mut sq_y = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
        sq_x += xi * xi;
        sq_y += yi * yi;
    }

    // Spread relative to magnitude; rounding noise on a constant series is not spread.
    if var_x <= f64::EPSILON * sq_x || var_y <= f64::EPSILON * sq_y {
        return f64::NAN;
    }
    (cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0)
}

fn p_value(r: f64, n: usize) -> f64 {
    if r.is_nan() {
        return f64::NAN;
    }
    let df = (n - 2) as f64;
    if r.abs() >= 1.0 {
        return 0.0;
    }
    let t = r * (df / (1.0 - r * r)).sqrt();
    student_t_two_tailed(t, df)
}

/// Pearson correlation over paired points.
pub fn pearson(x: &[f64], y: &[f64]) -> Result<Correlation> {
    if x.len() != y.len() {
        return Err(AnalyticsError::LengthMismatch {
            left: x.len(),
            right: y.len(),
        });
    }
    let n = x.len();
    if n < MIN_POINTS {
        return Err(AnalyticsError::InsufficientData {
            needed: MIN_POINTS,
            got: n,
        });
    }
    let r = pearson_coefficient(x, y);
    Ok(Correlation {
        coefficient: r,
        p_value: p_value(r, n),
        sample_size: n,
    })
}

/// Per-day performance figure to correlate against sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyMetric {
    TotalPnl,
    AvgPnl,
    TotalVolume,
    TradeCount,
    WinRate,
}

impl DailyMetric {
    /// The pairs the report always computes.
    pub const REPORTED: [DailyMetric; 4] = [
        DailyMetric::TotalPnl,
        DailyMetric::TotalVolume,
        DailyMetric::TradeCount,
        DailyMetric::WinRate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DailyMetric::TotalPnl => "total_pnl",
            DailyMetric::AvgPnl => "avg_pnl",
            DailyMetric::TotalVolume => "total_volume",
            DailyMetric::TradeCount => "trade_count",
            DailyMetric::WinRate => "win_rate",
        }
    }

    pub fn value(&self, d: &DailyAggregate) -> f64 {
        match self {
            DailyMetric::TotalPnl => d.total_pnl,
            DailyMetric::AvgPnl => d.avg_pnl,
            DailyMetric::TotalVolume => d.total_volume,
            DailyMetric::TradeCount => d.trade_count as f64,
            DailyMetric::WinRate => d.win_rate,
        }
    }
}

impl fmt::Display for DailyMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DailyMetric {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "total_pnl" | "pnl" => Ok(DailyMetric::TotalPnl),
            "avg_pnl" | "mean_pnl" => Ok(DailyMetric::AvgPnl),
            "total_volume" | "volume" => Ok(DailyMetric::TotalVolume),
            "trade_count" | "trades" => Ok(DailyMetric::TradeCount),
            "win_rate" | "winrate" => Ok(DailyMetric::WinRate),
            other => Err(AnalyticsError::InvalidParameter {
                name: "metric",
                message: format!("unknown daily metric '{}'", other),
            }),
        }
    }
}

/// Two value series sharing one date axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSeries {
    pub dates: Vec<NaiveDate>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl AlignedSeries {
    pub fn new(dates: Vec<NaiveDate>, x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        if dates.len() != x.len() || x.len() != y.len() {
            return Err(AnalyticsError::LengthMismatch {
                left: x.len(),
                right: y.len().max(dates.len()),
            });
        }
        Ok(Self { dates, x, y })
    }

    /// Sentiment score (x) against `metric` (y) for the days that have a score.
    pub fn sentiment_vs(daily: &[DailyAggregate], metric: DailyMetric) -> Self {
        let mut series = Self {
            dates: Vec::with_capacity(daily.len()),
            x: Vec::with_capacity(daily.len()),
            y: Vec::with_capacity(daily.len()),
        };
        for d in daily {
            if let Some(score) = d.sentiment_score {
                series.dates.push(d.date);
                series.x.push(score as f64);
                series.y.push(metric.value(d));
            }
        }
        series
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn correlate(&self) -> Result<Correlation> {
        pearson(&self.x, &self.y)
    }

    /// Correlation over each run of `window` consecutive observations. Each
    /// call starts a fresh pass.
    pub fn rolling(&self, window: usize) -> Result<RollingCorrelation<'_>> {
        if window == 0 {
            return Err(AnalyticsError::InvalidParameter {
                name: "window",
                message: "rolling window must be at least 1".to_string(),
            });
        }
        Ok(RollingCorrelation {
            series: self,
            window,
            end: window - 1,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingPoint {
    /// Last date of the window.
    pub date: NaiveDate,
    pub correlation: f64,
}

/// Lazily evaluated rolling correlation; yields `len - window + 1` points.
#[derive(Debug, Clone)]
pub struct RollingCorrelation<'a> {
    series: &'a AlignedSeries,
    window: usize,
    end: usize,
}

impl Iterator for RollingCorrelation<'_> {
    type Item = RollingPoint;

    fn next(&mut self) -> Option<RollingPoint> {
        if self.end >= self.series.len() {
            return None;
        }
        let start = self.end + 1 - self.window;
        let correlation = if self.window < MIN_POINTS {
            f64::NAN
        } else {
            pearson_coefficient(
                &self.series.x[start..=self.end],
                &self.series.y[start..=self.end],
            )
        };
        let point = RollingPoint {
            date: self.series.dates[self.end],
            correlation,
        };
        self.end += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.series.len().saturating_sub(self.end);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RollingCorrelation<'_> {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricCorrelation {
    pub metric: DailyMetric,
    pub coefficient: f64,
    pub p_value: f64,
    pub sample_size: usize,
}

impl MetricCorrelation {
    pub fn correlation(&self) -> Correlation {
        Correlation {
            coefficient: self.coefficient,
            p_value: self.p_value,
            sample_size: self.sample_size,
        }
    }
}

/// Sentiment against each reported daily metric. Too few days gives NaN
/// entries rather than an error.
pub fn sentiment_correlations(daily: &[DailyAggregate]) -> Vec<MetricCorrelation> {
    DailyMetric::REPORTED
        .iter()
        .map(|&metric| {
            let series = AlignedSeries::sentiment_vs(daily, metric);
            let c = series.correlate().unwrap_or_else(|e| {
                debug!("sentiment vs {}: {}", metric, e);
                Correlation::undefined(series.len())
            });
            MetricCorrelation {
                metric,
                coefficient: c.coefficient,
                p_value: c.p_value,
                sample_size: c.sample_size,
            }
        })
        .collect()
}
