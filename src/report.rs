use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::analysis::correlation::{DailyMetric, MetricCorrelation, RollingPoint};
use crate::analysis::daily::{DailyAggregate, TradingSummary};
use crate::analysis::merge::MergeResult;
use crate::analysis::metrics::{AggregateMetric, GroupKey};
use crate::analysis::stats::{
    detect_outliers, mean, median, sample_std, two_sample_t_test, DescriptiveStats,
    OutlierMethod, RiskMetrics,
};
use crate::loader::Dataset;
use crate::models::{SentimentClass, SentimentRecord, TradeRecord};

/// |r| above which a correlation is called out in the insights.
pub const INSIGHT_CORRELATION: f64 = 0.3;
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

#[derive(Debug, Clone, Serialize)]
pub struct ClassCount {
    pub classification: SentimentClass,
    pub days: usize,
    pub share: f64,
}

/// Distribution of the index over the analysed days.
#[derive(Debug, Clone, Serialize)]
pub struct SentimentStats {
    pub days: usize,
    pub avg_score: f64,
    pub median_score: f64,
    pub std_score: f64,
    pub min_score: Option<u8>,
    pub max_score: Option<u8>,
    pub class_counts: Vec<ClassCount>,
}

impl SentimentStats {
    pub fn of(records: &[SentimentRecord]) -> Self {
        let scores: Vec<f64> = records.iter().map(|r| r.score as f64).collect();
        let days = records.len();
        let class_counts = SentimentClass::ALL
            .iter()
            .map(|&c| {
                let n = records.iter().filter(|r| r.classification == c).count();
                ClassCount {
                    classification: c,
                    days: n,
                    share: if days > 0 { n as f64 / days as f64 } else { 0.0 },
                }
            })
            .collect();

        Self {
            days,
            avg_score: mean(&scores),
            median_score: median(&scores),
            std_score: sample_std(&scores),
            min_score: records.iter().map(|r| r.score).min(),
            max_score: records.iter().map(|r| r.score).max(),
            class_counts,
        }
    }
}

/// Daily pnl under one classification against all other days.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryTest {
    pub classification: SentimentClass,
    pub days: usize,
    pub mean_daily_pnl: f64,
    pub rest_mean_daily_pnl: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub significant: bool,
}

fn daily_pnl_by_class(daily: &[DailyAggregate]) -> BTreeMap<SentimentClass, Vec<f64>> {
    let mut out: BTreeMap<SentimentClass, Vec<f64>> = BTreeMap::new();
    for d in daily {
        if let Some(c) = d.classification {
            out.entry(c).or_default().push(d.total_pnl);
        }
    }
    out
}

/// One test per classification with at least two days on both sides.
pub fn category_tests(daily: &[DailyAggregate]) -> Vec<CategoryTest> {
    let by_class = daily_pnl_by_class(daily);
    by_class
        .iter()
        .filter_map(|(&class, inside)| {
            let rest: Vec<f64> = by_class
                .iter()
                .filter(|(c, _)| **c != class)
                .flat_map(|(_, v)| v.iter().copied())
                .collect();
            let test = two_sample_t_test(inside, &rest).ok()?;
            Some(CategoryTest {
                classification: class,
                days: inside.len(),
                mean_daily_pnl: mean(inside),
                rest_mean_daily_pnl: mean(&rest),
                t_statistic: test.t_statistic,
                p_value: test.p_value,
                significant: test.is_significant(SIGNIFICANCE_LEVEL),
            })
        })
        .collect()
}

/// Plain-language observations for the summary.
pub fn insights(
    correlations: &[MetricCorrelation],
    daily: &[DailyAggregate],
    trading: &TradingSummary,
) -> Vec<String> {
    let mut out = Vec::new();

    for c in correlations {
        let subject = match c.metric {
            DailyMetric::TotalPnl => "PnL",
            DailyMetric::TotalVolume => "trading volume",
            _ => continue,
        };
        if c.coefficient.abs() > INSIGHT_CORRELATION {
            let corr = c.correlation();
            let direction = if c.coefficient > 0.0 { "positive" } else { "negative" };
            out.push(format!(
                "{} {} correlation between sentiment and {} ({:.3}, p={:.3}){}",
                capitalize(corr.strength()),
                direction,
                subject,
                c.coefficient,
                c.p_value,
                if corr.is_significant(SIGNIFICANCE_LEVEL) {
                    ""
                } else {
                    ", not significant"
                }
            ));
        }
    }

    let by_class: Vec<(SentimentClass, f64)> = daily_pnl_by_class(daily)
        .into_iter()
        .map(|(c, v)| (c, mean(&v)))
        .collect();
    let best = by_class.iter().max_by(|a, b| a.1.total_cmp(&b.1));
    let worst = by_class.iter().min_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((class, avg)) = best {
        out.push(format!(
            "Best performance during {} periods (avg daily PnL: ${:.2})",
            class, avg
        ));
    }
    if let (Some((worst_class, avg)), Some((best_class, _))) = (worst, best) {
        if worst_class != best_class {
            out.push(format!(
                "Worst performance during {} periods (avg daily PnL: ${:.2})",
                worst_class, avg
            ));
        }
    }

    if trading.total_trades > 0 {
        let pct = trading.win_rate * 100.0;
        if trading.win_rate > 0.6 {
            out.push(format!(
                "High win rate of {:.1}% indicates strong trading strategy",
                pct
            ));
        } else if trading.win_rate < 0.4 {
            out.push(format!(
                "Low win rate of {:.1}% suggests room for strategy improvement",
                pct
            ));
        }
    }

    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    fn of(mut dates: impl Iterator<Item = NaiveDate>) -> Option<Self> {
        let first = dates.next()?;
        let (start, end) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some(Self { start, end })
    }
}

/// What the inputs looked like and what was lost on the way through.
///
/// Row counts, ranges and symbols describe the period view handed to
/// `assess`; skipped and relabeled rows are counted once at load time.
#[derive(Debug, Clone, Serialize)]
pub struct DataQuality {
    pub sentiment_source: String,
    pub trades_source: String,
    pub sentiment_rows: usize,
    pub trade_rows: usize,
    pub joined_rows: usize,
    pub skipped_sentiment_rows: usize,
    pub skipped_trade_rows: usize,
    pub relabeled_rows: usize,
    pub unmatched_trades: usize,
    pub unmatched_days: usize,
    pub sentiment_range: Option<DateRange>,
    pub trade_range: Option<DateRange>,
    pub symbols: usize,
    pub missing_fees: usize,
    /// Trades whose pnl lies outside 1.5 IQR of the joined set.
    pub pnl_outliers: usize,
}

impl DataQuality {
    pub fn assess(
        sentiment: &Dataset<SentimentRecord>,
        trades: &Dataset<TradeRecord>,
        merged: &MergeResult,
    ) -> Self {
        let pnls: Vec<f64> = merged.records.iter().map(|r| r.pnl).collect();
        let symbols: BTreeSet<&str> = trades.records.iter().map(|t| t.symbol.as_str()).collect();

        Self {
            sentiment_source: sentiment.source.clone(),
            trades_source: trades.source.clone(),
            sentiment_rows: sentiment.len(),
            trade_rows: trades.len(),
            joined_rows: merged.records.len(),
            skipped_sentiment_rows: sentiment.skipped_rows,
            skipped_trade_rows: trades.skipped_rows,
            relabeled_rows: sentiment.relabeled_rows,
            unmatched_trades: merged.unmatched_count,
            unmatched_days: merged.unmatched_dates.len(),
            sentiment_range: DateRange::of(sentiment.records.iter().map(|r| r.date)),
            trade_range: DateRange::of(trades.records.iter().map(|t| t.trade_date())),
            symbols: symbols.len(),
            missing_fees: trades.records.iter().filter(|t| t.fee.is_none()).count(),
            pnl_outliers: detect_outliers(&pnls, OutlierMethod::Iqr(1.5))
                .into_iter()
                .filter(|o| *o)
                .count(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupedMetrics {
    pub key: GroupKey,
    pub metrics: Vec<AggregateMetric>,
}

/// Everything one analysis run produces.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub period: String,
    pub reference_date: Option<NaiveDate>,
    pub sentiment_stats: SentimentStats,
    pub trading: TradingSummary,
    pub pnl_stats: DescriptiveStats,
    pub daily_risk: Option<RiskMetrics>,
    pub by_classification: Vec<AggregateMetric>,
    pub by_month: Vec<AggregateMetric>,
    /// The configured extra grouping, when it is not one of the two above.
    pub by_group: Option<GroupedMetrics>,
    pub daily: Vec<DailyAggregate>,
    pub correlations: Vec<MetricCorrelation>,
    pub rolling_window: usize,
    pub rolling: Vec<RollingPoint>,
    pub category_tests: Vec<CategoryTest>,
    pub insights: Vec<String>,
    pub quality: DataQuality,
}

fn fmt_f(v: f64, prec: usize) -> String {
    if v.is_finite() {
        format!("{:.*}", prec, v)
    } else {
        "n/a".to_string()
    }
}

fn fmt_date(r: &Option<DateRange>) -> String {
    match r {
        Some(r) => format!("{} to {}", r.start, r.end),
        None => "-".to_string(),
    }
}

fn section(w: &mut impl Write, title: &str) -> io::Result<()> {
    writeln!(w)?;
    writeln!(w, "  {}", title)?;
    writeln!(w, "  ───────────────────────────────────")
}

fn metric_rows(w: &mut impl Write, metrics: &[AggregateMetric]) -> io::Result<()> {
    for m in metrics {
        writeln!(
            w,
            "  {:>13}: {} trades | WR {:.0}% | Mean ${:+.2} | Total ${:+.2} | Sharpe {} | DD ${:.2}",
            m.group_key.to_string(),
            m.trade_count,
            m.win_rate * 100.0,
            m.mean_pnl,
            m.total_pnl,
            fmt_f(m.sharpe_ratio, 2),
            m.max_drawdown
        )?;
    }
    Ok(())
}

impl AnalysisReport {
    pub fn write_summary(&self, w: &mut impl Write) -> io::Result<()> {
        let q = &self.quality;
        writeln!(w, "{}", "=".repeat(70))?;
        writeln!(w, "  FEAR & GREED vs TRADING PERFORMANCE")?;
        writeln!(w, "{}", "=".repeat(70))?;
        writeln!(w, "  Period:      {}", self.period)?;
        if let Some(d) = self.reference_date {
            writeln!(w, "  As of:       {}", d)?;
        }
        writeln!(w, "  Sentiment:   {} ({})", q.sentiment_source, fmt_date(&q.sentiment_range))?;
        writeln!(w, "  Trades:      {} ({})", q.trades_source, fmt_date(&q.trade_range))?;

        let s = &self.sentiment_stats;
        section(w, "SENTIMENT")?;
        writeln!(w, "  Days:        {}", s.days)?;
        writeln!(
            w,
            "  Score:       avg {} | median {} | std {}",
            fmt_f(s.avg_score, 1),
            fmt_f(s.median_score, 1),
            fmt_f(s.std_score, 1)
        )?;
        for c in &s.class_counts {
            writeln!(
                w,
                "  {:>13}: {} days ({:.1}%)",
                c.classification.as_str(),
                c.days,
                c.share * 100.0
            )?;
        }

        let t = &self.trading;
        section(w, "TRADES")?;
        writeln!(w, "  Total:       {} over {} days", t.total_trades, t.trading_days)?;
        writeln!(w, "  Win/Loss:    {} / {}", t.profitable_trades, t.losing_trades)?;
        writeln!(w, "  Win Rate:    {:.1}%", t.win_rate * 100.0)?;
        writeln!(w, "  PnL:         ${:+.2}", t.total_pnl)?;
        writeln!(w, "  Avg Trade:   ${}", fmt_f(t.avg_pnl, 2))?;
        writeln!(w, "  Volume:      ${:.2}", t.total_volume)?;
        writeln!(w, "  Fees:        ${:.2}", t.total_fees)?;

        section(w, "RISK")?;
        writeln!(w, "  Max DD:      ${:.2}", t.max_drawdown)?;
        writeln!(w, "  Sharpe:      {}", fmt_f(t.sharpe_ratio, 2))?;
        if let Some(r) = &self.daily_risk {
            writeln!(w, "  Daily vol:   ${}", fmt_f(r.volatility, 2))?;
            writeln!(w, "  VaR 95%:     ${:.2}", r.var_95)?;
            writeln!(w, "  CVaR 95%:    ${:.2}", r.cvar_95)?;
        }

        section(w, "BY SENTIMENT")?;
        metric_rows(w, &self.by_classification)?;

        section(w, "BY MONTH")?;
        metric_rows(w, &self.by_month)?;

        if let Some(g) = &self.by_group {
            section(w, &format!("BY {}", g.key.as_str().to_uppercase()))?;
            metric_rows(w, &g.metrics)?;
        }

        section(w, "CORRELATION WITH SENTIMENT")?;
        for c in &self.correlations {
            let corr = c.correlation();
            writeln!(
                w,
                "  {:>13}: r={} p={} n={} ({}){}",
                c.metric.as_str(),
                fmt_f(c.coefficient, 3),
                fmt_f(c.p_value, 4),
                c.sample_size,
                corr.strength(),
                if corr.is_significant(SIGNIFICANCE_LEVEL) { " *" } else { "" }
            )?;
        }
        let defined: Vec<f64> = self
            .rolling
            .iter()
            .map(|p| p.correlation)
            .filter(|c| c.is_finite())
            .collect();
        writeln!(
            w,
            "  Rolling ({}d): {} windows, mean r={}",
            self.rolling_window,
            self.rolling.len(),
            fmt_f(mean(&defined), 3)
        )?;

        if !self.category_tests.is_empty() {
            section(w, "SENTIMENT CATEGORY TESTS (daily PnL vs rest)")?;
            for c in &self.category_tests {
                writeln!(
                    w,
                    "  {:>13}: {} days | mean ${:+.2} vs ${:+.2} | t={} p={}{}",
                    c.classification.as_str(),
                    c.days,
                    c.mean_daily_pnl,
                    c.rest_mean_daily_pnl,
                    fmt_f(c.t_statistic, 2),
                    fmt_f(c.p_value, 4),
                    if c.significant { " *" } else { "" }
                )?;
            }
        }

        section(w, "DATA QUALITY")?;
        writeln!(w, "  Rows:        {} sentiment | {} trades | {} joined", q.sentiment_rows, q.trade_rows, q.joined_rows)?;
        writeln!(w, "  Skipped:     {} sentiment | {} trades", q.skipped_sentiment_rows, q.skipped_trade_rows)?;
        writeln!(w, "  Relabeled:   {}", q.relabeled_rows)?;
        writeln!(w, "  Unmatched:   {} trades on {} days", q.unmatched_trades, q.unmatched_days)?;
        writeln!(w, "  Symbols:     {}", q.symbols)?;
        writeln!(w, "  Outliers:    {} (pnl, 1.5 IQR)", q.pnl_outliers)?;

        if !self.insights.is_empty() {
            section(w, "INSIGHTS")?;
            for i in &self.insights {
                writeln!(w, "  - {}", i)?;
            }
        }

        writeln!(w, "{}", "=".repeat(70))
    }

    pub fn print_summary(&self) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        if let Err(e) = self.write_summary(&mut out) {
            tracing::error!("Failed to print report: {}", e);
        }
    }

    pub fn save_summary(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut f = BufWriter::new(File::create(path)?);
        self.write_summary(&mut f)?;
        f.flush()
    }
}
