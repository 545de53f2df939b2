//! One analysis context: the loaded datasets, the active filters and a memo of
//! the grouped and rolling computations already done for them.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::analysis::correlation::{sentiment_correlations, AlignedSeries, DailyMetric, RollingPoint};
use crate::analysis::daily::{daily_aggregates, DailyAggregate, SharpeConvention, TradingSummary};
use crate::analysis::merge::{merge, MergeResult, UnmatchedPolicy};
use crate::analysis::metrics::{aggregate, AggregateMetric, GroupKey};
use crate::analysis::stats::{DescriptiveStats, RiskMetrics};
use crate::error::{AnalyticsError, Result};
use crate::loader::Dataset;
use crate::models::{JoinedRecord, SentimentRecord, TradeRecord};
use crate::report::{
    category_tests, insights, AnalysisReport, DataQuality, GroupedMetrics, SentimentStats,
};

/// Look-back window ending at the reference date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    #[default]
    All,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneMonth => "1M",
            Period::ThreeMonths => "3M",
            Period::SixMonths => "6M",
            Period::OneYear => "1Y",
            Period::All => "All",
        }
    }

    fn months(&self) -> Option<u32> {
        match self {
            Period::OneMonth => Some(1),
            Period::ThreeMonths => Some(3),
            Period::SixMonths => Some(6),
            Period::OneYear => Some(12),
            Period::All => None,
        }
    }

    /// First date inside the period, `None` for `All`.
    pub fn cutoff(&self, reference: NaiveDate) -> Option<NaiveDate> {
        self.months()
            .and_then(|m| reference.checked_sub_months(Months::new(m)))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Period {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1M" => Ok(Period::OneMonth),
            "3M" => Ok(Period::ThreeMonths),
            "6M" => Ok(Period::SixMonths),
            "1Y" | "12M" => Ok(Period::OneYear),
            "ALL" | "" => Ok(Period::All),
            other => Err(AnalyticsError::InvalidParameter {
                name: "period",
                message: format!("expected 1M, 3M, 6M, 1Y or All, got '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub policy: UnmatchedPolicy,
    pub period: Period,
    /// End of the period filter. Defaults to the latest date in either dataset.
    pub reference_date: Option<NaiveDate>,
    pub rolling_window: usize,
    /// Extra grouping shown next to classification and month.
    pub group_by: GroupKey,
    pub sharpe: SharpeConvention,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            policy: UnmatchedPolicy::Drop,
            period: Period::All,
            reference_date: None,
            rolling_window: 30,
            group_by: GroupKey::Classification,
            sharpe: SharpeConvention::default(),
        }
    }
}

type AggregateKey = (u64, GroupKey);
type RollingKey = (u64, DailyMetric, usize);

pub struct AnalysisSession {
    sentiment: Dataset<SentimentRecord>,
    trades: Dataset<TradeRecord>,
    options: SessionOptions,

    // Derived from the filtered view.
    reference_date: Option<NaiveDate>,
    view_sentiment: Dataset<SentimentRecord>,
    view_trades: Dataset<TradeRecord>,
    merged: MergeResult,
    daily: Vec<DailyAggregate>,
    fingerprint: u64,

    aggregates: HashMap<AggregateKey, Vec<AggregateMetric>>,
    rolling: HashMap<RollingKey, Vec<RollingPoint>>,
    cache_misses: usize,
}

impl AnalysisSession {
    pub fn new(
        sentiment: Dataset<SentimentRecord>,
        trades: Dataset<TradeRecord>,
        options: SessionOptions,
    ) -> Result<Self> {
        if options.rolling_window == 0 {
            return Err(AnalyticsError::InvalidParameter {
                name: "rolling_window",
                message: "must be at least 1".to_string(),
            });
        }

        let mut session = Self {
            view_sentiment: Dataset::new(sentiment.source.clone(), Vec::new()),
            view_trades: Dataset::new(trades.source.clone(), Vec::new()),
            sentiment,
            trades,
            options,
            reference_date: None,
            merged: MergeResult::default(),
            daily: Vec::new(),
            fingerprint: 0,
            aggregates: HashMap::new(),
            rolling: HashMap::new(),
            cache_misses: 0,
        };
        session.refresh();
        Ok(session)
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn records(&self) -> &[JoinedRecord] {
        &self.merged.records
    }

    pub fn merged(&self) -> &MergeResult {
        &self.merged
    }

    pub fn daily(&self) -> &[DailyAggregate] {
        &self.daily
    }

    /// Identifies the filtered joined data; memo entries are keyed by it.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Number of memoized computations actually performed.
    pub fn cache_misses(&self) -> usize {
        self.cache_misses
    }

    /// Switches the look-back window. Earlier results stay cached under their
    /// own fingerprint.
    pub fn set_period(&mut self, period: Period) {
        if self.options.period != period {
            self.options.period = period;
            self.refresh();
        }
    }

    pub fn set_policy(&mut self, policy: UnmatchedPolicy) {
        if self.options.policy != policy {
            self.options.policy = policy;
            self.refresh();
        }
    }

    fn latest_date(&self) -> Option<NaiveDate> {
        let s = self.sentiment.records.iter().map(|r| r.date).max();
        let t = self.trades.records.iter().map(|t| t.trade_date()).max();
        s.max(t)
    }

    fn refresh(&mut self) {
        let reference = self.options.reference_date.or_else(|| self.latest_date());
        let window = reference.map(|r| (self.options.period.cutoff(r), r));
        let in_window = |d: NaiveDate| match window {
            Some((Some(start), end)) => d >= start && d <= end,
            Some((None, end)) => self.options.reference_date.is_none() || d <= end,
            None => true,
        };

        let sentiment = self.sentiment.filtered(|r| in_window(r.date));
        let trades = self.trades.filtered(|t| in_window(t.trade_date()));

        let merged = merge(&sentiment.records, &trades.records, self.options.policy);
        let daily = daily_aggregates(&merged.records);
        let fingerprint = fingerprint(&merged.records, self.options.policy);

        info!(
            "Session view {} as of {}: {} sentiment days, {} trades, fingerprint {:016x}",
            self.options.period,
            reference.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
            sentiment.len(),
            trades.len(),
            fingerprint
        );

        self.reference_date = reference;
        self.view_sentiment = sentiment;
        self.view_trades = trades;
        self.merged = merged;
        self.daily = daily;
        self.fingerprint = fingerprint;
    }

    /// Grouped metrics for the current view, computed once per fingerprint.
    pub fn aggregate(&mut self, key: GroupKey) -> &[AggregateMetric] {
        let memo_key = (self.fingerprint, key);
        if !self.aggregates.contains_key(&memo_key) {
            debug!("Computing {} aggregates", key);
            self.cache_misses += 1;
            let metrics = aggregate(&self.merged.records, key);
            self.aggregates.insert(memo_key, metrics);
        }
        &self.aggregates[&memo_key]
    }

    /// Rolling sentiment correlation against `metric`, computed once per
    /// fingerprint and window.
    pub fn rolling(&mut self, metric: DailyMetric, window: usize) -> Result<&[RollingPoint]> {
        let memo_key = (self.fingerprint, metric, window);
        if !self.rolling.contains_key(&memo_key) {
            debug!("Computing {}-day rolling correlation for {}", window, metric);
            let series = AlignedSeries::sentiment_vs(&self.daily, metric);
            let points: Vec<RollingPoint> = series.rolling(window)?.collect();
            self.cache_misses += 1;
            self.rolling.insert(memo_key, points);
        }
        Ok(&self.rolling[&memo_key])
    }

    pub fn run(&mut self) -> AnalysisReport {
        let by_classification = self.aggregate(GroupKey::Classification).to_vec();
        let by_month = self.aggregate(GroupKey::Month).to_vec();
        let group_by = self.options.group_by;
        let by_group = match group_by {
            GroupKey::Classification | GroupKey::Month => None,
            key => Some(GroupedMetrics {
                key,
                metrics: self.aggregate(key).to_vec(),
            }),
        };

        let window = self.options.rolling_window;
        let rolling = match self.rolling(DailyMetric::TotalPnl, window) {
            Ok(points) => points.to_vec(),
            Err(e) => {
                warn!("Rolling correlation skipped: {}", e);
                Vec::new()
            }
        };
        if rolling.is_empty() {
            warn!(
                "Only {} sentiment days with trades; rolling window of {} yields nothing",
                self.daily.iter().filter(|d| d.sentiment_score.is_some()).count(),
                window
            );
        }

        let records = &self.merged.records;
        let trading = TradingSummary::compute(records, &self.daily, &self.options.sharpe);
        let pnls: Vec<f64> = records.iter().map(|r| r.pnl).collect();
        let daily_pnl: Vec<f64> = self.daily.iter().map(|d| d.total_pnl).collect();
        let correlations = sentiment_correlations(&self.daily);
        let insights = insights(&correlations, &self.daily, &trading);

        AnalysisReport {
            period: self.options.period.to_string(),
            reference_date: self.reference_date,
            sentiment_stats: SentimentStats::of(&self.view_sentiment.records),
            pnl_stats: DescriptiveStats::of(&pnls),
            daily_risk: RiskMetrics::of(&daily_pnl),
            by_classification,
            by_month,
            by_group,
            daily: self.daily.clone(),
            correlations,
            rolling_window: window,
            rolling,
            category_tests: category_tests(&self.daily),
            insights,
            quality: DataQuality::assess(&self.view_sentiment, &self.view_trades, &self.merged),
            trading,
        }
    }
}

fn fingerprint(records: &[JoinedRecord], policy: UnmatchedPolicy) -> u64 {
    let mut h = DefaultHasher::new();
    policy.hash(&mut h);
    records.len().hash(&mut h);
    for r in records {
        r.timestamp.timestamp_millis().hash(&mut h);
        r.symbol.hash(&mut h);
        r.side.hash(&mut h);
        r.size.to_bits().hash(&mut h);
        r.execution_price.to_bits().hash(&mut h);
        r.pnl.to_bits().hash(&mut h);
        r.sentiment_score.hash(&mut h);
    }
    h.finish()
}
