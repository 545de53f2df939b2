use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::stats::{mean, sample_std};
use crate::error::AnalyticsError;
use crate::models::{JoinedRecord, SentimentClass, Side};

/// Dimension to bucket joined trades by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKey {
    Classification,
    Day,
    Week,
    Month,
    Symbol,
    Side,
}

impl GroupKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKey::Classification => "classification",
            GroupKey::Day => "day",
            GroupKey::Week => "week",
            GroupKey::Month => "month",
            GroupKey::Symbol => "symbol",
            GroupKey::Side => "side",
        }
    }

    /// `None` when the record has nothing to group on (no sentiment for
    /// `Classification`).
    pub fn bucket(&self, r: &JoinedRecord) -> Option<Bucket> {
        match self {
            GroupKey::Classification => r.classification.map(Bucket::Sentiment),
            GroupKey::Day => Some(Bucket::Day(r.date)),
            GroupKey::Week => {
                let w = r.date.iso_week();
                Some(Bucket::Week {
                    year: w.year(),
                    week: w.week(),
                })
            }
            GroupKey::Month => Some(Bucket::Month {
                year: r.date.year(),
                month: r.date.month(),
            }),
            GroupKey::Symbol => Some(Bucket::Symbol(r.symbol.clone())),
            GroupKey::Side => Some(Bucket::Side(r.side)),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GroupKey {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classification" | "sentiment" | "class" => Ok(GroupKey::Classification),
            "day" | "daily" => Ok(GroupKey::Day),
            "week" | "weekly" => Ok(GroupKey::Week),
            "month" | "monthly" => Ok(GroupKey::Month),
            "symbol" | "coin" => Ok(GroupKey::Symbol),
            "side" => Ok(GroupKey::Side),
            other => Err(AnalyticsError::InvalidParameter {
                name: "group_by",
                message: format!("unknown grouping '{}'", other),
            }),
        }
    }
}

/// A distinct group value. Ordering is the natural order of the dimension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    Sentiment(SentimentClass),
    Day(NaiveDate),
    Week { year: i32, week: u32 },
    Month { year: i32, month: u32 },
    Symbol(String),
    Side(Side),
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Sentiment(c) => write!(f, "{}", c),
            Bucket::Day(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Bucket::Week { year, week } => write!(f, "{}-W{:02}", year, week),
            Bucket::Month { year, month } => write!(f, "{}-{:02}", year, month),
            Bucket::Symbol(s) => write!(f, "{}", s),
            Bucket::Side(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for Bucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateMetric {
    pub group_key: Bucket,
    pub trade_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub mean_pnl: f64,
    pub total_pnl: f64,
    pub pnl_std: f64,
    pub total_volume: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
}

/// Wins and losses ignoring flat trades, and the resulting win rate in [0, 1].
pub fn win_rate(pnls: &[f64]) -> (usize, usize, f64) {
    let wins = pnls.iter().filter(|p| **p > 0.0).count();
    let losses = pnls.iter().filter(|p| **p < 0.0).count();
    let decided = wins + losses;
    let rate = if decided > 0 {
        wins as f64 / decided as f64
    } else {
        0.0
    };
    (wins, losses, rate)
}

/// Per-trade Sharpe ratio, unannualized. NaN below two trades or with zero spread.
pub fn sharpe_ratio(pnls: &[f64]) -> f64 {
    let sd = sample_std(pnls);
    if sd.is_nan() || sd == 0.0 {
        return f64::NAN;
    }
    mean(pnls) / sd
}

/// Largest peak-to-trough fall of the running pnl sum, as a non-negative amount.
/// The running sum starts at zero, so an opening loss counts as drawdown.
pub fn max_drawdown(pnls: &[f64]) -> f64 {
    let mut equity = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut worst = 0.0_f64;
    for p in pnls {
        equity += p;
        peak = peak.max(equity);
        worst = worst.max(peak - equity);
    }
    worst
}

/// One metric per distinct group value, in group order.
///
/// Records are expected in timestamp order (as produced by the merger); the
/// drawdown of each group follows that order.
pub fn aggregate(records: &[JoinedRecord], key: GroupKey) -> Vec<AggregateMetric> {
    let mut groups: BTreeMap<Bucket, Vec<&JoinedRecord>> = BTreeMap::new();
    for r in records {
        if let Some(bucket) = key.bucket(r) {
            groups.entry(bucket).or_default().push(r);
        }
    }

    groups
        .into_iter()
        .map(|(bucket, mut trades)| {
            trades.sort_by_key(|t| t.timestamp);
            compute(bucket, &trades)
        })
        .collect()
}

fn compute(bucket: Bucket, trades: &[&JoinedRecord]) -> AggregateMetric {
    let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
    let (wins, losses, rate) = win_rate(&pnls);

    AggregateMetric {
        group_key: bucket,
        trade_count: trades.len(),
        wins,
        losses,
        win_rate: rate,
        mean_pnl: mean(&pnls),
        total_pnl: pnls.iter().sum(),
        pnl_std: sample_std(&pnls),
        total_volume: trades.iter().map(|t| t.notional()).sum(),
        sharpe_ratio: sharpe_ratio(&pnls),
        max_drawdown: max_drawdown(&pnls),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{joined, trade};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn fear_and_greed_scenario() {
        let records = vec![
            joined("2024-01-01 09:00:00", Some(20), 5.0),
            joined("2024-01-01 10:00:00", Some(20), -3.0),
            joined("2024-01-02 09:00:00", Some(80), 10.0),
        ];
        let out = aggregate(&records, GroupKey::Classification);
        assert_eq!(out.len(), 2);

        let fear = &out[0];
        assert_eq!(fear.group_key, Bucket::Sentiment(SentimentClass::Fear));
        assert_eq!(fear.trade_count, 2);
        assert!(close(fear.win_rate, 0.5));
        assert!(close(fear.mean_pnl, 1.0));
        assert!(close(fear.max_drawdown, 3.0));

        let greed = &out[1];
        assert_eq!(greed.group_key, Bucket::Sentiment(SentimentClass::Greed));
        assert_eq!(greed.trade_count, 1);
        assert!(close(greed.win_rate, 1.0));
        assert!(close(greed.mean_pnl, 10.0));
        assert!(greed.sharpe_ratio.is_nan());
    }

    #[test]
    fn win_rate_bounds() {
        assert_eq!(win_rate(&[1.0, 2.0, 0.5]).2, 1.0);
        assert_eq!(win_rate(&[-1.0, 0.0, -0.5]).2, 0.0);
        assert_eq!(win_rate(&[0.0, 0.0]).2, 0.0);
        assert_eq!(win_rate(&[]).2, 0.0);
    }

    #[test]
    fn flat_trades_count_but_do_not_decide() {
        let records = vec![
            joined("2024-01-01 09:00:00", Some(50), 2.0),
            joined("2024-01-01 10:00:00", Some(50), 0.0),
            joined("2024-01-01 11:00:00", Some(50), -1.0),
            joined("2024-01-01 12:00:00", Some(50), 0.0),
        ];
        let m = &aggregate(&records, GroupKey::Classification)[0];
        assert_eq!(m.trade_count, 4);
        assert_eq!((m.wins, m.losses), (1, 1));
        assert!(close(m.win_rate, 0.5));
    }

    #[test]
    fn sharpe_undefined_cases() {
        assert!(sharpe_ratio(&[1.0]).is_nan());
        assert!(sharpe_ratio(&[2.0, 2.0, 2.0]).is_nan());
        // mean 2, sample std 1.
        assert!(close(sharpe_ratio(&[1.0, 2.0, 3.0]), 2.0));
    }

    #[test]
    fn drawdown_from_running_peak() {
        assert!(close(max_drawdown(&[5.0, -3.0, 4.0, -8.0, 1.0]), 8.0));
        assert!(close(max_drawdown(&[1.0, 2.0, 3.0]), 0.0));
        assert!(close(max_drawdown(&[-2.0, -1.0]), 3.0));
        assert!(close(max_drawdown(&[]), 0.0));
    }

    #[test]
    fn unmatched_records_skip_classification_but_count_in_time_buckets() {
        let records = vec![
            joined("2024-01-31 09:00:00", Some(50), 1.0),
            joined("2024-02-01 09:00:00", None, 2.0),
        ];
        let by_class = aggregate(&records, GroupKey::Classification);
        assert_eq!(by_class.len(), 1);
        assert_eq!(by_class[0].trade_count, 1);

        let by_month = aggregate(&records, GroupKey::Month);
        assert_eq!(by_month.len(), 2);
        assert_eq!(by_month[0].group_key.to_string(), "2024-01");
        assert_eq!(by_month[1].group_key.to_string(), "2024-02");
    }

    #[test]
    fn volume_and_side_grouping() {
        let buy = trade("2024-01-01 09:00:00", Side::Buy, 2.0, 100.0, 1.0);
        let sell = trade("2024-01-01 10:00:00", Side::Sell, 1.0, 50.0, -1.0);
        let records: Vec<JoinedRecord> = [buy, sell]
            .iter()
            .map(|t| JoinedRecord::new(t, None))
            .collect();
        let out = aggregate(&records, GroupKey::Side);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].group_key, Bucket::Side(Side::Buy));
        assert!(close(out[0].total_volume, 200.0));
        assert!(close(out[1].total_volume, 50.0));

        let by_day = aggregate(&records, GroupKey::Day);
        assert!(close(by_day[0].total_volume, 250.0));
        assert_eq!(by_day[0].group_key.to_string(), "2024-01-01");
    }

    #[test]
    fn iso_week_labels() {
        let r = joined("2024-01-01 09:00:00", Some(50), 1.0);
        assert_eq!(GroupKey::Week.bucket(&r).unwrap().to_string(), "2024-W01");
    }

    #[test]
    fn parse_group_key() {
        assert_eq!("Month".parse::<GroupKey>().unwrap(), GroupKey::Month);
        assert_eq!("sentiment".parse::<GroupKey>().unwrap(), GroupKey::Classification);
        assert!("hour".parse::<GroupKey>().is_err());
    }
}
