use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

use crate::models::{JoinedRecord, SentimentRecord, TradeRecord};

/// What to do with trades whose day has no index value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedPolicy {
    #[default]
    Drop,
    /// Keep them with empty sentiment fields. They are still counted.
    Keep,
}

#[derive(Debug, Clone, Default)]
pub struct MergeResult {
    pub records: Vec<JoinedRecord>,
    pub unmatched_count: usize,
    pub unmatched_dates: BTreeSet<NaiveDate>,
}

impl MergeResult {
    pub fn matched(&self) -> impl Iterator<Item = &JoinedRecord> {
        self.records.iter().filter(|r| r.has_sentiment())
    }
}

/// Left-joins trades onto the sentiment day of their UTC trade date.
pub fn merge(
    sentiment: &[SentimentRecord],
    trades: &[TradeRecord],
    policy: UnmatchedPolicy,
) -> MergeResult {
    let by_date: HashMap<NaiveDate, &SentimentRecord> =
        sentiment.iter().map(|s| (s.date, s)).collect();

    let mut ordered: Vec<&TradeRecord> = trades.iter().collect();
    ordered.sort_by_key(|t| t.timestamp);

    let mut result = MergeResult {
        records: Vec::with_capacity(ordered.len()),
        ..Default::default()
    };

    for trade in ordered {
        let date = trade.trade_date();
        match by_date.get(&date) {
            Some(s) => result.records.push(JoinedRecord::new(trade, Some(s))),
            None => {
                result.unmatched_count += 1;
                result.unmatched_dates.insert(date);
                if policy == UnmatchedPolicy::Keep {
                    result.records.push(JoinedRecord::new(trade, None));
                }
            }
        }
    }

    if result.unmatched_count > 0 {
        warn!(
            "{} trades on {} days have no sentiment entry ({:?})",
            result.unmatched_count,
            result.unmatched_dates.len(),
            policy
        );
    }
    info!(
        "Merged {} trades with {} sentiment days -> {} joined records",
        trades.len(),
        sentiment.len(),
        result.records.len()
    );

    result
}
