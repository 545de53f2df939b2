use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{SentimentClass, SentimentRecord, Side, TradeRecord};

/// A trade with the sentiment of its trading day attached.
///
/// Kept flat so it exports as a single CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRecord {
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub symbol: String,
    pub side: Side,
    pub size: f64,
    pub execution_price: f64,
    pub pnl: f64,
    pub fee: Option<f64>,
    pub sentiment_score: Option<u8>,
    pub classification: Option<SentimentClass>,
}

impl JoinedRecord {
    pub fn new(trade: &TradeRecord, sentiment: Option<&SentimentRecord>) -> Self {
        Self {
            timestamp: trade.timestamp,
            date: trade.trade_date(),
            symbol: trade.symbol.clone(),
            side: trade.side,
            size: trade.size,
            execution_price: trade.execution_price,
            pnl: trade.pnl,
            fee: trade.fee,
            sentiment_score: sentiment.map(|s| s.score),
            classification: sentiment.map(|s| s.classification),
        }
    }

    pub fn notional(&self) -> f64 {
        (self.size * self.execution_price).abs()
    }

    pub fn has_sentiment(&self) -> bool {
        self.classification.is_some()
    }
}
