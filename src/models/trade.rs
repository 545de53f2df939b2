use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Side> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "b" | "bid" | "long" => Some(Side::Buy),
            "sell" | "s" | "ask" | "short" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub size: f64,
    pub execution_price: f64,
    pub pnl: f64,
    #[serde(default)]
    pub fee: Option<f64>,
    #[serde(default)]
    pub account: Option<String>,
}

impl TradeRecord {
    /// Join key: the UTC calendar day of the fill.
    pub fn trade_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    pub fn notional(&self) -> f64 {
        (self.size * self.execution_price).abs()
    }
}
