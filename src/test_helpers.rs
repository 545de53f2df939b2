use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::models::{JoinedRecord, SentimentRecord, Side, TradeRecord};

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// "YYYY-MM-DD HH:MM:SS" or "YYYY-MM-DD" as UTC.
pub fn ts(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|_| day(s).and_hms_opt(0, 0, 0).unwrap())
        .and_utc()
}

pub fn sentiment_days(days: &[(&str, u8)]) -> Vec<SentimentRecord> {
    days.iter()
        .map(|&(d, score)| SentimentRecord::new(day(d), score).unwrap())
        .collect()
}

/// A 1-unit BTC buy at 100.0 with the given pnl.
pub fn trade_at(at: &str, pnl: f64) -> TradeRecord {
    trade(at, Side::Buy, 1.0, 100.0, pnl)
}

pub fn trade(at: &str, side: Side, size: f64, price: f64, pnl: f64) -> TradeRecord {
    TradeRecord {
        timestamp: ts(at),
        symbol: "BTC".to_string(),
        side,
        size,
        execution_price: price,
        pnl,
        fee: Some(0.1),
        account: None,
    }
}

/// A joined record on `at` with optional sentiment score.
pub fn joined(at: &str, score: Option<u8>, pnl: f64) -> JoinedRecord {
    let t = trade_at(at, pnl);
    let s = score.map(|v| SentimentRecord::new(t.trade_date(), v).unwrap());
    JoinedRecord::new(&t, s.as_ref())
}

/// One joined trade per day starting at `start`, with the given (score, pnl) pairs.
pub fn daily_joined(start: &str, rows: &[(u8, f64)]) -> Vec<JoinedRecord> {
    let first = day(start);
    rows.iter()
        .enumerate()
        .map(|(i, &(score, pnl))| {
            let d = first + chrono::Duration::days(i as i64);
            joined(&format!("{} 12:00:00", d.format("%Y-%m-%d")), Some(score), pnl)
        })
        .collect()
}
