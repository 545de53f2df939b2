#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Writes `contents` to `<dir>/<name>` and returns the path.
pub fn write_csv(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// alternative.me style export: timestamp,value,classification,date
pub fn sentiment_csv(rows: &[(&str, u8, &str)]) -> String {
    let mut out = String::from("timestamp,value,classification,date\n");
    for (date, value, label) in rows {
        let d = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        let epoch = d.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
        out.push_str(&format!("{},{},{},{}\n", epoch, value, label, date));
    }
    out
}

/// Simple trade file with UTC timestamps.
pub fn trades_csv(rows: &[(&str, &str, f64, f64, f64)]) -> String {
    let mut out = String::from("timestamp,symbol,side,size,execution_price,pnl,fee\n");
    for (at, side, size, price, pnl) in rows {
        out.push_str(&format!("{},BTC,{},{},{},{},0.05\n", at, side, size, price, pnl));
    }
    out
}

/// `n` consecutive days from `start`, one sentiment row and one trade each.
/// Scores sweep 5..95 and pnl tracks the score.
pub fn correlated_days(start: &str, n: usize) -> (String, String) {
    let first = NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap();
    let mut sentiment = Vec::new();
    let mut trades = Vec::new();
    for i in 0..n {
        let d = first + Duration::days(i as i64);
        let score = (5 + (i * 90) / n.max(1)) as u8;
        let wiggle = if i % 2 == 0 { 1.5 } else { -1.5 };
        sentiment.push((d.format("%Y-%m-%d").to_string(), score));
        trades.push((
            format!("{} 14:30:00", d.format("%Y-%m-%d")),
            score as f64 / 10.0 - 5.0 + wiggle,
        ));
    }

    let mut s = String::from("date,value\n");
    for (d, v) in &sentiment {
        s.push_str(&format!("{},{}\n", d, v));
    }
    let mut t = String::from("timestamp,symbol,side,size,execution_price,pnl\n");
    for (at, pnl) in &trades {
        t.push_str(&format!("{},ETH,sell,2,50,{}\n", at, pnl));
    }
    (s, t)
}
