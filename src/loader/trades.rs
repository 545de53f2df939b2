use chrono_tz::Tz;
use csv::StringRecord;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

use super::schema::{ColumnSpec, Schema};
use super::timestamp::parse_timestamp;
use super::{parse_number, read_rows, required, Dataset, LoadOptions};
use crate::error::{AnalyticsError, Result};
use crate::models::{Side, TradeRecord};

// Hyperliquid exports carry both "Timestamp IST" and a lossy epoch
// "Timestamp"; the wall-clock column wins.
const COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::required(
        "timestamp",
        &["timestamp_ist", "timestamp", "datetime", "time", "date"],
    ),
    ColumnSpec::required("symbol", &["symbol", "coin", "asset", "ticker"]),
    ColumnSpec::required("side", &["side"]),
    ColumnSpec::required("size", &["size", "size_tokens", "quantity", "qty", "amount"]),
    ColumnSpec::required("execution_price", &["execution_price", "price", "fill_price"]),
    ColumnSpec::required("pnl", &["pnl", "closed_pnl", "realized_pnl", "profit"]),
    ColumnSpec::optional("fee", &["fee", "fees"]),
    ColumnSpec::optional("account", &["account"]),
];

pub fn load_trades_path(path: impl AsRef<Path>, opts: &LoadOptions) -> Result<Dataset<TradeRecord>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    load_trades(BufReader::new(file), &path.display().to_string(), opts)
}

/// Loads a trade history. Output is ordered by timestamp; ties keep file order.
pub fn load_trades<R: Read>(reader: R, source: &str, opts: &LoadOptions) -> Result<Dataset<TradeRecord>> {
    let mut zone: Option<Tz> = None;

    let (_, parsed) = read_rows(reader, source, COLUMNS, opts, |schema, record, line| {
        let tz = *zone.get_or_insert_with(|| {
            let tz = resolve_timezone(schema, opts);
            debug!("{}: naive timestamps read as {}", source, tz);
            tz
        });
        parse_row(schema, record, tz, source, line)
    })?;

    let mut records: Vec<TradeRecord> = parsed.rows.into_iter().map(|(_, t)| t).collect();
    if records.is_empty() {
        return Err(AnalyticsError::EmptyDataset {
            source_name: source.to_string(),
        });
    }
    records.sort_by_key(|t| t.timestamp);

    info!(
        "Loaded {} trades from {} ({} skipped)",
        records.len(),
        source,
        parsed.skipped
    );

    Ok(Dataset {
        source: source.to_string(),
        records,
        skipped_rows: parsed.skipped,
        relabeled_rows: 0,
    })
}

fn resolve_timezone(schema: &Schema, opts: &LoadOptions) -> Tz {
    if let Some(tz) = opts.timezone {
        return tz;
    }
    let header = schema.header("timestamp").to_ascii_lowercase();
    if header.split(|c: char| !c.is_ascii_alphanumeric()).any(|w| w == "ist") {
        chrono_tz::Asia::Kolkata
    } else {
        chrono_tz::UTC
    }
}

fn parse_row(
    schema: &Schema,
    record: &StringRecord,
    tz: Tz,
    source: &str,
    line: u64,
) -> Result<TradeRecord> {
    let raw_ts = required(schema, record, "timestamp", source, line)?;
    let timestamp = parse_timestamp(raw_ts, tz).ok_or_else(|| {
        AnalyticsError::parse(
            source,
            line,
            schema.header("timestamp"),
            format!("unrecognised timestamp '{}'", raw_ts),
        )
    })?;

    let symbol = required(schema, record, "symbol", source, line)?.to_string();

    let raw_side = required(schema, record, "side", source, line)?;
    let side = Side::from_str_loose(raw_side).ok_or_else(|| {
        AnalyticsError::parse(
            source,
            line,
            schema.header("side"),
            format!("unknown side '{}'", raw_side),
        )
    })?;

    let number = |name: &'static str| -> Result<f64> {
        parse_number(required(schema, record, name, source, line)?, schema, name, source, line)
    };
    let size = number("size")?;
    let execution_price = number("execution_price")?;
    let pnl = number("pnl")?;

    let fee = match schema.get(record, "fee") {
        Some(raw) => Some(parse_number(raw, schema, "fee", source, line)?),
        None => None,
    };
    let account = schema.get(record, "account").map(str::to_string);

    Ok(TradeRecord {
        timestamp,
        symbol,
        side,
        size,
        execution_price,
        pnl,
        fee,
        account,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn load(data: &str) -> Result<Dataset<TradeRecord>> {
        load_trades(data.as_bytes(), "trades.csv", &LoadOptions::default())
    }

    #[test]
    fn loads_plain_schema_sorted_by_time() {
        let data = "timestamp,symbol,side,size,price,pnl\n\
                    2024-01-02 10:00:00,BTC,SELL,0.5,42000,10\n\
                    2024-01-01 09:00:00,BTC,BUY,0.5,41000,-3\n";
        let ds = load(data).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[0].side, Side::Buy);
        assert_eq!(ds.records[0].pnl, -3.0);
        assert_eq!(ds.records[1].trade_date(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert!((ds.records[1].notional() - 21000.0).abs() < 1e-9);
        assert_eq!(ds.records[0].fee, None);
    }

    #[test]
    fn loads_hyperliquid_export_in_ist() {
        let data = "Account,Coin,Execution Price,Size Tokens,Size USD,Side,Timestamp IST,Start Position,Direction,Closed PnL,Transaction Hash,Order ID,Crossed,Fee,Trade ID,Timestamp\n\
                    0xabc,@107,7.9769,986.87,7872.16,BUY,02-12-2024 22:50,0,Buy,0,0x1,52017706630,TRUE,0.345404,8.95E+14,1.73E+12\n\
                    0xabc,@107,7.98,16,127.68,SELL,03-12-2024 01:00,986.87,Sell,1.25,0x2,52017706631,TRUE,0.0056,4.43E+14,1.73E+12\n";
        let ds = load(data).unwrap();
        assert_eq!(ds.len(), 2);
        let first = &ds.records[0];
        assert_eq!(first.symbol, "@107");
        assert_eq!(first.account.as_deref(), Some("0xabc"));
        assert_eq!(first.fee, Some(0.345404));
        assert_eq!(first.timestamp.hour(), 17);
        // 01:00 IST on the 3rd is still the 2nd in UTC.
        assert_eq!(ds.records[1].trade_date(), NaiveDate::from_ymd_opt(2024, 12, 2).unwrap());
        assert_eq!(ds.records[1].pnl, 1.25);
    }

    #[test]
    fn configured_timezone_overrides_header_hint() {
        let data = "Timestamp IST,Coin,Side,Size Tokens,Execution Price,Closed PnL\n\
                    02-12-2024 22:50,BTC,BUY,1,1,0\n";
        let opts = LoadOptions {
            timezone: Some(chrono_tz::UTC),
            ..Default::default()
        };
        let ds = load_trades(data.as_bytes(), "t.csv", &opts).unwrap();
        assert_eq!(ds.records[0].timestamp.hour(), 22);
    }

    #[test]
    fn missing_pnl_column() {
        let err = load("timestamp,symbol,side,size,price\n2024-01-01,BTC,BUY,1,1\n").unwrap_err();
        assert!(matches!(err, AnalyticsError::MissingColumn { ref column, .. } if column == "pnl"));
    }

    #[test]
    fn bad_number_names_column_and_line() {
        let data = "timestamp,symbol,side,size,price,Closed PnL\n\
                    2024-01-01,BTC,BUY,1,1,0\n\
                    2024-01-01,BTC,BUY,1,1,oops\n";
        match load(data).unwrap_err() {
            AnalyticsError::Parse { line, column, .. } => {
                assert_eq!(line, 3);
                assert_eq!(column, "Closed PnL");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_side_and_timestamp() {
        assert!(load("timestamp,symbol,side,size,price,pnl\n2024-01-01,BTC,HOLD,1,1,0\n").is_err());
        assert!(load("timestamp,symbol,side,size,price,pnl\nlater,BTC,BUY,1,1,0\n").is_err());
    }

    #[test]
    fn lenient_skips_and_empty_fails() {
        let opts = LoadOptions {
            lenient: true,
            ..Default::default()
        };
        let data = "timestamp,symbol,side,size,price,pnl\n\
                    2024-01-01,BTC,BUY,1,1,x\n\
                    2024-01-01,BTC,BUY,1,1,2\n";
        let ds = load_trades(data.as_bytes(), "t.csv", &opts).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.skipped_rows, 1);

        let err = load_trades(
            "timestamp,symbol,side,size,price,pnl\nnope,BTC,BUY,1,1,2\n".as_bytes(),
            "t.csv",
            &opts,
        )
        .unwrap_err();
        assert!(matches!(err, AnalyticsError::EmptyDataset { .. }));
    }
}
