use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::metrics::{max_drawdown, win_rate};
use super::stats::{mean, sample_std};
use crate::models::{JoinedRecord, SentimentClass, Side};

/// Trading activity of one calendar day alongside that day's index value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub trade_count: usize,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub pnl_std: f64,
    pub total_volume: f64,
    pub avg_volume: f64,
    pub buy_count: usize,
    pub sell_count: usize,
    pub buy_ratio: f64,
    pub total_fees: f64,
    pub win_rate: f64,
    pub cumulative_pnl: f64,
    pub sentiment_score: Option<u8>,
    pub classification: Option<SentimentClass>,
}

/// Rolls joined trades up to one row per day, ascending. Days without trades
/// are absent; sentiment is never carried forward from earlier days.
pub fn daily_aggregates(records: &[JoinedRecord]) -> Vec<DailyAggregate> {
    let mut days: BTreeMap<NaiveDate, Vec<&JoinedRecord>> = BTreeMap::new();
    for r in records {
        days.entry(r.date).or_default().push(r);
    }

    let mut cumulative = 0.0;
    days.into_iter()
        .map(|(date, trades)| {
            let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
            let volumes: Vec<f64> = trades.iter().map(|t| t.notional()).collect();
            let n = trades.len();
            let buy_count = trades.iter().filter(|t| t.side == Side::Buy).count();
            let total_pnl: f64 = pnls.iter().sum();
            cumulative += total_pnl;

            // All trades of a day share its sentiment.
            let first = trades[0];

            DailyAggregate {
                date,
                trade_count: n,
                total_pnl,
                avg_pnl: mean(&pnls),
                pnl_std: sample_std(&pnls),
                total_volume: volumes.iter().sum(),
                avg_volume: mean(&volumes),
                buy_count,
                sell_count: n - buy_count,
                buy_ratio: buy_count as f64 / n as f64,
                total_fees: trades.iter().filter_map(|t| t.fee).sum(),
                win_rate: win_rate(&pnls).2,
                cumulative_pnl: cumulative,
                sentiment_score: first.sentiment_score,
                classification: first.classification,
            }
        })
        .collect()
}

/// How daily pnl is turned into an annualized Sharpe ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SharpeConvention {
    /// Annual risk-free rate, in pnl units per year.
    pub risk_free_rate: f64,
    /// Trading days per year. Crypto trades every day.
    pub periods_per_year: f64,
}

impl Default for SharpeConvention {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            periods_per_year: 365.0,
        }
    }
}

impl SharpeConvention {
    pub fn annualized(&self, daily: &[f64]) -> f64 {
        let sd = sample_std(daily);
        if sd.is_nan() || sd == 0.0 {
            return f64::NAN;
        }
        let excess = mean(daily) - self.risk_free_rate / self.periods_per_year;
        excess / sd * self.periods_per_year.sqrt()
    }
}

/// Whole-history performance figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSummary {
    pub total_trades: usize,
    pub profitable_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub total_volume: f64,
    pub total_fees: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub trading_days: usize,
}

impl TradingSummary {
    pub fn compute(
        records: &[JoinedRecord],
        daily: &[DailyAggregate],
        convention: &SharpeConvention,
    ) -> Self {
        let pnls: Vec<f64> = records.iter().map(|r| r.pnl).collect();
        let (wins, losses, rate) = win_rate(&pnls);
        let daily_pnl: Vec<f64> = daily.iter().map(|d| d.total_pnl).collect();

        Self {
            total_trades: records.len(),
            profitable_trades: wins,
            losing_trades: losses,
            win_rate: rate,
            total_pnl: pnls.iter().sum(),
            avg_pnl: mean(&pnls),
            total_volume: records.iter().map(|r| r.notional()).sum(),
            total_fees: records.iter().filter_map(|r| r.fee).sum(),
            sharpe_ratio: convention.annualized(&daily_pnl),
            max_drawdown: max_drawdown(&daily_pnl),
            trading_days: daily.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{joined, trade};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn sample() -> Vec<JoinedRecord> {
        let mut sell = JoinedRecord::new(
            &trade("2024-01-01 11:00:00", Side::Sell, 1.0, 100.0, -3.0),
            None,
        );
        sell.sentiment_score = Some(20);
        sell.classification = Some(SentimentClass::Fear);
        vec![
            joined("2024-01-01 09:00:00", Some(20), 5.0),
            sell,
            joined("2024-01-03 09:00:00", Some(80), 10.0),
        ]
    }

    #[test]
    fn rolls_up_per_day() {
        let daily = daily_aggregates(&sample());
        assert_eq!(daily.len(), 2);

        let d1 = &daily[0];
        assert_eq!(d1.trade_count, 2);
        assert!(close(d1.total_pnl, 2.0));
        assert!(close(d1.avg_pnl, 1.0));
        assert_eq!((d1.buy_count, d1.sell_count), (1, 1));
        assert!(close(d1.buy_ratio, 0.5));
        assert!(close(d1.win_rate, 0.5));
        assert!(close(d1.total_fees, 0.2));
        assert!(close(d1.total_volume, 200.0));
        assert_eq!(d1.sentiment_score, Some(20));

        let d2 = &daily[1];
        assert!(close(d2.cumulative_pnl, 12.0));
        assert!(d2.pnl_std.is_nan());
        assert_eq!(d2.classification, Some(SentimentClass::Greed));
    }

    #[test]
    fn sentiment_is_not_forward_filled() {
        let records = vec![
            joined("2024-01-01 09:00:00", Some(20), 1.0),
            joined("2024-01-02 09:00:00", None, 1.0),
        ];
        let daily = daily_aggregates(&records);
        assert_eq!(daily[1].sentiment_score, None);
    }

    #[test]
    fn summary_over_all_trades() {
        let records = sample();
        let daily = daily_aggregates(&records);
        let s = TradingSummary::compute(&records, &daily, &SharpeConvention::default());
        assert_eq!(s.total_trades, 3);
        assert_eq!(s.profitable_trades, 2);
        assert_eq!(s.losing_trades, 1);
        assert!(close(s.win_rate, 2.0 / 3.0));
        assert!(close(s.total_pnl, 12.0));
        assert_eq!(s.trading_days, 2);
        assert!(close(s.max_drawdown, 0.0));

        // Daily pnl [2, 10]: mean 6, sample std sqrt(32).
        let expected = 6.0 / 32f64.sqrt() * 365f64.sqrt();
        assert!(close(s.sharpe_ratio, expected));
    }

    #[test]
    fn risk_free_rate_lowers_sharpe() {
        let daily = [1.0, 2.0, 3.0];
        let base = SharpeConvention::default().annualized(&daily);
        let with_rf = SharpeConvention {
            risk_free_rate: 36.5,
            periods_per_year: 365.0,
        }
        .annualized(&daily);
        assert!(with_rf < base);
        assert!(SharpeConvention::default().annualized(&[1.0]).is_nan());
    }
}
