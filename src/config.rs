use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Inputs
    pub sentiment_csv: String,
    pub trades_csv: String,
    pub lenient: bool,
    /// IANA zone for naive trade timestamps, empty for auto.
    pub trade_timezone: String,

    // Analysis
    pub rolling_window: usize,
    pub group_by: String,
    pub period: String,
    pub keep_unmatched: bool,
    pub risk_free_rate: f64,
    pub annualization_days: f64,

    // Output
    pub export_dir: String,
    pub export_format: String,

    // Logging
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };
        let flag = |key: &str| -> bool {
            matches!(env(key, "false").to_lowercase().as_str(), "true" | "1" | "yes")
        };

        Config {
            sentiment_csv: env("SENTIMENT_CSV", "data/fear_greed_index.csv"),
            trades_csv: env("TRADES_CSV", "data/historical_data.csv"),
            lenient: flag("LENIENT"),
            trade_timezone: env("TRADE_TIMEZONE", ""),
            rolling_window: env("ROLLING_WINDOW", "30").parse().unwrap_or(30),
            group_by: env("GROUP_BY", "classification"),
            period: env("PERIOD", "All"),
            keep_unmatched: flag("KEEP_UNMATCHED"),
            risk_free_rate: env("RISK_FREE_RATE", "0").parse().unwrap_or(0.0),
            annualization_days: env("ANNUALIZATION_DAYS", "365").parse().unwrap_or(365.0),
            export_dir: env("EXPORT_DIR", ""),
            export_format: env("EXPORT_FORMAT", "csv"),
            log_level: env("LOG_LEVEL", "info"),
        }
    }
}
