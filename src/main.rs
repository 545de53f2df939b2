use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use clap::Parser;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use fear_greed_analytics::analysis::{SharpeConvention, UnmatchedPolicy};
use fear_greed_analytics::config::Config;
use fear_greed_analytics::export::{export_report, export_table, ExportFormat};
use fear_greed_analytics::loader::{load_sentiment_path, load_trades_path, LoadOptions};
use fear_greed_analytics::session::{AnalysisSession, SessionOptions};

/// Bitcoin Fear & Greed sentiment against trading performance.
///
/// Every flag falls back to the matching environment variable (or `.env`).
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Fear & Greed index CSV [SENTIMENT_CSV]
    #[arg(short, long)]
    sentiment: Option<String>,

    /// Trade history CSV [TRADES_CSV]
    #[arg(short, long)]
    trades: Option<String>,

    /// Extra grouping: classification, day, week, month, symbol, side [GROUP_BY]
    #[arg(short, long)]
    group_by: Option<String>,

    /// Rolling correlation window in days with data [ROLLING_WINDOW]
    #[arg(short, long)]
    window: Option<usize>,

    /// Look-back period: 1M, 3M, 6M, 1Y or All [PERIOD]
    #[arg(short, long)]
    period: Option<String>,

    /// End date of the period (YYYY-MM-DD), defaults to the latest date in the data
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Keep trades on days without sentiment [KEEP_UNMATCHED]
    #[arg(long)]
    keep_unmatched: bool,

    /// Skip unparseable rows instead of failing [LENIENT]
    #[arg(long)]
    lenient: bool,

    /// IANA zone of naive trade timestamps, e.g. Asia/Kolkata [TRADE_TIMEZONE]
    #[arg(long)]
    timezone: Option<String>,

    /// Directory to export tables to [EXPORT_DIR]
    #[arg(short, long)]
    export_dir: Option<String>,

    /// Export format: csv or json [EXPORT_FORMAT]
    #[arg(short, long)]
    format: Option<String>,
}

impl Args {
    fn apply(self, cfg: &mut Config) -> Option<NaiveDate> {
        if let Some(v) = self.sentiment {
            cfg.sentiment_csv = v;
        }
        if let Some(v) = self.trades {
            cfg.trades_csv = v;
        }
        if let Some(v) = self.group_by {
            cfg.group_by = v;
        }
        if let Some(v) = self.window {
            cfg.rolling_window = v;
        }
        if let Some(v) = self.period {
            cfg.period = v;
        }
        if let Some(v) = self.timezone {
            cfg.trade_timezone = v;
        }
        if let Some(v) = self.export_dir {
            cfg.export_dir = v;
        }
        if let Some(v) = self.format {
            cfg.export_format = v;
        }
        cfg.keep_unmatched |= self.keep_unmatched;
        cfg.lenient |= self.lenient;
        self.as_of
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut cfg = Config::from_env();
    let as_of = args.apply(&mut cfg);

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    run(&cfg, as_of)
}

fn run(cfg: &Config, as_of: Option<NaiveDate>) -> Result<()> {
    let timezone = match cfg.trade_timezone.trim() {
        "" => None,
        name => Some(
            name.parse::<Tz>()
                .map_err(|e| anyhow!("invalid timezone '{}': {}", name, e))?,
        ),
    };
    let load = LoadOptions {
        lenient: cfg.lenient,
        timezone,
    };

    let sentiment = load_sentiment_path(&cfg.sentiment_csv, &load)
        .with_context(|| format!("Failed to load sentiment data from {}", cfg.sentiment_csv))?;
    let trades = load_trades_path(&cfg.trades_csv, &load)
        .with_context(|| format!("Failed to load trades from {}", cfg.trades_csv))?;

    let options = SessionOptions {
        policy: if cfg.keep_unmatched {
            UnmatchedPolicy::Keep
        } else {
            UnmatchedPolicy::Drop
        },
        period: cfg.period.parse()?,
        reference_date: as_of,
        rolling_window: cfg.rolling_window,
        group_by: cfg.group_by.parse()?,
        sharpe: SharpeConvention {
            risk_free_rate: cfg.risk_free_rate,
            periods_per_year: cfg.annualization_days,
        },
    };

    let mut session = AnalysisSession::new(sentiment, trades, options)?;
    let report = session.run();
    report.print_summary();

    if !cfg.export_dir.is_empty() {
        let format: ExportFormat = cfg.export_format.parse()?;
        let dir = Path::new(&cfg.export_dir);
        let mut files = export_report(dir, &report, format)
            .with_context(|| format!("Failed to export report to {}", cfg.export_dir))?;
        files.push(export_table(dir, "joined_trades", session.records(), format)?);

        println!("\nExported {} files to: {}", files.len(), dir.display());
        info!("Export complete ({})", format);
    }

    Ok(())
}
