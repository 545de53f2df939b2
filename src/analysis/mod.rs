pub mod correlation;
pub mod daily;
pub mod merge;
pub mod metrics;
pub mod stats;

pub use correlation::{
    pearson, sentiment_correlations, AlignedSeries, Correlation, DailyMetric, MetricCorrelation,
    RollingCorrelation, RollingPoint,
};
pub use daily::{daily_aggregates, DailyAggregate, SharpeConvention, TradingSummary};
pub use merge::{merge, MergeResult, UnmatchedPolicy};
pub use metrics::{aggregate, AggregateMetric, Bucket, GroupKey};
pub use stats::{DescriptiveStats, RiskMetrics, TTest};
