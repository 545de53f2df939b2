use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("{source_name}: line {line}, column '{column}': {message}")]
    Parse {
        source_name: String,
        line: u64,
        column: String,
        message: String,
    },

    #[error("{source_name}: missing required column '{column}'")]
    MissingColumn { source_name: String, column: String },

    #[error("{source_name}: no usable rows")]
    EmptyDataset { source_name: String },

    #[error("insufficient data: need at least {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("series length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("invalid parameter {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },

    #[error("unsupported export format '{0}', use 'csv' or 'json'")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalyticsError {
    pub fn parse(
        source_name: &str,
        line: u64,
        column: &str,
        message: impl Into<String>,
    ) -> Self {
        AnalyticsError::Parse {
            source_name: source_name.to_string(),
            line,
            column: column.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
