pub mod analysis;
pub mod config;
pub mod error;
pub mod export;
pub mod loader;
pub mod models;
pub mod report;
pub mod session;
#[cfg(test)]
pub mod test_helpers;

pub use error::{AnalyticsError, Result};
