pub mod joined;
pub mod sentiment;
pub mod trade;

pub use joined::JoinedRecord;
pub use sentiment::{SentimentClass, SentimentRecord};
pub use trade::{Side, TradeRecord};
