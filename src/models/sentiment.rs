use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// Inclusive upper bounds of each class; the table is symmetric around 50.
const EXTREME_FEAR_MAX: u8 = 19;
const FEAR_MAX: u8 = 39;
const NEUTRAL_MAX: u8 = 60;
const GREED_MAX: u8 = 80;

pub const MAX_SCORE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SentimentClass {
    #[serde(rename = "Extreme Fear")]
    ExtremeFear,
    Fear,
    Neutral,
    Greed,
    #[serde(rename = "Extreme Greed")]
    ExtremeGreed,
}

impl SentimentClass {
    pub const ALL: [SentimentClass; 5] = [
        SentimentClass::ExtremeFear,
        SentimentClass::Fear,
        SentimentClass::Neutral,
        SentimentClass::Greed,
        SentimentClass::ExtremeGreed,
    ];

    /// Classifies a 0–100 index value. Values above 100 saturate to ExtremeGreed.
    pub fn from_score(score: u8) -> Self {
        if score <= EXTREME_FEAR_MAX {
            SentimentClass::ExtremeFear
        } else if score <= FEAR_MAX {
            SentimentClass::Fear
        } else if score <= NEUTRAL_MAX {
            SentimentClass::Neutral
        } else if score <= GREED_MAX {
            SentimentClass::Greed
        } else {
            SentimentClass::ExtremeGreed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentClass::ExtremeFear => "Extreme Fear",
            SentimentClass::Fear => "Fear",
            SentimentClass::Neutral => "Neutral",
            SentimentClass::Greed => "Greed",
            SentimentClass::ExtremeGreed => "Extreme Greed",
        }
    }

    /// Accepts "Extreme Fear", "extreme_fear", "ExtremeFear", "EXTREME-FEAR", ...
    pub fn from_str_loose(s: &str) -> Option<SentimentClass> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "extremefear" => Some(SentimentClass::ExtremeFear),
            "fear" => Some(SentimentClass::Fear),
            "neutral" => Some(SentimentClass::Neutral),
            "greed" => Some(SentimentClass::Greed),
            "extremegreed" => Some(SentimentClass::ExtremeGreed),
            _ => None,
        }
    }

    /// 1 (Extreme Fear) through 5 (Extreme Greed).
    pub fn ordinal(&self) -> u8 {
        match self {
            SentimentClass::ExtremeFear => 1,
            SentimentClass::Fear => 2,
            SentimentClass::Neutral => 3,
            SentimentClass::Greed => 4,
            SentimentClass::ExtremeGreed => 5,
        }
    }
}

impl fmt::Display for SentimentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One day of the Fear & Greed index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SentimentRecord {
    pub date: NaiveDate,
    pub classification: SentimentClass,
    pub score: u8,
}

impl SentimentRecord {
    /// Builds a record whose class is derived from the score, so the two never disagree.
    /// Returns `None` for a score above 100.
    pub fn new(date: NaiveDate, score: u8) -> Option<Self> {
        if score > MAX_SCORE {
            return None;
        }
        Some(Self {
            date,
            classification: SentimentClass::from_score(score),
            score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_at_each_boundary() {
        assert_eq!(SentimentClass::from_score(0), SentimentClass::ExtremeFear);
        assert_eq!(SentimentClass::from_score(19), SentimentClass::ExtremeFear);
        assert_eq!(SentimentClass::from_score(20), SentimentClass::Fear);
        assert_eq!(SentimentClass::from_score(39), SentimentClass::Fear);
        assert_eq!(SentimentClass::from_score(40), SentimentClass::Neutral);
        assert_eq!(SentimentClass::from_score(60), SentimentClass::Neutral);
        assert_eq!(SentimentClass::from_score(61), SentimentClass::Greed);
        assert_eq!(SentimentClass::from_score(80), SentimentClass::Greed);
        assert_eq!(SentimentClass::from_score(81), SentimentClass::ExtremeGreed);
        assert_eq!(SentimentClass::from_score(100), SentimentClass::ExtremeGreed);
    }

    #[test]
    fn classification_is_monotonic_in_score() {
        let mut prev = SentimentClass::from_score(0);
        for s in 1..=MAX_SCORE {
            let c = SentimentClass::from_score(s);
            assert!(c >= prev, "score {} went from {} to {}", s, prev, c);
            prev = c;
        }
    }

    #[test]
    fn thresholds_are_symmetric() {
        for s in 0..=MAX_SCORE {
            let low = SentimentClass::from_score(s).ordinal();
            let high = SentimentClass::from_score(MAX_SCORE - s).ordinal();
            assert_eq!(low + high, 6, "score {}", s);
        }
    }

    #[test]
    fn loose_label_parsing() {
        assert_eq!(
            SentimentClass::from_str_loose("Extreme Fear"),
            Some(SentimentClass::ExtremeFear)
        );
        assert_eq!(
            SentimentClass::from_str_loose("extreme_greed"),
            Some(SentimentClass::ExtremeGreed)
        );
        assert_eq!(SentimentClass::from_str_loose(" GREED "), Some(SentimentClass::Greed));
        assert_eq!(SentimentClass::from_str_loose("panic"), None);
    }

    #[test]
    fn record_derives_class() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let r = SentimentRecord::new(d, 20).unwrap();
        assert_eq!(r.classification, SentimentClass::Fear);
        assert_eq!(SentimentRecord::new(d, MAX_SCORE).unwrap().score, 100);
    }

    #[test]
    fn score_above_range_is_rejected() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(SentimentRecord::new(d, 101).is_none());
        assert!(SentimentRecord::new(d, u8::MAX).is_none());
    }
}
