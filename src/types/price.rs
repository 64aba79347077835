use serde::{Deserialize, Serialize};
use std::fmt;

/// A single accepted price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub price: f64,
}

impl PriceSample {
    /// Samples must carry a finite, strictly positive price.
    pub fn is_valid_price(price: f64) -> bool {
        price.is_finite() && price > 0.0
    }
}

/// Where a feed's prices come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    #[default]
    Simulated,
    Live,
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedMode::Simulated => write!(f, "simulated"),
            FeedMode::Live => write!(f, "live"),
        }
    }
}

/// Move of the current price relative to the previous close.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PriceChange {
    pub amount: f64,
    pub percent: f64,
}

impl PriceChange {
    /// Zero when either side is unusable, so callers never render NaN.
    pub fn between(current: f64, previous_close: f64) -> Self {
        if !current.is_finite() || !previous_close.is_finite() || previous_close <= 0.0 {
            return Self::default();
        }

        let amount = current - previous_close;
        let percent = amount / previous_close * 100.0;

        Self {
            amount: if amount.is_finite() { amount } else { 0.0 },
            percent: if percent.is_finite() { percent } else { 0.0 },
        }
    }
}

/// Snapshot of a price feed's observable state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatus {
    pub mode: FeedMode,
    pub running: bool,
    pub connected: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub symbol: Option<String>,
    pub current_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub change: PriceChange,
    pub last_updated: Option<i64>,
    pub history_len: usize,
}
