//! Quote payloads as cached and served by the quote gateway.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upstream fields that carry numbers and get sanitized.
pub const NUMERIC_FIELDS: &[&str] = &["c", "h", "l", "o", "pc", "d", "dp"];

/// Sanitized upstream quote plus the metadata added by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotePayload {
    /// Current price
    #[serde(rename = "c", default)]
    pub current: Option<f64>,
    /// High price of the day
    #[serde(rename = "h", default)]
    pub high: Option<f64>,
    /// Low price of the day
    #[serde(rename = "l", default)]
    pub low: Option<f64>,
    /// Open price of the day
    #[serde(rename = "o", default)]
    pub open: Option<f64>,
    /// Previous close price
    #[serde(rename = "pc", default)]
    pub previous_close: Option<f64>,
    /// Change
    #[serde(rename = "d", default)]
    pub change: Option<f64>,
    /// Percent change
    #[serde(rename = "dp", default)]
    pub change_percent: Option<f64>,
    pub symbol: String,
    /// Milliseconds since the Unix epoch when the gateway fetched it.
    pub timestamp: i64,
    pub source: String,
    /// Upstream fields the gateway passes through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Whether a payload came out of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_header(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Successful gateway result.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteOutcome {
    Found {
        payload: QuotePayload,
        cache: CacheStatus,
        /// Seconds a client may reuse the payload.
        max_age_secs: u64,
    },
    /// The symbol is well formed but upstream has no price for it.
    NoData { symbol: String },
}

/// Feed-facing view of a quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub current: f64,
    pub previous_close: f64,
    pub change: f64,
    pub change_percent: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub timestamp: i64,
}

fn nonzero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

impl Quote {
    /// Build from a payload. `None` when neither current nor previous close is usable.
    pub fn from_payload(payload: &QuotePayload) -> Option<Self> {
        let current = nonzero(payload.current).or(nonzero(payload.previous_close))?;
        let previous_close = nonzero(payload.previous_close).unwrap_or(current);

        Some(Self {
            current,
            previous_close,
            change: payload.change.unwrap_or(0.0),
            change_percent: payload.change_percent.unwrap_or(0.0),
            high: payload.high.unwrap_or(0.0),
            low: payload.low.unwrap_or(0.0),
            open: payload.open.unwrap_or(0.0),
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }
}
