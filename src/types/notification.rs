//! Alert notification types.

use serde::{Deserialize, Serialize};

/// Threshold an alert refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertKind {
    StopLoss,
    TakeProfit,
}

impl AlertKind {
    pub fn as_str(&self) -> &str {
        match self {
            AlertKind::StopLoss => "stopLoss",
            AlertKind::TakeProfit => "takeProfit",
        }
    }
}

/// A threshold crossing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub kind: AlertKind,
    /// Price that crossed the threshold
    pub price: f64,
    /// Stop or take-profit price at the time of crossing
    pub threshold: f64,
    /// Timestamp in milliseconds
    pub timestamp: i64,
}

impl Alert {
    /// Short human-readable title.
    pub fn title(&self) -> String {
        match self.kind {
            AlertKind::StopLoss => format!(
                "Stop hit: {:.2} at or below stop {:.2}",
                self.price, self.threshold
            ),
            AlertKind::TakeProfit => format!(
                "Take-profit hit: {:.2} at or above target {:.2}",
                self.price, self.threshold
            ),
        }
    }
}

/// What happened when an alert was handed to its notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "reason")]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
}

/// A fired alert together with its delivery result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub alert: Alert,
    pub delivery: DeliveryOutcome,
}

/// One-shot flags, `true` while price sits beyond the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertState {
    pub crossed_stop: bool,
    pub crossed_tp: bool,
}
