use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account margin mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MarginMode {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "reg-t")]
    RegT,
    #[serde(rename = "portfolio")]
    Portfolio,
}

impl MarginMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarginMode::None => "none",
            MarginMode::RegT => "reg-t",
            MarginMode::Portfolio => "portfolio",
        }
    }

    /// Whether the account trades on margin at all.
    pub fn is_margin(&self) -> bool {
        !matches!(self, MarginMode::None)
    }
}

impl fmt::Display for MarginMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarginMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" => Ok(MarginMode::None),
            "reg-t" => Ok(MarginMode::RegT),
            "portfolio" => Ok(MarginMode::Portfolio),
            other => Err(format!("unknown margin mode: {}", other)),
        }
    }
}

/// User-entered trade plan. Immutable per computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TradeParameters {
    pub shares: u64,
    pub entry_price: f64,
    /// Flat fees per round trip.
    pub fees: f64,
    /// Adverse slippage, percent.
    pub slippage_pct: f64,
    /// Stop distance below entry, percent.
    pub stop_rate: f64,
    /// Take-profit distance above entry, percent.
    pub tp_rate: f64,
    pub equity: f64,
    /// Percent of equity risked per trade.
    pub risk_pct: f64,
    pub buying_power: f64,
    pub daily_loss_rate_pct: f64,
    pub pdt_trade_count: u64,
    pub margin_mode: MarginMode,
}

impl Default for TradeParameters {
    fn default() -> Self {
        Self {
            shares: 100,
            entry_price: 150.0,
            fees: 2.0,
            slippage_pct: 0.05,
            stop_rate: 2.0,
            tp_rate: 4.0,
            equity: 25_000.0,
            risk_pct: 0.5,
            buying_power: 100_000.0,
            daily_loss_rate_pct: 2.0,
            pdt_trade_count: 0,
            margin_mode: MarginMode::None,
        }
    }
}

/// Every number derived from a [`TradeParameters`] and a current price.
///
/// Degenerate inputs show up here as NaN or infinite fields, which serialize as `null`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub current_price: f64,
    pub stop_price: f64,
    pub tp_price: f64,
    pub effective_entry: f64,
    pub effective_exit: f64,
    pub effective_stop: f64,
    pub effective_tp: f64,
    pub position_cost: f64,
    pub pl: f64,
    pub roi: f64,
    pub pl_stop: f64,
    pub pl_tp: f64,
    pub risk_per_share: f64,
    pub reward_per_share: f64,
    pub rr: f64,
    pub risk_budget: f64,
    pub rec_by_risk: f64,
    pub rec_by_buying_power: f64,
    pub recommended_shares: f64,
    pub daily_loss_limit: f64,
    pub pdt_risk: bool,
}
