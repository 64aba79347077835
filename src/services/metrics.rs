//! Trade economics derived from a [`TradeParameters`] and the current price.
//!
//! Everything here is a pure function. Bad inputs are not rejected; they flow
//! through as NaN or infinity so the caller can show the field as unavailable.

use crate::types::{MetricsSnapshot, TradeParameters};

/// Floor for risk per share, so a stop at the entry price does not divide by zero.
pub const MIN_RISK_PER_SHARE: f64 = 1e-9;

/// Equity below which margin accounts are subject to pattern-day-trading limits.
pub const PDT_EQUITY_THRESHOLD: f64 = 25_000.0;

/// Day trades in the rolling window that flag PDT risk.
pub const PDT_TRADE_LIMIT: u64 = 4;

// `f64::max`/`min` drop NaN operands; these keep them.
fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.min(b)
    }
}

fn pct(rate: f64) -> f64 {
    rate / 100.0
}

/// Compute the full metrics snapshot for `current_price`.
pub fn compute(params: &TradeParameters, current_price: f64) -> MetricsSnapshot {
    let shares = params.shares as f64;
    let entry = params.entry_price;
    let slippage = pct(params.slippage_pct);

    let stop_price = entry * (1.0 - pct(params.stop_rate));
    let tp_price = entry * (1.0 + pct(params.tp_rate));

    // Slippage always works against the trader: pay more in, receive less out.
    let effective_entry = entry * (1.0 + slippage);
    let effective_exit = current_price * (1.0 - slippage);
    let effective_stop = stop_price * (1.0 - slippage);
    let effective_tp = tp_price * (1.0 - slippage);

    let position_cost = shares * effective_entry + params.fees;
    let pl = shares * (effective_exit - effective_entry) - params.fees;
    let roi = if position_cost > 0.0 {
        pl / position_cost * 100.0
    } else {
        f64::NAN
    };

    let pl_stop = shares * (effective_stop - effective_entry) - params.fees;
    let pl_tp = shares * (effective_tp - effective_entry) - params.fees;

    // Per-share ratio, fees excluded.
    let risk_per_share = nan_max(MIN_RISK_PER_SHARE, effective_entry - effective_stop);
    let reward_per_share = nan_max(0.0, effective_tp - effective_entry);
    let rr = reward_per_share / risk_per_share;

    let risk_budget = params.equity * pct(params.risk_pct);
    let rec_by_risk = (risk_budget / risk_per_share).floor();
    let rec_by_buying_power = (params.buying_power / effective_entry).floor();
    let recommended_shares = nan_max(0.0, nan_min(rec_by_risk, rec_by_buying_power));

    let daily_loss_limit = params.equity * pct(params.daily_loss_rate_pct);
    let pdt_risk = params.equity < PDT_EQUITY_THRESHOLD
        && params.margin_mode.is_margin()
        && params.pdt_trade_count >= PDT_TRADE_LIMIT;

    MetricsSnapshot {
        current_price,
        stop_price,
        tp_price,
        effective_entry,
        effective_exit,
        effective_stop,
        effective_tp,
        position_cost,
        pl,
        roi,
        pl_stop,
        pl_tp,
        risk_per_share,
        reward_per_share,
        rr,
        risk_budget,
        rec_by_risk,
        rec_by_buying_power,
        recommended_shares,
        daily_loss_limit,
        pdt_risk,
    }
}
