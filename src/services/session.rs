//! Wiring of price feed, metrics engine and alert monitor for one trade plan.
//!
//! The session subscribes to a [`PriceFeed`] and, inside the feed's callback, recomputes
//! the snapshot and runs the alert monitor. Everything for one sample happens under
//! one lock, so readers never see a snapshot that the monitor has not evaluated.

use super::alert_monitor::{AlertMonitor, Notifier};
use super::metrics;
use super::price_feed::PriceFeed;
use crate::types::{AlertEvent, AlertState, MetricsSnapshot, TradeParameters};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Fired alerts kept for inspection.
const RECENT_ALERTS: usize = 50;

struct SessionInner {
    params: TradeParameters,
    last_price: f64,
    snapshot: MetricsSnapshot,
    monitor: AlertMonitor,
    recent_alerts: VecDeque<AlertEvent>,
}

impl SessionInner {
    fn recompute(&mut self) -> Vec<AlertEvent> {
        self.snapshot = metrics::compute(&self.params, self.last_price);
        let events = self.monitor.observe(&self.snapshot);
        for event in &events {
            self.recent_alerts.push_back(event.clone());
            if self.recent_alerts.len() > RECENT_ALERTS {
                self.recent_alerts.pop_front();
            }
        }
        events
    }
}

/// Live trade plan: parameters, latest snapshot and alert state.
pub struct TradeSession {
    inner: Mutex<SessionInner>,
}

impl TradeSession {
    /// Create a session. Until the first price arrives the snapshot is computed
    /// against NaN, so price-dependent fields read as unavailable.
    pub fn new(params: TradeParameters, notifier: Arc<dyn Notifier>) -> Arc<Self> {
        let snapshot = metrics::compute(&params, f64::NAN);
        Arc::new(Self {
            inner: Mutex::new(SessionInner {
                params,
                last_price: f64::NAN,
                snapshot,
                monitor: AlertMonitor::new(notifier),
                recent_alerts: VecDeque::new(),
            }),
        })
    }

    /// Subscribe to `feed` so every accepted sample updates this session.
    pub fn attach(self: &Arc<Self>, feed: &PriceFeed) {
        let session = Arc::clone(self);
        feed.on_sample(move |sample| {
            session.on_price(sample.price);
        });
    }

    /// Recompute for a new price and evaluate alerts.
    pub fn on_price(&self, price: f64) -> Vec<AlertEvent> {
        let mut inner = self.inner.lock();
        inner.last_price = price;
        let events = inner.recompute();
        debug!(
            "Price {:.4}: P/L {:.2}, {} alert(s)",
            price,
            inner.snapshot.pl,
            events.len()
        );
        events
    }

    /// Replace the trade plan and recompute against the last known price.
    pub fn update_parameters(&self, params: TradeParameters) -> MetricsSnapshot {
        let mut inner = self.inner.lock();
        inner.params = params;
        inner.recompute();
        inner.snapshot.clone()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().snapshot.clone()
    }

    pub fn parameters(&self) -> TradeParameters {
        self.inner.lock().params.clone()
    }

    pub fn alert_state(&self) -> AlertState {
        self.inner.lock().monitor.state()
    }

    /// Most recent fired alerts, oldest first.
    pub fn recent_alerts(&self) -> Vec<AlertEvent> {
        self.inner.lock().recent_alerts.iter().cloned().collect()
    }
}
