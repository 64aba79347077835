//! Stop-loss and take-profit alerts with one notification per crossing.

use crate::types::{
    Alert, AlertEvent, AlertKind, AlertState, DeliveryOutcome, MetricsSnapshot,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Notification delivery errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no subscribers listening for alerts")]
    NoSubscribers,

    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Side-effect run when an alert fires. Delivery is fire-and-forget.
pub trait Notifier: Send + Sync {
    fn notify(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// Writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        info!("ALERT {}", alert.title());
        Ok(())
    }
}

/// Publishes alerts on a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Alert>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<Alert>) {
        let (tx, rx) = broadcast::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.tx.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        self.tx
            .send(alert.clone())
            .map(|_| ())
            .map_err(|_| NotifyError::NoSubscribers)
    }
}

/// Hysteresis state machine over stop and take-profit thresholds.
///
/// A flag fires on its false-to-true transition only and re-arms as soon as price is
/// back inside the band, so every separate excursion notifies once.
pub struct AlertMonitor {
    state: AlertState,
    notifier: Arc<dyn Notifier>,
}

impl AlertMonitor {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            state: AlertState::default(),
            notifier,
        }
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    /// Re-arm both flags.
    pub fn reset(&mut self) {
        self.state = AlertState::default();
    }

    /// Evaluate a fresh snapshot and return the alerts that fired.
    pub fn observe(&mut self, snapshot: &MetricsSnapshot) -> Vec<AlertEvent> {
        let price = snapshot.current_price;
        if !price.is_finite() {
            return Vec::new();
        }

        let mut events = Vec::new();

        let stop_hit = price <= snapshot.stop_price;
        if stop_hit && !self.state.crossed_stop {
            events.push(self.fire(AlertKind::StopLoss, price, snapshot.stop_price));
        }
        self.state.crossed_stop = stop_hit;

        let tp_hit = price >= snapshot.tp_price;
        if tp_hit && !self.state.crossed_tp {
            events.push(self.fire(AlertKind::TakeProfit, price, snapshot.tp_price));
        }
        self.state.crossed_tp = tp_hit;

        events
    }

    fn fire(&self, kind: AlertKind, price: f64, threshold: f64) -> AlertEvent {
        let alert = Alert {
            kind,
            price,
            threshold,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        let delivery = match self.notifier.notify(&alert) {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(e) => {
                warn!("Alert delivery failed for {}: {}", kind.as_str(), e);
                DeliveryOutcome::Failed(e.to_string())
            }
        };

        AlertEvent { alert, delivery }
    }
}
