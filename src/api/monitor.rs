//! Built-in trade session: status, parameters and price history.

use crate::error::{AppError, Result};
use crate::types::{AlertEvent, AlertState, FeedStatus, MetricsSnapshot, PriceSample, TradeParameters};
use crate::{AppState, MonitorState};
use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorResponse {
    pub feed: FeedStatus,
    pub snapshot: MetricsSnapshot,
    pub alert_state: AlertState,
    pub parameters: TradeParameters,
    pub recent_alerts: Vec<AlertEvent>,
}

fn monitor(state: &AppState) -> Result<&MonitorState> {
    state
        .monitor
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Trade monitor is disabled".to_string()))
}

/// GET /api/monitor
async fn get_monitor(State(state): State<AppState>) -> Result<Json<MonitorResponse>> {
    let monitor = monitor(&state)?;
    Ok(Json(MonitorResponse {
        feed: monitor.feed.status(),
        snapshot: monitor.session.snapshot(),
        alert_state: monitor.session.alert_state(),
        parameters: monitor.session.parameters(),
        recent_alerts: monitor.session.recent_alerts(),
    }))
}

/// PUT /api/monitor/params
async fn update_params(
    State(state): State<AppState>,
    Json(params): Json<TradeParameters>,
) -> Result<Json<MetricsSnapshot>> {
    let monitor = monitor(&state)?;

    if let Some(store) = &monitor.params {
        // The session still takes the new plan when persisting fails.
        if let Err(e) = store.save(&params) {
            warn!("Failed to persist trade parameters: {}", e);
        }
    }

    let snapshot = monitor.session.update_parameters(params);
    info!("Trade parameters updated");
    Ok(Json(snapshot))
}

/// GET /api/monitor/history
async fn get_history(State(state): State<AppState>) -> Result<Json<Vec<PriceSample>>> {
    Ok(Json(monitor(&state)?.feed.history()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_monitor))
        .route("/params", put(update_params))
        .route("/history", get(get_history))
}
