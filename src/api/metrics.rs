//! Stateless metrics calculation over HTTP.

use crate::services::metrics;
use crate::types::{MetricsSnapshot, TradeParameters};
use crate::AppState;
use axum::{routing::post, Json, Router};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct MetricsRequest {
    #[serde(default)]
    pub params: TradeParameters,
    /// Missing price computes the price-independent fields only.
    pub price: Option<f64>,
}

/// POST /api/metrics
async fn compute_metrics(Json(request): Json<MetricsRequest>) -> Json<MetricsSnapshot> {
    let price = request.price.unwrap_or(f64::NAN);
    Json(metrics::compute(&request.params, price))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/metrics", post(compute_metrics))
}
