pub mod health;
pub mod metrics;
pub mod monitor;
pub mod quote;

use crate::AppState;
use axum::Router;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(quote::router())
        .merge(metrics::router())
        .nest("/api/monitor", monitor::router())
}
