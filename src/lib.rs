//! TradeCalc - stock trade risk calculator with a caching quote gateway

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

use axum::http::Method;
use axum::Router;
use config::Config;
use services::{FileKvStore, ParameterStore, PriceFeed, QuoteGateway, TradeSession};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// The server's own trade session and the feed driving it.
#[derive(Clone)]
pub struct MonitorState {
    pub feed: Arc<PriceFeed>,
    pub session: Arc<TradeSession>,
    /// Where parameter updates are persisted, if anywhere.
    pub params: Option<Arc<ParameterStore<FileKvStore>>>,
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gateway: Arc<QuoteGateway>,
    pub monitor: Option<MonitorState>,
}

/// Build the full application with middleware.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .merge(api::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Re-export commonly used types
pub use error::{AppError, QuoteError};
pub use types::*;
