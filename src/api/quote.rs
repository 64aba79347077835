//! `/api/quote`: the public face of the quote gateway.

use crate::error::{QuoteError, Result};
use crate::types::QuoteOutcome;
use crate::AppState;
use axum::{
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;

pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache-status");
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub symbol: Option<String>,
    pub token: Option<String>,
}

/// Rate-limit identity of the caller: first forwarded address, else the peer
/// address. Forwarded headers are caller-controlled, so this is not authentication.
pub fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// GET /api/quote?symbol=AAPL&token=...
async fn get_quote(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<QuoteQuery>,
) -> Result<Response> {
    let client = client_id(&headers, peer.map(|ConnectInfo(addr)| addr));
    let outcome = state
        .gateway
        .fetch_quote(
            query.symbol.as_deref().unwrap_or_default(),
            query.token.as_deref().unwrap_or_default(),
            &client,
        )
        .await?;

    match outcome {
        QuoteOutcome::Found {
            payload,
            cache,
            max_age_secs,
        } => {
            let mut response = Json(payload).into_response();
            let headers = response.headers_mut();
            headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static(cache.as_header()));
            if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", max_age_secs)) {
                headers.insert(header::CACHE_CONTROL, value);
            }
            Ok(response)
        }
        QuoteOutcome::NoData { symbol } => Err(QuoteError::NoData { symbol }.into()),
    }
}

/// OPTIONS /api/quote
async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> Response {
    crate::error::AppError::from(QuoteError::MethodNotAllowed).into_response()
}

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/quote",
        get(get_quote)
            .options(preflight)
            .fallback(method_not_allowed),
    )
}
