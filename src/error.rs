use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Coarse error category, enough for a caller to decide how to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Validation,
    RateLimit,
    UpstreamAuth,
    UpstreamUnavailable,
    Timeout,
    NoData,
    Internal,
}

/// Quote acquisition errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteError {
    #[error("A valid stock symbol is required: 1-5 letters (e.g., AAPL, TSLA), got \"{0}\"")]
    InvalidSymbol(String),

    #[error("A valid Finnhub API token is required. Get one at https://finnhub.io")]
    InvalidToken,

    #[error("Only GET requests are supported")]
    MethodNotAllowed,

    #[error("Rate limit exceeded. Retry in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Invalid API token. Please check your Finnhub API key.")]
    Unauthorized,

    #[error("API access forbidden. Check your subscription plan.")]
    Forbidden,

    #[error("API rate limit exceeded. Please wait before making more requests.")]
    UpstreamRateLimited,

    #[error("Quote service temporarily unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Quote API error: HTTP {status}")]
    Upstream { status: u16 },

    #[error("The request to the quote API timed out. Please try again.")]
    Timeout,

    #[error("No price data found for symbol \"{symbol}\". Please check the symbol or try again later.")]
    NoData { symbol: String },

    #[error("Unexpected quote response: {0}")]
    Internal(String),
}

impl QuoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuoteError::InvalidSymbol(_)
            | QuoteError::InvalidToken
            | QuoteError::MethodNotAllowed => ErrorKind::Validation,
            QuoteError::RateLimited { .. } => ErrorKind::RateLimit,
            QuoteError::Unauthorized | QuoteError::Forbidden => ErrorKind::UpstreamAuth,
            QuoteError::UpstreamRateLimited
            | QuoteError::UpstreamUnavailable(_)
            | QuoteError::Upstream { .. } => ErrorKind::UpstreamUnavailable,
            QuoteError::Timeout => ErrorKind::Timeout,
            QuoteError::NoData { .. } => ErrorKind::NoData,
            QuoteError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RateLimit | ErrorKind::UpstreamUnavailable | ErrorKind::Timeout
        )
    }

    /// Short label used as the `error` field of JSON bodies.
    pub fn title(&self) -> &'static str {
        match self {
            QuoteError::InvalidSymbol(_) => "Invalid stock symbol",
            QuoteError::InvalidToken => "Invalid API token",
            QuoteError::MethodNotAllowed => "Method not allowed",
            QuoteError::RateLimited { .. } => "Rate limit exceeded",
            QuoteError::Timeout => "Request timeout",
            QuoteError::UpstreamUnavailable(_) => "Service unavailable",
            QuoteError::NoData { .. } => "No data available",
            QuoteError::Unauthorized
            | QuoteError::Forbidden
            | QuoteError::UpstreamRateLimited
            | QuoteError::Upstream { .. }
            | QuoteError::Internal(_) => "Failed to fetch stock data",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            QuoteError::InvalidSymbol(_) | QuoteError::InvalidToken => StatusCode::BAD_REQUEST,
            QuoteError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            QuoteError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            QuoteError::Timeout => StatusCode::REQUEST_TIMEOUT,
            QuoteError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            QuoteError::NoData { .. } => StatusCode::NOT_FOUND,
            QuoteError::Unauthorized
            | QuoteError::Forbidden
            | QuoteError::UpstreamRateLimited
            | QuoteError::Upstream { .. }
            | QuoteError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Quote(#[from] QuoteError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

fn quote_error_response(err: &QuoteError) -> Response {
    let status = err.status_code();
    let mut body = json!({
        "error": err.title(),
        "message": err.to_string(),
        "kind": err.kind(),
        "retryable": err.is_retryable(),
        "timestamp": chrono::Utc::now().timestamp_millis(),
    });

    match err {
        QuoteError::RateLimited { retry_after_secs } => {
            body["retryAfter"] = json!(retry_after_secs);
        }
        QuoteError::NoData { symbol } => {
            body["symbol"] = json!(symbol);
        }
        QuoteError::MethodNotAllowed => {
            body["allowedMethods"] = json!(["GET", "OPTIONS"]);
        }
        _ => {}
    }

    let mut response = (status, Json(body)).into_response();
    if let QuoteError::RateLimited { retry_after_secs } = err {
        if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    response
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Quote(err) => return quote_error_response(err),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::SerdeJson(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_by_kind() {
        assert!(QuoteError::Timeout.is_retryable());
        assert!(QuoteError::RateLimited { retry_after_secs: 5 }.is_retryable());
        assert!(QuoteError::UpstreamUnavailable("down".into()).is_retryable());
        assert!(QuoteError::UpstreamRateLimited.is_retryable());
        assert!(!QuoteError::Unauthorized.is_retryable());
        assert!(!QuoteError::Forbidden.is_retryable());
        assert!(!QuoteError::InvalidToken.is_retryable());
        assert!(!QuoteError::NoData { symbol: "ZZZZ".into() }.is_retryable());
        assert!(!QuoteError::Internal("bad".into()).is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(QuoteError::InvalidSymbol("1".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(QuoteError::NoData { symbol: "X".into() }.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(QuoteError::Timeout.status_code(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            QuoteError::RateLimited { retry_after_secs: 1 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            QuoteError::UpstreamUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(QuoteError::Forbidden.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_rate_limited_response_has_retry_after() {
        let response =
            AppError::from(QuoteError::RateLimited { retry_after_secs: 42 }).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn test_plain_error_response() {
        let response = AppError::BadRequest("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
