//! Client for a remote `/api/quote` proxy, usable as a live feed provider.

use crate::error::QuoteError;
use crate::services::price_feed::QuoteProvider;
use crate::types::{Quote, QuotePayload};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Slightly above the proxy's own upstream timeout so its 408 arrives first.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(12);
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Map a proxy error response back onto the error taxonomy.
pub fn error_from_response(status: u16, body: &Value, symbol: &str) -> QuoteError {
    let error = body.get("error").and_then(Value::as_str).unwrap_or_default();
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or(error)
        .to_string();

    match status {
        400 if error.contains("token") => QuoteError::InvalidToken,
        400 => QuoteError::InvalidSymbol(symbol.to_string()),
        404 => QuoteError::NoData {
            symbol: body
                .get("symbol")
                .and_then(Value::as_str)
                .unwrap_or(symbol)
                .to_string(),
        },
        405 => QuoteError::MethodNotAllowed,
        408 => QuoteError::Timeout,
        429 => QuoteError::RateLimited {
            retry_after_secs: body
                .get("retryAfter")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        503 => QuoteError::UpstreamUnavailable(message),
        _ if message.is_empty() => QuoteError::Internal(format!("HTTP {}", status)),
        _ => QuoteError::Internal(message),
    }
}

/// HTTP client for a quote proxy.
pub struct ProxyClient {
    client: Client,
    base_url: String,
}

impl ProxyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn quote_url(&self) -> String {
        format!("{}/api/quote", self.base_url)
    }
}

#[async_trait]
impl QuoteProvider for ProxyClient {
    async fn quote(&self, symbol: &str, credential: &str) -> Result<Quote, QuoteError> {
        debug!("GET {} symbol={}", self.quote_url(), symbol);

        let response = self
            .client
            .get(self.quote_url())
            .query(&[("symbol", symbol), ("token", credential)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QuoteError::Timeout
                } else {
                    QuoteError::UpstreamUnavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            return Err(error_from_response(status.as_u16(), &body, symbol));
        }

        let payload = response
            .json::<QuotePayload>()
            .await
            .map_err(|e| QuoteError::Internal(format!("Invalid symbol or API response: {}", e)))?;

        Quote::from_payload(&payload).ok_or(QuoteError::NoData {
            symbol: symbol.to_string(),
        })
    }
}
