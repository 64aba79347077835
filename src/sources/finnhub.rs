//! Finnhub API client for stock quotes.
//!
//! Only the quote endpoint is used. The caller's token is sent as a header so it
//! never appears in request URLs or access logs.

use super::{QuoteSource, SourceError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

pub const FINNHUB_URL: &str = "https://finnhub.io/api/v1";
const USER_AGENT: &str = "TradeCalc/2.0 (Stock Calculator)";
const TOKEN_HEADER: &str = "X-Finnhub-Token";

/// Finnhub API client.
pub struct FinnhubClient {
    client: Client,
    base_url: String,
}

impl FinnhubClient {
    /// Create a client against the public Finnhub API.
    pub fn new() -> Self {
        Self::with_base_url(FINNHUB_URL)
    }

    /// Create a client against another base URL (self-hosted mirror, test server).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn quote_url(&self) -> String {
        format!("{}/quote", self.base_url)
    }
}

impl Default for FinnhubClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteSource for FinnhubClient {
    fn name(&self) -> &str {
        "finnhub"
    }

    async fn fetch(&self, symbol: &str, credential: &str) -> Result<Value, SourceError> {
        debug!("GET {} symbol={}", self.quote_url(), symbol);

        let response = self
            .client
            .get(self.quote_url())
            .query(&[("symbol", symbol)])
            .header(TOKEN_HEADER, credential)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SourceError::Body(format!("Invalid response format from Finnhub API: {}", e)))
    }
}
