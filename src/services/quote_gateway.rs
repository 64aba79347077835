//! Rate-limited, cached access to an upstream quote source.

use super::price_feed::QuoteProvider;
use super::quote_store::QuoteStore;
use crate::error::QuoteError;
use crate::sources::{QuoteSource, SourceError};
use crate::types::{CacheStatus, Quote, QuoteOutcome, QuotePayload, NUMERIC_FIELDS};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Log label for in-process polls, which bypass the rate limiter.
const IN_PROCESS_CLIENT: &str = "in-process";

const MAX_SYMBOL_LEN: usize = 5;

/// Trim and upper-case a symbol, then require 1-5 ASCII letters.
pub fn normalize_symbol(raw: &str) -> Result<String, QuoteError> {
    let symbol = raw.trim().to_uppercase();
    let valid = (1..=MAX_SYMBOL_LEN).contains(&symbol.len())
        && symbol.chars().all(|c| c.is_ascii_uppercase());

    if valid {
        Ok(symbol)
    } else {
        Err(QuoteError::InvalidSymbol(raw.trim().to_string()))
    }
}

/// Numeric view of a JSON value; anything non-finite or unparsable is `None`.
fn sanitize_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn has_price(value: Option<f64>) -> bool {
    matches!(value, Some(v) if v != 0.0)
}

/// Validate and sanitize an upstream body.
///
/// `Ok(None)` means the symbol has no data: both current and previous close are
/// missing or zero. A zero price is treated as missing even though upstream could in
/// principle report one.
pub fn sanitize_quote(
    body: Value,
    symbol: &str,
    source: &str,
    timestamp: i64,
) -> Result<Option<QuotePayload>, QuoteError> {
    let Value::Object(mut fields) = body else {
        return Err(QuoteError::Internal(
            "Invalid response format from quote API".to_string(),
        ));
    };

    let mut numeric = [None; 7];
    for (slot, name) in numeric.iter_mut().zip(NUMERIC_FIELDS) {
        *slot = fields.remove(*name).as_ref().and_then(sanitize_number);
    }
    let [current, high, low, open, previous_close, change, change_percent] = numeric;

    if !has_price(current) && !has_price(previous_close) {
        return Ok(None);
    }

    for reserved in ["symbol", "timestamp", "source"] {
        fields.remove(reserved);
    }

    Ok(Some(QuotePayload {
        current,
        high,
        low,
        open,
        previous_close,
        change,
        change_percent,
        symbol: symbol.to_string(),
        timestamp,
        source: source.to_string(),
        extra: fields,
    }))
}

fn translate_source_error(err: SourceError) -> QuoteError {
    match err {
        SourceError::Status(401) => QuoteError::Unauthorized,
        SourceError::Status(403) => QuoteError::Forbidden,
        SourceError::Status(429) => QuoteError::UpstreamRateLimited,
        SourceError::Status(status) if status >= 500 => {
            QuoteError::UpstreamUnavailable(format!("upstream returned HTTP {}", status))
        }
        SourceError::Status(status) => QuoteError::Upstream { status },
        SourceError::Transport(msg) => QuoteError::UpstreamUnavailable(msg),
        SourceError::Body(msg) => QuoteError::Internal(msg),
    }
}

/// Partial client id for logs.
fn redact_client(client_id: &str) -> String {
    let prefix: String = client_id.chars().take(10).collect();
    format!("{}...", prefix)
}

/// Quote gateway: validation, rate limiting, caching, upstream translation.
pub struct QuoteGateway {
    source: Arc<dyn QuoteSource>,
    store: Arc<QuoteStore>,
    timeout: Duration,
}

impl QuoteGateway {
    /// Create a gateway over `source`, keeping its state in `store`.
    pub fn new(source: Arc<dyn QuoteSource>, store: Arc<QuoteStore>) -> Self {
        Self {
            source,
            store,
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    /// Override the upstream timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<QuoteStore> {
        &self.store
    }

    /// Fetch one quote for `symbol`, counted against `client_id`'s rate window.
    pub async fn fetch_quote(
        &self,
        symbol: &str,
        credential: &str,
        client_id: &str,
    ) -> Result<QuoteOutcome, QuoteError> {
        if let Err(retry_after) = self.store.rate_limiter.check(client_id) {
            let retry_after_secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            debug!(
                "Rate limited client {} (retry in {}s)",
                redact_client(client_id),
                retry_after_secs
            );
            return Err(QuoteError::RateLimited { retry_after_secs });
        }

        self.fetch_unmetered(symbol, credential, client_id).await
    }

    /// Everything after the rate limit: validation, cache and upstream.
    async fn fetch_unmetered(
        &self,
        symbol: &str,
        credential: &str,
        client_id: &str,
    ) -> Result<QuoteOutcome, QuoteError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(QuoteError::InvalidToken);
        }

        let symbol = normalize_symbol(symbol)?;
        let cache_key = QuoteStore::cache_key(&symbol, credential);

        if let Some(cached) = self.store.cache.get(&cache_key) {
            debug!("Quote cache hit for {}", symbol);
            return Ok(QuoteOutcome::Found {
                payload: cached.value,
                cache: CacheStatus::Hit,
                max_age_secs: self.store.cache.remaining_secs(cached.age),
            });
        }

        debug!("Quote cache miss for {}, fetching from {}", symbol, self.source.name());
        let body = match tokio::time::timeout(self.timeout, self.source.fetch(&symbol, credential))
            .await
        {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                let err = translate_source_error(e);
                warn!(
                    "Quote fetch for {} failed (client {}): {}",
                    symbol,
                    redact_client(client_id),
                    err
                );
                return Err(err);
            }
            Err(_) => {
                warn!(
                    "Quote fetch for {} timed out after {:?} (client {})",
                    symbol,
                    self.timeout,
                    redact_client(client_id)
                );
                return Err(QuoteError::Timeout);
            }
        };

        let timestamp = chrono::Utc::now().timestamp_millis();
        let Some(payload) = sanitize_quote(body, &symbol, self.source.name(), timestamp)? else {
            debug!("No price data for {}", symbol);
            return Ok(QuoteOutcome::NoData { symbol });
        };

        self.store.cache.insert(cache_key, payload.clone());

        Ok(QuoteOutcome::Found {
            payload,
            cache: CacheStatus::Miss,
            max_age_secs: self.store.cache.ttl().as_secs(),
        })
    }
}

#[async_trait]
impl QuoteProvider for QuoteGateway {
    async fn quote(&self, symbol: &str, credential: &str) -> Result<Quote, QuoteError> {
        // The server's own feed is not a network caller and never shares a window with one.
        match self.fetch_unmetered(symbol, credential, IN_PROCESS_CLIENT).await? {
            QuoteOutcome::Found { payload, .. } => {
                Quote::from_payload(&payload).ok_or(QuoteError::NoData {
                    symbol: payload.symbol,
                })
            }
            QuoteOutcome::NoData { symbol } => Err(QuoteError::NoData { symbol }),
        }
    }
}
