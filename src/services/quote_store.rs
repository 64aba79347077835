//! Process-lifetime state behind the quote gateway.
//!
//! Created once at startup and handed to [`QuoteGateway`](super::QuoteGateway). Nothing
//! here is persisted; a restart starts with an empty cache and empty rate windows.
//! Each process keeps its own store, so several instances behind a load balancer do
//! not share limits or cached quotes.

use super::cache::Cache;
use super::rate_limiter::RateLimiter;
use crate::types::QuotePayload;
use sha2::{Digest, Sha256};
use std::time::Duration;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_REQUESTS: usize = 60;

/// Hex characters of the credential digest kept in cache keys.
const CREDENTIAL_FINGERPRINT_LEN: usize = 16;

/// Quote cache plus per-client rate windows.
pub struct QuoteStore {
    pub cache: Cache<QuotePayload>,
    pub rate_limiter: RateLimiter,
}

impl QuoteStore {
    pub fn new(cache_ttl: Duration, rate_window: Duration, max_requests: usize) -> Self {
        Self {
            cache: Cache::new(cache_ttl),
            rate_limiter: RateLimiter::new(rate_window, max_requests),
        }
    }

    /// Cache key for a normalized symbol and a credential.
    ///
    /// Only a truncated SHA-256 digest of the credential ends up in the key.
    pub fn cache_key(symbol: &str, credential: &str) -> String {
        let digest = hex::encode(Sha256::digest(credential.as_bytes()));
        format!("{}_{}", symbol, &digest[..CREDENTIAL_FINGERPRINT_LEN])
    }
}

impl Default for QuoteStore {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL, DEFAULT_RATE_WINDOW, DEFAULT_MAX_REQUESTS)
    }
}
