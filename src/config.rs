use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::price_feed::{DEFAULT_BASE_PRICE, DEFAULT_HISTORY_LIMIT};
use crate::sources::finnhub::FINNHUB_URL;

/// Which price feed, if any, the server runs for its built-in trade session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    /// No session; the server only proxies quotes.
    Off,
    /// Simulated random-walk prices.
    Demo,
    /// Live quotes through the server's own gateway.
    Live,
}

impl FromStr for MonitorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" | "none" | "" => Ok(MonitorMode::Off),
            "demo" | "simulated" => Ok(MonitorMode::Demo),
            "live" => Ok(MonitorMode::Live),
            other => Err(format!("unknown monitor mode: {}", other)),
        }
    }
}

/// Built-in trade session configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub mode: MonitorMode,
    /// Symbol polled in live mode.
    pub symbol: String,
    /// Starting price in demo mode.
    pub base_price: f64,
    /// Tick interval in milliseconds.
    pub tick_ms: u64,
    /// Maximum retained price samples.
    pub history_limit: usize,
    /// JSON file holding persisted trade parameters.
    pub params_file: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            mode: MonitorMode::Demo,
            symbol: "AAPL".to_string(),
            base_price: DEFAULT_BASE_PRICE,
            tick_ms: 3_000,
            history_limit: DEFAULT_HISTORY_LIMIT,
            params_file: None,
        }
    }
}

impl MonitorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Finnhub API base URL.
    pub finnhub_base_url: String,
    /// Finnhub API key for the built-in live session (proxy callers bring their own).
    pub finnhub_api_key: Option<String>,
    /// Quote cache TTL (seconds).
    pub cache_ttl_secs: u64,
    /// Rate limit window (seconds).
    pub rate_limit_window_secs: u64,
    /// Requests allowed per client per window.
    pub rate_limit_max_requests: usize,
    /// Upstream request timeout (seconds).
    pub upstream_timeout_secs: u64,
    /// Built-in trade session.
    pub monitor: MonitorConfig,
}

fn parsed<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = MonitorConfig::default();

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parsed("PORT").unwrap_or(3001),
            finnhub_base_url: env::var("FINNHUB_BASE_URL")
                .unwrap_or_else(|_| FINNHUB_URL.to_string()),
            finnhub_api_key: env::var("FINNHUB_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            cache_ttl_secs: parsed("QUOTE_CACHE_TTL_SECS").unwrap_or(60),
            rate_limit_window_secs: parsed("RATE_LIMIT_WINDOW_SECS").unwrap_or(60),
            rate_limit_max_requests: parsed("RATE_LIMIT_MAX_REQUESTS").unwrap_or(60),
            upstream_timeout_secs: parsed("UPSTREAM_TIMEOUT_SECS").unwrap_or(10),
            monitor: MonitorConfig {
                mode: parsed("MONITOR_MODE").unwrap_or(defaults.mode),
                symbol: env::var("MONITOR_SYMBOL").unwrap_or(defaults.symbol),
                base_price: parsed("MONITOR_BASE_PRICE")
                    .filter(|p: &f64| p.is_finite() && *p > 0.0)
                    .unwrap_or(defaults.base_price),
                tick_ms: parsed("FEED_TICK_MS").unwrap_or(defaults.tick_ms),
                history_limit: parsed("FEED_HISTORY_LIMIT").unwrap_or(defaults.history_limit),
                params_file: env::var("PARAMS_FILE").ok(),
            },
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
