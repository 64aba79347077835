//! Price feed: a timer-driven stream of [`PriceSample`]s.
//!
//! Two sources sit behind the same lifecycle. The simulated source runs a bounded
//! random walk; the live source polls a [`QuoteProvider`]. Each running feed owns one
//! tokio task. A live fetch is awaited inside that task before the next tick is taken,
//! so a feed never has more than one request in flight.

use crate::error::QuoteError;
use crate::types::{FeedMode, FeedStatus, PriceChange, PriceSample, Quote};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_HISTORY_LIMIT: usize = 300;
pub const DEFAULT_BASE_PRICE: f64 = 150.0;

/// Simulated prices never drop below this.
pub const MIN_SIMULATED_PRICE: f64 = 0.01;

const MAX_DRIFT: f64 = 0.2;
const DRIFT_STEP: f64 = 0.02;
/// Per-tick volatility, percent.
const TICK_VOLATILITY: f64 = 0.15;
/// Spread of the simulated previous close around the base price.
const PREVIOUS_CLOSE_SPREAD: f64 = 0.02;

/// Anything that can produce a single current quote for a symbol.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn quote(&self, symbol: &str, credential: &str) -> Result<Quote, QuoteError>;
}

/// Feed start failures.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("API key required for live data")]
    MissingCredential,

    #[error("Initial quote fetch failed: {0}")]
    InitialFetch(#[source] QuoteError),
}

/// Bounded random walk used by the simulated feed.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    price: f64,
    drift: f64,
}

impl RandomWalk {
    pub fn new(base_price: f64) -> Self {
        Self {
            price: base_price,
            drift: 0.0,
        }
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn drift(&self) -> f64 {
        self.drift
    }

    /// Advance one tick and return the new price.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f64 {
        self.drift = (self.drift + (rng.gen::<f64>() - 0.5) * DRIFT_STEP).clamp(-MAX_DRIFT, MAX_DRIFT);
        let noise = (rng.gen::<f64>() - 0.5) * TICK_VOLATILITY * 0.01;
        self.price = (self.price * (1.0 + self.drift * 0.001 + noise)).max(MIN_SIMULATED_PRICE);
        self.price
    }
}

/// A previous close within +/-1% of `base_price`, standing in for the prior session.
pub fn simulated_previous_close<R: Rng + ?Sized>(base_price: f64, rng: &mut R) -> f64 {
    base_price * (1.0 + (rng.gen::<f64>() - 0.5) * PREVIOUS_CLOSE_SPREAD)
}

/// Where the feed takes prices from.
#[derive(Clone)]
pub enum FeedSource {
    Simulated {
        base_price: f64,
        /// Fixed RNG seed; `None` seeds from entropy.
        seed: Option<u64>,
    },
    Live {
        symbol: String,
        credential: String,
        provider: Arc<dyn QuoteProvider>,
    },
}

/// Start-time configuration.
#[derive(Clone)]
pub struct FeedConfig {
    pub source: FeedSource,
    pub tick_interval: Duration,
    pub history_limit: usize,
}

impl FeedConfig {
    pub fn simulated(base_price: f64) -> Self {
        Self {
            source: FeedSource::Simulated {
                base_price,
                seed: None,
            },
            tick_interval: DEFAULT_TICK_INTERVAL,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn live(
        symbol: impl Into<String>,
        credential: impl Into<String>,
        provider: Arc<dyn QuoteProvider>,
    ) -> Self {
        Self {
            source: FeedSource::Live {
                symbol: symbol.into(),
                credential: credential.into(),
                provider,
            },
            tick_interval: DEFAULT_TICK_INTERVAL,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    /// Fix the simulator seed. No effect on live feeds.
    pub fn with_seed(mut self, value: u64) -> Self {
        if let FeedSource::Simulated { seed, .. } = &mut self.source {
            *seed = Some(value);
        }
        self
    }
}

type SampleCallback = Box<dyn FnMut(&PriceSample) + Send>;

struct FeedState {
    mode: FeedMode,
    connected: bool,
    loading: bool,
    error: Option<String>,
    symbol: Option<String>,
    previous_close: f64,
    history: VecDeque<PriceSample>,
    history_limit: usize,
    /// Survives history clears so timestamps stay non-decreasing.
    last_timestamp: Option<i64>,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            mode: FeedMode::Simulated,
            connected: false,
            loading: false,
            error: None,
            symbol: None,
            previous_close: f64::NAN,
            history: VecDeque::with_capacity(DEFAULT_HISTORY_LIMIT),
            history_limit: DEFAULT_HISTORY_LIMIT,
            last_timestamp: None,
        }
    }
}

struct FeedShared {
    state: Mutex<FeedState>,
    subscribers: Mutex<Vec<SampleCallback>>,
}

impl FeedShared {
    /// Validate, record and broadcast one price. Invalid prices are dropped.
    fn push_sample(&self, price: f64) -> Option<PriceSample> {
        if !PriceSample::is_valid_price(price) {
            debug!("Discarding invalid price sample: {}", price);
            return None;
        }

        let sample = {
            let mut state = self.state.lock();
            let now = chrono::Utc::now().timestamp_millis();
            let timestamp = state.last_timestamp.map_or(now, |last| last.max(now));
            let sample = PriceSample { timestamp, price };

            state.history.push_back(sample);
            while state.history.len() > state.history_limit {
                state.history.pop_front();
            }
            state.last_timestamp = Some(timestamp);
            sample
        };

        // State lock is released; callbacks may read feed status.
        for callback in self.subscribers.lock().iter_mut() {
            callback(&sample);
        }
        Some(sample)
    }

    async fn fetch_once(
        &self,
        provider: &dyn QuoteProvider,
        symbol: &str,
        credential: &str,
    ) -> Result<(), QuoteError> {
        match provider.quote(symbol, credential).await {
            Ok(quote) => {
                {
                    let mut state = self.state.lock();
                    // Always the market's previous close, never a simulated value.
                    state.previous_close = quote.previous_close;
                    state.connected = true;
                    state.error = None;
                }
                self.push_sample(quote.current);
                Ok(())
            }
            Err(e) => {
                warn!("Quote fetch error for {}: {}", symbol, e);
                let mut state = self.state.lock();
                state.error = Some(e.to_string());
                state.connected = false;
                Err(e)
            }
        }
    }
}

/// Timer-driven price feed.
pub struct PriceFeed {
    shared: Arc<FeedShared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PriceFeed {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(FeedShared {
                state: Mutex::new(FeedState::default()),
                subscribers: Mutex::new(Vec::new()),
            }),
            task: Mutex::new(None),
        }
    }

    /// Register a callback run synchronously after every accepted sample.
    ///
    /// Callbacks must not register further callbacks.
    pub fn on_sample<F>(&self, callback: F)
    where
        F: FnMut(&PriceSample) + Send + 'static,
    {
        self.shared.subscribers.lock().push(Box::new(callback));
    }

    /// Start (or restart) the feed. A running feed is stopped first.
    pub async fn start(&self, config: FeedConfig) -> Result<(), FeedError> {
        self.stop();
        self.shared.state.lock().history_limit = config.history_limit.max(1);

        match config.source {
            FeedSource::Simulated { base_price, seed } => {
                self.start_simulated(base_price, seed, config.tick_interval);
                Ok(())
            }
            FeedSource::Live {
                symbol,
                credential,
                provider,
            } => {
                self.start_live(symbol, credential, provider, config.tick_interval)
                    .await
            }
        }
    }

    fn start_simulated(&self, base_price: f64, seed: Option<u64>, tick: Duration) {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        {
            let mut state = self.shared.state.lock();
            state.mode = FeedMode::Simulated;
            state.connected = true;
            state.loading = false;
            state.error = None;
            state.symbol = None;
            state.previous_close = simulated_previous_close(base_price, &mut rng);
        }
        self.shared.push_sample(base_price);

        let shared = self.shared.clone();
        let mut walk = RandomWalk::new(base_price);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let price = walk.step(&mut rng);
                shared.push_sample(price);
            }
        });

        *self.task.lock() = Some(handle);
        info!("Simulated price feed started at {:.2}", base_price);
    }

    async fn start_live(
        &self,
        symbol: String,
        credential: String,
        provider: Arc<dyn QuoteProvider>,
        tick: Duration,
    ) -> Result<(), FeedError> {
        if credential.trim().is_empty() {
            self.shared.state.lock().error = Some(FeedError::MissingCredential.to_string());
            return Err(FeedError::MissingCredential);
        }

        {
            let mut state = self.shared.state.lock();
            state.mode = FeedMode::Live;
            state.loading = true;
            state.error = None;
            state.symbol = Some(symbol.clone());
            state.history.clear();
        }

        let first = self
            .shared
            .fetch_once(provider.as_ref(), &symbol, &credential)
            .await;
        self.shared.state.lock().loading = false;

        if let Err(e) = first {
            return Err(FeedError::InitialFetch(e));
        }

        let shared = self.shared.clone();
        let task_symbol = symbol.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                // Failures are recorded in feed state; the next tick retries.
                let _ = shared
                    .fetch_once(provider.as_ref(), &task_symbol, &credential)
                    .await;
            }
        });

        *self.task.lock() = Some(handle);
        info!("Live price feed started for {}", symbol);
        Ok(())
    }

    /// Cancel the timer and any in-flight request. Safe to call when not running.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            debug!("Price feed stopped");
        }
    }

    /// Stop, mark disconnected and fall back to simulated mode.
    pub fn disconnect(&self) {
        self.stop();
        let mut state = self.shared.state.lock();
        state.connected = false;
        state.mode = FeedMode::Simulated;
        state.error = None;
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn clear_history(&self) {
        self.shared.state.lock().history.clear();
    }

    /// Trailing history, oldest first.
    pub fn history(&self) -> Vec<PriceSample> {
        self.shared.state.lock().history.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<PriceSample> {
        self.shared.state.lock().history.back().copied()
    }

    pub fn previous_close(&self) -> f64 {
        self.shared.state.lock().previous_close
    }

    pub fn status(&self) -> FeedStatus {
        let running = self.is_running();
        let state = self.shared.state.lock();
        let latest = state.history.back().copied();
        let current = latest.map(|s| s.price).unwrap_or(f64::NAN);

        FeedStatus {
            mode: state.mode,
            running,
            connected: state.connected,
            loading: state.loading,
            error: state.error.clone(),
            symbol: state.symbol.clone(),
            current_price: latest.map(|s| s.price),
            previous_close: state
                .previous_close
                .is_finite()
                .then_some(state.previous_close),
            change: PriceChange::between(current, state.previous_close),
            last_updated: latest.map(|s| s.timestamp),
            history_len: state.history.len(),
        }
    }
}

impl Default for PriceFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PriceFeed {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}
