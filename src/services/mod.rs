pub mod alert_monitor;
pub mod cache;
pub mod metrics;
pub mod parameter_store;
pub mod price_feed;
pub mod quote_gateway;
pub mod quote_store;
pub mod rate_limiter;
pub mod session;

pub use alert_monitor::{AlertMonitor, BroadcastNotifier, LogNotifier, Notifier, NotifyError};
pub use cache::Cache;
pub use parameter_store::{FileKvStore, KeyValueStore, MemoryKvStore, ParameterStore, StoreError};
pub use price_feed::{FeedConfig, FeedError, FeedSource, PriceFeed, QuoteProvider, RandomWalk};
pub use quote_gateway::QuoteGateway;
pub use quote_store::QuoteStore;
pub use rate_limiter::RateLimiter;
pub use session::TradeSession;
