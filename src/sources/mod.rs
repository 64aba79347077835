pub mod finnhub;
pub mod proxy;

pub use finnhub::FinnhubClient;
pub use proxy::ProxyClient;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure talking to an upstream quote source, before the body is interpreted.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("Unable to connect to quote API: {0}")]
    Transport(String),

    #[error("Invalid response body: {0}")]
    Body(String),
}

/// An upstream provider that returns a raw quote body for a symbol.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Name recorded as the `source` of served payloads.
    fn name(&self) -> &str;

    /// Fetch the raw quote JSON for an already normalized symbol.
    async fn fetch(&self, symbol: &str, credential: &str) -> Result<Value, SourceError>;
}
