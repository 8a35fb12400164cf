use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::quote::Quote;

/// Trait abstraction for the external market-data provider.
///
/// The quote cache and portfolio store only ever see this trait; if the
/// provider changes or goes away, only one implementation is replaced.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Fetch the latest price plus dividend metadata for a ticker.
    ///
    /// Error contract:
    /// - `NotFound` — the symbol has no data;
    /// - `RateLimited` — the provider signalled a throttle;
    /// - `Upstream` / `Network` — any other provider failure.
    async fn fetch_quote(&self, ticker: &str) -> Result<Quote, CoreError>;
}
