use chrono::Duration;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::{QUOTE_CACHE_TTL_HOURS, REFRESH_GUARD_TTL_MINUTES};
use crate::errors::CoreError;
use crate::models::quote::{QuoteResponse, RefreshSummary};
use crate::providers::traits::MarketDataProvider;
use crate::storage::traits::{PortfolioRepository, QuoteCacheRow, ScratchStore};

/// Tickers per batch in the scheduled refresh job — the provider's
/// calls-per-minute ceiling.
const REFRESH_BATCH_SIZE: usize = 5;

/// Pause between refresh batches. Slightly over a minute to stay clear of
/// the per-minute ceiling.
const REFRESH_BATCH_PAUSE: std::time::Duration = std::time::Duration::from_secs(62);

/// Scratch key holding the refresh job's mutual-exclusion flag
/// (value: RFC 3339 start time).
const REFRESH_GUARD_KEY: &str = "price_refresh_running";

/// Market-data lookups with a 24-hour cache to respect provider rate limits.
///
/// Lookup flow:
/// 1. Cache row younger than 24h → returned, no provider call.
/// 2. Miss or stale → live call; success refreshes the cache.
/// 3. Provider throttled/failing and *any* cached row exists → the stale
///    row is returned flagged `stale` instead of failing outright.
/// 4. No cached row → the typed provider error propagates.
pub struct QuoteService {
    provider: Arc<dyn MarketDataProvider>,
    repo: Arc<dyn PortfolioRepository>,
    scratch: Arc<dyn ScratchStore>,
    clock: Arc<dyn Clock>,
}

impl QuoteService {
    #[must_use]
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        repo: Arc<dyn PortfolioRepository>,
        scratch: Arc<dyn ScratchStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            repo,
            scratch,
            clock,
        }
    }

    /// Get a quote for a ticker, serving from cache when fresh.
    pub async fn get_quote(&self, ticker: &str) -> Result<QuoteResponse, CoreError> {
        let ticker = ticker.trim().to_uppercase();
        let now = self.clock.now();
        let cached = self.repo.cached_quote(&ticker).await?;

        if let Some(row) = &cached {
            if now - row.updated_at < Duration::hours(QUOTE_CACHE_TTL_HOURS) {
                log::debug!("Quote cache hit for {ticker}");
                return Ok(QuoteResponse {
                    quote: row.to_quote(),
                    stale: false,
                });
            }
        }

        match self.provider.fetch_quote(&ticker).await {
            Ok(quote) => {
                self.repo
                    .upsert_cached_quote(QuoteCacheRow::from_quote(&quote, now))
                    .await?;
                Ok(QuoteResponse {
                    quote,
                    stale: false,
                })
            }
            Err(e) if e.is_transient() => match cached {
                // Rate-limited or flaky provider: a stale cache entry beats
                // no data. Flagged so callers can show a warning.
                Some(row) => {
                    log::warn!("Provider unavailable for {ticker} ({e}), serving stale cache");
                    Ok(QuoteResponse {
                        quote: row.to_quote(),
                        stale: true,
                    })
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Scheduled job: refresh every distinct ticker across all users.
    ///
    /// Processes tickers in batches of 5 with an enforced pause between
    /// batches. A rate-limit response aborts the remaining work rather than
    /// retrying immediately. Each successful quote updates both the cache
    /// row and every user's stock rows for that ticker.
    ///
    /// Singleton-guarded: a second invocation while the guard flag is fresh
    /// returns `Busy`. The guard expires after 15 minutes so a crashed run
    /// cannot block the job forever.
    pub async fn refresh_all(&self) -> Result<RefreshSummary, CoreError> {
        let now = self.clock.now();
        if let Some(raw) = self.scratch.get(REFRESH_GUARD_KEY) {
            let fresh = raw
                .parse::<chrono::DateTime<chrono::Utc>>()
                .map(|started| now - started < Duration::minutes(REFRESH_GUARD_TTL_MINUTES))
                .unwrap_or(false);
            if fresh {
                return Err(CoreError::Busy("price refresh".into()));
            }
        }
        self.scratch.set(REFRESH_GUARD_KEY, &now.to_rfc3339());

        let result = self.refresh_all_inner().await;
        self.scratch.remove(REFRESH_GUARD_KEY);
        result
    }

    async fn refresh_all_inner(&self) -> Result<RefreshSummary, CoreError> {
        let tickers = self.repo.distinct_tickers().await?;
        log::info!("Refreshing {} distinct tickers", tickers.len());

        let mut summary = RefreshSummary::default();

        'batches: for (batch_idx, batch) in tickers.chunks(REFRESH_BATCH_SIZE).enumerate() {
            if batch_idx > 0 {
                log::info!(
                    "Processed {} tickers, pausing for rate limit",
                    batch_idx * REFRESH_BATCH_SIZE
                );
                tokio::time::sleep(REFRESH_BATCH_PAUSE).await;
            }

            for ticker in batch {
                match self.provider.fetch_quote(ticker).await {
                    Ok(quote) => {
                        let now = self.clock.now();
                        self.repo
                            .upsert_cached_quote(QuoteCacheRow::from_quote(&quote, now))
                            .await?;
                        self.repo.apply_quote_to_stocks(&quote).await?;
                        summary.updated += 1;
                        log::info!(
                            "Updated {ticker}: ${}, yield: {:?}%",
                            quote.price,
                            quote.dividend_yield
                        );
                    }
                    Err(CoreError::RateLimited(msg)) => {
                        log::warn!("Rate limited while refreshing {ticker} ({msg}), aborting run");
                        summary.rate_limited = true;
                        break 'batches;
                    }
                    Err(e) => {
                        log::warn!("Failed to refresh {ticker}: {e}");
                        summary.failed += 1;
                    }
                }
            }
        }

        log::info!(
            "Refresh finished: {} updated, {} failed, rate_limited={}",
            summary.updated,
            summary.failed,
            summary.rate_limited
        );
        Ok(summary)
    }
}
