use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A market-data snapshot for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Ticker symbol, uppercased.
    pub ticker: String,

    /// Latest per-share price.
    pub price: f64,

    /// Annualized dividend yield as a percentage (provider reports a
    /// fraction; converted by multiplying by 100).
    pub dividend_yield: Option<f64>,

    /// Ex-dividend date, when the provider reports one.
    pub ex_dividend_date: Option<NaiveDate>,
}

/// A quote lookup result. `stale` marks a cached entry older than the cache
/// TTL that was served because the provider was rate-limited or failing —
/// callers should surface it with a warning rather than as fresh data.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteResponse {
    pub quote: Quote,
    pub stale: bool,
}

/// Outcome of the scheduled refresh-all-tickers job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Tickers whose cache row and stock rows were updated.
    pub updated: usize,

    /// Tickers that failed (no data, transient provider error).
    pub failed: usize,

    /// True when a rate-limit response aborted the remaining tickers.
    pub rate_limited: bool,
}
