use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::quote::Quote;
use crate::models::stock::{DividendFrequency, StockHolding};
use crate::models::subscription::{SubscriberRecord, Tier};

/// A persisted stock row. Numeric columns arrive as text decimals from the
/// row-store and are coerced on load.
#[derive(Debug, Clone, PartialEq)]
pub struct StockRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ticker: String,
    pub quantity: String,
    pub purchase_price: String,
    pub current_price: String,
    pub dividend_yield: Option<String>,
    pub dividend_frequency: Option<String>,
    pub ex_dividend_date: Option<NaiveDate>,
}

impl StockRow {
    /// Coerce the persisted text decimals into a validated holding.
    /// Required numeric columns that fail to parse are a persistence error;
    /// the optional yield degrades to absent.
    pub fn into_holding(self) -> Result<StockHolding, CoreError> {
        let quantity = coerce_decimal(&self.quantity, "quantity", &self.ticker)?;
        let purchase_price = coerce_decimal(&self.purchase_price, "purchase_price", &self.ticker)?;
        let current_price = coerce_decimal(&self.current_price, "current_price", &self.ticker)?;
        let dividend_yield = self.dividend_yield.as_deref().and_then(|y| y.parse().ok());
        let dividend_frequency = self
            .dividend_frequency
            .as_deref()
            .and_then(DividendFrequency::parse);

        let mut holding = StockHolding {
            id: self.id,
            ticker: self.ticker,
            quantity,
            purchase_price,
            current_price,
            dividend_yield,
            dividend_frequency,
            ex_dividend_date: self.ex_dividend_date,
        };
        holding.normalize();
        Ok(holding)
    }

    /// Render a holding back to its persisted row shape.
    #[must_use]
    pub fn from_holding(user_id: Uuid, holding: &StockHolding) -> Self {
        Self {
            id: holding.id,
            user_id,
            ticker: holding.ticker.clone(),
            quantity: holding.quantity.to_string(),
            purchase_price: holding.purchase_price.to_string(),
            current_price: holding.current_price.to_string(),
            dividend_yield: holding.dividend_yield.map(|y| y.to_string()),
            dividend_frequency: holding.dividend_frequency.map(|f| f.as_str().to_string()),
            ex_dividend_date: holding.ex_dividend_date,
        }
    }
}

fn coerce_decimal(raw: &str, column: &str, ticker: &str) -> Result<f64, CoreError> {
    raw.trim().parse().map_err(|_| {
        CoreError::Persistence(format!(
            "Invalid decimal in column {column} for {ticker}: '{raw}'"
        ))
    })
}

/// A persisted dividend-goal row (text decimal, same coercion rule).
#[derive(Debug, Clone, PartialEq)]
pub struct GoalRow {
    pub user_id: Uuid,
    pub annual_goal: String,
}

impl GoalRow {
    pub fn annual_goal_value(&self) -> Result<f64, CoreError> {
        self.annual_goal.trim().parse().map_err(|_| {
            CoreError::Persistence(format!(
                "Invalid decimal in dividend goal: '{}'",
                self.annual_goal
            ))
        })
    }
}

/// A cached quote row, keyed by ticker with a write timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteCacheRow {
    pub ticker: String,
    pub price: f64,
    pub dividend_yield: Option<f64>,
    pub ex_dividend_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl QuoteCacheRow {
    #[must_use]
    pub fn from_quote(quote: &Quote, updated_at: DateTime<Utc>) -> Self {
        Self {
            ticker: quote.ticker.clone(),
            price: quote.price,
            dividend_yield: quote.dividend_yield,
            ex_dividend_date: quote.ex_dividend_date,
            updated_at,
        }
    }

    #[must_use]
    pub fn to_quote(&self) -> Quote {
        Quote {
            ticker: self.ticker.clone(),
            price: self.price,
            dividend_yield: self.dividend_yield,
            ex_dividend_date: self.ex_dividend_date,
        }
    }
}

/// Row-store persistence port. Backed by a hosted row-store in production;
/// the in-memory implementation serves tests and demos.
///
/// Tables: stocks (user holdings), dividend goals, the global quote cache,
/// the tier → stock-limit lookup, and the reconciled subscriber records.
#[async_trait]
pub trait PortfolioRepository: Send + Sync {
    // ── Stocks ──────────────────────────────────────────────────────
    async fn list_stocks(&self, user_id: Uuid) -> Result<Vec<StockRow>, CoreError>;
    async fn insert_stock(&self, row: StockRow) -> Result<(), CoreError>;
    /// Full-row overwrite by id.
    async fn update_stock(&self, row: StockRow) -> Result<(), CoreError>;
    async fn delete_stock(&self, id: Uuid) -> Result<(), CoreError>;

    // ── Dividend goals ──────────────────────────────────────────────
    async fn fetch_goal(&self, user_id: Uuid) -> Result<Option<GoalRow>, CoreError>;
    async fn insert_goal(&self, user_id: Uuid, annual_goal: f64) -> Result<GoalRow, CoreError>;
    async fn update_goal(&self, user_id: Uuid, annual_goal: f64) -> Result<(), CoreError>;

    // ── Quote cache ─────────────────────────────────────────────────
    async fn cached_quote(&self, ticker: &str) -> Result<Option<QuoteCacheRow>, CoreError>;
    async fn upsert_cached_quote(&self, row: QuoteCacheRow) -> Result<(), CoreError>;

    /// Distinct tickers across all users, for the scheduled refresh job.
    async fn distinct_tickers(&self) -> Result<Vec<String>, CoreError>;

    /// Apply a fresh quote to every user's stock rows for this ticker.
    async fn apply_quote_to_stocks(&self, quote: &Quote) -> Result<(), CoreError>;

    // ── Subscriptions ───────────────────────────────────────────────
    /// Max stock count for a tier, if the lookup table has a row for it.
    async fn stock_limit_for_tier(&self, tier: Tier) -> Result<Option<u32>, CoreError>;

    /// Upsert the reconciled subscriber record, keyed by email.
    async fn upsert_subscriber(&self, record: SubscriberRecord) -> Result<(), CoreError>;

    async fn find_subscriber(&self, email: &str) -> Result<Option<SubscriberRecord>, CoreError>;
}

/// Small key-value scratch space for transient local state (the checkout
/// marker, the batch-refresh guard flag). Browser hosts back this with
/// local storage; tests use the in-memory implementation.
pub trait ScratchStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}
