use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use super::traits::{GoalRow, PortfolioRepository, QuoteCacheRow, ScratchStore, StockRow};
use crate::errors::CoreError;
use crate::models::quote::Quote;
use crate::models::subscription::{SubscriberRecord, Tier};

/// In-memory row-store. Serves tests and demos; also documents the exact
/// table shapes the production row-store is expected to provide.
#[derive(Default)]
pub struct InMemoryRepository {
    stocks: Mutex<Vec<StockRow>>,
    goals: Mutex<HashMap<Uuid, GoalRow>>,
    quote_cache: Mutex<HashMap<String, QuoteCacheRow>>,
    limits: Mutex<HashMap<&'static str, u32>>,
    subscribers: Mutex<HashMap<String, SubscriberRecord>>,
    /// Operation names forced to fail, for error-path tests.
    failing: Mutex<HashSet<String>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tier → limit lookup table.
    pub fn set_limit(&self, tier: Tier, max_stocks: u32) {
        self.limits
            .lock()
            .expect("limits lock")
            .insert(tier.as_str(), max_stocks);
    }

    /// Force the named operation to fail with a persistence error until
    /// cleared. Used by tests for soft-failure and no-partial-apply paths.
    pub fn fail_on(&self, operation: &str) {
        self.failing
            .lock()
            .expect("failing lock")
            .insert(operation.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().expect("failing lock").clear();
    }

    fn check(&self, operation: &str) -> Result<(), CoreError> {
        if self.failing.lock().expect("failing lock").contains(operation) {
            return Err(CoreError::Persistence(format!(
                "simulated {operation} failure"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PortfolioRepository for InMemoryRepository {
    async fn list_stocks(&self, user_id: Uuid) -> Result<Vec<StockRow>, CoreError> {
        self.check("list_stocks")?;
        let mut rows: Vec<StockRow> = self
            .stocks
            .lock()
            .expect("stocks lock")
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Ok(rows)
    }

    async fn insert_stock(&self, row: StockRow) -> Result<(), CoreError> {
        self.check("insert_stock")?;
        self.stocks.lock().expect("stocks lock").push(row);
        Ok(())
    }

    async fn update_stock(&self, row: StockRow) -> Result<(), CoreError> {
        self.check("update_stock")?;
        let mut stocks = self.stocks.lock().expect("stocks lock");
        match stocks.iter_mut().find(|r| r.id == row.id) {
            Some(existing) => {
                *existing = row;
                Ok(())
            }
            None => Err(CoreError::Persistence(format!(
                "no stock row with id {}",
                row.id
            ))),
        }
    }

    async fn delete_stock(&self, id: Uuid) -> Result<(), CoreError> {
        self.check("delete_stock")?;
        self.stocks.lock().expect("stocks lock").retain(|r| r.id != id);
        Ok(())
    }

    async fn fetch_goal(&self, user_id: Uuid) -> Result<Option<GoalRow>, CoreError> {
        self.check("fetch_goal")?;
        Ok(self.goals.lock().expect("goals lock").get(&user_id).cloned())
    }

    async fn insert_goal(&self, user_id: Uuid, annual_goal: f64) -> Result<GoalRow, CoreError> {
        self.check("insert_goal")?;
        let row = GoalRow {
            user_id,
            annual_goal: annual_goal.to_string(),
        };
        self.goals
            .lock()
            .expect("goals lock")
            .insert(user_id, row.clone());
        Ok(row)
    }

    async fn update_goal(&self, user_id: Uuid, annual_goal: f64) -> Result<(), CoreError> {
        self.check("update_goal")?;
        self.goals.lock().expect("goals lock").insert(
            user_id,
            GoalRow {
                user_id,
                annual_goal: annual_goal.to_string(),
            },
        );
        Ok(())
    }

    async fn cached_quote(&self, ticker: &str) -> Result<Option<QuoteCacheRow>, CoreError> {
        self.check("cached_quote")?;
        Ok(self
            .quote_cache
            .lock()
            .expect("quote cache lock")
            .get(&ticker.to_uppercase())
            .cloned())
    }

    async fn upsert_cached_quote(&self, row: QuoteCacheRow) -> Result<(), CoreError> {
        self.check("upsert_cached_quote")?;
        self.quote_cache
            .lock()
            .expect("quote cache lock")
            .insert(row.ticker.to_uppercase(), row);
        Ok(())
    }

    async fn distinct_tickers(&self) -> Result<Vec<String>, CoreError> {
        self.check("distinct_tickers")?;
        let stocks = self.stocks.lock().expect("stocks lock");
        let mut tickers: Vec<String> = stocks
            .iter()
            .map(|r| r.ticker.to_uppercase())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        tickers.sort();
        Ok(tickers)
    }

    async fn apply_quote_to_stocks(&self, quote: &Quote) -> Result<(), CoreError> {
        self.check("apply_quote_to_stocks")?;
        let mut stocks = self.stocks.lock().expect("stocks lock");
        for row in stocks.iter_mut().filter(|r| r.ticker == quote.ticker) {
            row.current_price = quote.price.to_string();
            row.dividend_yield = quote.dividend_yield.map(|y| y.to_string());
            row.ex_dividend_date = quote.ex_dividend_date;
        }
        Ok(())
    }

    async fn stock_limit_for_tier(&self, tier: Tier) -> Result<Option<u32>, CoreError> {
        self.check("stock_limit_for_tier")?;
        Ok(self
            .limits
            .lock()
            .expect("limits lock")
            .get(tier.as_str())
            .copied())
    }

    async fn upsert_subscriber(&self, record: SubscriberRecord) -> Result<(), CoreError> {
        self.check("upsert_subscriber")?;
        self.subscribers
            .lock()
            .expect("subscribers lock")
            .insert(record.email.to_lowercase(), record);
        Ok(())
    }

    async fn find_subscriber(&self, email: &str) -> Result<Option<SubscriberRecord>, CoreError> {
        self.check("find_subscriber")?;
        Ok(self
            .subscribers
            .lock()
            .expect("subscribers lock")
            .get(&email.to_lowercase())
            .cloned())
    }
}

/// In-memory scratch space (the local-storage stand-in).
#[derive(Default)]
pub struct InMemoryScratch {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryScratch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScratchStore for InMemoryScratch {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().expect("scratch lock").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .expect("scratch lock")
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().expect("scratch lock").remove(key);
    }
}
