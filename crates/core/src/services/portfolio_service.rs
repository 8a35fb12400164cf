use std::sync::Arc;
use uuid::Uuid;

use super::quote_service::QuoteService;
use crate::errors::CoreError;
use crate::models::portfolio::{Portfolio, DEFAULT_ANNUAL_GOAL};
use crate::models::stock::StockHolding;
use crate::storage::traits::{PortfolioRepository, StockRow};

/// Owns the holdings/goal lifecycle against the row-store.
///
/// Mutation contract: enrichment (best-effort quote lookup) always resolves
/// before the persistence write is issued, and the holdings list is
/// re-fetched only after the write succeeds — the in-session list is never
/// ahead of persisted state, and a failed mutation leaves it untouched.
pub struct PortfolioService {
    repo: Arc<dyn PortfolioRepository>,
    quotes: Arc<QuoteService>,
}

impl PortfolioService {
    #[must_use]
    pub fn new(repo: Arc<dyn PortfolioRepository>, quotes: Arc<QuoteService>) -> Self {
        Self { repo, quotes }
    }

    /// Fetch and coerce the user's stock rows. No rows is an empty list,
    /// not an error.
    pub async fn load_stocks(&self, user_id: Uuid) -> Result<Vec<StockHolding>, CoreError> {
        let rows = self.repo.list_stocks(user_id).await?;
        rows.into_iter().map(StockRow::into_holding).collect()
    }

    /// Fetch the user's dividend goal, creating the default lazily on
    /// first access.
    pub async fn load_goal(&self, user_id: Uuid) -> Result<f64, CoreError> {
        match self.repo.fetch_goal(user_id).await? {
            Some(row) => row.annual_goal_value(),
            None => {
                let row = self.repo.insert_goal(user_id, DEFAULT_ANNUAL_GOAL).await?;
                row.annual_goal_value()
            }
        }
    }

    /// Add a holding: enrich from market data (best-effort), persist, then
    /// re-fetch the list into the portfolio.
    ///
    /// The caller gates on the entitlement limit *before* invoking this —
    /// a rejected add must never reach enrichment or persistence.
    pub async fn add_stock(
        &self,
        portfolio: &mut Portfolio,
        mut holding: StockHolding,
    ) -> Result<Uuid, CoreError> {
        holding.validate()?;
        self.enrich(&mut holding).await;

        let id = holding.id;
        self.repo
            .insert_stock(StockRow::from_holding(portfolio.user_id, &holding))
            .await?;

        portfolio.stocks = self.load_stocks(portfolio.user_id).await?;
        Ok(id)
    }

    /// Delete a holding by id, re-fetching on success.
    pub async fn remove_stock(&self, portfolio: &mut Portfolio, id: Uuid) -> Result<(), CoreError> {
        self.repo.delete_stock(id).await?;
        portfolio.stocks = self.load_stocks(portfolio.user_id).await?;
        Ok(())
    }

    /// Full-row overwrite of an existing holding, re-fetching on success.
    pub async fn update_stock(
        &self,
        portfolio: &mut Portfolio,
        mut holding: StockHolding,
    ) -> Result<(), CoreError> {
        holding.normalize();
        holding.validate()?;
        self.repo
            .update_stock(StockRow::from_holding(portfolio.user_id, &holding))
            .await?;

        portfolio.stocks = self.load_stocks(portfolio.user_id).await?;
        Ok(())
    }

    /// Set the annual dividend goal. The local value updates immediately
    /// (goal display should feel instant); the persist runs afterwards and
    /// a failure is reported without rolling the local value back.
    pub async fn set_goal(&self, portfolio: &mut Portfolio, value: f64) -> Result<(), CoreError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Dividend goal must be positive, got {value}"
            )));
        }

        portfolio.dividend_goal = value;

        if let Err(e) = self.repo.update_goal(portfolio.user_id, value).await {
            log::error!("Failed to persist dividend goal: {e}");
            return Err(e);
        }
        Ok(())
    }

    /// Best-effort enrichment: overlay provider price/dividend data onto
    /// the caller-supplied values. Any failure keeps the caller's values.
    async fn enrich(&self, holding: &mut StockHolding) {
        match self.quotes.get_quote(&holding.ticker).await {
            Ok(response) => {
                if response.stale {
                    log::warn!(
                        "Enriching {} from a stale cached quote",
                        holding.ticker
                    );
                }
                let quote = response.quote;
                if quote.price > 0.0 {
                    holding.current_price = quote.price;
                }
                if quote.dividend_yield.is_some() {
                    holding.dividend_yield = quote.dividend_yield;
                }
                if quote.ex_dividend_date.is_some() {
                    holding.ex_dividend_date = quote.ex_dividend_date;
                }
                holding.normalize();
            }
            Err(e) => {
                log::warn!(
                    "Quote enrichment failed for {}, keeping caller values: {e}",
                    holding.ticker
                );
            }
        }
    }
}
