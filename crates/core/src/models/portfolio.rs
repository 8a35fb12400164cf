use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stock::StockHolding;

/// Default annual dividend goal created lazily on first access.
pub const DEFAULT_ANNUAL_GOAL: f64 = 5000.0;

/// The in-session view of one user's portfolio: the holdings list as last
/// re-fetched from the row-store, plus the dividend goal.
///
/// This is a cache of persisted state, never an optimistic patch — every
/// successful holdings mutation triggers a re-query so the list is never
/// ahead of the row-store. The goal is the one exception (optimistic
/// update, background persist).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    /// Owning user account.
    pub user_id: Uuid,

    /// Holdings, ordered by ticker as returned by the row-store.
    pub stocks: Vec<StockHolding>,

    /// Annual dividend income goal in dollars (always positive).
    pub dividend_goal: f64,
}

impl Portfolio {
    #[must_use]
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            stocks: Vec::new(),
            dividend_goal: DEFAULT_ANNUAL_GOAL,
        }
    }

    /// Find a holding by row id.
    #[must_use]
    pub fn stock(&self, id: Uuid) -> Option<&StockHolding> {
        self.stocks.iter().find(|s| s.id == id)
    }

    #[must_use]
    pub fn stock_count(&self) -> usize {
        self.stocks.len()
    }
}
