use serde::{Deserialize, Serialize};

/// Aggregate portfolio value metrics, derived on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    /// Sum over holdings of `quantity * current_price`.
    pub value: f64,

    /// `value` minus cost basis (`quantity * purchase_price` summed).
    pub change: f64,

    /// `change / cost * 100`, formatted to 2 decimals.
    /// `"0.00"` when the cost basis is zero (division-by-zero guard).
    pub change_percent: String,
}

impl PortfolioMetrics {
    /// All-zero metrics for an empty portfolio.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            value: 0.0,
            change: 0.0,
            change_percent: "0.00".to_string(),
        }
    }
}

/// Projected dividend income, distributed across calendar months by each
/// holding's payout frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendProjection {
    /// Projected dollars per month, index 0 = January.
    pub monthly: [f64; 12],

    /// Sum of all monthly slots.
    pub annual_total: f64,

    /// `annual_total / 12`.
    pub monthly_average: f64,
}

impl DividendProjection {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            monthly: [0.0; 12],
            annual_total: 0.0,
            monthly_average: 0.0,
        }
    }
}
