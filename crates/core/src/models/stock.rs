use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreError;

/// Dividend payout cadence. Controls how a holding's annual dividend is
/// distributed across the 12-month projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DividendFrequency {
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
}

impl DividendFrequency {
    /// Lenient parse of a persisted frequency string.
    ///
    /// Unrecognized values return `None` and are logged; downstream
    /// projection treats an absent frequency as annual (December payout),
    /// matching the documented default rather than rejecting the row.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "monthly" => Some(DividendFrequency::Monthly),
            "quarterly" => Some(DividendFrequency::Quarterly),
            "semi-annual" | "semiannual" => Some(DividendFrequency::SemiAnnual),
            "annual" => Some(DividendFrequency::Annual),
            other => {
                log::warn!("Unrecognized dividend frequency '{other}', defaulting to annual");
                None
            }
        }
    }

    /// The persisted wire/text form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DividendFrequency::Monthly => "monthly",
            DividendFrequency::Quarterly => "quarterly",
            DividendFrequency::SemiAnnual => "semi-annual",
            DividendFrequency::Annual => "annual",
        }
    }
}

impl std::fmt::Display for DividendFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One portfolio line item: a ticker with quantity and cost basis, plus
/// optional dividend metadata fetched from the market-data provider.
///
/// Invariant: `dividend_frequency` is present iff `dividend_yield` is
/// present and positive. Maintained by [`StockHolding::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockHolding {
    /// Unique row identifier.
    pub id: Uuid,

    /// Ticker symbol, uppercased (e.g., "AAPL", "O").
    pub ticker: String,

    /// Number of shares held (always positive).
    pub quantity: f64,

    /// Per-share price paid (always positive).
    pub purchase_price: f64,

    /// Latest known per-share market price (non-negative).
    pub current_price: f64,

    /// Annualized dividend yield as a percentage (e.g., 4.8 for 4.8%).
    #[serde(default)]
    pub dividend_yield: Option<f64>,

    /// Payout cadence; present only when the yield is positive.
    #[serde(default)]
    pub dividend_frequency: Option<DividendFrequency>,

    /// Next/last ex-dividend date reported by the provider.
    #[serde(default)]
    pub ex_dividend_date: Option<NaiveDate>,
}

impl StockHolding {
    /// Build a new holding from user input. Uppercases the ticker,
    /// normalizes dividend fields, and validates.
    pub fn new(
        ticker: impl Into<String>,
        quantity: f64,
        purchase_price: f64,
        current_price: f64,
    ) -> Result<Self, CoreError> {
        let mut holding = Self {
            id: Uuid::new_v4(),
            ticker: ticker.into().trim().to_uppercase(),
            quantity,
            purchase_price,
            current_price,
            dividend_yield: None,
            dividend_frequency: None,
            ex_dividend_date: None,
        };
        holding.normalize();
        holding.validate()?;
        Ok(holding)
    }

    /// Attach dividend metadata (builder style, used by tests and callers
    /// that already have provider data).
    #[must_use]
    pub fn with_dividend(
        mut self,
        yield_pct: f64,
        frequency: DividendFrequency,
        ex_date: Option<NaiveDate>,
    ) -> Self {
        self.dividend_yield = Some(yield_pct);
        self.dividend_frequency = Some(frequency);
        self.ex_dividend_date = ex_date;
        self.normalize();
        self
    }

    /// Annual projected dividend dollars for this holding:
    /// `quantity * current_price * (yield / 100)`. Zero when no yield.
    #[must_use]
    pub fn annual_dividend_amount(&self) -> f64 {
        match self.dividend_yield {
            Some(y) if y > 0.0 => self.quantity * self.current_price * (y / 100.0),
            _ => 0.0,
        }
    }

    /// Enforce the frequency/yield invariant:
    /// - yield absent or non-positive → frequency cleared;
    /// - yield positive with no frequency → defaults to annual.
    pub fn normalize(&mut self) {
        match self.dividend_yield {
            Some(y) if y > 0.0 => {
                if self.dividend_frequency.is_none() {
                    self.dividend_frequency = Some(DividendFrequency::Annual);
                }
            }
            _ => {
                self.dividend_frequency = None;
            }
        }
    }

    /// Reject bad user input before any network or persistence call.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.ticker.is_empty() {
            return Err(CoreError::Validation("Ticker symbol is required".into()));
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Quantity must be positive, got {}",
                self.quantity
            )));
        }
        if !self.purchase_price.is_finite() || self.purchase_price <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Purchase price must be positive, got {}",
                self.purchase_price
            )));
        }
        if !self.current_price.is_finite() || self.current_price < 0.0 {
            return Err(CoreError::Validation(format!(
                "Current price must be non-negative, got {}",
                self.current_price
            )));
        }
        if let Some(y) = self.dividend_yield {
            if !y.is_finite() || y < 0.0 {
                return Err(CoreError::Validation(format!(
                    "Dividend yield must be non-negative, got {y}"
                )));
            }
        }
        Ok(())
    }
}
