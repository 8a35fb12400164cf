use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CHECKOUT_MARKER_TTL_MINUTES;

/// Stock limit sentinel for "unlimited" tiers. A plain large integer keeps
/// the `can_add_stock` comparison uniform across tiers.
pub const UNLIMITED_STOCK_SENTINEL: u32 = 999_999;

/// Fixed plan prices in minor currency units (USD cents).
pub const MONTHLY_PRICE_CENTS: u32 = 799;
pub const ANNUAL_PRICE_CENTS: u32 = 7900;

/// Subscription level determining the stock-count limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Premium,
}

impl Tier {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Premium => "premium",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Billing interval for the premium plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Monthly,
    Annual,
}

impl PlanType {
    /// Unit price in minor currency units.
    #[must_use]
    pub fn unit_amount_cents(&self) -> u32 {
        match self {
            PlanType::Monthly => MONTHLY_PRICE_CENTS,
            PlanType::Annual => ANNUAL_PRICE_CENTS,
        }
    }
}

impl std::fmt::Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanType::Monthly => write!(f, "monthly"),
            PlanType::Annual => write!(f, "annual"),
        }
    }
}

/// The resolved subscription state used for local gating decisions.
/// Sourced from the billing provider, cached locally; never mutated except
/// through a successful provider round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    pub subscribed: bool,
    pub tier: Tier,
    pub period_end: Option<DateTime<Utc>>,
    pub stock_limit: u32,
}

impl SubscriptionStatus {
    /// Free-tier status with the given limit. Also the safe default before
    /// the first reconciliation completes.
    #[must_use]
    pub fn free(stock_limit: u32) -> Self {
        Self {
            subscribed: false,
            tier: Tier::Free,
            period_end: None,
            stock_limit,
        }
    }

    /// Days until the subscription renews/expires, rounded up so a partial
    /// day still counts as a full one. Negative once the period end passed.
    #[must_use]
    pub fn days_until_renewal(&self, now: DateTime<Utc>) -> Option<i64> {
        self.period_end.map(|end| {
            let secs = (end - now).num_seconds();
            secs.div_euclid(86_400) + i64::from(secs.rem_euclid(86_400) != 0)
        })
    }

    /// True when the subscription renews within a week — used for the
    /// renewal-reminder notice.
    #[must_use]
    pub fn expiring_soon(&self, now: DateTime<Utc>) -> bool {
        matches!(self.days_until_renewal(now), Some(d) if d > 0 && d <= 7)
    }
}

/// Entitlement engine lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum EntitlementState {
    /// No reconciliation attempted yet.
    Uninitialized,
    /// A provider round-trip is in flight.
    Loading,
    /// Last reconciliation succeeded.
    Ready(SubscriptionStatus),
    /// All retries exhausted; holds the surfaced message.
    Error(String),
}

impl EntitlementState {
    #[must_use]
    pub fn status(&self) -> Option<&SubscriptionStatus> {
        match self {
            EntitlementState::Ready(s) => Some(s),
            _ => None,
        }
    }
}

/// Transient record of an in-flight external checkout redirect, persisted
/// in the scratch space so an interrupted checkout survives page reloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutMarker {
    pub plan: PlanType,
    pub started_at: DateTime<Utc>,
}

impl CheckoutMarker {
    #[must_use]
    pub fn new(plan: PlanType, started_at: DateTime<Utc>) -> Self {
        Self { plan, started_at }
    }

    /// Markers older than 30 minutes are discarded instead of resumed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.started_at > chrono::Duration::minutes(CHECKOUT_MARKER_TTL_MINUTES)
    }
}

/// The reconciled subscriber row — the row-store's system of record for
/// gating, updated on every status check and webhook event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriberRecord {
    pub email: String,
    pub user_id: Option<Uuid>,
    pub billing_customer_id: Option<String>,
    pub subscribed: bool,
    pub tier: Tier,
    pub period_end: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Redirect indicator carried back from the billing provider after a
/// checkout attempt (`subscription=success|canceled` query parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutOutcome {
    Success,
    Canceled,
}

impl CheckoutOutcome {
    /// Parse the query-parameter value; anything else is ignored.
    #[must_use]
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "success" => Some(CheckoutOutcome::Success),
            "canceled" => Some(CheckoutOutcome::Canceled),
            _ => None,
        }
    }
}
