use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::CoreError;
use crate::models::subscription::PlanType;

/// A billing-provider customer reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRef {
    pub id: String,
    pub email: String,
}

/// The provider's view of an active subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSubscription {
    pub id: String,
    pub current_period_end: DateTime<Utc>,
}

/// A hosted session the browsing context is redirected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedSession {
    pub url: String,
}

/// Billing-provider port. Only the operations this system consumes:
/// customer lookup by email, active-subscription lookup, checkout session
/// creation, and customer-portal session creation.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Find the customer record for an email, if one exists.
    async fn find_customer(&self, email: &str) -> Result<Option<CustomerRef>, CoreError>;

    /// The customer's active subscription, if any.
    async fn active_subscription(
        &self,
        customer_id: &str,
    ) -> Result<Option<ActiveSubscription>, CoreError>;

    /// Create a checkout session for the given plan at the given unit price
    /// (minor currency units). `origin` is where the provider redirects back
    /// with the `subscription=success|canceled` indicator.
    async fn create_checkout_session(
        &self,
        customer: Option<&CustomerRef>,
        email: &str,
        plan: PlanType,
        unit_amount_cents: u32,
        origin: &str,
    ) -> Result<HostedSession, CoreError>;

    /// Create a self-service management (customer portal) session.
    async fn create_portal_session(
        &self,
        customer_id: &str,
        origin: &str,
    ) -> Result<HostedSession, CoreError>;

    /// Resolve a customer id to its email (used by the webhook receiver).
    async fn customer_email(&self, customer_id: &str) -> Result<Option<String>, CoreError>;
}
