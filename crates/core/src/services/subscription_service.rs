use chrono::Duration;
use std::sync::Arc;

use super::retry::retryable;
use crate::billing::traits::BillingProvider;
use crate::clock::Clock;
use crate::config::{Config, RECONCILE_INTERVAL_MINUTES};
use crate::errors::CoreError;
use crate::models::subscription::{
    CheckoutMarker, CheckoutOutcome, EntitlementState, PlanType, SubscriberRecord,
    SubscriptionStatus, Tier,
};
use crate::models::user::UserIdentity;
use crate::storage::traits::{PortfolioRepository, ScratchStore};

/// Status-check retry policy: transient provider failures are retried a
/// bounded number of times with a short backoff before surfacing.
const STATUS_MAX_ATTEMPTS: u32 = 3;
const STATUS_BACKOFF: std::time::Duration = std::time::Duration::from_secs(1);

/// After this many consecutive checkout/portal failures the engine stops
/// offering retries and surfaces a terminal contact-support message.
const MAX_BILLING_FAILURES: u32 = 3;

/// Scratch key for the in-flight checkout marker (JSON blob).
const CHECKOUT_MARKER_KEY: &str = "checkout_marker";

/// Tracks tier, expiry, and the stock-count limit, reconciled against the
/// billing provider. The resolved state is cached locally (and written to
/// the subscriber row) so gating decisions never need a live provider call.
pub struct SubscriptionService {
    billing: Arc<dyn BillingProvider>,
    repo: Arc<dyn PortfolioRepository>,
    scratch: Arc<dyn ScratchStore>,
    clock: Arc<dyn Clock>,
    config: Config,
    state: EntitlementState,
    last_checked: Option<chrono::DateTime<chrono::Utc>>,
    checkout_failures: u32,
    portal_failures: u32,
}

impl SubscriptionService {
    #[must_use]
    pub fn new(
        billing: Arc<dyn BillingProvider>,
        repo: Arc<dyn PortfolioRepository>,
        scratch: Arc<dyn ScratchStore>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Self {
        Self {
            billing,
            repo,
            scratch,
            clock,
            config,
            state: EntitlementState::Uninitialized,
            last_checked: None,
            checkout_failures: 0,
            portal_failures: 0,
        }
    }

    // ── State & gating ──────────────────────────────────────────────

    #[must_use]
    pub fn state(&self) -> &EntitlementState {
        &self.state
    }

    /// The status used for gating: the last reconciled state, or the free
    /// default before the first reconciliation.
    #[must_use]
    pub fn current_status(&self) -> SubscriptionStatus {
        self.state
            .status()
            .cloned()
            .unwrap_or_else(|| SubscriptionStatus::free(self.config.fallback_free_stock_limit))
    }

    #[must_use]
    pub fn stock_limit(&self) -> u32 {
        self.current_status().stock_limit
    }

    /// Pure gating predicate against the last reconciled state — no
    /// network call. Staleness is bounded by the periodic reconciliation.
    #[must_use]
    pub fn can_add_stock(&self, current_count: usize) -> bool {
        current_count < self.stock_limit() as usize
    }

    /// True when the 30-minute reconciliation bound is exceeded (or no
    /// check has happened yet). The host's timer calls `check_status` then.
    #[must_use]
    pub fn reconcile_due(&self) -> bool {
        match self.last_checked {
            Some(at) => self.clock.now() - at >= Duration::minutes(RECONCILE_INTERVAL_MINUTES),
            None => true,
        }
    }

    // ── Reconciliation ──────────────────────────────────────────────

    /// Query the billing provider and resolve tier/limit/expiry.
    ///
    /// No customer record means free tier. The resolved state is written
    /// to the subscriber row — the system of record for gating — and held
    /// locally. Transient failures retry up to 3 times with backoff.
    pub async fn check_status(
        &mut self,
        user: &UserIdentity,
    ) -> Result<SubscriptionStatus, CoreError> {
        self.state = EntitlementState::Loading;

        let billing = Arc::clone(&self.billing);
        let repo = Arc::clone(&self.repo);
        let config = self.config.clone();
        let result = retryable(
            || Self::resolve_status(&billing, &repo, &config, user),
            STATUS_MAX_ATTEMPTS,
            STATUS_BACKOFF,
        )
        .await;

        match result {
            Ok((status, customer_id)) => {
                self.repo
                    .upsert_subscriber(SubscriberRecord {
                        email: user.email.clone(),
                        user_id: Some(user.id),
                        billing_customer_id: customer_id,
                        subscribed: status.subscribed,
                        tier: status.tier,
                        period_end: status.period_end,
                        updated_at: self.clock.now(),
                    })
                    .await?;
                self.last_checked = Some(self.clock.now());
                self.state = EntitlementState::Ready(status.clone());
                log::info!(
                    "Subscription reconciled: tier={}, limit={}",
                    status.tier,
                    status.stock_limit
                );
                Ok(status)
            }
            Err(e) => {
                log::error!("Subscription check failed after retries: {e}");
                self.state = EntitlementState::Error(e.to_string());
                Err(e)
            }
        }
    }

    async fn resolve_status(
        billing: &Arc<dyn BillingProvider>,
        repo: &Arc<dyn PortfolioRepository>,
        config: &Config,
        user: &UserIdentity,
    ) -> Result<(SubscriptionStatus, Option<String>), CoreError> {
        let customer = billing.find_customer(&user.email).await?;

        let Some(customer) = customer else {
            let limit = Self::limit_for(repo, config, Tier::Free).await?;
            return Ok((SubscriptionStatus::free(limit), None));
        };

        match billing.active_subscription(&customer.id).await? {
            Some(sub) => {
                let limit = Self::limit_for(repo, config, Tier::Premium).await?;
                Ok((
                    SubscriptionStatus {
                        subscribed: true,
                        tier: Tier::Premium,
                        period_end: Some(sub.current_period_end),
                        stock_limit: limit,
                    },
                    Some(customer.id),
                ))
            }
            None => {
                let limit = Self::limit_for(repo, config, Tier::Free).await?;
                Ok((SubscriptionStatus::free(limit), Some(customer.id)))
            }
        }
    }

    /// Tier limit from the lookup table, falling back to configured
    /// defaults when the table has no row.
    async fn limit_for(
        repo: &Arc<dyn PortfolioRepository>,
        config: &Config,
        tier: Tier,
    ) -> Result<u32, CoreError> {
        let fallback = match tier {
            Tier::Free => config.fallback_free_stock_limit,
            Tier::Premium => config.fallback_premium_stock_limit,
        };
        Ok(repo.stock_limit_for_tier(tier).await?.unwrap_or(fallback))
    }

    // ── Checkout & portal ───────────────────────────────────────────

    /// True once consecutive failures have exhausted the retry offers;
    /// the host shows a contact-support message instead of a retry action.
    #[must_use]
    pub fn checkout_retries_exhausted(&self) -> bool {
        self.checkout_failures >= MAX_BILLING_FAILURES
    }

    #[must_use]
    pub fn portal_retries_exhausted(&self) -> bool {
        self.portal_failures >= MAX_BILLING_FAILURES
    }

    /// Request a checkout session URL for the plan. On success the marker
    /// is persisted *before* the URL is returned, so an interrupted
    /// redirect can be resumed after a reload.
    pub async fn start_checkout(
        &mut self,
        user: &UserIdentity,
        plan: PlanType,
    ) -> Result<String, CoreError> {
        let customer = self.billing.find_customer(&user.email).await.ok().flatten();

        let session = self
            .billing
            .create_checkout_session(
                customer.as_ref(),
                &user.email,
                plan,
                plan.unit_amount_cents(),
                &self.config.checkout_origin,
            )
            .await;

        match session {
            Ok(session) => {
                self.checkout_failures = 0;
                self.write_marker(&CheckoutMarker::new(plan, self.clock.now()));
                Ok(session.url)
            }
            Err(e) => {
                self.checkout_failures += 1;
                log::error!(
                    "Checkout failed (attempt {} of {MAX_BILLING_FAILURES}): {e}",
                    self.checkout_failures
                );
                Err(e)
            }
        }
    }

    /// Request a self-service billing portal URL. Requires an existing
    /// billing customer (free users with no history have none).
    pub async fn open_billing_portal(&mut self, user: &UserIdentity) -> Result<String, CoreError> {
        let customer = self.billing.find_customer(&user.email).await?.ok_or_else(|| {
            CoreError::Validation("No billing account exists for this user yet".into())
        })?;

        match self
            .billing
            .create_portal_session(&customer.id, &self.config.checkout_origin)
            .await
        {
            Ok(session) => {
                self.portal_failures = 0;
                Ok(session.url)
            }
            Err(e) => {
                self.portal_failures += 1;
                log::error!(
                    "Portal session failed (attempt {} of {MAX_BILLING_FAILURES}): {e}",
                    self.portal_failures
                );
                Err(e)
            }
        }
    }

    // ── Checkout recovery ───────────────────────────────────────────

    /// A non-expired marker from an interrupted checkout, if one exists.
    /// Expired markers are discarded silently. The host notifies the user
    /// and gives a short cancellation window before calling
    /// [`Self::resume_checkout`].
    #[must_use]
    pub fn pending_recovery(&self) -> Option<CheckoutMarker> {
        let marker = self.read_marker()?;
        if marker.is_expired(self.clock.now()) {
            log::debug!("Discarding expired checkout marker");
            self.clear_marker();
            return None;
        }
        Some(marker)
    }

    /// Cancel an offered recovery: the marker is cleared, nothing resumes.
    pub fn cancel_recovery(&self) {
        self.clear_marker();
    }

    /// Resume an interrupted checkout with the remembered plan type.
    /// Returns `None` when no live marker remains (cancelled or expired).
    pub async fn resume_checkout(
        &mut self,
        user: &UserIdentity,
    ) -> Result<Option<String>, CoreError> {
        match self.pending_recovery() {
            Some(marker) => self.start_checkout(user, marker.plan).await.map(Some),
            None => Ok(None),
        }
    }

    /// Consume the post-redirect `subscription=success|canceled` indicator.
    /// A recognized indicator clears the marker (that checkout is no longer
    /// in flight); a load without one leaves any live marker alone so the
    /// recovery flow can still offer it. A success triggers an immediate
    /// status check so gating reflects the new tier.
    pub async fn handle_redirect(
        &mut self,
        user: &UserIdentity,
        param: Option<&str>,
    ) -> Result<Option<CheckoutOutcome>, CoreError> {
        let Some(outcome) = param.and_then(CheckoutOutcome::from_param) else {
            return Ok(None);
        };
        self.clear_marker();

        if outcome == CheckoutOutcome::Success {
            self.check_status(user).await?;
        }
        Ok(Some(outcome))
    }

    // ── Marker plumbing ─────────────────────────────────────────────

    fn write_marker(&self, marker: &CheckoutMarker) {
        match serde_json::to_string(marker) {
            Ok(json) => self.scratch.set(CHECKOUT_MARKER_KEY, &json),
            Err(e) => log::error!("Failed to serialize checkout marker: {e}"),
        }
    }

    fn read_marker(&self) -> Option<CheckoutMarker> {
        let raw = self.scratch.get(CHECKOUT_MARKER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(marker) => Some(marker),
            Err(e) => {
                log::warn!("Dropping unreadable checkout marker: {e}");
                self.clear_marker();
                None
            }
        }
    }

    fn clear_marker(&self) {
        self.scratch.remove(CHECKOUT_MARKER_KEY);
    }
}
