pub mod billing;
pub mod clock;
pub mod config;
pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

use billing::stripe::StripeBilling;
use billing::traits::BillingProvider;
use clock::{Clock, SystemClock};
use config::Config;
use errors::CoreError;
use models::{
    metrics::{DividendProjection, PortfolioMetrics},
    notice::Notice,
    portfolio::Portfolio,
    quote::{QuoteResponse, RefreshSummary},
    stock::StockHolding,
    subscription::{CheckoutMarker, CheckoutOutcome, EntitlementState, PlanType},
    user::UserIdentity,
};
use providers::alphavantage::AlphaVantageProvider;
use providers::traits::MarketDataProvider;
use services::{
    metrics_service::MetricsService, portfolio_service::PortfolioService,
    quote_service::QuoteService, subscription_service::SubscriptionService,
};
use storage::traits::{PortfolioRepository, ScratchStore};

/// Main entry point for one signed-in user's session.
///
/// Owns the in-session portfolio, the entitlement state, and a queue of
/// non-blocking notices for the host UI. All external collaborators
/// (row-store, market data, billing, scratch space, clock) are injected as
/// ports, so the core runs without a browser or network in tests.
///
/// Expected host flow on page load:
/// 1. [`DividendTracker::initialize`] — load holdings/goal, reconcile
///    entitlements.
/// 2. [`DividendTracker::handle_checkout_redirect`] with the
///    `subscription` query parameter, if present.
/// 3. [`DividendTracker::pending_checkout_recovery`], offering the user a
///    short cancellation window before [`DividendTracker::resume_checkout`].
/// Thereafter, call [`DividendTracker::check_subscription`] whenever
/// [`DividendTracker::reconcile_due`] reports the 30-minute bound expired.
#[must_use]
pub struct DividendTracker {
    user: UserIdentity,
    portfolio: Portfolio,
    metrics_service: MetricsService,
    portfolio_service: PortfolioService,
    quote_service: Arc<QuoteService>,
    subscription_service: SubscriptionService,
    clock: Arc<dyn Clock>,
    notices: VecDeque<Notice>,
}

impl std::fmt::Debug for DividendTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DividendTracker")
            .field("user", &self.user.id)
            .field("stocks", &self.portfolio.stocks.len())
            .field("dividend_goal", &self.portfolio.dividend_goal)
            .field("entitlement", &matches!(self.subscription_service.state(), EntitlementState::Ready(_)))
            .finish()
    }
}

impl DividendTracker {
    /// Build a session with explicit ports (the constructor tests use).
    pub fn new(
        user: UserIdentity,
        config: Config,
        provider: Arc<dyn MarketDataProvider>,
        repo: Arc<dyn PortfolioRepository>,
        billing: Arc<dyn BillingProvider>,
        scratch: Arc<dyn ScratchStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let quote_service = Arc::new(QuoteService::new(
            provider,
            Arc::clone(&repo),
            Arc::clone(&scratch),
            Arc::clone(&clock),
        ));
        let portfolio_service =
            PortfolioService::new(Arc::clone(&repo), Arc::clone(&quote_service));
        let subscription_service = SubscriptionService::new(
            billing,
            repo,
            scratch,
            Arc::clone(&clock),
            config,
        );

        Self {
            portfolio: Portfolio::new(user.id),
            user,
            metrics_service: MetricsService::new(),
            portfolio_service,
            quote_service,
            subscription_service,
            clock,
            notices: VecDeque::new(),
        }
    }

    /// Build a session wired to the real providers from configuration.
    /// Missing credentials fail here, at startup, never mid-session.
    pub fn with_defaults(
        user: UserIdentity,
        config: Config,
        repo: Arc<dyn PortfolioRepository>,
        scratch: Arc<dyn ScratchStore>,
    ) -> Result<Self, CoreError> {
        if config.alpha_vantage_api_key.trim().is_empty() {
            return Err(CoreError::Configuration(
                "ALPHA_VANTAGE_API_KEY is not set".into(),
            ));
        }
        if config.stripe_secret_key.trim().is_empty() {
            return Err(CoreError::Configuration("STRIPE_SECRET_KEY is not set".into()));
        }

        let provider: Arc<dyn MarketDataProvider> = Arc::new(AlphaVantageProvider::new(
            config.alpha_vantage_api_key.clone(),
        ));
        let billing: Arc<dyn BillingProvider> =
            Arc::new(StripeBilling::new(config.stripe_secret_key.clone()));
        Ok(Self::new(
            user,
            config,
            provider,
            repo,
            billing,
            scratch,
            Arc::new(SystemClock),
        ))
    }

    // ── Session bootstrap ───────────────────────────────────────────

    /// Load holdings and goal, then reconcile entitlements.
    ///
    /// Every failure here is soft: the session starts with an empty list
    /// or default goal plus an error notice, never a crashed render path.
    pub async fn initialize(&mut self) {
        match self.portfolio_service.load_stocks(self.user.id).await {
            Ok(stocks) => self.portfolio.stocks = stocks,
            Err(e) => {
                log::error!("Failed to load stocks: {e}");
                self.portfolio.stocks = Vec::new();
                self.push_notice(Notice::error(format!("Failed to load stocks: {e}")));
            }
        }

        match self.portfolio_service.load_goal(self.user.id).await {
            Ok(goal) => self.portfolio.dividend_goal = goal,
            Err(e) => {
                log::error!("Failed to load dividend goal: {e}");
                self.push_notice(Notice::error(format!("Failed to load dividend goal: {e}")));
            }
        }

        self.check_subscription().await;
    }

    // ── Holdings ────────────────────────────────────────────────────

    /// The in-session holdings list (always reflects persisted state).
    #[must_use]
    pub fn stocks(&self) -> &[StockHolding] {
        &self.portfolio.stocks
    }

    #[must_use]
    pub fn dividend_goal(&self) -> f64 {
        self.portfolio.dividend_goal
    }

    #[must_use]
    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    /// Add a holding. The entitlement gate runs first — a rejected add
    /// never reaches enrichment, persistence, or any network call.
    pub async fn add_stock(&mut self, holding: StockHolding) -> Result<Uuid, CoreError> {
        if !self
            .subscription_service
            .can_add_stock(self.portfolio.stock_count())
        {
            let limit = self.subscription_service.stock_limit();
            self.push_notice(Notice::warning(format!(
                "You've reached your plan's limit of {limit} stocks. Upgrade to add more."
            )));
            return Err(CoreError::LimitReached(limit));
        }

        match self
            .portfolio_service
            .add_stock(&mut self.portfolio, holding)
            .await
        {
            Ok(id) => Ok(id),
            Err(e) => {
                self.push_notice(Notice::error(format!("Failed to add stock: {e}")));
                Err(e)
            }
        }
    }

    /// Remove a holding by id.
    pub async fn remove_stock(&mut self, id: Uuid) -> Result<(), CoreError> {
        self.portfolio_service
            .remove_stock(&mut self.portfolio, id)
            .await
            .inspect_err(|e| {
                self.notices
                    .push_back(Notice::error(format!("Failed to remove stock: {e}")));
            })
    }

    /// Overwrite an existing holding.
    pub async fn update_stock(&mut self, holding: StockHolding) -> Result<(), CoreError> {
        self.portfolio_service
            .update_stock(&mut self.portfolio, holding)
            .await
            .inspect_err(|e| {
                self.notices
                    .push_back(Notice::error(format!("Failed to update stock: {e}")));
            })
    }

    /// Set the annual dividend goal. The local value updates immediately;
    /// a failed persist surfaces a notice but is not rolled back.
    pub async fn set_goal(&mut self, value: f64) -> Result<(), CoreError> {
        self.portfolio_service
            .set_goal(&mut self.portfolio, value)
            .await
            .inspect_err(|e| {
                self.notices
                    .push_back(Notice::error(format!("Failed to update dividend goal: {e}")));
            })
    }

    // ── Derived metrics ─────────────────────────────────────────────

    #[must_use]
    pub fn metrics(&self) -> PortfolioMetrics {
        self.metrics_service.compute_metrics(&self.portfolio.stocks)
    }

    #[must_use]
    pub fn dividend_projection(&self) -> DividendProjection {
        self.metrics_service
            .compute_dividend_projection(&self.portfolio.stocks)
    }

    /// Progress toward the annual goal, as a whole percentage in [0, 100].
    #[must_use]
    pub fn goal_progress(&self) -> u8 {
        let projection = self.dividend_projection();
        self.metrics_service
            .goal_progress(projection.annual_total, self.portfolio.dividend_goal)
    }

    /// Projected dividend for a given month (0 = January). The month comes
    /// from the host so the calculation itself stays clock-free.
    #[must_use]
    pub fn expected_dividend_for_month(&self, month_index: usize) -> f64 {
        let projection = self.dividend_projection();
        self.metrics_service
            .expected_for_month(&projection, month_index)
    }

    // ── Quotes ──────────────────────────────────────────────────────

    /// Look up a quote (cache-first). A `stale` response gets a warning
    /// notice attached for the host to display.
    pub async fn get_quote(&mut self, ticker: &str) -> Result<QuoteResponse, CoreError> {
        let response = self.quote_service.get_quote(ticker).await?;
        if response.stale {
            self.push_notice(Notice::warning(format!(
                "Market data for {} may be out of date (provider unavailable)",
                response.quote.ticker
            )));
        }
        Ok(response)
    }

    /// Run the scheduled refresh-all-tickers job, then re-fetch this
    /// session's holdings so updated prices are visible.
    pub async fn refresh_all_prices(&mut self) -> Result<RefreshSummary, CoreError> {
        let summary = self.quote_service.refresh_all().await?;
        if summary.rate_limited {
            self.push_notice(Notice::warning(
                "Price refresh was rate-limited; some tickers were not updated. Try again later.",
            ));
        }
        self.portfolio.stocks = self.portfolio_service.load_stocks(self.user.id).await?;
        Ok(summary)
    }

    // ── Subscription & entitlements ─────────────────────────────────

    #[must_use]
    pub fn entitlement_state(&self) -> &EntitlementState {
        self.subscription_service.state()
    }

    #[must_use]
    pub fn stock_limit(&self) -> u32 {
        self.subscription_service.stock_limit()
    }

    /// Pure gating predicate; see [`SubscriptionService::can_add_stock`].
    #[must_use]
    pub fn can_add_stock(&self) -> bool {
        self.subscription_service
            .can_add_stock(self.portfolio.stock_count())
    }

    #[must_use]
    pub fn reconcile_due(&self) -> bool {
        self.subscription_service.reconcile_due()
    }

    /// Reconcile entitlements with the billing provider. Failure after the
    /// bounded retries surfaces an error notice offering a manual retry.
    pub async fn check_subscription(&mut self) {
        match self.subscription_service.check_status(&self.user).await {
            Ok(status) => {
                let now = self.clock.now();
                if status.expiring_soon(now) {
                    if let Some(days) = status.days_until_renewal(now) {
                        let plural = if days == 1 { "" } else { "s" };
                        self.push_notice(Notice::info(format!(
                            "Your {} subscription will renew in {days} day{plural}.",
                            status.tier
                        )));
                    }
                }
            }
            Err(e) => {
                self.push_notice(Notice::error(format!(
                    "Failed to check subscription status: {e}. Try again."
                )));
            }
        }
    }

    /// Start a premium checkout; returns the provider URL to redirect to.
    /// After 3 consecutive failures the notice switches to a terminal
    /// contact-support message instead of offering another retry.
    pub async fn start_checkout(&mut self, plan: PlanType) -> Result<String, CoreError> {
        match self.subscription_service.start_checkout(&self.user, plan).await {
            Ok(url) => Ok(url),
            Err(e) => {
                if self.subscription_service.checkout_retries_exhausted() {
                    self.push_notice(Notice::error(
                        "Multiple checkout attempts failed. Please try again later or contact support.",
                    ));
                } else {
                    self.push_notice(Notice::error(format!(
                        "Failed to start checkout: {e}. Try again."
                    )));
                }
                Err(e)
            }
        }
    }

    /// Open the billing provider's self-service portal.
    pub async fn open_billing_portal(&mut self) -> Result<String, CoreError> {
        match self.subscription_service.open_billing_portal(&self.user).await {
            Ok(url) => Ok(url),
            Err(e) => {
                if self.subscription_service.portal_retries_exhausted() {
                    self.push_notice(Notice::error(
                        "Multiple attempts to open the billing portal failed. Please contact support.",
                    ));
                } else {
                    self.push_notice(Notice::error(format!(
                        "Failed to open the billing portal: {e}. Try again."
                    )));
                }
                Err(e)
            }
        }
    }

    /// Consume the post-checkout redirect indicator
    /// (`subscription=success|canceled`), emitting the matching notice.
    /// A load without a recognized indicator leaves any pending checkout
    /// marker untouched.
    pub async fn handle_checkout_redirect(
        &mut self,
        param: Option<&str>,
    ) -> Result<Option<CheckoutOutcome>, CoreError> {
        let result = self
            .subscription_service
            .handle_redirect(&self.user, param)
            .await;
        match &result {
            Ok(Some(CheckoutOutcome::Success)) => {
                self.push_notice(Notice::success("Subscription activated successfully!"));
            }
            Ok(Some(CheckoutOutcome::Canceled)) => {
                self.push_notice(Notice::info("Subscription checkout was canceled."));
            }
            Ok(None) => {}
            Err(e) => {
                // Only the post-success status check can fail here; the
                // subscription itself is already active on the provider side.
                self.push_notice(Notice::success("Subscription activated successfully!"));
                self.push_notice(Notice::error(format!(
                    "Failed to check subscription status: {e}. Try again."
                )));
            }
        }
        result
    }

    /// A resumable checkout from before a reload, if one exists. Emits the
    /// resuming notice; the host gives the user a short cancellation
    /// window before calling [`Self::resume_checkout`].
    pub fn pending_checkout_recovery(&mut self) -> Option<CheckoutMarker> {
        let marker = self.subscription_service.pending_recovery()?;
        self.push_notice(Notice::info(
            "Resuming previous subscription checkout... (cancel to abort)",
        ));
        Some(marker)
    }

    /// Abort a pending recovery.
    pub fn cancel_checkout_recovery(&mut self) {
        self.subscription_service.cancel_recovery();
    }

    /// Resume the interrupted checkout with its remembered plan. `None`
    /// when the marker was cancelled or expired in the meantime.
    pub async fn resume_checkout(&mut self) -> Result<Option<String>, CoreError> {
        self.subscription_service.resume_checkout(&self.user).await
    }

    // ── Notices ─────────────────────────────────────────────────────

    /// Drain queued notices for display. Non-blocking: nothing here ever
    /// crashes the session.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    fn push_notice(&mut self, notice: Notice) {
        self.notices.push_back(notice);
    }
}
