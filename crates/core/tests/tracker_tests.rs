// ═══════════════════════════════════════════════════════════════════
// Facade Tests — DividendTracker session flows
// ═══════════════════════════════════════════════════════════════════

mod common;

use chrono::Duration;
use std::sync::Arc;

use common::{
    ex_date, fixed_clock, holding, test_instant, test_user, ScriptedBilling, ScriptedProvider,
    ScriptedQuote,
};
use dividend_tracker_core::billing::traits::BillingProvider;
use dividend_tracker_core::clock::{Clock, FixedClock};
use dividend_tracker_core::config::Config;
use dividend_tracker_core::errors::CoreError;
use dividend_tracker_core::models::notice::NoticeLevel;
use dividend_tracker_core::models::subscription::{CheckoutOutcome, PlanType, Tier};
use dividend_tracker_core::providers::traits::MarketDataProvider;
use dividend_tracker_core::storage::memory::{InMemoryRepository, InMemoryScratch};
use dividend_tracker_core::storage::traits::{PortfolioRepository, ScratchStore};
use dividend_tracker_core::DividendTracker;

struct Harness {
    provider: Arc<ScriptedProvider>,
    repo: Arc<InMemoryRepository>,
    billing: Arc<ScriptedBilling>,
    clock: Arc<FixedClock>,
    tracker: DividendTracker,
}

fn harness_with_config(config: Config) -> Harness {
    let provider = Arc::new(ScriptedProvider::new());
    let repo = Arc::new(InMemoryRepository::new());
    let billing = Arc::new(ScriptedBilling::new());
    let clock = fixed_clock();
    repo.set_limit(Tier::Free, config.fallback_free_stock_limit);
    repo.set_limit(Tier::Premium, config.fallback_premium_stock_limit);

    let tracker = DividendTracker::new(
        test_user(),
        config,
        Arc::clone(&provider) as Arc<dyn MarketDataProvider>,
        Arc::clone(&repo) as Arc<dyn PortfolioRepository>,
        Arc::clone(&billing) as Arc<dyn BillingProvider>,
        Arc::new(InMemoryScratch::new()) as Arc<dyn ScratchStore>,
        Arc::clone(&clock) as Arc<dyn Clock>,
    );
    Harness {
        provider,
        repo,
        billing,
        clock,
        tracker,
    }
}

fn harness() -> Harness {
    harness_with_config(Config::default())
}

// ═══════════════════════════════════════════════════════════════════
// Session Bootstrap
// ═══════════════════════════════════════════════════════════════════

mod bootstrap {
    use super::*;

    #[tokio::test]
    async fn loads_holdings_goal_and_entitlements() {
        let mut h = harness();
        h.provider.quote("AAPL", 165.30, Some(0.55), None);
        h.tracker
            .add_stock(holding("AAPL", 10.0, 135.25, 135.25))
            .await
            .unwrap();

        // A second session over the same ports sees the persisted state.
        let mut fresh = DividendTracker::new(
            test_user(),
            Config::default(),
            Arc::clone(&h.provider) as Arc<dyn MarketDataProvider>,
            Arc::clone(&h.repo) as Arc<dyn PortfolioRepository>,
            Arc::clone(&h.billing) as Arc<dyn BillingProvider>,
            Arc::new(InMemoryScratch::new()) as Arc<dyn ScratchStore>,
            Arc::clone(&h.clock) as Arc<dyn Clock>,
        );
        fresh.initialize().await;

        assert_eq!(fresh.stocks().len(), 1);
        assert_eq!(fresh.dividend_goal(), 5000.0);
        assert_eq!(fresh.stock_limit(), 10);
    }

    #[tokio::test]
    async fn a_failed_load_starts_empty_with_an_error_notice() {
        let mut h = harness();
        h.repo.fail_on("list_stocks");

        h.tracker.initialize().await;

        assert!(h.tracker.stocks().is_empty());
        let notices = h.tracker.drain_notices();
        assert!(notices
            .iter()
            .any(|n| n.level == NoticeLevel::Error && n.message.contains("Failed to load stocks")));
    }

    #[tokio::test]
    async fn with_defaults_requires_credentials() {
        let result = DividendTracker::with_defaults(
            test_user(),
            Config::default(),
            Arc::new(InMemoryRepository::new()) as Arc<dyn PortfolioRepository>,
            Arc::new(InMemoryScratch::new()) as Arc<dyn ScratchStore>,
        );
        assert!(matches!(result, Err(CoreError::Configuration(_))));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Entitlement Gate
// ═══════════════════════════════════════════════════════════════════

mod entitlement_gate {
    use super::*;

    #[tokio::test]
    async fn the_limit_blocks_adds_before_any_external_call() {
        let mut h = harness_with_config(Config {
            fallback_free_stock_limit: 2,
            ..Config::default()
        });
        h.repo.set_limit(Tier::Free, 2);
        h.provider.quote("AAPL", 165.30, None, None);
        h.provider.quote("MSFT", 410.00, None, None);
        h.provider.quote("O", 54.64, None, None);

        h.tracker
            .add_stock(holding("AAPL", 1.0, 100.0, 100.0))
            .await
            .unwrap();
        h.tracker
            .add_stock(holding("MSFT", 1.0, 400.0, 400.0))
            .await
            .unwrap();
        let calls_before = h.provider.call_count();

        let result = h.tracker.add_stock(holding("O", 1.0, 50.0, 50.0)).await;
        assert!(matches!(result, Err(CoreError::LimitReached(2))));
        assert_eq!(h.provider.call_count(), calls_before);
        assert_eq!(h.tracker.stocks().len(), 2);

        let notices = h.tracker.drain_notices();
        assert!(notices
            .iter()
            .any(|n| n.level == NoticeLevel::Warning && n.message.contains("limit of 2")));
    }

    #[tokio::test]
    async fn a_premium_upgrade_unblocks_adds() {
        let mut h = harness_with_config(Config {
            fallback_free_stock_limit: 1,
            ..Config::default()
        });
        h.repo.set_limit(Tier::Free, 1);
        h.provider.quote("AAPL", 165.30, None, None);
        h.provider.quote("MSFT", 410.00, None, None);

        h.tracker
            .add_stock(holding("AAPL", 1.0, 100.0, 100.0))
            .await
            .unwrap();
        assert!(!h.tracker.can_add_stock());

        h.billing.add_customer("cus_1", &test_user().email);
        h.billing
            .add_subscription("cus_1", test_instant() + Duration::days(300));
        h.tracker.check_subscription().await;

        assert!(h.tracker.can_add_stock());
        h.tracker
            .add_stock(holding("MSFT", 1.0, 400.0, 400.0))
            .await
            .unwrap();
        assert_eq!(h.tracker.stocks().len(), 2);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Derived Metrics
// ═══════════════════════════════════════════════════════════════════

mod derived_metrics {
    use super::*;

    #[tokio::test]
    async fn metrics_and_projection_follow_the_holdings() {
        let mut h = harness();
        h.provider
            .quote("O", 54.64, Some(6.0), Some(ex_date(2025, 5, 30)));

        h.tracker
            .add_stock(holding("O", 20.0, 50.0, 50.0))
            .await
            .unwrap();

        let metrics = h.tracker.metrics();
        assert!((metrics.value - 20.0 * 54.64).abs() < 1e-9);

        // Enrichment found a yield but no cadence, so December gets it all.
        let projection = h.tracker.dividend_projection();
        assert!((projection.annual_total - 65.568).abs() < 1e-9);
        assert!((h.tracker.expected_dividend_for_month(11) - 65.568).abs() < 1e-9);
        assert_eq!(h.tracker.expected_dividend_for_month(3), 0.0);

        // 65.568 of 5000 rounds to 1%.
        assert_eq!(h.tracker.goal_progress(), 1);
    }

    #[tokio::test]
    async fn goal_changes_apply_immediately() {
        let mut h = harness();
        h.tracker.set_goal(100.0).await.unwrap();
        assert_eq!(h.tracker.dividend_goal(), 100.0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Quotes & Price Refresh
// ═══════════════════════════════════════════════════════════════════

mod quotes_and_refresh {
    use super::*;

    #[tokio::test]
    async fn a_stale_quote_raises_a_warning_notice() {
        let mut h = harness();
        h.provider.quote("AAPL", 165.30, None, None);
        h.tracker.get_quote("AAPL").await.unwrap();

        h.clock.advance(Duration::hours(25));
        h.provider.fail_with("AAPL", ScriptedQuote::RateLimited);

        let response = h.tracker.get_quote("AAPL").await.unwrap();
        assert!(response.stale);
        assert!(h
            .tracker
            .drain_notices()
            .iter()
            .any(|n| n.level == NoticeLevel::Warning && n.message.contains("out of date")));
    }

    #[tokio::test]
    async fn refreshing_prices_updates_the_session_holdings() {
        let mut h = harness();
        h.provider.quote("AAPL", 165.30, None, None);
        h.tracker
            .add_stock(holding("AAPL", 10.0, 135.25, 135.25))
            .await
            .unwrap();

        h.clock.advance(Duration::hours(25));
        h.provider.quote("AAPL", 180.00, None, None);

        let summary = h.tracker.refresh_all_prices().await.unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(h.tracker.stocks()[0].current_price, 180.00);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Subscription Flows
// ═══════════════════════════════════════════════════════════════════

mod subscription_flows {
    use super::*;

    #[tokio::test]
    async fn a_successful_redirect_activates_and_notifies() {
        let mut h = harness();
        h.billing.add_customer("cus_1", &test_user().email);
        h.billing
            .add_subscription("cus_1", test_instant() + Duration::days(300));

        h.tracker.start_checkout(PlanType::Monthly).await.unwrap();
        let outcome = h
            .tracker
            .handle_checkout_redirect(Some("success"))
            .await
            .unwrap();

        assert_eq!(outcome, Some(CheckoutOutcome::Success));
        assert_eq!(h.tracker.stock_limit(), 50);
        assert!(h
            .tracker
            .drain_notices()
            .iter()
            .any(|n| n.level == NoticeLevel::Success));
    }

    #[tokio::test]
    async fn a_reload_without_an_indicator_still_offers_recovery() {
        let mut h = harness();
        h.tracker.start_checkout(PlanType::Monthly).await.unwrap();
        h.clock.advance(Duration::minutes(10));

        // Ordinary reload: no subscription query parameter.
        let outcome = h.tracker.handle_checkout_redirect(None).await.unwrap();
        assert_eq!(outcome, None);

        let marker = h.tracker.pending_checkout_recovery().unwrap();
        assert_eq!(marker.plan, PlanType::Monthly);
    }

    #[tokio::test(start_paused = true)]
    async fn a_failed_post_checkout_check_still_reports_activation() {
        let mut h = harness();
        h.tracker.start_checkout(PlanType::Monthly).await.unwrap();
        h.billing.fail_find_customer_times(5);

        let result = h.tracker.handle_checkout_redirect(Some("success")).await;
        assert!(result.is_err());

        let notices = h.tracker.drain_notices();
        assert!(notices
            .iter()
            .any(|n| n.level == NoticeLevel::Success && n.message.contains("activated")));
        assert!(notices.iter().any(|n| n.level == NoticeLevel::Error
            && n.message.contains("Failed to check subscription status")));
    }

    #[tokio::test]
    async fn an_interrupted_checkout_can_be_resumed() {
        let mut h = harness();
        h.tracker.start_checkout(PlanType::Annual).await.unwrap();

        // Reload: the marker survives in the scratch space.
        let marker = h.tracker.pending_checkout_recovery().unwrap();
        assert_eq!(marker.plan, PlanType::Annual);

        let url = h.tracker.resume_checkout().await.unwrap();
        assert_eq!(url, Some("https://dividnd.com/checkout/annual".to_string()));
    }

    #[tokio::test]
    async fn cancelling_a_recovery_stops_the_resume() {
        let mut h = harness();
        h.tracker.start_checkout(PlanType::Monthly).await.unwrap();

        h.tracker.pending_checkout_recovery().unwrap();
        h.tracker.cancel_checkout_recovery();
        assert_eq!(h.tracker.resume_checkout().await.unwrap(), None);
    }

    #[tokio::test]
    async fn repeated_checkout_failures_surface_a_terminal_notice() {
        let mut h = harness();
        h.billing.fail_sessions(true);

        for _ in 0..3 {
            let _ = h.tracker.start_checkout(PlanType::Monthly).await;
        }

        let notices = h.tracker.drain_notices();
        assert!(notices
            .iter()
            .any(|n| n.message.contains("contact support")));
    }

    #[tokio::test]
    async fn an_upcoming_renewal_raises_a_reminder() {
        let mut h = harness();
        h.billing.add_customer("cus_1", &test_user().email);
        h.billing
            .add_subscription("cus_1", test_instant() + Duration::days(3));

        h.tracker.check_subscription().await;

        let notices = h.tracker.drain_notices();
        assert!(notices
            .iter()
            .any(|n| n.level == NoticeLevel::Info && n.message.contains("renew in 3 days")));
    }

    #[tokio::test(start_paused = true)]
    async fn a_failed_status_check_offers_a_retry() {
        let mut h = harness();
        h.billing.fail_find_customer_times(5);

        h.tracker.check_subscription().await;

        let notices = h.tracker.drain_notices();
        assert!(notices.iter().any(|n| n.level == NoticeLevel::Error
            && n.message.contains("Failed to check subscription status")));
        // Gating still works on the free default.
        assert_eq!(h.tracker.stock_limit(), 10);
    }
}
