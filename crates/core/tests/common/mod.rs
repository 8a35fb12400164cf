#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use dividend_tracker_core::billing::traits::{
    ActiveSubscription, BillingProvider, CustomerRef, HostedSession,
};
use dividend_tracker_core::clock::FixedClock;
use dividend_tracker_core::errors::CoreError;
use dividend_tracker_core::models::quote::Quote;
use dividend_tracker_core::models::stock::{DividendFrequency, StockHolding};
use dividend_tracker_core::models::subscription::PlanType;
use dividend_tracker_core::models::user::UserIdentity;
use dividend_tracker_core::providers::traits::MarketDataProvider;

pub fn test_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(test_instant()))
}

pub fn test_user() -> UserIdentity {
    UserIdentity::new(
        Uuid::parse_str("6f2b0f3e-7c1a-4f7e-9a7b-2f4a1c8d9e01").unwrap(),
        "investor@example.com",
    )
}

pub fn holding(ticker: &str, quantity: f64, purchase: f64, current: f64) -> StockHolding {
    StockHolding::new(ticker, quantity, purchase, current).unwrap()
}

pub fn dividend_holding(
    ticker: &str,
    quantity: f64,
    purchase: f64,
    current: f64,
    yield_pct: f64,
    frequency: DividendFrequency,
) -> StockHolding {
    holding(ticker, quantity, purchase, current).with_dividend(yield_pct, frequency, None)
}

pub fn ex_date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// What the scripted provider returns for a ticker. Errors are rebuilt on
/// every call since `CoreError` is not `Clone`.
pub enum ScriptedQuote {
    Quote(Quote),
    RateLimited,
    Network,
    NotFound,
}

/// Market-data mock with per-ticker scripted responses and a call counter.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<HashMap<String, ScriptedQuote>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quote(
        &self,
        ticker: &str,
        price: f64,
        dividend_yield: Option<f64>,
        ex_dividend_date: Option<NaiveDate>,
    ) {
        self.responses.lock().unwrap().insert(
            ticker.to_uppercase(),
            ScriptedQuote::Quote(Quote {
                ticker: ticker.to_uppercase(),
                price,
                dividend_yield,
                ex_dividend_date,
            }),
        );
    }

    pub fn fail_with(&self, ticker: &str, response: ScriptedQuote) {
        self.responses
            .lock()
            .unwrap()
            .insert(ticker.to_uppercase(), response);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_quote(&self, ticker: &str) -> Result<Quote, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let responses = self.responses.lock().unwrap();
        match responses.get(&ticker.to_uppercase()) {
            Some(ScriptedQuote::Quote(q)) => Ok(q.clone()),
            Some(ScriptedQuote::RateLimited) => {
                Err(CoreError::RateLimited("scripted limit".into()))
            }
            Some(ScriptedQuote::Network) => Err(CoreError::Network("scripted outage".into())),
            Some(ScriptedQuote::NotFound) | None => {
                Err(CoreError::NotFound(ticker.to_uppercase()))
            }
        }
    }
}

/// Billing mock: in-memory customers and subscriptions, with switches for
/// flaky lookups and failing session creation.
#[derive(Default)]
pub struct ScriptedBilling {
    customers: Mutex<HashMap<String, CustomerRef>>,
    subscriptions: Mutex<HashMap<String, ActiveSubscription>>,
    find_customer_failures: Mutex<u32>,
    fail_sessions: Mutex<bool>,
    find_customer_calls: AtomicUsize,
    checkout_calls: AtomicUsize,
}

impl ScriptedBilling {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_customer(&self, id: &str, email: &str) {
        self.customers.lock().unwrap().insert(
            email.to_lowercase(),
            CustomerRef {
                id: id.to_string(),
                email: email.to_string(),
            },
        );
    }

    pub fn add_subscription(&self, customer_id: &str, period_end: DateTime<Utc>) {
        self.subscriptions.lock().unwrap().insert(
            customer_id.to_string(),
            ActiveSubscription {
                id: format!("sub_{customer_id}"),
                current_period_end: period_end,
            },
        );
    }

    /// Make the next `n` customer lookups fail with a network error.
    pub fn fail_find_customer_times(&self, n: u32) {
        *self.find_customer_failures.lock().unwrap() = n;
    }

    pub fn fail_sessions(&self, fail: bool) {
        *self.fail_sessions.lock().unwrap() = fail;
    }

    pub fn find_customer_calls(&self) -> usize {
        self.find_customer_calls.load(Ordering::SeqCst)
    }

    pub fn checkout_calls(&self) -> usize {
        self.checkout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BillingProvider for ScriptedBilling {
    async fn find_customer(&self, email: &str) -> Result<Option<CustomerRef>, CoreError> {
        self.find_customer_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut failures = self.find_customer_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(CoreError::Network("scripted billing outage".into()));
            }
        }
        Ok(self
            .customers
            .lock()
            .unwrap()
            .get(&email.to_lowercase())
            .cloned())
    }

    async fn active_subscription(
        &self,
        customer_id: &str,
    ) -> Result<Option<ActiveSubscription>, CoreError> {
        Ok(self.subscriptions.lock().unwrap().get(customer_id).cloned())
    }

    async fn create_checkout_session(
        &self,
        _customer: Option<&CustomerRef>,
        _email: &str,
        plan: PlanType,
        _unit_amount_cents: u32,
        origin: &str,
    ) -> Result<HostedSession, CoreError> {
        self.checkout_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_sessions.lock().unwrap() {
            return Err(CoreError::Upstream {
                provider: "scripted billing".into(),
                message: "checkout unavailable".into(),
            });
        }
        Ok(HostedSession {
            url: format!("{origin}/checkout/{plan}"),
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        origin: &str,
    ) -> Result<HostedSession, CoreError> {
        if *self.fail_sessions.lock().unwrap() {
            return Err(CoreError::Upstream {
                provider: "scripted billing".into(),
                message: "portal unavailable".into(),
            });
        }
        Ok(HostedSession {
            url: format!("{origin}/portal/{customer_id}"),
        })
    }

    async fn customer_email(&self, customer_id: &str) -> Result<Option<String>, CoreError> {
        Ok(self
            .customers
            .lock()
            .unwrap()
            .values()
            .find(|c| c.id == customer_id)
            .map(|c| c.email.clone()))
    }
}
