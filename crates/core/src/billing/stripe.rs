use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::traits::{ActiveSubscription, BillingProvider, CustomerRef, HostedSession};
use crate::errors::CoreError;
use crate::models::subscription::PlanType;

const BASE_URL: &str = "https://api.stripe.com/v1";
const PROVIDER_NAME: &str = "Stripe";

/// Stripe REST client covering the consumed billing operations.
/// All requests are form-encoded with bearer auth, per the Stripe API.
pub struct StripeBilling {
    client: Client,
    secret_key: String,
}

impl StripeBilling {
    #[must_use]
    pub fn new(secret_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, secret_key }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CoreError> {
        let resp = self
            .client
            .get(format!("{BASE_URL}{path}"))
            .bearer_auth(&self.secret_key)
            .query(query)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, CoreError> {
        let resp = self
            .client
            .post(format!("{BASE_URL}{path}"))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, CoreError> {
        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::RateLimited("billing provider throttled".into()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            return Err(CoreError::Upstream {
                provider: PROVIDER_NAME.into(),
                message,
            });
        }
        resp.json().await.map_err(|e| CoreError::Upstream {
            provider: PROVIDER_NAME.into(),
            message: format!("Failed to parse response: {e}"),
        })
    }
}

// ── Stripe API response types ───────────────────────────────────────

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Deserialize)]
struct ListEnvelope<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct CustomerObject {
    id: String,
    email: Option<String>,
}

#[derive(Deserialize)]
struct SubscriptionObject {
    id: String,
    current_period_end: i64,
}

#[derive(Deserialize)]
struct SessionObject {
    url: String,
}

#[async_trait]
impl BillingProvider for StripeBilling {
    async fn find_customer(&self, email: &str) -> Result<Option<CustomerRef>, CoreError> {
        let list: ListEnvelope<CustomerObject> = self
            .get("/customers", &[("email", email), ("limit", "1")])
            .await?;
        Ok(list.data.into_iter().next().map(|c| CustomerRef {
            id: c.id,
            email: c.email.unwrap_or_else(|| email.to_string()),
        }))
    }

    async fn active_subscription(
        &self,
        customer_id: &str,
    ) -> Result<Option<ActiveSubscription>, CoreError> {
        let list: ListEnvelope<SubscriptionObject> = self
            .get(
                "/subscriptions",
                &[
                    ("customer", customer_id),
                    ("status", "active"),
                    ("limit", "1"),
                ],
            )
            .await?;
        Ok(list.data.into_iter().next().map(|s| ActiveSubscription {
            id: s.id,
            current_period_end: epoch_to_utc(s.current_period_end),
        }))
    }

    async fn create_checkout_session(
        &self,
        customer: Option<&CustomerRef>,
        email: &str,
        plan: PlanType,
        unit_amount_cents: u32,
        origin: &str,
    ) -> Result<HostedSession, CoreError> {
        let (product_name, interval) = match plan {
            PlanType::Monthly => ("Monthly Premium Subscription", "month"),
            PlanType::Annual => ("Annual Premium Subscription", "year"),
        };

        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "subscription".into()),
            (
                "success_url".into(),
                format!("{origin}/dashboard?subscription=success"),
            ),
            (
                "cancel_url".into(),
                format!("{origin}/dashboard?subscription=canceled"),
            ),
            ("line_items[0][quantity]".into(), "1".into()),
            (
                "line_items[0][price_data][currency]".into(),
                "usd".into(),
            ),
            (
                "line_items[0][price_data][product_data][name]".into(),
                product_name.into(),
            ),
            (
                "line_items[0][price_data][unit_amount]".into(),
                unit_amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][recurring][interval]".into(),
                interval.into(),
            ),
        ];

        // Attach the existing customer when known, otherwise let the
        // provider create one from the email.
        match customer {
            Some(c) => form.push(("customer".into(), c.id.clone())),
            None => form.push(("customer_email".into(), email.into())),
        }

        let session: SessionObject = self.post("/checkout/sessions", &form).await?;
        Ok(HostedSession { url: session.url })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        origin: &str,
    ) -> Result<HostedSession, CoreError> {
        let form: Vec<(String, String)> = vec![
            ("customer".into(), customer_id.into()),
            ("return_url".into(), format!("{origin}/dashboard")),
        ];
        let session: SessionObject = self.post("/billing_portal/sessions", &form).await?;
        Ok(HostedSession { url: session.url })
    }

    async fn customer_email(&self, customer_id: &str) -> Result<Option<String>, CoreError> {
        let customer: CustomerObject = self
            .get(&format!("/customers/{customer_id}"), &[])
            .await?;
        Ok(customer.email)
    }
}

fn epoch_to_utc(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}
