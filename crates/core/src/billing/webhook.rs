use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;

use super::traits::BillingProvider;
use crate::clock::Clock;
use crate::errors::CoreError;
use crate::models::subscription::{SubscriberRecord, Tier};
use crate::storage::traits::PortfolioRepository;

type HmacSha256 = Hmac<Sha256>;

/// Reject webhook payloads whose signature timestamp is older than this,
/// limiting the replay window.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Receiver for billing-provider webhook events. Verifies the signature
/// with the shared secret, then reconciles the local subscriber record so
/// gating decisions track provider-side changes without polling.
pub struct WebhookHandler {
    repo: Arc<dyn PortfolioRepository>,
    billing: Arc<dyn BillingProvider>,
    clock: Arc<dyn Clock>,
    secret: String,
}

// ── Webhook payload types ───────────────────────────────────────────

#[derive(Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Deserialize)]
struct EventData {
    object: EventObject,
}

#[derive(Deserialize)]
struct EventObject {
    customer: Option<String>,
    status: Option<String>,
    current_period_end: Option<i64>,
}

impl WebhookHandler {
    #[must_use]
    pub fn new(
        repo: Arc<dyn PortfolioRepository>,
        billing: Arc<dyn BillingProvider>,
        clock: Arc<dyn Clock>,
        secret: String,
    ) -> Self {
        Self {
            repo,
            billing,
            clock,
            secret,
        }
    }

    /// Verify and process one webhook delivery.
    ///
    /// `signature_header` is the provider's `t=<epoch>,v1=<hex>` header.
    /// Unhandled event types are logged and acknowledged as Ok.
    pub async fn handle(&self, payload: &str, signature_header: &str) -> Result<(), CoreError> {
        self.verify_signature(payload, signature_header)?;

        let event: WebhookEvent = serde_json::from_str(payload)?;
        log::info!("Webhook event received: {}", event.kind);

        match event.kind.as_str() {
            "customer.subscription.updated" | "customer.subscription.deleted" => {
                self.reconcile_subscription(&event.data.object).await
            }
            "invoice.payment_failed" => {
                // Flagged for follow-up only; the next status check or
                // subscription.updated event carries the state change.
                if let Some(customer_id) = &event.data.object.customer {
                    log::warn!("Payment failed for billing customer {customer_id}");
                }
                Ok(())
            }
            other => {
                log::debug!("Unhandled webhook event type: {other}");
                Ok(())
            }
        }
    }

    async fn reconcile_subscription(&self, object: &EventObject) -> Result<(), CoreError> {
        let customer_id = object
            .customer
            .as_deref()
            .ok_or_else(|| CoreError::Validation("webhook event has no customer id".into()))?;

        let email = self
            .billing
            .customer_email(customer_id)
            .await?
            .ok_or_else(|| CoreError::Validation("billing customer has no email".into()))?;

        let is_active = object.status.as_deref() == Some("active");
        let period_end = if is_active {
            object
                .current_period_end
                .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        } else {
            None
        };
        let tier = if is_active { Tier::Premium } else { Tier::Free };

        // Keep the user id already on record, if any.
        let existing_user_id = self
            .repo
            .find_subscriber(&email)
            .await?
            .and_then(|r| r.user_id);

        self.repo
            .upsert_subscriber(SubscriberRecord {
                email: email.clone(),
                user_id: existing_user_id,
                billing_customer_id: Some(customer_id.to_string()),
                subscribed: is_active,
                tier,
                period_end,
                updated_at: self.clock.now(),
            })
            .await?;

        log::info!("Reconciled subscriber {email}: tier={tier}, subscribed={is_active}");
        Ok(())
    }

    fn verify_signature(&self, payload: &str, header: &str) -> Result<(), CoreError> {
        let mut timestamp: Option<i64> = None;
        let mut signature: Option<Vec<u8>> = None;

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => signature = hex::decode(value).ok(),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| CoreError::WebhookSignature("missing timestamp".into()))?;
        let signature =
            signature.ok_or_else(|| CoreError::WebhookSignature("missing v1 signature".into()))?;

        let age = self.clock.now().timestamp() - timestamp;
        if age.abs() > SIGNATURE_TOLERANCE_SECS {
            return Err(CoreError::WebhookSignature(format!(
                "timestamp outside tolerance ({age}s)"
            )));
        }

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| CoreError::WebhookSignature("invalid secret".into()))?;
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| CoreError::WebhookSignature("signature mismatch".into()))
    }
}

/// Build a `t=...,v1=...` signature header for a payload. Test helper and
/// reference for how the provider signs deliveries.
#[must_use]
pub fn sign_payload(payload: &str, secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    let sig = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={sig}")
}
