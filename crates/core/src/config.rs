use crate::errors::CoreError;

/// Provider credentials and tunables.
///
/// `Default` gives sane values for everything except credentials, which the
/// host supplies directly or via [`Config::from_env`]. Missing required
/// credentials are a deployment error, caught at startup — never surfaced
/// mid-session to the user.
#[derive(Debug, Clone)]
pub struct Config {
    /// Alpha Vantage API key (market data).
    pub alpha_vantage_api_key: String,

    /// Stripe secret key (billing API).
    pub stripe_secret_key: String,

    /// Shared secret for verifying billing webhook signatures.
    /// Only required by hosts that mount the webhook receiver.
    pub stripe_webhook_secret: Option<String>,

    /// Origin the billing provider redirects back to after checkout.
    pub checkout_origin: String,

    /// Stock limit applied when the limits lookup table has no row for a tier.
    pub fallback_free_stock_limit: u32,
    pub fallback_premium_stock_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alpha_vantage_api_key: String::new(),
            stripe_secret_key: String::new(),
            stripe_webhook_secret: None,
            checkout_origin: "https://dividnd.com".to_string(),
            fallback_free_stock_limit: 10,
            fallback_premium_stock_limit: 50,
        }
    }
}

impl Config {
    /// Load credentials from the environment.
    ///
    /// Required: `ALPHA_VANTAGE_API_KEY`, `STRIPE_SECRET_KEY`.
    /// Optional: `STRIPE_WEBHOOK_SECRET`, `CHECKOUT_ORIGIN`.
    pub fn from_env() -> Result<Self, CoreError> {
        let alpha_vantage_api_key = required_env("ALPHA_VANTAGE_API_KEY")?;
        let stripe_secret_key = required_env("STRIPE_SECRET_KEY")?;
        let mut config = Self {
            alpha_vantage_api_key,
            stripe_secret_key,
            stripe_webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
            ..Self::default()
        };
        if let Ok(origin) = std::env::var("CHECKOUT_ORIGIN") {
            config.checkout_origin = origin;
        }
        Ok(config)
    }

    /// The webhook secret, or a `Configuration` error for hosts that need it.
    pub fn webhook_secret(&self) -> Result<&str, CoreError> {
        self.stripe_webhook_secret
            .as_deref()
            .ok_or_else(|| CoreError::Configuration("STRIPE_WEBHOOK_SECRET is not set".into()))
    }
}

fn required_env(name: &str) -> Result<String, CoreError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(CoreError::Configuration(format!("{name} is not set"))),
    }
}

/// How long a cached quote stays fresh before a live provider call is made.
pub const QUOTE_CACHE_TTL_HOURS: i64 = 24;

/// How often the entitlement state should be reconciled with the billing
/// provider. Gating decisions may be up to this much stale by design.
pub const RECONCILE_INTERVAL_MINUTES: i64 = 30;

/// A checkout marker older than this is discarded instead of resumed.
pub const CHECKOUT_MARKER_TTL_MINUTES: i64 = 30;

/// Batch-refresh mutual-exclusion flag lifetime. A crashed run stops
/// blocking new runs once the flag is this old.
pub const REFRESH_GUARD_TTL_MINUTES: i64 = 15;
