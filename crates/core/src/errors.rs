use thiserror::Error;

/// Unified error type for the entire dividend-tracker-core library.
/// Every public fallible function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── User input ──────────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    Validation(String),

    // ── Market data ─────────────────────────────────────────────────
    #[error("No data found for ticker {0}")]
    NotFound(String),

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    // ── External collaborators ──────────────────────────────────────
    #[error("Upstream error ({provider}): {message}")]
    Upstream {
        provider: String,
        message: String,
    },

    #[error("Authentication required: {0}")]
    Auth(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Network error: {0}")]
    Network(String),

    // ── Entitlements ────────────────────────────────────────────────
    #[error("Stock limit reached ({0} stocks) — upgrade to add more")]
    LimitReached(u32),

    // ── Webhooks ────────────────────────────────────────────────────
    #[error("Webhook signature verification failed: {0}")]
    WebhookSignature(String),

    // ── Plumbing ────────────────────────────────────────────────────
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Job already running: {0}")]
    Busy(String),
}

impl CoreError {
    /// Transient errors are worth retrying for idempotent reads.
    /// Mutations are never silently retried regardless of this flag.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::Network(_) | CoreError::RateLimited(_) | CoreError::Upstream { .. }
        )
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // Sanitize error message: strip query parameters from URLs to prevent
        // API key leakage. reqwest errors often contain full URLs with secrets.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::Network(sanitized)
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}
