use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::traits::MarketDataProvider;
use crate::errors::CoreError;
use crate::models::quote::Quote;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_NAME: &str = "Alpha Vantage";

/// Alpha Vantage API provider for stock quotes and dividend metadata.
///
/// - **Free tier**: 25 requests/day, 5 calls/minute — cache aggressively.
/// - **Requires**: API key.
/// - **Endpoints used**: GLOBAL_QUOTE (latest price) and OVERVIEW
///   (dividend yield as a fraction, ex-dividend date).
///
/// A throttled request comes back as HTTP 200 with a `Note` or
/// `Information` field instead of data; that maps to `RateLimited` so the
/// cache layer can fall back to a stale entry.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
}

impl AlphaVantageProvider {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, api_key }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        function: &str,
        symbol: &str,
    ) -> Result<T, CoreError> {
        let resp = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", function),
                ("symbol", &symbol.to_uppercase()),
                ("apikey", &self.api_key),
            ])
            .send()
            .await?;

        resp.json().await.map_err(|e| CoreError::Upstream {
            provider: PROVIDER_NAME.into(),
            message: format!("Failed to parse {function} response for {symbol}: {e}"),
        })
    }
}

// ── Alpha Vantage API response types ────────────────────────────────

#[derive(Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
}

#[derive(Deserialize)]
struct OverviewResponse {
    #[serde(rename = "DividendYield")]
    dividend_yield: Option<String>,
    #[serde(rename = "ExDividendDate")]
    ex_dividend_date: Option<String>,
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch_quote(&self, ticker: &str) -> Result<Quote, CoreError> {
        let quote_resp: GlobalQuoteResponse = self.get_json("GLOBAL_QUOTE", ticker).await?;

        // Throttle signal arrives as a 200 with a Note/Information body.
        if let Some(note) = quote_resp.note.or(quote_resp.information) {
            return Err(CoreError::RateLimited(note));
        }

        let price_str = quote_resp
            .global_quote
            .and_then(|q| q.price)
            .ok_or_else(|| CoreError::NotFound(ticker.to_uppercase()))?;

        let price: f64 = price_str.parse().map_err(|e| CoreError::Upstream {
            provider: PROVIDER_NAME.into(),
            message: format!("Invalid price format for {ticker}: {e}"),
        })?;

        // Dividend metadata is best-effort: the overview call failing or
        // carrying no dividend fields still yields a usable quote.
        let mut quote = Quote {
            ticker: ticker.to_uppercase(),
            price,
            dividend_yield: None,
            ex_dividend_date: None,
        };

        match self.get_json::<OverviewResponse>("OVERVIEW", ticker).await {
            Ok(overview) => {
                // Provider reports the yield as a fraction; convert to percent.
                quote.dividend_yield = overview
                    .dividend_yield
                    .and_then(|y| y.parse::<f64>().ok())
                    .map(|y| y * 100.0);
                quote.ex_dividend_date = overview
                    .ex_dividend_date
                    .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok());
            }
            Err(e) => {
                log::warn!("Dividend overview lookup failed for {ticker}: {e}");
            }
        }

        Ok(quote)
    }
}
