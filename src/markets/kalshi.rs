//! Kalshi market-listing integration.
//!
//! Pulls open events for one series (EUR/USD strikes) and reduces the
//! listing to a single most-likely outcome.
//!
//! API docs: https://trading-api.readme.io/reference
//! Base URL (demo): https://demo-api.kalshi.co/trade-api/v2
//! Auth: not required for public event listings.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::MarketSource;
use crate::config::MarketConfig;
use crate::types::{Event, FetchOutcome, Market, OracleError, SelectedOutcome};

const SOURCE_NAME: &str = "kalshi";

/// Sort key for events missing a strike date — pushes them last.
const FAR_FUTURE: &str = "9999-12-31T23:59:59Z";

// ---------------------------------------------------------------------------
// API response types (Kalshi JSON → Rust)
// ---------------------------------------------------------------------------

/// Response from `GET /events`. We only deserialize the fields we need.
#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Vec<ApiEvent>,
}

#[derive(Debug, Deserialize)]
struct ApiEvent {
    #[serde(default)]
    event_ticker: String,
    #[serde(default)]
    strike_date: Option<String>,
    #[serde(default)]
    markets: Vec<ApiMarket>,
}

#[derive(Debug, Deserialize)]
struct ApiMarket {
    ticker: String,
    #[serde(default)]
    yes_bid: Option<i64>,
    #[serde(default)]
    no_ask: Option<i64>,
}

impl From<ApiEvent> for Event {
    fn from(e: ApiEvent) -> Self {
        Event {
            event_ticker: e.event_ticker,
            strike_date: e.strike_date,
            markets: e
                .markets
                .into_iter()
                .map(|m| Market {
                    ticker: m.ticker,
                    yes_bid: m.yes_bid,
                    no_ask: m.no_ask,
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Kalshi market-listing client for a single series.
pub struct KalshiClient {
    http: Client,
    base_url: String,
    series_ticker: String,
}

impl KalshiClient {
    /// Create a new Kalshi client from the market config.
    pub fn new(cfg: &MarketConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.request_timeout_secs))
            .user_agent("kalshilink/0.1.0 (oracle-server)")
            .build()
            .context("Failed to build HTTP client for Kalshi")?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            series_ticker: cfg.series_ticker.clone(),
        })
    }

    /// Fetch all open events for the configured series.
    async fn fetch_open_events(&self) -> Result<Vec<Event>, OracleError> {
        let url = format!(
            "{}/events?series_ticker={}&status=open&with_nested_markets=true",
            self.base_url,
            urlencoding::encode(&self.series_ticker),
        );

        debug!(url = %url, "Fetching Kalshi events");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| OracleError::Upstream(format!("Kalshi request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(OracleError::Upstream(format!(
                "Kalshi API error {status}: {body}"
            )));
        }

        let listing: EventsResponse = resp
            .json()
            .await
            .map_err(|e| OracleError::Upstream(format!("Kalshi response malformed: {e}")))?;

        Ok(listing.events.into_iter().map(Event::from).collect())
    }

    /// Reduce an event listing to the most likely outcome of the
    /// nearest-dated event.
    ///
    /// Events are ordered by `strike_date` ascending (missing dates last);
    /// within the first event, markets are ranked by implied probability
    /// descending. Both sorts are stable, so ties keep listing order.
    fn select_outcome(mut events: Vec<Event>) -> FetchOutcome {
        if events.is_empty() {
            return FetchOutcome::Empty;
        }

        events.sort_by(|a, b| {
            let ka = a.strike_date.as_deref().unwrap_or(FAR_FUTURE);
            let kb = b.strike_date.as_deref().unwrap_or(FAR_FUTURE);
            ka.cmp(kb)
        });

        let event = events.remove(0);
        if event.markets.is_empty() {
            return FetchOutcome::Empty;
        }

        let mut ranked: Vec<&Market> = event.markets.iter().collect();
        ranked.sort_by(|a, b| {
            b.implied_probability()
                .partial_cmp(&a.implied_probability())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let top = ranked[0];
        FetchOutcome::Selected(SelectedOutcome {
            ticker: top.ticker.clone(),
            probability: top.implied_probability(),
            price: extract_price(&top.ticker),
            yes_bid: top.yes_bid,
            no_ask: top.no_ask,
            strike_date: event.strike_date.clone(),
        })
    }
}

/// Extract the strike price from a ticker.
///
/// Ticker format: `KXEURUSD-25NOV1810-T1.17399` (above) or `-B1.17399`
/// (below). The last `-` segment carries the price, prefixed with the
/// side marker.
pub fn extract_price(ticker: &str) -> String {
    let last = ticker.rsplit('-').next().unwrap_or(ticker);
    match last.strip_prefix('T').or_else(|| last.strip_prefix('B')) {
        Some(stripped) => stripped.to_string(),
        None => last.to_string(),
    }
}

// ---------------------------------------------------------------------------
// MarketSource trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl MarketSource for KalshiClient {
    async fn latest_outcome(&self) -> Result<FetchOutcome, OracleError> {
        let events = self.fetch_open_events().await?;
        let count = events.len();
        let outcome = Self::select_outcome(events);

        match &outcome {
            FetchOutcome::Selected(s) => {
                info!(
                    events = count,
                    ticker = %s.ticker,
                    price = %s.price,
                    probability = s.probability,
                    "Kalshi outcome selected"
                );
            }
            FetchOutcome::Empty => {
                warn!(series = %self.series_ticker, "No open Kalshi events");
            }
        }

        Ok(outcome)
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
