//! REST API route handlers.
//!
//! All endpoints return JSON. Errors use a `{"detail": "..."}` body with
//! the matching status code. State is shared via `Arc<ApiState>`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::chain::ChainGateway;
use crate::mapper;
use crate::markets::MarketSource;
use crate::types::{
    ChainHealth, DataPoint, MintReport, OracleError, OracleInfo, OracleSubmission,
    SelectedOutcome, SubmissionReceipt, TokenBalances,
};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub chain: Arc<dyn ChainGateway>,
    pub markets: Arc<dyn MarketSource>,
    /// Offset added to submission time when a request omits the
    /// resolution timestamp.
    pub resolution_window_secs: u64,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Error shape
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
}

/// Map domain errors to HTTP: caller mistakes are 400, upstream and
/// chain failures are 502.
fn map_error(e: OracleError) -> ApiError {
    let status = match e {
        OracleError::InvalidPrice(_) | OracleError::ValueOutOfRange(_) | OracleError::Config(_) => {
            StatusCode::BAD_REQUEST
        }
        OracleError::Upstream(_) | OracleError::Chain(_) => StatusCode::BAD_GATEWAY,
    };
    api_error(status, e.to_string())
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub market_source: String,
    pub uptime_secs: i64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub chain: ChainHealth,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub value: u64,
    /// Defaults to now.
    pub timestamp: Option<u64>,
    /// Defaults to timestamp + the configured resolution window.
    pub resolution_timestamp: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub value: u64,
    pub value_percentage: f64,
    pub timestamp: u64,
    pub resolution_timestamp: u64,
    pub receipt: SubmissionReceipt,
}

#[derive(Debug, Serialize)]
pub struct SubmitLatestResponse {
    pub success: bool,
    pub market: SelectedOutcome,
    pub target_percentage: u64,
    pub oracle_value: u64,
    pub receipt: SubmissionReceipt,
}

#[derive(Debug, Deserialize)]
pub struct AddressQuery {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balances: TokenBalances,
}

#[derive(Debug, Serialize)]
pub struct MintResponse {
    pub address: String,
    pub tokens: MintReport,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /service
pub async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    let uptime = (chrono::Utc::now() - state.started_at).num_seconds();
    Json(ServiceInfo {
        service: "kalshilink".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        market_source: state.markets.name().to_string(),
        uptime_secs: uptime,
    })
}

/// GET /health
pub async fn health(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<HealthResponse>), ApiError> {
    let chain = state.chain.health().await.map_err(map_error)?;
    let (status, label) = if chain.connected {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };
    Ok((
        status,
        Json(HealthResponse {
            status: label.into(),
            chain,
        }),
    ))
}

/// GET /oracle/info
pub async fn oracle_info(State(state): State<AppState>) -> Result<Json<OracleInfo>, ApiError> {
    state.chain.oracle_info().await.map(Json).map_err(map_error)
}

/// GET /oracle/data/:index
pub async fn data_point(
    State(state): State<AppState>,
    Path(index): Path<u64>,
) -> Result<Json<DataPoint>, ApiError> {
    let info = state.chain.oracle_info().await.map_err(map_error)?;
    if index >= info.total_data_points {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!(
                "Data point {index} not found ({} stored)",
                info.total_data_points
            ),
        ));
    }
    state
        .chain
        .data_point(index)
        .await
        .map(Json)
        .map_err(map_error)
}

/// POST /oracle/submit
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let timestamp = req
        .timestamp
        .unwrap_or_else(|| chrono::Utc::now().timestamp() as u64);
    let submission = OracleSubmission {
        value: req.value,
        timestamp,
        resolution_timestamp: req
            .resolution_timestamp
            .unwrap_or(timestamp + state.resolution_window_secs),
    };
    submission.validate().map_err(map_error)?;

    let receipt = state
        .chain
        .submit_data(&submission)
        .await
        .map_err(map_error)?;

    Ok(Json(SubmitResponse {
        success: receipt.confirmed,
        value: submission.value,
        value_percentage: submission.value_percentage(),
        timestamp: submission.timestamp,
        resolution_timestamp: submission.resolution_timestamp,
        receipt,
    }))
}

/// POST /oracle/submit-latest
///
/// Runs the full fetch → map → submit pipeline on demand. Only the
/// oracle contract is written; the treasury rebalance stays with the
/// scheduler.
pub async fn submit_latest(
    State(state): State<AppState>,
) -> Result<Json<SubmitLatestResponse>, ApiError> {
    let outcome = state.markets.latest_outcome().await.map_err(map_error)?;
    let Some(selected) = outcome.selected().cloned() else {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            "No open markets found",
        ));
    };

    // A broken strike price here is upstream data, not caller input.
    let allocation = mapper::map_price(&selected.price)
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, e.to_string()))?;

    let now = chrono::Utc::now().timestamp() as u64;
    let submission = OracleSubmission {
        value: allocation.oracle_value,
        timestamp: now,
        resolution_timestamp: now + state.resolution_window_secs,
    };
    let receipt = state
        .chain
        .submit_data(&submission)
        .await
        .map_err(map_error)?;

    Ok(Json(SubmitLatestResponse {
        success: receipt.confirmed,
        market: selected,
        target_percentage: allocation.target_percentage,
        oracle_value: allocation.oracle_value,
        receipt,
    }))
}

/// GET /balance?address=0x...
pub async fn balance(
    State(state): State<AppState>,
    Query(query): Query<AddressQuery>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balances = state
        .chain
        .token_balances(&query.address)
        .await
        .map_err(map_error)?;
    Ok(Json(BalanceResponse {
        address: query.address,
        balances,
    }))
}

/// POST /mint-tokens?address=0x...
pub async fn mint_tokens(
    State(state): State<AppState>,
    Query(query): Query<AddressQuery>,
) -> Result<Json<MintResponse>, ApiError> {
    let tokens = state
        .chain
        .mint_test_tokens(&query.address)
        .await
        .map_err(map_error)?;
    if !tokens.any_success() {
        return Err(api_error(
            StatusCode::BAD_GATEWAY,
            "All mint transactions failed",
        ));
    }
    Ok(Json(MintResponse {
        address: query.address,
        tokens,
    }))
}

/// GET /market/latest
pub async fn market_latest(
    State(state): State<AppState>,
) -> Result<Json<SelectedOutcome>, ApiError> {
    let outcome = state.markets.latest_outcome().await.map_err(map_error)?;
    match outcome.selected() {
        Some(selected) => Ok(Json(selected.clone())),
        None => Err(api_error(StatusCode::NOT_FOUND, "No open markets found")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_support::{StubGateway, StubSource};

    fn state_with(gateway: StubGateway, source: StubSource) -> AppState {
        Arc::new(ApiState {
            chain: Arc::new(gateway),
            markets: Arc::new(source),
            resolution_window_secs: 86_400,
            started_at: chrono::Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_health_healthy() {
        let state = state_with(StubGateway::default(), StubSource::with_price("1.163"));
        let (status, Json(body)) = health(State(state)).await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "healthy");
        assert!(body.chain.current_block.is_some());
    }

    #[tokio::test]
    async fn test_health_unhealthy_when_disconnected() {
        let gateway = StubGateway {
            connected: false,
            ..StubGateway::default()
        };
        let state = state_with(gateway, StubSource::empty());
        let (status, Json(body)) = health(State(state)).await.unwrap();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "unhealthy");
    }

    #[tokio::test]
    async fn test_data_point_out_of_range_is_404() {
        let state = state_with(StubGateway::default(), StubSource::empty());
        let err = data_point(State(state), Path(99)).await.err().unwrap();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
        assert!(err.1.detail.contains("99"));
    }

    #[tokio::test]
    async fn test_submit_defaults_timestamps() {
        let state = state_with(StubGateway::default(), StubSource::empty());
        let before = chrono::Utc::now().timestamp() as u64;
        let Json(resp) = submit(
            State(state),
            Json(SubmitRequest {
                value: 86_000,
                timestamp: None,
                resolution_timestamp: None,
            }),
        )
        .await
        .unwrap();
        assert!(resp.success);
        assert!(resp.timestamp >= before);
        assert_eq!(resp.resolution_timestamp, resp.timestamp + 86_400);
        assert!((resp.value_percentage - 86.0).abs() < 1e-10);
    }

    #[tokio::test]
    async fn test_submit_rejects_out_of_range_value() {
        let state = state_with(StubGateway::default(), StubSource::empty());
        let err = submit(
            State(state),
            Json(SubmitRequest {
                value: 100_000,
                timestamp: None,
                resolution_timestamp: None,
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert!(err.1.detail.contains("100000"));
    }

    #[tokio::test]
    async fn test_submit_latest_maps_and_submits() {
        let state = state_with(StubGateway::default(), StubSource::with_price("1.163"));
        let Json(resp) = submit_latest(State(state)).await.unwrap();
        assert_eq!(resp.target_percentage, 86);
        assert_eq!(resp.oracle_value, 86_000);
        assert!(resp.market.ticker.contains("1.163"));
    }

    #[tokio::test]
    async fn test_submit_latest_404_when_no_markets() {
        let state = state_with(StubGateway::default(), StubSource::empty());
        let err = submit_latest(State(state)).await.err().unwrap();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_submit_latest_502_on_chain_failure() {
        let gateway = StubGateway {
            fail_submissions: true,
            ..StubGateway::default()
        };
        let state = state_with(gateway, StubSource::with_price("1.163"));
        let err = submit_latest(State(state)).await.err().unwrap();
        assert_eq!(err.0, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_balance_rejects_malformed_address() {
        let state = state_with(StubGateway::default(), StubSource::empty());
        let err = balance(
            State(state),
            Query(AddressQuery {
                address: "not-an-address".into(),
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_market_latest_returns_selected_outcome() {
        let state = state_with(StubGateway::default(), StubSource::with_price("1.17399"));
        let Json(outcome) = market_latest(State(state)).await.unwrap();
        assert_eq!(outcome.price, "1.17399");
    }
}
