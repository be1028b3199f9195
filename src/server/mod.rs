//! REST API — Axum web server for the oracle service.
//!
//! Serves the JSON API and a self-contained HTML status page.
//! CORS enabled for local development.

pub mod routes;

use axum::{
    http::{header, HeaderValue, Method},
    response::Html,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use routes::AppState;

/// The embedded status page (compiled into the binary).
const INDEX_HTML: &str = include_str!("templates/index.html");

/// Start the API server.
///
/// This spawns a background task — it doesn't block.
pub fn spawn_server(state: AppState, port: u16) {
    let app = build_router(state);

    tokio::spawn(async move {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        info!(port, "API server starting on http://localhost:{port}");

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .expect("Failed to bind API port");

        axum::serve(listener, app).await.expect("API server error");
    });
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin("*".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // Oracle endpoints
        .route("/oracle/info", get(routes::oracle_info))
        .route("/oracle/data/:index", get(routes::data_point))
        .route("/oracle/submit", post(routes::submit))
        .route("/oracle/submit-latest", post(routes::submit_latest))
        // Market and token endpoints
        .route("/market/latest", get(routes::market_latest))
        .route("/balance", get(routes::balance))
        .route("/mint-tokens", post(routes::mint_tokens))
        // Service endpoints
        .route("/service", get(routes::service_info))
        .route("/health", get(routes::health))
        // Status page
        .route("/", get(serve_index))
        .layer(cors)
        .with_state(state)
}

/// Serve the embedded HTML status page.
async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
