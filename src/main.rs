//! KalshiLink — Kalshi EUR/USD → Arc Testnet oracle bridge.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the Kalshi client and chain gateway together, starts the REST
//! API, and runs the fetch→map→submit scheduler with graceful shutdown.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use kalshilink::chain::{ChainClient, ChainGateway};
use kalshilink::config::AppConfig;
use kalshilink::markets::kalshi::KalshiClient;
use kalshilink::markets::MarketSource;
use kalshilink::scheduler::Scheduler;
use kalshilink::server::{self, routes::ApiState};

const BANNER: &str = r#"
 _  __     _     _     _ _     _       _
| |/ /__ _| |___| |__ (_) |   (_)_ __ | | __
| ' // _` | / __| '_ \| | |   | | '_ \| |/ /
| . \ (_| | \__ \ | | | | |___| | | | |   <
|_|\_\__,_|_|___/_| |_|_|_____|_|_| |_|_|\_\

  Kalshi EUR/USD -> Arc Testnet oracle bridge
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        series = %cfg.market.series_ticker,
        chain_id = cfg.chain.chain_id,
        contract = %cfg.chain.oracle_address,
        interval_secs = cfg.scheduler.interval_secs,
        "KalshiLink starting up"
    );

    // -- Initialise components -------------------------------------------

    let signing_key = cfg
        .signing_key()
        .context("A signing key is required to submit oracle data")?;

    let source: Arc<dyn MarketSource> =
        Arc::new(KalshiClient::new(&cfg.market).context("Failed to build Kalshi client")?);
    let chain: Arc<dyn ChainGateway> = Arc::new(
        ChainClient::new(&cfg.chain, &signing_key).context("Failed to build chain client")?,
    );

    // -- REST API ----------------------------------------------------------

    if cfg.server.enabled {
        let state = Arc::new(ApiState {
            chain: chain.clone(),
            markets: source.clone(),
            resolution_window_secs: cfg.scheduler.resolution_window_secs,
            started_at: chrono::Utc::now(),
        });
        server::spawn_server(state, cfg.server.port);
    }

    // -- Scheduler ---------------------------------------------------------

    let (stop_tx, stop_rx) = watch::channel(false);

    if cfg.scheduler.enabled {
        let scheduler = Scheduler::new(
            source,
            chain,
            Duration::from_secs(cfg.scheduler.interval_secs),
            Duration::from_secs(cfg.scheduler.resolution_window_secs),
        );
        let rx = stop_rx.clone();
        tokio::spawn(async move { scheduler.run(rx).await });
    } else {
        info!("Scheduler disabled — serving API only");
    }

    info!("Running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received.");
    let _ = stop_tx.send(true);
    // Give the scheduler a moment to finish an in-flight tick log line
    tokio::time::sleep(Duration::from_millis(100)).await;

    info!("KalshiLink shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("kalshilink=info"));

    let json_logging = std::env::var("KALSHILINK_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
