//! Fixed-interval submission scheduler.
//!
//! Every tick fetches the latest market outcome, maps its strike price to
//! an allocation, and pushes the result to both contracts. Tick failures
//! are logged and abandoned; the loop itself only stops on the shutdown
//! signal.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::chain::ChainGateway;
use crate::mapper::{self, Allocation};
use crate::markets::MarketSource;
use crate::types::{OracleError, OracleSubmission, SelectedOutcome, SubmissionReceipt};

/// What one successful tick produced.
#[derive(Debug)]
pub struct TickReport {
    pub outcome: SelectedOutcome,
    pub allocation: Allocation,
    pub oracle_receipt: SubmissionReceipt,
    pub rebalance_receipt: SubmissionReceipt,
}

pub struct Scheduler {
    source: Arc<dyn MarketSource>,
    chain: Arc<dyn ChainGateway>,
    interval: Duration,
    resolution_window: Duration,
}

impl Scheduler {
    pub fn new(
        source: Arc<dyn MarketSource>,
        chain: Arc<dyn ChainGateway>,
        interval: Duration,
        resolution_window: Duration,
    ) -> Self {
        Self {
            source,
            chain,
            interval,
            resolution_window,
        }
    }

    /// Run one fetch → map → submit → rebalance cycle.
    ///
    /// Returns `Ok(None)` when the upstream listed no usable market; any
    /// stage error abandons the tick.
    pub async fn run_tick(&self) -> Result<Option<TickReport>, OracleError> {
        let outcome = self.source.latest_outcome().await?;
        let Some(selected) = outcome.selected() else {
            warn!(source = self.source.name(), "No open markets, skipping tick");
            return Ok(None);
        };

        let allocation = mapper::map_price(&selected.price)?;
        info!(
            ticker = %selected.ticker,
            price = %selected.price,
            probability = selected.probability,
            target_percentage = allocation.target_percentage,
            oracle_value = allocation.oracle_value,
            "Selected outcome mapped"
        );

        let now = chrono::Utc::now().timestamp() as u64;
        let submission = OracleSubmission {
            value: allocation.oracle_value,
            timestamp: now,
            resolution_timestamp: now + self.resolution_window.as_secs(),
        };

        let oracle_receipt = self.chain.submit_data(&submission).await?;
        let rebalance_receipt = self.chain.rebalance(allocation.target_percentage).await?;

        Ok(Some(TickReport {
            outcome: selected.clone(),
            allocation,
            oracle_receipt,
            rebalance_receipt,
        }))
    }

    /// Drive ticks on a fixed interval until `shutdown` flips to true.
    ///
    /// The first tick fires immediately. Tick errors never terminate the
    /// loop.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        info!(
            interval_secs = self.interval.as_secs(),
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_tick().await {
                        Ok(Some(report)) => {
                            info!(
                                ticker = %report.outcome.ticker,
                                oracle_tx = %report.oracle_receipt.transaction_hash,
                                rebalance_tx = %report.rebalance_receipt.transaction_hash,
                                "Tick complete"
                            );
                        }
                        Ok(None) => {}
                        Err(e) => {
                            error!(error = %e, "Tick failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Scheduler stopping");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FetchOutcome;
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::*;
    use crate::types::{
        ChainHealth, DataPoint, MintReport, OracleInfo, TokenBalances,
    };

    mock! {
        Source {}

        #[async_trait]
        impl MarketSource for Source {
            async fn latest_outcome(&self) -> Result<FetchOutcome, OracleError>;
            fn name(&self) -> &str;
        }
    }

    mock! {
        Gateway {}

        #[async_trait]
        impl ChainGateway for Gateway {
            async fn health(&self) -> Result<ChainHealth, OracleError>;
            async fn oracle_info(&self) -> Result<OracleInfo, OracleError>;
            async fn data_point(&self, index: u64) -> Result<DataPoint, OracleError>;
            async fn submit_data(
                &self,
                submission: &OracleSubmission,
            ) -> Result<SubmissionReceipt, OracleError>;
            async fn rebalance(
                &self,
                target_percentage: u64,
            ) -> Result<SubmissionReceipt, OracleError>;
            async fn token_balances(&self, address: &str) -> Result<TokenBalances, OracleError>;
            async fn mint_test_tokens(&self, address: &str) -> Result<MintReport, OracleError>;
        }
    }

    fn outcome(price: &str) -> FetchOutcome {
        FetchOutcome::Selected(SelectedOutcome {
            ticker: format!("KXEURUSD-26AUG28-T{price}"),
            probability: 0.62,
            price: price.to_string(),
            yes_bid: Some(62),
            no_ask: Some(40),
            strike_date: Some("2026-08-28T16:00:00Z".to_string()),
        })
    }

    fn receipt() -> SubmissionReceipt {
        SubmissionReceipt {
            transaction_hash: "0xabc".into(),
            block_number: Some(77),
            gas_used: Some(21_000),
            confirmed: true,
        }
    }

    fn scheduler(source: MockSource, chain: MockGateway) -> Scheduler {
        Scheduler::new(
            Arc::new(source),
            Arc::new(chain),
            Duration::from_secs(300),
            Duration::from_secs(86_400),
        )
    }

    #[tokio::test]
    async fn test_tick_submits_mapped_values() {
        let mut source = MockSource::new();
        source
            .expect_latest_outcome()
            .times(1)
            .returning(|| Ok(outcome("1.163")));

        let mut chain = MockGateway::new();
        chain
            .expect_submit_data()
            .withf(|s: &OracleSubmission| {
                s.value == 86_000 && s.resolution_timestamp == s.timestamp + 86_400
            })
            .times(1)
            .returning(|_| Ok(receipt()));
        chain
            .expect_rebalance()
            .with(eq(86u64))
            .times(1)
            .returning(|_| Ok(receipt()));

        let report = scheduler(source, chain).run_tick().await.unwrap().unwrap();
        assert_eq!(report.allocation.target_percentage, 86);
        assert_eq!(report.allocation.oracle_value, 86_000);
        assert!(report.oracle_receipt.confirmed);
    }

    #[tokio::test]
    async fn test_tick_skips_when_no_markets() {
        let mut source = MockSource::new();
        source
            .expect_latest_outcome()
            .times(1)
            .returning(|| Ok(FetchOutcome::Empty));
        source.expect_name().return_const("kalshi".to_string());

        let mut chain = MockGateway::new();
        chain.expect_submit_data().times(0);
        chain.expect_rebalance().times(0);

        let report = scheduler(source, chain).run_tick().await.unwrap();
        assert!(report.is_none());
    }

    #[tokio::test]
    async fn test_tick_aborts_on_fetch_error() {
        let mut source = MockSource::new();
        source
            .expect_latest_outcome()
            .times(1)
            .returning(|| Err(OracleError::Upstream("connection refused".into())));

        let mut chain = MockGateway::new();
        chain.expect_submit_data().times(0);
        chain.expect_rebalance().times(0);

        let result = scheduler(source, chain).run_tick().await;
        assert!(matches!(result, Err(OracleError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_tick_aborts_on_bad_price_without_submitting() {
        let mut source = MockSource::new();
        source
            .expect_latest_outcome()
            .times(1)
            .returning(|| Ok(outcome("garbage")));

        let mut chain = MockGateway::new();
        chain.expect_submit_data().times(0);
        chain.expect_rebalance().times(0);

        let result = scheduler(source, chain).run_tick().await;
        assert!(matches!(result, Err(OracleError::InvalidPrice(_))));
    }

    #[tokio::test]
    async fn test_tick_skips_rebalance_when_submit_fails() {
        let mut source = MockSource::new();
        source
            .expect_latest_outcome()
            .times(1)
            .returning(|| Ok(outcome("1.163")));

        let mut chain = MockGateway::new();
        chain
            .expect_submit_data()
            .times(1)
            .returning(|_| Err(OracleError::Chain("reverted".into())));
        chain.expect_rebalance().times(0);

        let result = scheduler(source, chain).run_tick().await;
        assert!(matches!(result, Err(OracleError::Chain(_))));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let mut source = MockSource::new();
        source
            .expect_latest_outcome()
            .returning(|| Ok(FetchOutcome::Empty));
        source.expect_name().return_const("kalshi".to_string());

        let chain = MockGateway::new();
        let sched = scheduler(source, chain);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { sched.run(rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler did not stop after shutdown signal")
            .unwrap();
    }
}
