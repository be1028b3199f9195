//! Arc Testnet chain gateway.
//!
//! Wraps the `KalshiLinkOracle` and `TreasuryManager` contracts (plus the
//! mock WUSDC/EURC test tokens) behind the `ChainGateway` trait. All
//! signing, gas estimation, and broadcast mechanics are delegated to
//! ethers-rs; this module only shapes calls and receipts.

use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use ethers::utils::{format_units, parse_units};
use secrecy::{ExposeSecret, Secret};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::ChainConfig;
use crate::types::{
    ChainHealth, DataPoint, MintReport, MintResult, OracleError, OracleInfo, OracleSubmission,
    SubmissionReceipt, TokenBalance, TokenBalances, ORACLE_SCALE,
};

/// Units of each test token handed out per faucet call.
const FAUCET_AMOUNT: &str = "100";

/// Gas headroom added on top of the node's estimate.
const GAS_BUFFER: u64 = 10_000;

abigen!(
    KalshiLinkOracle,
    r#"[
        function fulfillPredictionMarketDataEurUsd(uint256 _value, uint256 _timestamp, uint256 _resolutionTimestamp)
        function name() view returns (string)
        function owner() view returns (address)
        function nextIndexDataPoint() view returns (uint256)
        function getDataPoint(uint256 _index) view returns ((uint256, uint256, uint256, address, uint256))
    ]"#
);

abigen!(
    TreasuryManager,
    r#"[
        function rebalance(uint256 _targetPercentage)
    ]"#
);

abigen!(
    MockErc20,
    r#"[
        function balanceOf(address account) view returns (uint256)
        function decimals() view returns (uint8)
        function mint(address to, uint256 amount)
    ]"#
);

type ChainMiddleware = SignerMiddleware<Provider<Http>, LocalWallet>;

// ---------------------------------------------------------------------------
// Gateway trait
// ---------------------------------------------------------------------------

/// Abstraction over the on-chain surface.
///
/// The scheduler only uses `submit_data` / `rebalance`; the REST layer
/// uses the full surface. Implemented by [`ChainClient`] and mocked in
/// tests.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// RPC connectivity and current block.
    async fn health(&self) -> Result<ChainHealth, OracleError>;

    /// Oracle contract metadata.
    async fn oracle_info(&self) -> Result<OracleInfo, OracleError>;

    /// Read one stored data point by index.
    async fn data_point(&self, index: u64) -> Result<DataPoint, OracleError>;

    /// Push a data point to the oracle and wait for confirmation.
    async fn submit_data(
        &self,
        submission: &OracleSubmission,
    ) -> Result<SubmissionReceipt, OracleError>;

    /// Push a target percentage to the treasury and wait for confirmation.
    async fn rebalance(&self, target_percentage: u64) -> Result<SubmissionReceipt, OracleError>;

    /// WUSDC/EURC balances for an address.
    async fn token_balances(&self, address: &str) -> Result<TokenBalances, OracleError>;

    /// Test-only faucet: mint fixed amounts of both tokens to an address.
    async fn mint_test_tokens(&self, address: &str) -> Result<MintReport, OracleError>;
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Concrete gateway backed by a signing JSON-RPC middleware.
pub struct ChainClient {
    client: Arc<ChainMiddleware>,
    oracle: KalshiLinkOracle<ChainMiddleware>,
    treasury: TreasuryManager<ChainMiddleware>,
    usdc: MockErc20<ChainMiddleware>,
    eurc: MockErc20<ChainMiddleware>,
    oracle_address: String,
    confirm_timeout: Duration,
    /// Serializes every state-mutating call from the signing account so
    /// the scheduler and on-demand API submissions cannot race the
    /// account nonce.
    submit_lock: Mutex<()>,
}

impl ChainClient {
    /// Build a client from the chain config and the signing key.
    pub fn new(cfg: &ChainConfig, signing_key: &Secret<String>) -> Result<Self, OracleError> {
        let provider = Provider::<Http>::try_from(cfg.rpc_url.as_str())
            .map_err(|e| OracleError::Config(format!("Invalid RPC URL '{}': {e}", cfg.rpc_url)))?;

        let wallet: LocalWallet = signing_key
            .expose_secret()
            .parse()
            .map_err(|e| OracleError::Config(format!("Invalid signing key: {e}")))?;
        let wallet = wallet.with_chain_id(cfg.chain_id);

        let client = Arc::new(SignerMiddleware::new(provider, wallet));

        let oracle_addr = parse_address(&cfg.oracle_address, "oracle_address")?;
        let treasury_addr = parse_address(&cfg.treasury_address, "treasury_address")?;
        let usdc_addr = parse_address(&cfg.usdc_address, "usdc_address")?;
        let eurc_addr = parse_address(&cfg.eurc_address, "eurc_address")?;

        Ok(Self {
            oracle: KalshiLinkOracle::new(oracle_addr, client.clone()),
            treasury: TreasuryManager::new(treasury_addr, client.clone()),
            usdc: MockErc20::new(usdc_addr, client.clone()),
            eurc: MockErc20::new(eurc_addr, client.clone()),
            oracle_address: cfg.oracle_address.clone(),
            confirm_timeout: Duration::from_secs(cfg.confirmation_timeout_secs),
            submit_lock: Mutex::new(()),
            client,
        })
    }

    /// The signing account address.
    pub fn signer_address(&self) -> Address {
        self.client.signer().address()
    }

    /// Send a prepared call and wait for its receipt under the
    /// confirmation timeout. Callers must hold `submit_lock`.
    async fn send_and_confirm(
        &self,
        call: ethers::contract::ContractCall<ChainMiddleware, ()>,
        what: &str,
    ) -> Result<SubmissionReceipt, OracleError> {
        let gas = call
            .estimate_gas()
            .await
            .map_err(|e| OracleError::Chain(format!("{what}: gas estimation failed: {e}")))?;
        let call = call.gas(gas + GAS_BUFFER);

        let pending = call
            .send()
            .await
            .map_err(|e| OracleError::Chain(format!("{what}: broadcast failed: {e}")))?;
        let tx_hash = format!("{:#x}", pending.tx_hash());

        let receipt = tokio::time::timeout(self.confirm_timeout, pending)
            .await
            .map_err(|_| {
                OracleError::Chain(format!(
                    "{what}: no confirmation within {}s ({tx_hash})",
                    self.confirm_timeout.as_secs()
                ))
            })?
            .map_err(|e| OracleError::Chain(format!("{what}: confirmation failed: {e}")))?
            .ok_or_else(|| {
                OracleError::Chain(format!("{what}: transaction dropped ({tx_hash})"))
            })?;

        let confirmed = receipt.status == Some(1u64.into());
        if !confirmed {
            warn!(tx_hash = %tx_hash, what, "Transaction reverted");
        }

        Ok(SubmissionReceipt {
            transaction_hash: tx_hash,
            block_number: receipt.block_number.map(|b| b.as_u64()),
            gas_used: receipt.gas_used.map(|g| g.as_u64()),
            confirmed,
        })
    }

    /// Balance of one token, formatted with its on-chain decimals.
    async fn one_balance(token: &MockErc20<ChainMiddleware>, holder: Address) -> TokenBalance {
        let raw = match token.balance_of(holder).call().await {
            Ok(raw) => raw,
            Err(e) => return TokenBalance::err(format!("balanceOf failed: {e}")),
        };
        let decimals = token.decimals().call().await.unwrap_or(18);
        match format_units(raw, decimals as u32) {
            Ok(formatted) => TokenBalance::ok(formatted),
            Err(e) => TokenBalance::err(format!("format failed: {e}")),
        }
    }

    /// Mint the faucet amount of one token to `recipient`.
    async fn mint_one(
        &self,
        token: &MockErc20<ChainMiddleware>,
        recipient: Address,
        symbol: &str,
    ) -> MintResult {
        let decimals = token.decimals().call().await.unwrap_or(18);
        let amount: U256 = match parse_units(FAUCET_AMOUNT, decimals as u32) {
            Ok(parsed) => parsed.into(),
            Err(e) => {
                return MintResult {
                    success: false,
                    amount: FAUCET_AMOUNT.to_string(),
                    transaction_hash: None,
                    error: Some(format!("amount parse failed: {e}")),
                }
            }
        };

        match self
            .send_and_confirm(token.mint(recipient, amount), symbol)
            .await
        {
            Ok(receipt) => MintResult {
                success: receipt.confirmed,
                amount: FAUCET_AMOUNT.to_string(),
                transaction_hash: Some(receipt.transaction_hash),
                error: if receipt.confirmed {
                    None
                } else {
                    Some("mint transaction reverted".to_string())
                },
            },
            Err(e) => MintResult {
                success: false,
                amount: FAUCET_AMOUNT.to_string(),
                transaction_hash: None,
                error: Some(e.to_string()),
            },
        }
    }
}

fn parse_address(raw: &str, field: &str) -> Result<Address, OracleError> {
    raw.parse::<Address>()
        .map_err(|e| OracleError::Config(format!("Invalid {field} '{raw}': {e}")))
}

// ---------------------------------------------------------------------------
// ChainGateway implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ChainGateway for ChainClient {
    async fn health(&self) -> Result<ChainHealth, OracleError> {
        match self.client.get_block_number().await {
            Ok(block) => Ok(ChainHealth {
                connected: true,
                current_block: Some(block.as_u64()),
                contract_address: self.oracle_address.clone(),
            }),
            Err(e) => {
                warn!(error = %e, "RPC unreachable");
                Ok(ChainHealth {
                    connected: false,
                    current_block: None,
                    contract_address: self.oracle_address.clone(),
                })
            }
        }
    }

    async fn oracle_info(&self) -> Result<OracleInfo, OracleError> {
        let name = self
            .oracle
            .name()
            .call()
            .await
            .map_err(|e| OracleError::Chain(format!("name() failed: {e}")))?;
        let owner = self
            .oracle
            .owner()
            .call()
            .await
            .map_err(|e| OracleError::Chain(format!("owner() failed: {e}")))?;
        let next_index = self
            .oracle
            .next_index_data_point()
            .call()
            .await
            .map_err(|e| OracleError::Chain(format!("nextIndexDataPoint() failed: {e}")))?;

        Ok(OracleInfo {
            name,
            owner: format!("{owner:#x}"),
            total_data_points: next_index.as_u64(),
            contract_address: self.oracle_address.clone(),
        })
    }

    async fn data_point(&self, index: u64) -> Result<DataPoint, OracleError> {
        let (value, submitted, resolution, submitter, block) = self
            .oracle
            .get_data_point(U256::from(index))
            .call()
            .await
            .map_err(|e| OracleError::Chain(format!("getDataPoint({index}) failed: {e}")))?;

        let value = value.as_u64();
        Ok(DataPoint {
            index,
            value,
            value_percentage: value as f64 / ORACLE_SCALE as f64,
            submission_timestamp: submitted.as_u64(),
            resolution_timestamp: resolution.as_u64(),
            submitter: format!("{submitter:#x}"),
            block_number: block.as_u64(),
        })
    }

    async fn submit_data(
        &self,
        submission: &OracleSubmission,
    ) -> Result<SubmissionReceipt, OracleError> {
        submission.validate()?;

        let _guard = self.submit_lock.lock().await;
        let call = self.oracle.fulfill_prediction_market_data_eur_usd(
            U256::from(submission.value),
            U256::from(submission.timestamp),
            U256::from(submission.resolution_timestamp),
        );

        let receipt = self.send_and_confirm(call, "oracle submit").await?;
        info!(
            value = submission.value,
            percentage = submission.value_percentage(),
            resolution_timestamp = submission.resolution_timestamp,
            receipt = %receipt,
            "Oracle data point submitted"
        );
        Ok(receipt)
    }

    async fn rebalance(&self, target_percentage: u64) -> Result<SubmissionReceipt, OracleError> {
        let _guard = self.submit_lock.lock().await;
        let call = self.treasury.rebalance(U256::from(target_percentage));

        let receipt = self.send_and_confirm(call, "treasury rebalance").await?;
        info!(
            target_percentage,
            receipt = %receipt,
            "Treasury rebalance submitted"
        );
        Ok(receipt)
    }

    async fn token_balances(&self, address: &str) -> Result<TokenBalances, OracleError> {
        let holder = parse_address(address, "address")?;
        Ok(TokenBalances {
            usdc: Self::one_balance(&self.usdc, holder).await,
            eurc: Self::one_balance(&self.eurc, holder).await,
        })
    }

    async fn mint_test_tokens(&self, address: &str) -> Result<MintReport, OracleError> {
        let recipient = parse_address(address, "address")?;

        let _guard = self.submit_lock.lock().await;
        let usdc = self.mint_one(&self.usdc, recipient, "WUSDC mint").await;
        let eurc = self.mint_one(&self.eurc, recipient, "EURC mint").await;

        info!(
            address,
            usdc_ok = usdc.success,
            eurc_ok = eurc.success,
            "Test tokens minted"
        );
        Ok(MintReport { usdc, eurc })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
