//! Etherscan-style contract API client with rate budgeting, credential
//! rotation, and retry.
//!
//! Every call is a form-encoded POST carrying `module`/`action` keys plus
//! the active credential; responses decode into per-action typed shapes.
//! A failed decode is treated as quota exhaustion on the current key (the
//! API answers over-quota calls with a string `result` that breaks the
//! typed shape), so the client rotates the credential and retries under the
//! configured [`RetryConfig`]. A response that decodes but reports a
//! non-success status carries a real API message and is surfaced to the
//! caller without retrying.

use crate::config::RetryConfig;
use crate::schemas::{ContractProperties, Transaction};
use crate::throttle::{CredentialRotator, RateBudget};
use async_trait::async_trait;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Hard per-call row cap of the `txlist` action; a page of exactly this
/// size means more history remains past the cursor.
pub const PAGE_SIZE: usize = 10_000;

/// Message the API uses for an address with an empty transaction history.
const NO_TRANSACTIONS: &str = "No transactions found";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API error: {0}")]
    Api(String),

    #[error("address has no verified contract source")]
    NoContractSource,

    #[error("address has no recorded deployer")]
    NoDeployer,

    #[error("retries exhausted after {0} attempts")]
    RetriesExhausted(u32),
}

/// Common envelope predicate over the per-action response shapes.
pub trait ApiResponse {
    /// The API signals success with the status sentinel `"1"`.
    fn is_successful(&self) -> bool;
    fn message(&self) -> &str;
}

macro_rules! impl_api_response {
    ($($ty:ty),+) => {
        $(impl ApiResponse for $ty {
            fn is_successful(&self) -> bool {
                self.status == "1"
            }
            fn message(&self) -> &str {
                &self.message
            }
        })+
    };
}

/// `contract/getsourcecode` envelope.
#[derive(Debug, Deserialize)]
pub struct ContractSourceResponse {
    pub status: String,
    pub message: String,
    pub result: Vec<ContractProperties>,
}

/// `contract/getcontractcreation` envelope.
#[derive(Debug, Deserialize)]
pub struct ContractCreationResponse {
    pub status: String,
    pub message: String,
    pub result: Vec<ContractCreation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractCreation {
    #[serde(rename = "contractAddress")]
    pub contract_address: String,
    #[serde(rename = "contractCreator")]
    pub contract_creator: String,
    #[serde(rename = "txHash")]
    pub tx_hash: String,
}

/// `account/txlist` envelope.
#[derive(Debug, Deserialize)]
pub struct TransactionListResponse {
    pub status: String,
    pub message: String,
    pub result: Vec<Transaction>,
}

impl_api_response!(
    ContractSourceResponse,
    ContractCreationResponse,
    TransactionListResponse
);

/// The contract-API surface the resolver and fetcher depend on.
///
/// Implemented by [`EtherscanClient`] for production and by synthetic
/// in-memory APIs in tests.
#[async_trait]
pub trait ContractApi: Send + Sync {
    /// Verified source and metadata for one contract address.
    async fn contract_properties(&self, address: &str) -> Result<ContractProperties, ApiError>;

    /// The address that deployed the given contract.
    async fn deployer_address(&self, address: &str) -> Result<String, ApiError>;

    /// One ascending-sorted page of an address's transaction history,
    /// starting at `start_block`. At most [`PAGE_SIZE`] rows per page; an
    /// empty history is an empty page, not an error.
    async fn transactions_page(
        &self,
        address: &str,
        start_block: u64,
    ) -> Result<Vec<Transaction>, ApiError>;
}

/// Rate-limited contract API client with credential rotation.
pub struct EtherscanClient {
    http: reqwest::Client,
    api_url: String,
    budget: Arc<RateBudget>,
    credentials: Arc<CredentialRotator>,
    retry: RetryConfig,
}

impl EtherscanClient {
    pub fn new(
        api_url: impl Into<String>,
        budget: Arc<RateBudget>,
        credentials: Arc<CredentialRotator>,
        retry: RetryConfig,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            api_url: api_url.into(),
            budget,
            credentials,
            retry,
        }
    }

    /// Issue one API call, retrying with credential rotation until the body
    /// decodes into `T` or the retry policy gives up.
    async fn execute<T>(&self, params: &[(&str, &str)]) -> Result<T, ApiError>
    where
        T: DeserializeOwned + ApiResponse,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            self.budget.acquire().await;

            let key = self.credentials.current().unwrap_or_default().to_string();
            let mut form: Vec<(&str, &str)> = params.to_vec();
            form.push(("apikey", key.as_str()));

            let sent = self.http.post(&self.api_url).form(&form).send().await;
            let body = match sent {
                Ok(response) => response.text().await,
                Err(e) => Err(e),
            };
            self.budget.mark_accessed();

            let body = match body {
                Ok(body) => body,
                Err(e) => {
                    warn!(
                        "[attempt {}] transport error: {} — rotating credential",
                        attempt, e
                    );
                    self.credentials.rotate();
                    self.backoff(attempt).await?;
                    continue;
                }
            };

            match serde_json::from_str::<T>(&body) {
                Ok(response) => {
                    if response.is_successful() {
                        return Ok(response);
                    }
                    // Decoded but the API said no; its message is the error.
                    return Err(ApiError::Api(response.message().to_string()));
                }
                Err(e) => {
                    warn!(
                        "[attempt {}] response did not decode ({}) — presuming quota, rotating credential",
                        attempt, e
                    );
                    self.credentials.rotate();
                    self.backoff(attempt).await?;
                }
            }
        }
    }

    /// Sleep out the backoff for `attempt`, or fail once the policy's
    /// attempt cap is reached. No cap means the original retry-forever
    /// behavior.
    async fn backoff(&self, attempt: u32) -> Result<(), ApiError> {
        if let Some(max) = self.retry.max_attempts {
            if attempt >= max {
                return Err(ApiError::RetriesExhausted(attempt));
            }
        }
        tokio::time::sleep(retry_delay(&self.retry, attempt)).await;
        Ok(())
    }
}

/// Exponential backoff with jitter: `base * 2^(attempt-1)` capped at the
/// configured ceiling, plus up to half the base delay of random jitter so
/// parallel crawls do not retry in lockstep.
fn retry_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let backoff = retry
        .base_delay_ms
        .saturating_mul(1u64 << exponent)
        .min(retry.max_delay_ms);
    let jitter = rand::thread_rng().gen_range(0..=retry.base_delay_ms / 2);
    Duration::from_millis(backoff + jitter)
}

#[async_trait]
impl ContractApi for EtherscanClient {
    async fn contract_properties(&self, address: &str) -> Result<ContractProperties, ApiError> {
        let params = [
            ("module", "contract"),
            ("action", "getsourcecode"),
            ("address", address),
        ];
        let response: ContractSourceResponse = self.execute(&params).await?;
        response
            .result
            .into_iter()
            .next()
            .ok_or(ApiError::NoContractSource)
    }

    async fn deployer_address(&self, address: &str) -> Result<String, ApiError> {
        let params = [
            ("module", "contract"),
            ("action", "getcontractcreation"),
            ("contractaddresses", address),
        ];
        let response: ContractCreationResponse = self.execute(&params).await?;
        let creation = response.result.into_iter().next().ok_or(ApiError::NoDeployer)?;
        if creation.contract_creator.is_empty() {
            return Err(ApiError::NoDeployer);
        }
        Ok(creation.contract_creator)
    }

    async fn transactions_page(
        &self,
        address: &str,
        start_block: u64,
    ) -> Result<Vec<Transaction>, ApiError> {
        let start = start_block.to_string();
        let params = [
            ("module", "account"),
            ("action", "txlist"),
            ("address", address),
            ("startblock", start.as_str()),
            ("sort", "asc"),
        ];
        match self.execute::<TransactionListResponse>(&params).await {
            Ok(response) => {
                debug!(
                    "txlist {} from block {}: {} rows",
                    address,
                    start_block,
                    response.result.len()
                );
                Ok(response.result)
            }
            // Zero history decodes as status "0" with this message; that is
            // a valid empty page, not a failure.
            Err(ApiError::Api(message)) if message == NO_TRANSACTIONS => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}
