// src/bundler.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use ethers::types::{Address, H256};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use tracing::{debug, info};

use crate::builder::AccountBuilder;
use crate::error::{AccountError, RpcClientError};
use crate::gateway::ChainGateway;
use crate::rpc::BundlerApiClient;
use crate::signer::UserOpSigner;
use crate::types::{GasEstimate, UserOperation, UserOperationReceipt};

/// Bundler endpoint used for estimation, submission and receipt lookups.
#[async_trait]
pub trait BundlerRpc: Send + Sync {
    async fn send_user_operation(
        &self,
        user_op: &UserOperation,
        entry_point: Address,
    ) -> Result<H256, RpcClientError>;

    async fn estimate_user_operation_gas(
        &self,
        user_op: &UserOperation,
        entry_point: Address,
    ) -> Result<GasEstimate, RpcClientError>;

    async fn get_user_operation_receipt(
        &self,
        user_op_hash: H256,
    ) -> Result<Option<UserOperationReceipt>, RpcClientError>;
}

/// [`BundlerRpc`] over HTTP JSON-RPC.
#[derive(Debug, Clone)]
pub struct HttpBundler {
    client: HttpClient,
}

impl HttpBundler {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let client = HttpClientBuilder::default()
            .build(url)
            .context("bundler url should be valid")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BundlerRpc for HttpBundler {
    async fn send_user_operation(
        &self,
        user_op: &UserOperation,
        entry_point: Address,
    ) -> Result<H256, RpcClientError> {
        BundlerApiClient::send_user_operation(&self.client, user_op.clone(), entry_point)
            .await
            .map_err(|e| RpcClientError::new("eth_sendUserOperation", e.to_string()))
    }

    async fn estimate_user_operation_gas(
        &self,
        user_op: &UserOperation,
        entry_point: Address,
    ) -> Result<GasEstimate, RpcClientError> {
        BundlerApiClient::estimate_user_operation_gas(&self.client, user_op.clone(), entry_point)
            .await
            .map_err(|e| RpcClientError::new("eth_estimateUserOperationGas", e.to_string()))
    }

    async fn get_user_operation_receipt(
        &self,
        user_op_hash: H256,
    ) -> Result<Option<UserOperationReceipt>, RpcClientError> {
        BundlerApiClient::get_user_operation_receipt(&self.client, user_op_hash)
            .await
            .map_err(|e| RpcClientError::new("eth_getUserOperationReceipt", e.to_string()))
    }
}

/// Polling schedule for inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 6,
        }
    }
}

/// Submits finished operations to a bundler.
///
/// Submission is never retried; sending the same operation twice is up to the caller.
pub struct Client<B> {
    bundler: Arc<B>,
    entry_point: Address,
    wait: WaitOptions,
}

impl<B: BundlerRpc> Client<B> {
    pub fn new(bundler: Arc<B>, entry_point: Address) -> Self {
        Self {
            bundler,
            entry_point,
            wait: WaitOptions::default(),
        }
    }

    pub fn with_wait_options(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }

    /// Sends a finished operation. Operations with placeholder fields are refused before any
    /// network call.
    pub async fn send(&self, user_op: &UserOperation) -> Result<PendingUserOperation<B>, AccountError> {
        if let Some(field) = user_op.missing_field() {
            return Err(AccountError::Incomplete(field));
        }

        let user_op_hash = self
            .bundler
            .send_user_operation(user_op, self.entry_point)
            .await
            .map_err(AccountError::Submission)?;

        info!("Submitted user operation {:?}", user_op_hash);
        Ok(PendingUserOperation {
            bundler: Arc::clone(&self.bundler),
            user_op_hash,
            wait: self.wait,
        })
    }

    /// Builds the builder's current operation and sends it. Nothing is sent if the build fails.
    pub async fn send_user_operation<G, S>(
        &self,
        builder: &AccountBuilder<G, S>,
    ) -> Result<PendingUserOperation<B>, AccountError>
    where
        G: ChainGateway + 'static,
        S: UserOpSigner,
    {
        let user_op = builder.build().await?;
        if let Ok(json) = serde_json::to_string(&user_op) {
            debug!("Signed UserOperation: {}", json);
        }
        self.send(&user_op).await
    }
}

/// Handle to a submitted operation.
pub struct PendingUserOperation<B> {
    bundler: Arc<B>,
    user_op_hash: H256,
    wait: WaitOptions,
}

impl<B: BundlerRpc> PendingUserOperation<B> {
    pub fn user_op_hash(&self) -> H256 {
        self.user_op_hash
    }

    /// Polls the bundler until it reports a receipt, up to the configured number of attempts.
    pub async fn wait(&self) -> Result<UserOperationReceipt, AccountError> {
        for attempt in 1..=self.wait.max_attempts {
            let receipt = self
                .bundler
                .get_user_operation_receipt(self.user_op_hash)
                .await
                .map_err(AccountError::Receipt)?;

            if let Some(receipt) = receipt {
                info!(
                    "User operation {:?} included in {:?}",
                    self.user_op_hash,
                    receipt.transaction_hash()
                );
                return Ok(receipt);
            }

            debug!(
                "User operation {:?} not yet included (attempt {}/{})",
                self.user_op_hash, attempt, self.wait.max_attempts
            );
            if attempt < self.wait.max_attempts {
                tokio::time::sleep(self.wait.interval).await;
            }
        }

        Err(AccountError::InclusionTimeout {
            hash: self.user_op_hash,
            attempts: self.wait.max_attempts,
        })
    }
}
