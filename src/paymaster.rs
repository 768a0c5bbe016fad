// src/paymaster.rs
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use ethers::types::Address;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use tracing::{debug, info};

use crate::context::{OperationContext, PAYMASTER_RESULT_KEY};
use crate::error::{RpcClientError, StepError};
use crate::pipeline::UserOperationMiddleware;
use crate::rpc::PaymasterApiClient;
use crate::types::{PaymasterContext, PaymasterResult, UserOperation};

/// Paymaster service that can sponsor an operation.
#[async_trait]
pub trait PaymasterRpc: Send + Sync {
    async fn sponsor_user_operation(
        &self,
        user_op: &UserOperation,
        entry_point: Address,
        context: &PaymasterContext,
    ) -> Result<PaymasterResult, RpcClientError>;
}

/// [`PaymasterRpc`] over HTTP JSON-RPC (`pm_sponsorUserOperation`).
#[derive(Debug, Clone)]
pub struct HttpPaymaster {
    client: HttpClient,
}

impl HttpPaymaster {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let client = HttpClientBuilder::default()
            .build(url)
            .context("paymaster url should be valid")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PaymasterRpc for HttpPaymaster {
    async fn sponsor_user_operation(
        &self,
        user_op: &UserOperation,
        entry_point: Address,
        context: &PaymasterContext,
    ) -> Result<PaymasterResult, RpcClientError> {
        PaymasterApiClient::sponsor_user_operation(
            &self.client,
            user_op.clone(),
            entry_point,
            context.clone(),
        )
        .await
        .map_err(|e| RpcClientError::new("pm_sponsorUserOperation", e.to_string()))
    }
}

/// Middleware that has a verifying paymaster sponsor the operation.
///
/// Sets `paymasterAndData` and whichever gas limits the paymaster returns. Used in place of
/// bundler gas estimation, never alongside it.
pub struct VerifyingPaymaster {
    paymaster: Arc<dyn PaymasterRpc>,
    context: PaymasterContext,
}

impl VerifyingPaymaster {
    pub fn new(paymaster: Arc<dyn PaymasterRpc>, context: PaymasterContext) -> Self {
        Self { paymaster, context }
    }
}

#[async_trait]
impl UserOperationMiddleware for VerifyingPaymaster {
    fn name(&self) -> &'static str {
        "verifying_paymaster"
    }

    async fn handle(&self, ctx: &mut OperationContext) -> Result<(), StepError> {
        let op = ctx.estimation_op();
        debug!("Requesting sponsorship for sender: {}", op.sender);

        let result = self
            .paymaster
            .sponsor_user_operation(&op, ctx.entry_point, &self.context)
            .await
            .map_err(StepError::Paymaster)?;

        info!("Paymaster sponsored operation for {}", op.sender);
        ctx.op.paymaster_and_data = result.paymaster_and_data.clone();
        if let Some(gas) = result.pre_verification_gas {
            ctx.op.pre_verification_gas = Some(gas);
        }
        if let Some(gas) = result.verification_gas_limit {
            ctx.op.verification_gas_limit = Some(gas);
        }
        if let Some(gas) = result.call_gas_limit {
            ctx.op.call_gas_limit = Some(gas);
        }
        ctx.set_scratch(PAYMASTER_RESULT_KEY, &result)?;
        Ok(())
    }
}
