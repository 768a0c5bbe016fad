// src/gateway.rs
use async_trait::async_trait;
use ethers::providers::{spoof, JsonRpcClient, Middleware, Provider, ProviderError, RawCall};
use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, BlockNumber, Bytes, Eip1559TransactionRequest,
    U256,
};

use crate::error::GatewayError;

/// Outcome of a simulated (non-committing) contract call. A revert is a regular result here,
/// not an error: some entry point methods only ever answer through revert data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Success(Bytes),
    RevertWithData(Bytes),
}

/// Read-only access to the chain. Implementations must be safe to share between
/// concurrent builds.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Deployed bytecode at `address`; empty if nothing is deployed.
    async fn get_code(&self, address: Address) -> Result<Bytes, GatewayError>;

    /// `eth_call` with the given state overrides.
    async fn simulate_call(
        &self,
        to: Address,
        data: Bytes,
        state_overrides: &spoof::State,
    ) -> Result<CallOutcome, GatewayError>;

    /// `eth_maxPriorityFeePerGas`
    async fn max_priority_fee(&self) -> Result<U256, GatewayError>;

    /// Base fee of the latest block, `None` on chains without EIP-1559.
    async fn latest_base_fee(&self) -> Result<Option<U256>, GatewayError>;

    /// `eth_gasPrice`
    async fn gas_price(&self) -> Result<U256, GatewayError>;
}

#[async_trait]
impl<C: JsonRpcClient + 'static> ChainGateway for Provider<C> {
    async fn get_code(&self, address: Address) -> Result<Bytes, GatewayError> {
        Middleware::get_code(self, address, None)
            .await
            .map_err(|e| GatewayError::Provider(e.to_string()))
    }

    async fn simulate_call(
        &self,
        to: Address,
        data: Bytes,
        state_overrides: &spoof::State,
    ) -> Result<CallOutcome, GatewayError> {
        let tx: TypedTransaction = Eip1559TransactionRequest {
            to: Some(to.into()),
            data: Some(data),
            ..Default::default()
        }
        .into();

        match self.call_raw(&tx).state(state_overrides).await {
            Ok(output) => Ok(CallOutcome::Success(output)),
            Err(error) => match revert_data(&error) {
                Some(data) => Ok(CallOutcome::RevertWithData(data)),
                None => Err(GatewayError::Provider(error.to_string())),
            },
        }
    }

    async fn max_priority_fee(&self) -> Result<U256, GatewayError> {
        self.request("eth_maxPriorityFeePerGas", ())
            .await
            .map_err(|e| GatewayError::Provider(e.to_string()))
    }

    async fn latest_base_fee(&self) -> Result<Option<U256>, GatewayError> {
        let block = Middleware::get_block(self, BlockNumber::Latest)
            .await
            .map_err(|e| GatewayError::Provider(e.to_string()))?
            .ok_or_else(|| GatewayError::Provider("latest block not found".to_string()))?;
        Ok(block.base_fee_per_gas)
    }

    async fn gas_price(&self) -> Result<U256, GatewayError> {
        Middleware::get_gas_price(self)
            .await
            .map_err(|e| GatewayError::Provider(e.to_string()))
    }
}

// Revert payload of a JSON-RPC error, if the node reported the call as reverted.
fn revert_data(error: &ProviderError) -> Option<Bytes> {
    let ProviderError::JsonRpcClientError(client_error) = error else {
        return None;
    };
    let jsonrpc_error = client_error.as_error_response()?;
    if !jsonrpc_error.is_revert() {
        return None;
    }
    jsonrpc_error.as_revert_data()
}
