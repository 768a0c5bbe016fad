// src/rpc.rs
//! JSON-RPC surfaces of the bundler and paymaster services, as seen by a client.

use ethers::types::{Address, H256};
use jsonrpsee::proc_macros::rpc;

use crate::types::{
    GasEstimate, PaymasterContext, PaymasterResult, UserOperation, UserOperationReceipt,
};

/// ERC-4337 bundler methods.
#[rpc(client, namespace = "eth")]
pub trait BundlerApi {
    #[method(name = "sendUserOperation")]
    async fn send_user_operation(
        &self,
        user_op: UserOperation,
        entry_point: Address,
    ) -> RpcResult<H256>;

    #[method(name = "estimateUserOperationGas")]
    async fn estimate_user_operation_gas(
        &self,
        user_op: UserOperation,
        entry_point: Address,
    ) -> RpcResult<GasEstimate>;

    #[method(name = "getUserOperationReceipt")]
    async fn get_user_operation_receipt(
        &self,
        user_op_hash: H256,
    ) -> RpcResult<Option<UserOperationReceipt>>;
}

/// Verifying paymaster sponsorship.
#[rpc(client, namespace = "pm")]
pub trait PaymasterApi {
    /// Requests the paymaster to sponsor a user operation
    #[method(name = "sponsorUserOperation")]
    async fn sponsor_user_operation(
        &self,
        user_op: UserOperation,
        entry_point: Address,
        context: PaymasterContext,
    ) -> RpcResult<PaymasterResult>;
}
