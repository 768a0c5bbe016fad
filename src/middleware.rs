// src/middleware.rs
//! The standard middleware steps of an account build.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::{AbiDecode, AbiEncode};
use ethers::providers::spoof;
use ethers::types::{Address, Bytes, U256};
use tracing::{debug, warn};

use crate::bundler::BundlerRpc;
use crate::context::{OperationContext, DUMMY_SIGNATURE_KEY, GAS_ESTIMATE_KEY, USER_OP_HASH_KEY};
use crate::contracts::{GetNonceCall, GetNonceReturn};
use crate::error::{GatewayError, StepError};
use crate::gateway::{CallOutcome, ChainGateway};
use crate::pipeline::UserOperationMiddleware;
use crate::signer::UserOpSigner;
use crate::types::GasFees;

/// Percentage added on top of the node's suggested priority fee.
const PRIORITY_FEE_BUFFER_PERCENT: u64 = 13;

/// Seeds the sender and records the dummy signature that estimation requests are sized with.
pub struct UseDefaults {
    sender: Address,
    dummy_signature: Bytes,
}

impl UseDefaults {
    pub fn new(sender: Address, dummy_signature: Bytes) -> Self {
        Self {
            sender,
            dummy_signature,
        }
    }
}

#[async_trait]
impl UserOperationMiddleware for UseDefaults {
    fn name(&self) -> &'static str {
        "use_defaults"
    }

    async fn handle(&self, ctx: &mut OperationContext) -> Result<(), StepError> {
        ctx.op.sender.get_or_insert(self.sender);
        ctx.set_scratch(DUMMY_SIGNATURE_KEY, &self.dummy_signature)?;
        Ok(())
    }
}

/// Fetches the nonce for the configured key and decides whether the account still needs its
/// init code. Both reads are issued together.
pub struct ResolveAccount<G> {
    gateway: Arc<G>,
    nonce_key: U256,
    init_code: Bytes,
}

impl<G: ChainGateway> ResolveAccount<G> {
    pub fn new(gateway: Arc<G>, nonce_key: U256, init_code: Bytes) -> Self {
        Self {
            gateway,
            nonce_key,
            init_code,
        }
    }

    async fn get_nonce(&self, entry_point: Address, sender: Address) -> Result<U256, GatewayError> {
        let data = GetNonceCall {
            sender,
            key: self.nonce_key,
        }
        .encode();

        match self
            .gateway
            .simulate_call(entry_point, data.into(), &spoof::State::default())
            .await?
        {
            CallOutcome::Success(output) => GetNonceReturn::decode(&output)
                .map(|ret| ret.nonce)
                .map_err(|e| GatewayError::Decode(e.to_string())),
            CallOutcome::RevertWithData(revert_data) => {
                Err(GatewayError::Reverted(hex::encode(revert_data)))
            }
        }
    }
}

#[async_trait]
impl<G: ChainGateway + 'static> UserOperationMiddleware for ResolveAccount<G> {
    fn name(&self) -> &'static str {
        "resolve_account"
    }

    async fn handle(&self, ctx: &mut OperationContext) -> Result<(), StepError> {
        let sender = ctx.op.sender.ok_or(StepError::Incomplete("sender"))?;

        let (nonce, code) = tokio::try_join!(
            self.get_nonce(ctx.entry_point, sender),
            self.gateway.get_code(sender),
        )?;

        let deployed = !code.is_empty();
        debug!("Account {:?} nonce {} deployed {}", sender, nonce, deployed);

        ctx.op.nonce = Some(nonce);
        ctx.op.init_code = Some(if deployed {
            Bytes::default()
        } else {
            self.init_code.clone()
        });
        Ok(())
    }
}

/// Prices the operation from current network fees.
///
/// Priority fee is `eth_maxPriorityFeePerGas` plus a 13% buffer; max fee is twice the latest
/// base fee plus the priority fee. Chains that reject the EIP-1559 reads are priced with
/// `eth_gasPrice` for both fields. Fees that do not fit in 256 bits fail the step.
pub struct GasPrice<G> {
    gateway: Arc<G>,
}

impl<G: ChainGateway> GasPrice<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    async fn eip1559_inputs(&self) -> Result<(U256, Option<U256>), GatewayError> {
        tokio::try_join!(
            self.gateway.max_priority_fee(),
            self.gateway.latest_base_fee(),
        )
    }
}

fn eip1559_fees(tip: U256, base_fee: Option<U256>) -> Result<GasFees, GatewayError> {
    let overflow = || {
        GatewayError::Decode(format!(
            "fee overflow: priority fee {} base fee {:?}",
            tip, base_fee
        ))
    };

    let buffer = tip / U256::from(100) * U256::from(PRIORITY_FEE_BUFFER_PERCENT);
    let max_priority_fee_per_gas = tip.checked_add(buffer).ok_or_else(overflow)?;
    let max_fee_per_gas = match base_fee {
        Some(base_fee) => base_fee
            .checked_mul(U256::from(2))
            .and_then(|doubled| doubled.checked_add(max_priority_fee_per_gas))
            .ok_or_else(overflow)?,
        None => max_priority_fee_per_gas,
    };

    Ok(GasFees {
        max_fee_per_gas,
        max_priority_fee_per_gas,
    })
}

#[async_trait]
impl<G: ChainGateway + 'static> UserOperationMiddleware for GasPrice<G> {
    fn name(&self) -> &'static str {
        "gas_price"
    }

    async fn handle(&self, ctx: &mut OperationContext) -> Result<(), StepError> {
        let fees = match self.eip1559_inputs().await {
            Ok((tip, base_fee)) => eip1559_fees(tip, base_fee)?,
            Err(e) => {
                warn!("EIP-1559 fee lookup failed, using eth_gasPrice: {}", e);
                let gas_price = self.gateway.gas_price().await?;
                GasFees {
                    max_fee_per_gas: gas_price,
                    max_priority_fee_per_gas: gas_price,
                }
            }
        };

        debug!(
            "Gas fees: max {} priority {}",
            fees.max_fee_per_gas, fees.max_priority_fee_per_gas
        );
        ctx.op.max_fee_per_gas = Some(fees.max_fee_per_gas);
        ctx.op.max_priority_fee_per_gas = Some(fees.max_priority_fee_per_gas);
        Ok(())
    }
}

/// Asks the bundler for call, verification and pre-verification gas.
pub struct EstimateUserOperationGas<B> {
    bundler: Arc<B>,
}

impl<B: BundlerRpc> EstimateUserOperationGas<B> {
    pub fn new(bundler: Arc<B>) -> Self {
        Self { bundler }
    }
}

#[async_trait]
impl<B: BundlerRpc + 'static> UserOperationMiddleware for EstimateUserOperationGas<B> {
    fn name(&self) -> &'static str {
        "estimate_user_operation_gas"
    }

    async fn handle(&self, ctx: &mut OperationContext) -> Result<(), StepError> {
        let op = ctx.estimation_op();
        let estimate = self
            .bundler
            .estimate_user_operation_gas(&op, ctx.entry_point)
            .await
            .map_err(StepError::Bundler)?;

        debug!("Gas estimate: {:?}", estimate);
        ctx.op.pre_verification_gas = Some(estimate.pre_verification_gas);
        ctx.op.verification_gas_limit = Some(estimate.verification_gas_limit);
        ctx.op.call_gas_limit = Some(estimate.call_gas_limit);
        ctx.set_scratch(GAS_ESTIMATE_KEY, &estimate)?;
        Ok(())
    }
}

/// Signs the entry point digest of the priced operation.
pub struct SignUserOpHash<S> {
    signer: Arc<S>,
}

impl<S: UserOpSigner> SignUserOpHash<S> {
    pub fn new(signer: Arc<S>) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl<S: UserOpSigner> UserOperationMiddleware for SignUserOpHash<S> {
    fn name(&self) -> &'static str {
        "sign_user_op_hash"
    }

    async fn handle(&self, ctx: &mut OperationContext) -> Result<(), StepError> {
        let op = ctx.op.signable().map_err(StepError::Incomplete)?;
        let hash = op.hash(ctx.entry_point, ctx.chain_id);
        let signature = self.signer.sign_digest(hash).await?;

        debug!("Signed user operation hash {:?}", hash);
        ctx.op.signature = Some(signature);
        ctx.set_scratch(USER_OP_HASH_KEY, &hash)?;
        Ok(())
    }
}
