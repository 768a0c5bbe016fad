// src/resolver.rs
use std::sync::Arc;

use ethers::abi::{AbiDecode, AbiEncode};
use ethers::providers::spoof;
use ethers::types::{Address, Bytes};
use tracing::debug;

use crate::contracts::{GetSenderAddressCall, SenderAddressResult};
use crate::error::ResolutionError;
use crate::gateway::{CallOutcome, ChainGateway};

/// Learns the counterfactual address of an account before it is deployed.
///
/// The entry point's `getSenderAddress(initCode)` runs the factory call and always reverts
/// with `SenderAddressResult(sender)`. A successful return is treated as a failure.
pub struct AddressResolver<G> {
    gateway: Arc<G>,
    entry_point: Address,
}

impl<G: ChainGateway> AddressResolver<G> {
    pub fn new(gateway: Arc<G>, entry_point: Address) -> Self {
        Self {
            gateway,
            entry_point,
        }
    }

    pub async fn resolve(&self, init_code: &Bytes) -> Result<Address, ResolutionError> {
        let data = GetSenderAddressCall {
            init_code: init_code.clone(),
        }
        .encode();

        let outcome = self
            .gateway
            .simulate_call(self.entry_point, data.into(), &spoof::State::default())
            .await?;

        match outcome {
            CallOutcome::Success(_) => Err(ResolutionError::NoAddress),
            CallOutcome::RevertWithData(revert_data) => {
                let result = SenderAddressResult::decode(&revert_data).map_err(|e| {
                    ResolutionError::MalformedResponse(format!(
                        "0x{}: {}",
                        hex::encode(&revert_data),
                        e
                    ))
                })?;
                debug!("getSenderAddress resolved {:?}", result.sender);
                Ok(result.sender)
            }
        }
    }
}
