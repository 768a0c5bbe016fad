// src/context.rs
use std::collections::HashMap;

use ethers::types::{Address, Bytes};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::types::{PartialUserOperation, UserOperation};

/// Scratch key under which the defaults step records the dummy signature.
pub const DUMMY_SIGNATURE_KEY: &str = "dummy_signature";
/// Scratch key for the raw bundler gas estimate.
pub const GAS_ESTIMATE_KEY: &str = "gas_estimate";
/// Scratch key for the raw paymaster response.
pub const PAYMASTER_RESULT_KEY: &str = "paymaster_result";
/// Scratch key for the hash the owner signed.
pub const USER_OP_HASH_KEY: &str = "user_op_hash";

/// State of one build: the operation under construction, the entry point domain it is built
/// for, and scratch values passed between steps.
///
/// A context lives for exactly one pipeline run.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub op: PartialUserOperation,
    pub entry_point: Address,
    pub chain_id: u64,
    scratch: HashMap<String, Value>,
}

impl OperationContext {
    pub fn new(op: PartialUserOperation, entry_point: Address, chain_id: u64) -> Self {
        Self {
            op,
            entry_point,
            chain_id,
            scratch: HashMap::new(),
        }
    }

    /// Stores `value` under `key`, replacing any earlier value.
    pub fn set_scratch<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.scratch.insert(key.into(), value);
        Ok(())
    }

    /// Reads the value under `key`, `None` if it is absent or has a different shape.
    pub fn scratch<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.scratch
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn has_scratch(&self, key: &str) -> bool {
        self.scratch.contains_key(key)
    }

    /// The operation as sent to gas estimation and sponsorship. Until the operation is signed,
    /// the signature slot carries the dummy signature recorded under [`DUMMY_SIGNATURE_KEY`].
    pub fn estimation_op(&self) -> UserOperation {
        let sizing_signature = self
            .scratch::<Bytes>(DUMMY_SIGNATURE_KEY)
            .unwrap_or_default();
        self.op.estimation_op(sizing_signature)
    }
}
