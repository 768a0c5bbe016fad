// src/types.rs
use ethers::abi::{encode, Token};
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};
use ethers::utils::keccak256;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// ERC-4337 (v0.6) user operation in the form the bundler accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

impl UserOperation {
    /// ABI-encodes every field except the signature, with the dynamic byte fields
    /// replaced by their keccak256.
    pub fn pack_for_hash(&self) -> Bytes {
        encode(&[
            Token::Address(self.sender),
            Token::Uint(self.nonce),
            Token::FixedBytes(keccak256(&self.init_code).to_vec()),
            Token::FixedBytes(keccak256(&self.call_data).to_vec()),
            Token::Uint(self.call_gas_limit),
            Token::Uint(self.verification_gas_limit),
            Token::Uint(self.pre_verification_gas),
            Token::Uint(self.max_fee_per_gas),
            Token::Uint(self.max_priority_fee_per_gas),
            Token::FixedBytes(keccak256(&self.paymaster_and_data).to_vec()),
        ])
        .into()
    }

    /// The entry point domain digest the account owner signs.
    pub fn hash(&self, entry_point: Address, chain_id: u64) -> H256 {
        let op_hash = keccak256(self.pack_for_hash());
        keccak256(encode(&[
            Token::FixedBytes(op_hash.to_vec()),
            Token::Address(entry_point),
            Token::Uint(U256::from(chain_id)),
        ]))
        .into()
    }

    /// Returns the first field that still holds a placeholder value.
    ///
    /// Fees are not checked: a zero priority fee is legitimate on some chains.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.sender.is_zero() {
            return Some("sender");
        }
        if self.call_gas_limit.is_zero() {
            return Some("callGasLimit");
        }
        if self.verification_gas_limit.is_zero() {
            return Some("verificationGasLimit");
        }
        if self.pre_verification_gas.is_zero() {
            return Some("preVerificationGas");
        }
        if self.signature.is_empty() {
            return Some("signature");
        }
        None
    }
}

/// A user operation whose fields are filled in progressively by the middleware pipeline.
///
/// `call_data` and `paymaster_and_data` start out as the empty byte string, which is a
/// concrete value for both. Everything else must be written by a step before
/// [`PartialUserOperation::finish`] accepts the operation. The signature is only ever the
/// owner's signature over the final hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialUserOperation {
    pub sender: Option<Address>,
    pub nonce: Option<U256>,
    pub init_code: Option<Bytes>,
    pub call_data: Bytes,
    pub call_gas_limit: Option<U256>,
    pub verification_gas_limit: Option<U256>,
    pub pre_verification_gas: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    pub paymaster_and_data: Bytes,
    pub signature: Option<Bytes>,
}

impl PartialUserOperation {
    pub fn with_call_data(call_data: Bytes) -> Self {
        Self {
            call_data,
            ..Default::default()
        }
    }

    /// Wire form for estimation and sponsorship requests: unknown numeric fields are sent as zero
    /// and an unsigned operation carries `sizing_signature` so the request has a realistic size.
    pub fn estimation_op(&self, sizing_signature: Bytes) -> UserOperation {
        UserOperation {
            sender: self.sender.unwrap_or_default(),
            nonce: self.nonce.unwrap_or_default(),
            init_code: self.init_code.clone().unwrap_or_default(),
            call_data: self.call_data.clone(),
            call_gas_limit: self.call_gas_limit.unwrap_or_default(),
            verification_gas_limit: self.verification_gas_limit.unwrap_or_default(),
            pre_verification_gas: self.pre_verification_gas.unwrap_or_default(),
            max_fee_per_gas: self.max_fee_per_gas.unwrap_or_default(),
            max_priority_fee_per_gas: self.max_priority_fee_per_gas.unwrap_or_default(),
            paymaster_and_data: self.paymaster_and_data.clone(),
            signature: self.signature.clone().unwrap_or(sizing_signature),
        }
    }

    /// Every field except the signature, which is left empty. Used to compute the hash to sign.
    pub fn signable(&self) -> Result<UserOperation, &'static str> {
        Ok(UserOperation {
            sender: self.sender.ok_or("sender")?,
            nonce: self.nonce.ok_or("nonce")?,
            init_code: self.init_code.clone().ok_or("initCode")?,
            call_data: self.call_data.clone(),
            call_gas_limit: self.call_gas_limit.ok_or("callGasLimit")?,
            verification_gas_limit: self
                .verification_gas_limit
                .ok_or("verificationGasLimit")?,
            pre_verification_gas: self.pre_verification_gas.ok_or("preVerificationGas")?,
            max_fee_per_gas: self.max_fee_per_gas.ok_or("maxFeePerGas")?,
            max_priority_fee_per_gas: self
                .max_priority_fee_per_gas
                .ok_or("maxPriorityFeePerGas")?,
            paymaster_and_data: self.paymaster_and_data.clone(),
            signature: Bytes::default(),
        })
    }

    /// Converts into a submittable operation. Fails on the first unset field.
    pub fn finish(self) -> Result<UserOperation, &'static str> {
        let mut op = self.signable()?;
        op.signature = self.signature.ok_or("signature")?;
        Ok(op)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasFees {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

/// Result of `eth_estimateUserOperationGas`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    pub pre_verification_gas: U256,
    #[serde(alias = "verificationGas")]
    pub verification_gas_limit: U256,
    pub call_gas_limit: U256,
}

/// Context tag sent with a sponsorship request, e.g. `{"type": "payg"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymasterContext {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PaymasterContext {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            extra: Map::new(),
        }
    }

    pub fn pay_as_you_go() -> Self {
        Self::new("payg")
    }
}

/// Result of `pm_sponsorUserOperation`. Gas limits are only present when the paymaster
/// chooses to override them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterResult {
    pub paymaster_and_data: Bytes,
    #[serde(default)]
    pub pre_verification_gas: Option<U256>,
    #[serde(default)]
    pub verification_gas_limit: Option<U256>,
    #[serde(default)]
    pub call_gas_limit: Option<U256>,
}

/// Result of `eth_getUserOperationReceipt`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    pub user_op_hash: H256,
    pub sender: Address,
    pub nonce: U256,
    #[serde(default)]
    pub paymaster: Address,
    pub actual_gas_cost: U256,
    pub actual_gas_used: U256,
    pub success: bool,
    #[serde(default)]
    pub reason: String,
    pub receipt: TransactionReceipt,
}

impl UserOperationReceipt {
    /// Hash of the bundle transaction that settled the operation.
    pub fn transaction_hash(&self) -> H256 {
        self.receipt.transaction_hash
    }
}
