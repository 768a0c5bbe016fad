// src/contracts.rs
//! ABI bindings for the contracts the builder talks to. Only the call encodings are used;
//! the actual calls go through [`crate::gateway::ChainGateway`].

use ethers::abi::AbiEncode;
use ethers::contract::abigen;
use ethers::types::{Address, Bytes, U256};

abigen!(
    IEntryPoint,
    r#"[
        function getSenderAddress(bytes initCode) external
        function getNonce(address sender, uint192 key) external view returns (uint256 nonce)
    ]"#
);

abigen!(
    AccountFactory,
    r#"[
        function deployAccount(address owner) external returns (address)
    ]"#
);

abigen!(
    SimpleAccount,
    r#"[
        function execute(address dest, uint256 value, bytes func) external
    ]"#
);

abigen!(
    IERC20,
    r#"[
        function approve(address spender, uint256 value) external returns (bool)
    ]"#
);

/// Revert raised by `getSenderAddress`, carrying the counterfactual account address.
#[derive(Clone, Debug, Default, Eq, PartialEq, ethers::contract::EthError)]
#[etherror(name = "SenderAddressResult", abi = "SenderAddressResult(address)")]
pub struct SenderAddressResult {
    pub sender: Address,
}

/// Init code for the factory's `deployAccount(owner)` path: factory address followed by the
/// encoded call.
pub fn deploy_account_init_code(factory: Address, owner: Address) -> Bytes {
    let mut init_code = factory.as_bytes().to_vec();
    init_code.extend(DeployAccountCall { owner }.encode());
    init_code.into()
}

/// Reference to the account contract at its resolved address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountProxy {
    address: Address,
}

impl AccountProxy {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Encodes the account's single-call `execute(dest, value, func)`.
    pub fn encode_execute(&self, dest: Address, value: U256, func: Bytes) -> Bytes {
        ExecuteCall { dest, value, func }.encode().into()
    }
}

pub fn encode_approve(spender: Address, value: U256) -> Bytes {
    ApproveCall { spender, value }.encode().into()
}
