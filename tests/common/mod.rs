//! Test doubles for the chain, bundler, paymaster and signer collaborators.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use account_builder::contracts::{GetNonceCall, GetSenderAddressCall, SenderAddressResult};
use account_builder::{
    AccountBuilder, BuilderOptions, BundlerRpc, CallOutcome, ChainGateway, GasEstimate,
    GatewayError, PaymasterContext, PaymasterResult, PaymasterRpc, RpcClientError, SignerError,
    UserOpSigner, UserOperation, UserOperationReceipt,
};
use async_trait::async_trait;
use ethers::abi::{AbiDecode, AbiEncode};
use ethers::providers::spoof;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};
use tokio::sync::Barrier;

pub const CHAIN_ID: u64 = 1337;
pub const OWNER_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub fn entry_point() -> Address {
    "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789".parse().unwrap()
}

pub fn factory() -> Address {
    "0x48B65829444A3bF831eeea5861e3BF7303685ebe".parse().unwrap()
}

pub fn account() -> Address {
    Address::repeat_byte(0xac)
}

pub fn wallet() -> LocalWallet {
    OWNER_KEY.parse::<LocalWallet>().unwrap().with_chain_id(CHAIN_ID)
}

pub fn estimate() -> GasEstimate {
    GasEstimate {
        pre_verification_gas: U256::from(48_000),
        verification_gas_limit: U256::from(350_000),
        call_gas_limit: U256::from(60_000),
    }
}

/// How `getSenderAddress` answers.
#[derive(Clone)]
pub enum SenderResponse {
    Revert(Address),
    Succeed,
    Garbage,
}

struct GatewayState {
    sender_response: SenderResponse,
    nonce: U256,
    code: Bytes,
    fail_nonce: bool,
    fail_fees: bool,
    barrier: Option<Arc<Barrier>>,
    nonce_keys: Vec<U256>,
}

pub struct MockGateway {
    state: Mutex<GatewayState>,
    pub resolve_calls: AtomicUsize,
    pub code_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(GatewayState {
                sender_response: SenderResponse::Revert(account()),
                nonce: U256::zero(),
                code: Bytes::default(),
                fail_nonce: false,
                fail_fees: false,
                barrier: None,
                nonce_keys: Vec::new(),
            }),
            resolve_calls: AtomicUsize::new(0),
            code_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_sender_response(&self, response: SenderResponse) {
        self.state.lock().unwrap().sender_response = response;
    }

    pub fn set_nonce(&self, nonce: U256) {
        self.state.lock().unwrap().nonce = nonce;
    }

    pub fn set_deployed(&self, deployed: bool) {
        self.state.lock().unwrap().code = if deployed {
            Bytes::from(vec![0x60, 0x80, 0x60, 0x40])
        } else {
            Bytes::default()
        };
    }

    pub fn fail_nonce(&self) {
        self.state.lock().unwrap().fail_nonce = true;
    }

    pub fn fail_fees(&self) {
        self.state.lock().unwrap().fail_fees = true;
    }

    /// Makes the nonce and code reads wait for each other.
    pub fn rendezvous(&self) {
        self.state.lock().unwrap().barrier = Some(Arc::new(Barrier::new(2)));
    }

    pub fn nonce_keys(&self) -> Vec<U256> {
        self.state.lock().unwrap().nonce_keys.clone()
    }

    fn barrier(&self) -> Option<Arc<Barrier>> {
        self.state.lock().unwrap().barrier.clone()
    }
}

#[async_trait]
impl ChainGateway for MockGateway {
    async fn get_code(&self, _address: Address) -> Result<Bytes, GatewayError> {
        self.code_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = self.barrier() {
            barrier.wait().await;
        }
        Ok(self.state.lock().unwrap().code.clone())
    }

    async fn simulate_call(
        &self,
        to: Address,
        data: Bytes,
        _state_overrides: &spoof::State,
    ) -> Result<CallOutcome, GatewayError> {
        assert_eq!(to, entry_point());

        if GetSenderAddressCall::decode(&data).is_ok() {
            self.resolve_calls.fetch_add(1, Ordering::SeqCst);
            let response = self.state.lock().unwrap().sender_response.clone();
            return Ok(match response {
                SenderResponse::Revert(sender) => {
                    CallOutcome::RevertWithData(SenderAddressResult { sender }.encode().into())
                }
                SenderResponse::Succeed => CallOutcome::Success(Bytes::default()),
                SenderResponse::Garbage => CallOutcome::RevertWithData(Bytes::from(vec![0xff; 7])),
            });
        }

        if let Ok(call) = GetNonceCall::decode(&data) {
            if let Some(barrier) = self.barrier() {
                barrier.wait().await;
            }
            let mut state = self.state.lock().unwrap();
            state.nonce_keys.push(call.key);
            if state.fail_nonce {
                return Err(GatewayError::Provider("nonce read failed".to_string()));
            }
            return Ok(CallOutcome::Success(state.nonce.encode().into()));
        }

        Err(GatewayError::Provider("unexpected call".to_string()))
    }

    async fn max_priority_fee(&self) -> Result<U256, GatewayError> {
        if self.state.lock().unwrap().fail_fees {
            return Err(GatewayError::Provider("fee read failed".to_string()));
        }
        Ok(U256::from(1_000_000_000u64))
    }

    async fn latest_base_fee(&self) -> Result<Option<U256>, GatewayError> {
        Ok(Some(U256::from(10_000_000_000u64)))
    }

    async fn gas_price(&self) -> Result<U256, GatewayError> {
        if self.state.lock().unwrap().fail_fees {
            return Err(GatewayError::Provider("gas price read failed".to_string()));
        }
        Ok(U256::from(12_000_000_000u64))
    }
}

struct BundlerState {
    estimate: Result<GasEstimate, String>,
    send_result: Result<H256, String>,
    pending_polls: usize,
    sent: Vec<UserOperation>,
    estimated: Vec<UserOperation>,
}

pub struct MockBundler {
    state: Mutex<BundlerState>,
    pub receipt_calls: AtomicUsize,
}

impl MockBundler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BundlerState {
                estimate: Ok(estimate()),
                send_result: Ok(H256::repeat_byte(0x0b)),
                pending_polls: 0,
                sent: Vec::new(),
                estimated: Vec::new(),
            }),
            receipt_calls: AtomicUsize::new(0),
        })
    }

    pub fn fail_estimate(&self, message: &str) {
        self.state.lock().unwrap().estimate = Err(message.to_string());
    }

    pub fn reject_send(&self, message: &str) {
        self.state.lock().unwrap().send_result = Err(message.to_string());
    }

    /// Number of receipt polls answered with `null` before the receipt shows up.
    /// `usize::MAX` never includes the operation.
    pub fn include_after(&self, polls: usize) {
        self.state.lock().unwrap().pending_polls = polls;
    }

    pub fn sent(&self) -> Vec<UserOperation> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn estimated(&self) -> Vec<UserOperation> {
        self.state.lock().unwrap().estimated.clone()
    }
}

#[async_trait]
impl BundlerRpc for MockBundler {
    async fn send_user_operation(
        &self,
        user_op: &UserOperation,
        entry_point: Address,
    ) -> Result<H256, RpcClientError> {
        let mut state = self.state.lock().unwrap();
        assert_eq!(entry_point, crate::common::entry_point());
        state.sent.push(user_op.clone());
        state
            .send_result
            .clone()
            .map_err(|message| RpcClientError::new("eth_sendUserOperation", message))
    }

    async fn estimate_user_operation_gas(
        &self,
        user_op: &UserOperation,
        _entry_point: Address,
    ) -> Result<GasEstimate, RpcClientError> {
        let mut state = self.state.lock().unwrap();
        state.estimated.push(user_op.clone());
        state
            .estimate
            .clone()
            .map_err(|message| RpcClientError::new("eth_estimateUserOperationGas", message))
    }

    async fn get_user_operation_receipt(
        &self,
        user_op_hash: H256,
    ) -> Result<Option<UserOperationReceipt>, RpcClientError> {
        self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.pending_polls > 0 {
            state.pending_polls -= 1;
            return Ok(None);
        }
        Ok(Some(UserOperationReceipt {
            user_op_hash,
            sender: account(),
            success: true,
            receipt: TransactionReceipt {
                transaction_hash: H256::repeat_byte(0x7c),
                ..Default::default()
            },
            ..Default::default()
        }))
    }
}

pub struct MockPaymaster {
    result: Result<PaymasterResult, String>,
    pub calls: AtomicUsize,
    pub contexts: Mutex<Vec<PaymasterContext>>,
}

impl MockPaymaster {
    pub fn sponsoring() -> Arc<Self> {
        Self::with_result(Ok(PaymasterResult {
            paymaster_and_data: Bytes::from(vec![0xe9; 85]),
            pre_verification_gas: Some(U256::from(50_000)),
            verification_gas_limit: Some(U256::from(400_000)),
            call_gas_limit: Some(U256::from(70_000)),
        }))
    }

    pub fn with_result(result: Result<PaymasterResult, String>) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::with_result(Err(message.to_string()))
    }
}

#[async_trait]
impl PaymasterRpc for MockPaymaster {
    async fn sponsor_user_operation(
        &self,
        _user_op: &UserOperation,
        _entry_point: Address,
        context: &PaymasterContext,
    ) -> Result<PaymasterResult, RpcClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(context.clone());
        self.result
            .clone()
            .map_err(|message| RpcClientError::new("pm_sponsorUserOperation", message))
    }
}

/// Signs the dummy digest at init, then refuses everything.
pub struct FailingSigner {
    inner: LocalWallet,
    signed: AtomicUsize,
}

impl FailingSigner {
    pub fn new() -> Self {
        Self {
            inner: wallet(),
            signed: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl UserOpSigner for FailingSigner {
    fn address(&self) -> Address {
        Signer::address(&self.inner)
    }

    async fn sign_digest(&self, digest: H256) -> Result<Bytes, SignerError> {
        if self.signed.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(SignerError("hardware wallet disconnected".to_string()));
        }
        UserOpSigner::sign_digest(&self.inner, digest).await
    }
}

pub fn options() -> BuilderOptions {
    BuilderOptions::new(entry_point(), factory(), CHAIN_ID)
}

pub async fn builder(
    gateway: &Arc<MockGateway>,
    bundler: &Arc<MockBundler>,
    opts: BuilderOptions,
) -> AccountBuilder<MockGateway, LocalWallet> {
    AccountBuilder::init(wallet(), Arc::clone(gateway), Arc::clone(bundler), opts)
        .await
        .unwrap()
}

pub fn paymaster_context() -> PaymasterContext {
    PaymasterContext::pay_as_you_go()
}
