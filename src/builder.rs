// src/builder.rs
use std::sync::Arc;

use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;
use tracing::info;

use crate::bundler::BundlerRpc;
use crate::context::OperationContext;
use crate::contracts::{deploy_account_init_code, encode_approve, AccountProxy};
use crate::error::AccountError;
use crate::gateway::ChainGateway;
use crate::middleware::{
    EstimateUserOperationGas, GasPrice, ResolveAccount, SignUserOpHash, UseDefaults,
};
use crate::pipeline::{GasLimitStage, MiddlewarePipeline, PipelineStages, UserOperationMiddleware};
use crate::resolver::AddressResolver;
use crate::signer::UserOpSigner;
use crate::types::{PartialUserOperation, UserOperation};

/// Payload whose signature stands in for the real one during gas estimation.
const DUMMY_SIGNATURE_PAYLOAD: [u8; 2] = [0xde, 0xad];

/// Construction parameters for [`AccountBuilder`].
pub struct BuilderOptions {
    pub entry_point: Address,
    pub factory: Address,
    pub chain_id: u64,
    pub nonce_key: U256,
    /// Replaces bundler gas estimation when set.
    pub paymaster_middleware: Option<Box<dyn UserOperationMiddleware>>,
}

impl BuilderOptions {
    pub fn new(entry_point: Address, factory: Address, chain_id: u64) -> Self {
        Self {
            entry_point,
            factory,
            chain_id,
            nonce_key: U256::zero(),
            paymaster_middleware: None,
        }
    }

    pub fn with_nonce_key(mut self, nonce_key: U256) -> Self {
        self.nonce_key = nonce_key;
        self
    }

    pub fn with_paymaster(mut self, middleware: impl UserOperationMiddleware + 'static) -> Self {
        self.paymaster_middleware = Some(Box::new(middleware));
        self
    }
}

/// Owner key and deployment details of one account.
pub struct AccountIdentity<S> {
    pub signer: Arc<S>,
    pub factory: Address,
    pub entry_point: Address,
}

/// Builds signed user operations for a counterfactual account.
///
/// [`AccountBuilder::init`] resolves the account address once and freezes the middleware
/// pipeline. Each [`AccountBuilder::build`] runs the pipeline on a fresh context, so builds
/// may run concurrently.
pub struct AccountBuilder<G, S> {
    gateway: Arc<G>,
    identity: AccountIdentity<S>,
    proxy: AccountProxy,
    chain_id: u64,
    base: PartialUserOperation,
    pipeline: MiddlewarePipeline,
}

impl<G, S> AccountBuilder<G, S>
where
    G: ChainGateway + 'static,
    S: UserOpSigner,
{
    pub async fn init<B>(
        signer: S,
        gateway: Arc<G>,
        bundler: Arc<B>,
        opts: BuilderOptions,
    ) -> Result<Self, AccountError>
    where
        B: BundlerRpc + 'static,
    {
        let BuilderOptions {
            entry_point,
            factory,
            chain_id,
            nonce_key,
            paymaster_middleware,
        } = opts;

        let signer = Arc::new(signer);
        let owner = signer.address();
        let init_code = deploy_account_init_code(factory, owner);

        let sender = AddressResolver::new(Arc::clone(&gateway), entry_point)
            .resolve(&init_code)
            .await?;
        let proxy = AccountProxy::new(sender);
        info!("Account owner {:?} resolved to account {:?}", owner, sender);

        let dummy_signature = signer
            .sign_digest(H256::from(keccak256(DUMMY_SIGNATURE_PAYLOAD)))
            .await?;

        let gas_limits = match paymaster_middleware {
            Some(middleware) => GasLimitStage::Sponsored(middleware),
            None => GasLimitStage::Estimated(Box::new(EstimateUserOperationGas::new(bundler))),
        };
        let pipeline = MiddlewarePipeline::new(PipelineStages {
            defaults: Box::new(UseDefaults::new(proxy.address(), dummy_signature)),
            resolve_account: Box::new(ResolveAccount::new(
                Arc::clone(&gateway),
                nonce_key,
                init_code,
            )),
            gas_price: Box::new(GasPrice::new(Arc::clone(&gateway))),
            gas_limits,
            sign: Box::new(SignUserOpHash::new(Arc::clone(&signer))),
        });

        Ok(Self {
            gateway,
            identity: AccountIdentity {
                signer,
                factory,
                entry_point,
            },
            proxy,
            chain_id,
            base: PartialUserOperation::default(),
            pipeline,
        })
    }

    /// Counterfactual (or deployed) account address.
    pub fn sender(&self) -> Address {
        self.proxy.address()
    }

    pub fn owner(&self) -> Address {
        self.identity.signer.address()
    }

    pub fn proxy(&self) -> &AccountProxy {
        &self.proxy
    }

    pub fn identity(&self) -> &AccountIdentity<S> {
        &self.identity
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn entry_point(&self) -> Address {
        self.identity.entry_point
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn call_data(&self) -> &Bytes {
        &self.base.call_data
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.pipeline.step_names()
    }

    /// Sets the operation's call data to `execute(target, value, data)` on the account.
    pub fn execute(&mut self, target: Address, value: U256, data: Bytes) -> &mut Self {
        self.base.call_data = self.proxy.encode_execute(target, value, data);
        self
    }

    /// Has the account approve `spender` for `amount` of `token`.
    pub fn approve(&mut self, token: Address, spender: Address, amount: U256) -> &mut Self {
        self.execute(token, U256::zero(), encode_approve(spender, amount))
    }

    /// Runs the full pipeline and returns the signed operation.
    pub async fn build(&self) -> Result<UserOperation, AccountError> {
        let ctx = OperationContext::new(self.base.clone(), self.entry_point(), self.chain_id);
        self.pipeline.build(ctx).await
    }

    /// Like [`AccountBuilder::build`], but returns the whole context including scratch values.
    pub async fn build_context(&self) -> Result<OperationContext, AccountError> {
        let ctx = OperationContext::new(self.base.clone(), self.entry_point(), self.chain_id);
        self.pipeline.run(ctx).await
    }
}
