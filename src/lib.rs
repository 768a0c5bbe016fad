// src/lib.rs
//! Builds, signs and submits ERC-4337 user operations for a counterfactual smart account.
//!
//! [`AccountBuilder`] resolves the account address from its init code, then runs every build
//! through a fixed middleware pipeline: defaults, nonce and init code, gas price, gas limits
//! (bundler estimate or paymaster sponsorship), signature. [`Client`] submits the result and
//! waits for inclusion.

pub mod builder;
pub mod bundler;
pub mod context;
pub mod contracts;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod paymaster;
pub mod pipeline;
pub mod resolver;
pub mod rpc;
pub mod signer;
pub mod types;

pub use builder::{AccountBuilder, AccountIdentity, BuilderOptions};
pub use bundler::{BundlerRpc, Client, HttpBundler, PendingUserOperation, WaitOptions};
pub use context::OperationContext;
pub use error::{AccountError, GatewayError, ResolutionError, RpcClientError, SignerError, StepError};
pub use gateway::{CallOutcome, ChainGateway};
pub use paymaster::{HttpPaymaster, PaymasterRpc, VerifyingPaymaster};
pub use pipeline::{GasLimitStage, MiddlewarePipeline, PipelineStages, UserOperationMiddleware};
pub use resolver::AddressResolver;
pub use signer::UserOpSigner;
pub use types::{
    GasEstimate, GasFees, PartialUserOperation, PaymasterContext, PaymasterResult,
    UserOperation, UserOperationReceipt,
};
