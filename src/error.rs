// src/error.rs
use ethers::types::H256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Ethereum provider error: {0}")]
    Provider(String),

    #[error("Call reverted unexpectedly: 0x{0}")]
    Reverted(String),

    #[error("Failed to decode contract response: {0}")]
    Decode(String),
}

/// A bundler or paymaster JSON-RPC call failed. The message is kept exactly as the
/// remote end reported it.
#[derive(Error, Debug)]
#[error("{method} failed: {message}")]
pub struct RpcClientError {
    pub method: &'static str,
    pub message: String,
}

impl RpcClientError {
    pub fn new(method: &'static str, message: impl Into<String>) -> Self {
        Self {
            method,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
#[error("Signer error: {0}")]
pub struct SignerError(pub String);

#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("getSenderAddress returned without reverting, resolver produced no address")]
    NoAddress,

    #[error("Malformed resolver response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Failure raised by a single middleware step.
#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Bundler error: {0}")]
    Bundler(RpcClientError),

    #[error("Paymaster error: {0}")]
    Paymaster(RpcClientError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error("User operation is missing {0}")]
    Incomplete(&'static str),

    #[error("Failed to record step output: {0}")]
    Scratch(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Address resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error("Middleware `{step}` failed: {source}")]
    Step {
        step: &'static str,
        source: StepError,
    },

    #[error("User operation is incomplete: missing {0}")]
    Incomplete(&'static str),

    #[error("Bundler rejected user operation: {0}")]
    Submission(RpcClientError),

    #[error("Failed to query user operation receipt: {0}")]
    Receipt(RpcClientError),

    #[error("User operation {hash:?} was not included after {attempts} attempts")]
    InclusionTimeout { hash: H256, attempts: u32 },
}

impl AccountError {
    /// Name of the middleware step that aborted the build, if any.
    pub fn failed_step(&self) -> Option<&'static str> {
        match self {
            AccountError::Step { step, .. } => Some(step),
            _ => None,
        }
    }
}
