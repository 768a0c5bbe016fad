// src/signer.rs
use async_trait::async_trait;
use ethers::signers::Signer;
use ethers::types::{Address, Bytes, H256};

use crate::error::SignerError;

/// Key holder for the account owner.
///
/// Digests are signed EIP-191 style, which is what the account's signature check expects.
/// Every [`ethers::signers::Signer`] gets this for free.
#[async_trait]
pub trait UserOpSigner: Send + Sync + 'static {
    fn address(&self) -> Address;

    async fn sign_digest(&self, digest: H256) -> Result<Bytes, SignerError>;
}

#[async_trait]
impl<S> UserOpSigner for S
where
    S: Signer + 'static,
{
    fn address(&self) -> Address {
        Signer::address(self)
    }

    async fn sign_digest(&self, digest: H256) -> Result<Bytes, SignerError> {
        let signature = self
            .sign_message(digest.as_bytes())
            .await
            .map_err(|e| SignerError(e.to_string()))?;
        Ok(signature.to_vec().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::signers::LocalWallet;
    use ethers::types::RecoveryMessage;
    use ethers::types::Signature;
    use ethers::utils::keccak256;

    #[tokio::test]
    async fn wallet_signature_recovers_to_owner() {
        let wallet: LocalWallet = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
            .parse()
            .unwrap();
        let digest = H256::from(keccak256([0xde, 0xad]));

        let sig = UserOpSigner::sign_digest(&wallet, digest).await.unwrap();
        assert_eq!(sig.len(), 65);

        let signature = Signature::try_from(sig.as_ref()).unwrap();
        signature
            .verify(RecoveryMessage::Data(digest.as_bytes().to_vec()), Signer::address(&wallet))
            .unwrap();
    }
}
