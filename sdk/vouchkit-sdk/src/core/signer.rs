use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;

/// Abstraction for an entity that can sign extrinsics.
/// This allows the SDK to work with:
/// 1. Local Keypairs (sponsors, signless credentials)
/// 2. Wallet extensions (connected accounts)
#[async_trait]
pub trait VouchSigner: Send + Sync {
    fn address(&self) -> Pubkey;

    /// Sign an extrinsic payload.
    /// Returns Err if the signer refused or failed.
    async fn sign_payload(&self, payload: &[u8]) -> Result<Signature, String>;
}

#[async_trait]
impl VouchSigner for Keypair {
    fn address(&self) -> Pubkey {
        Signer::pubkey(self)
    }

    async fn sign_payload(&self, payload: &[u8]) -> Result<Signature, String> {
        Ok(Signer::sign_message(self, payload))
    }
}
