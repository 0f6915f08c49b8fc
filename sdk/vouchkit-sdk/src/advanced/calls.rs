use crate::core::signer::VouchSigner;
use crate::error::{Result, VouchSdkError};
use crate::types::{BlockNumber, VoucherId};
use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

/// Chain calls this SDK submits. The borsh encoding is the signing payload.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum Call {
    IssueVoucher {
        owner: [u8; 32],
        balance: u128,
        duration: BlockNumber,
        programs: Vec<[u8; 32]>,
    },
    UpdateVoucher {
        owner: [u8; 32],
        voucher_id: VoucherId,
        balance_top_up: Option<u128>,
        prolong_duration: Option<BlockNumber>,
    },
    SendMessage {
        destination: [u8; 32],
        payload: Vec<u8>,
        gas_limit: u64,
        value: u128,
        voucher_id: Option<VoucherId>,
    },
}

impl Call {
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        Ok(borsh::to_vec(self)?)
    }
}

pub fn issue_voucher(
    owner: &Pubkey,
    balance: u128,
    duration: BlockNumber,
    programs: &[Pubkey],
) -> Call {
    Call::IssueVoucher {
        owner: owner.to_bytes(),
        balance,
        duration,
        programs: programs.iter().map(|program| program.to_bytes()).collect(),
    }
}

pub fn prolong_voucher(owner: &Pubkey, voucher_id: &VoucherId, blocks: BlockNumber) -> Call {
    Call::UpdateVoucher {
        owner: owner.to_bytes(),
        voucher_id: *voucher_id,
        balance_top_up: None,
        prolong_duration: Some(blocks),
    }
}

pub fn top_up_voucher(owner: &Pubkey, voucher_id: &VoucherId, amount: u128) -> Call {
    Call::UpdateVoucher {
        owner: owner.to_bytes(),
        voucher_id: *voucher_id,
        balance_top_up: Some(amount),
        prolong_duration: None,
    }
}

pub fn send_message(
    destination: &Pubkey,
    payload: Vec<u8>,
    gas_limit: u64,
    value: u128,
    voucher_id: Option<VoucherId>,
) -> Call {
    Call::SendMessage {
        destination: destination.to_bytes(),
        payload,
        gas_limit,
        value,
        voucher_id,
    }
}

/// A call together with its signer and signature, ready to broadcast.
/// Anyone holding it can check the signature against the signer address.
#[derive(Debug, Clone)]
pub struct SignedExtrinsic {
    pub signer: Pubkey,
    pub call: Call,
    pub signature: Signature,
}

impl SignedExtrinsic {
    pub async fn sign(call: Call, signer: &dyn VouchSigner) -> Result<Self> {
        let payload = call.signing_payload()?;
        let signature = signer
            .sign_payload(&payload)
            .await
            .map_err(|e| VouchSdkError::SubmissionFailure(format!("signing failed: {e}")))?;

        Ok(Self {
            signer: signer.address(),
            call,
            signature,
        })
    }

    pub fn verify(&self) -> bool {
        match self.call.signing_payload() {
            Ok(payload) => self.signature.verify(self.signer.as_ref(), &payload),
            Err(_) => false,
        }
    }

    /// Hash identifying the extrinsic in the pool
    pub fn hash(&self) -> Result<Hash> {
        let mut hasher = Sha256::new();
        hasher.update(self.call.signing_payload()?);
        hasher.update(self.signature.as_ref());
        Ok(Hash::new_from_array(hasher.finalize().into()))
    }
}
