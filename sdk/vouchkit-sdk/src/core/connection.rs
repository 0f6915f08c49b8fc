use crate::advanced::calls::SignedExtrinsic;
use crate::types::{BlockNumber, VoucherDetails, VoucherId};
use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

pub type ConnectionError = Box<dyn Error + Send + Sync>;

/// Status notifications for one submitted extrinsic, in arrival order.
pub type StatusStream = UnboundedReceiver<TxStatus>;

/// Lifecycle of a submitted extrinsic as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Queued behind an earlier nonce
    Future,
    /// Valid and waiting in the pool
    Ready,
    /// Gossiped to peers
    Broadcast,
    /// Included in a block that may still be reverted
    InBlock(Hash),
    /// The including block was retracted; the extrinsic may be re-included
    Retracted(Hash),
    /// Permanently included
    Finalized(FinalizedBlock),
    /// Gave up waiting for finality of the including block
    FinalityTimeout(Hash),
    /// Replaced by another extrinsic with the same nonce
    Usurped(Hash),
    /// Removed from the pool
    Dropped,
    /// Rejected by the pool
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedBlock {
    pub block_hash: Hash,
    /// Events emitted by the extrinsic in this block
    pub events: Vec<ChainEvent>,
}

/// Events an extrinsic can emit that this SDK interprets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    VoucherIssued {
        owner: Pubkey,
        voucher_id: VoucherId,
    },
    VoucherUpdated {
        owner: Pubkey,
        voucher_id: VoucherId,
        new_expiry: Option<BlockNumber>,
        balance_top_up: Option<u128>,
    },
    MessageQueued {
        message_id: Hash,
        source: Pubkey,
        destination: Pubkey,
    },
    Reply {
        reply_to: Hash,
        payload: Vec<u8>,
    },
    /// Dispatch failed after inclusion
    ExtrinsicFailed {
        reason: String,
    },
}

/// Access to a chain node. Implementations wrap an RPC client; tests use an
/// in-memory chain.
#[async_trait]
pub trait ChainConnection: Send + Sync {
    /// Whether the handle finished connecting and can serve requests
    fn is_ready(&self) -> bool {
        true
    }

    async fn finalized_block_number(&self) -> Result<BlockNumber, ConnectionError>;

    async fn free_balance(&self, account: &Pubkey) -> Result<u128, ConnectionError>;

    async fn voucher_details(
        &self,
        owner: &Pubkey,
        voucher_id: &VoucherId,
    ) -> Result<Option<VoucherDetails>, ConnectionError>;

    async fn vouchers_for_account(
        &self,
        owner: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Vec<VoucherId>, ConnectionError>;

    /// Execute a read-only query against a contract and return the raw reply
    async fn read_state(
        &self,
        program_id: &Pubkey,
        origin: &Pubkey,
        payload: &[u8],
    ) -> Result<Vec<u8>, ConnectionError>;

    async fn calculate_gas(
        &self,
        origin: &Pubkey,
        program_id: &Pubkey,
        payload: &[u8],
        value: u128,
    ) -> Result<u64, ConnectionError>;

    /// Broadcast a signed extrinsic and stream its status updates
    async fn submit(&self, extrinsic: SignedExtrinsic) -> Result<StatusStream, ConnectionError>;
}

/// Opens a [`ChainConnection`] to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Arc<dyn ChainConnection>, ConnectionError>;
}
