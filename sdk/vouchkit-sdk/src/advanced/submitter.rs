//! Finalization-gated submission.
//!
//! A submitted extrinsic moves through `Ready → Broadcast → (InBlock)* →
//! Finalized`. Only `Finalized` completes a submission; every failure status
//! rejects it. Each submission completes exactly once and is never retried
//! here.

use crate::advanced::calls::{Call, SignedExtrinsic};
use crate::core::connection::{ChainConnection, ChainEvent, FinalizedBlock, StatusStream, TxStatus};
use crate::core::progress::{tracked, ProgressObserver, Step, TracingObserver};
use crate::core::signer::VouchSigner;
use crate::error::{Result, VouchSdkError};
use solana_sdk::hash::Hash;
use std::time::Duration;
use tracing::{debug, trace};

/// Outcome of a finalized extrinsic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedTx {
    pub tx_hash: Hash,
    pub block_hash: Hash,
    pub events: Vec<ChainEvent>,
}

pub struct Submitter<'a> {
    connection: &'a dyn ChainConnection,
    finalization_timeout: Option<Duration>,
    observer: &'a dyn ProgressObserver,
}

impl<'a> Submitter<'a> {
    /// `finalization_timeout` of `None` waits indefinitely.
    pub fn new(connection: &'a dyn ChainConnection, finalization_timeout: Option<Duration>) -> Self {
        Self {
            connection,
            finalization_timeout,
            observer: &TracingObserver,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = observer;
        self
    }

    pub async fn sign_and_submit(&self, call: Call, signer: &dyn VouchSigner) -> Result<FinalizedTx> {
        let extrinsic = SignedExtrinsic::sign(call, signer).await?;
        self.submit(extrinsic).await
    }

    pub async fn submit(&self, extrinsic: SignedExtrinsic) -> Result<FinalizedTx> {
        let tx_hash = extrinsic.hash()?;
        let signer = extrinsic.signer;

        let stream = tracked(self.observer, Step::Submission, async {
            self.connection
                .submit(extrinsic)
                .await
                .map_err(|e| VouchSdkError::SubmissionFailure(format!("broadcast failed: {e}")))
        })
        .await?;
        debug!(%tx_hash, %signer, "extrinsic broadcast, awaiting finalization");

        let block = tracked(self.observer, Step::Finalization, self.await_with_timeout(stream)).await?;

        if let Some(reason) = block.events.iter().find_map(|event| match event {
            ChainEvent::ExtrinsicFailed { reason } => Some(reason.clone()),
            _ => None,
        }) {
            return Err(VouchSdkError::SubmissionFailure(format!(
                "dispatch failed in block {}: {reason}",
                block.block_hash
            )));
        }

        debug!(%tx_hash, block_hash = %block.block_hash, events = block.events.len(), "extrinsic finalized");
        Ok(FinalizedTx {
            tx_hash,
            block_hash: block.block_hash,
            events: block.events,
        })
    }

    async fn await_with_timeout(&self, stream: StatusStream) -> Result<FinalizedBlock> {
        match self.finalization_timeout {
            Some(limit) => tokio::time::timeout(limit, await_finalization(stream))
                .await
                .map_err(|_| {
                    VouchSdkError::FinalizationNotObserved(format!(
                        "no terminal status within {}ms",
                        limit.as_millis()
                    ))
                })?,
            None => await_finalization(stream).await,
        }
    }
}

/// Drain the status stream until a terminal status arrives.
pub async fn await_finalization(mut stream: StatusStream) -> Result<FinalizedBlock> {
    while let Some(status) = stream.recv().await {
        match status {
            TxStatus::Finalized(block) => return Ok(block),
            TxStatus::Future
            | TxStatus::Ready
            | TxStatus::Broadcast
            | TxStatus::InBlock(_)
            | TxStatus::Retracted(_) => {
                trace!(?status, "intermediate status");
            },
            TxStatus::FinalityTimeout(block) => {
                return Err(VouchSdkError::SubmissionFailure(format!(
                    "finality timeout for block {block}"
                )))
            },
            TxStatus::Usurped(by) => {
                return Err(VouchSdkError::SubmissionFailure(format!("usurped by {by}")))
            },
            TxStatus::Dropped => {
                return Err(VouchSdkError::SubmissionFailure(
                    "dropped from the pool".to_string(),
                ))
            },
            TxStatus::Invalid(reason) => {
                return Err(VouchSdkError::SubmissionFailure(format!("invalid: {reason}")))
            },
        }
    }

    Err(VouchSdkError::FinalizationNotObserved(
        "status stream closed before finalization".to_string(),
    ))
}
