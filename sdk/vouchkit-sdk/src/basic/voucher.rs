use crate::advanced::calls;
use crate::core::connection::ChainEvent;
use crate::core::constants::{MIN_ISSUE_TOKENS, MIN_VOUCHER_BLOCKS};
use crate::core::context::ChainContext;
use crate::core::progress::{tracked, Step};
use crate::core::signer::VouchSigner;
use crate::error::{Result, VouchSdkError};
use crate::types::{BlockNumber, VoucherDetails, VoucherId};
use crate::utils::{from_raw_tokens, to_raw_tokens};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info};

/// Issues, renews, funds and inspects vouchers.
///
/// Mutating operations are signed by the sponsor and resolve only once the
/// chain reports them finalized. Amounts are whole tokens.
pub struct VoucherManager<'a> {
    ctx: &'a ChainContext,
}

impl<'a> VoucherManager<'a> {
    pub fn new(ctx: &'a ChainContext) -> Self {
        Self { ctx }
    }

    //=========================================================================
    // Mutations
    //=========================================================================

    /// Issue a voucher that pays for `owner`'s calls to `programs`.
    ///
    /// # Arguments
    /// * `sponsor` - Signs and funds the issuance
    /// * `owner` - Account allowed to spend the voucher
    /// * `programs` - Contracts the voucher may pay for, at least one
    /// * `initial_tokens` - Whole tokens, at least 2
    /// * `initial_expiry_blocks` - Validity from the current block, at least 20
    ///
    /// # Returns
    /// The identifier the chain assigned to the new voucher
    pub async fn issue(
        &self,
        sponsor: &dyn VouchSigner,
        owner: &Pubkey,
        programs: &[Pubkey],
        initial_tokens: u64,
        initial_expiry_blocks: BlockNumber,
    ) -> Result<VoucherId> {
        self.ctx.ensure_connected()?;

        if initial_tokens < MIN_ISSUE_TOKENS {
            return Err(VouchSdkError::Validation(format!(
                "Min limit of initial tokens is {MIN_ISSUE_TOKENS}, got {initial_tokens}"
            )));
        }
        if initial_expiry_blocks < MIN_VOUCHER_BLOCKS {
            return Err(VouchSdkError::Validation(format!(
                "Min limit of blocks is {MIN_VOUCHER_BLOCKS}, got {initial_expiry_blocks}"
            )));
        }
        if programs.is_empty() {
            return Err(VouchSdkError::Validation(
                "voucher must be bound to at least one contract".to_string(),
            ));
        }

        let voucher_id = tracked(self.ctx.observer(), Step::VoucherIssue, async {
            let call = calls::issue_voucher(
                owner,
                to_raw_tokens(initial_tokens),
                initial_expiry_blocks,
                programs,
            );
            let tx = self.ctx.submitter().sign_and_submit(call, sponsor).await?;

            tx.events
                .iter()
                .find_map(|event| match event {
                    ChainEvent::VoucherIssued {
                        owner: issued_to,
                        voucher_id,
                    } if issued_to == owner => Some(*voucher_id),
                    _ => None,
                })
                .ok_or_else(|| {
                    VouchSdkError::SubmissionFailure(format!(
                        "issuance finalized in {} without a VoucherIssued event",
                        tx.block_hash
                    ))
                })
        })
        .await?;

        info!(%voucher_id, %owner, initial_tokens, initial_expiry_blocks, "voucher issued");
        Ok(voucher_id)
    }

    /// Extend the expiry of `voucher_id` by `num_blocks` (at least 20).
    pub async fn renew(
        &self,
        sponsor: &dyn VouchSigner,
        owner: &Pubkey,
        voucher_id: &VoucherId,
        num_blocks: BlockNumber,
    ) -> Result<()> {
        self.ctx.ensure_connected()?;

        if num_blocks < MIN_VOUCHER_BLOCKS {
            return Err(VouchSdkError::Validation(format!(
                "Min limit of blocks is {MIN_VOUCHER_BLOCKS}, got {num_blocks}"
            )));
        }

        tracked(self.ctx.observer(), Step::VoucherRenewal, async {
            let call = calls::prolong_voucher(owner, voucher_id, num_blocks);
            self.ctx.submitter().sign_and_submit(call, sponsor).await
        })
        .await?;

        info!(%voucher_id, %owner, num_blocks, "voucher renewed");
        Ok(())
    }

    /// Add `num_tokens` whole tokens to the balance of `voucher_id`.
    pub async fn top_up(
        &self,
        sponsor: &dyn VouchSigner,
        owner: &Pubkey,
        voucher_id: &VoucherId,
        num_tokens: i64,
    ) -> Result<()> {
        self.ctx.ensure_connected()?;

        let tokens = u64::try_from(num_tokens).map_err(|_| {
            VouchSdkError::Validation(format!("Top-up amount must not be negative, got {num_tokens}"))
        })?;

        tracked(self.ctx.observer(), Step::VoucherTopUp, async {
            let call = calls::top_up_voucher(owner, voucher_id, to_raw_tokens(tokens));
            self.ctx.submitter().sign_and_submit(call, sponsor).await
        })
        .await?;

        info!(%voucher_id, %owner, tokens, "voucher topped up");
        Ok(())
    }

    //=========================================================================
    // Reads
    //=========================================================================

    /// Vouchers `owner` holds for `program_id`, in chain order.
    pub async fn list_for_account_and_contract(
        &self,
        owner: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Vec<VoucherId>> {
        self.ctx.ensure_connected()?;

        let vouchers = self
            .ctx
            .connection()
            .vouchers_for_account(owner, program_id)
            .await
            .map_err(VouchSdkError::connection)?;
        debug!(%owner, %program_id, count = vouchers.len(), "listed vouchers");
        Ok(vouchers)
    }

    pub async fn details(&self, owner: &Pubkey, voucher_id: &VoucherId) -> Result<VoucherDetails> {
        self.ctx.ensure_connected()?;

        self.ctx
            .connection()
            .voucher_details(owner, voucher_id)
            .await
            .map_err(VouchSdkError::connection)?
            .ok_or(VouchSdkError::VoucherNotFound(*voucher_id))
    }

    /// `true` once the finalized height has passed the voucher's expiry.
    /// A voucher expiring at exactly the current height is still valid.
    pub async fn is_expired(&self, owner: &Pubkey, voucher_id: &VoucherId) -> Result<bool> {
        let details = self.details(owner, voucher_id).await?;
        let height = self
            .ctx
            .connection()
            .finalized_block_number()
            .await
            .map_err(VouchSdkError::connection)?;

        let expired = details.is_expired_at(height);
        debug!(%voucher_id, height, expiry = details.expiry, expired, "checked voucher expiry");
        Ok(expired)
    }

    /// Balance in whole tokens, fraction discarded.
    pub async fn balance(&self, voucher_id: &VoucherId) -> Result<u128> {
        self.ctx.ensure_connected()?;

        let raw = self
            .ctx
            .connection()
            .free_balance(&voucher_id.account())
            .await
            .map_err(VouchSdkError::connection)?;
        Ok(from_raw_tokens(raw))
    }
}
