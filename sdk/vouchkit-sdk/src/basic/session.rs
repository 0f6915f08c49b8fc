use crate::basic::contract::{CommandBuilder, CommandReceipt};
use crate::basic::vault::SignlessCredential;
use crate::config::VoucherPolicy;
use crate::core::context::ChainContext;
use crate::core::signer::VouchSigner;
use crate::error::{Result, VouchSdkError};
use crate::types::{BlockNumber, VoucherId};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// The caller's current operating context.
///
/// A sponsored call needs a voucher and a signer: the signless credential
/// when one is active, otherwise the connected wallet.
#[derive(Clone, Default)]
pub struct Session {
    pub voucher_id: Option<VoucherId>,
    pub credential: Option<Arc<SignlessCredential>>,
    pub wallet: Option<Arc<dyn VouchSigner>>,
    /// Hashed name the credential is stored under, for walletless sessions
    pub coded_name: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wallet(wallet: Arc<dyn VouchSigner>) -> Self {
        Self {
            wallet: Some(wallet),
            ..Self::default()
        }
    }

    pub fn with_credential(mut self, credential: Arc<SignlessCredential>) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_voucher(mut self, voucher_id: VoucherId) -> Self {
        self.voucher_id = Some(voucher_id);
        self
    }

    /// Account that signs sponsored calls
    pub fn signer(&self) -> Result<Arc<dyn VouchSigner>> {
        if let Some(credential) = &self.credential {
            let signer: Arc<dyn VouchSigner> = credential.clone();
            return Ok(signer);
        }
        self.wallet.clone().ok_or_else(|| {
            VouchSdkError::SessionIncomplete("no signless credential or connected wallet".to_string())
        })
    }

    pub fn voucher(&self) -> Result<VoucherId> {
        self.voucher_id
            .ok_or_else(|| VouchSdkError::SessionIncomplete("no active voucher".to_string()))
    }

    pub fn is_signless(&self) -> bool {
        self.credential.is_some()
    }

    /// Drop the credential and voucher. The wallet stays connected.
    pub fn end(&mut self) {
        self.credential = None;
        self.voucher_id = None;
        self.coded_name = None;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("voucher_id", &self.voucher_id)
            .field("credential", &self.credential)
            .field("wallet", &self.wallet.as_ref().map(|w| w.address()))
            .field("coded_name", &self.coded_name)
            .finish()
    }
}

//=============================================================================
// Orchestrator
//=============================================================================

/// Keeps session vouchers usable. Maintenance is signed by the sponsor.
pub struct SessionOrchestrator<'a> {
    ctx: &'a ChainContext,
    sponsor: &'a dyn VouchSigner,
    policy: VoucherPolicy,
}

impl<'a> SessionOrchestrator<'a> {
    pub fn new(ctx: &'a ChainContext, sponsor: &'a dyn VouchSigner) -> Self {
        Self {
            ctx,
            sponsor,
            policy: *ctx.policy(),
        }
    }

    pub fn with_policy(mut self, policy: VoucherPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn ctx(&self) -> &'a ChainContext {
        self.ctx
    }

    pub fn sponsor(&self) -> &'a dyn VouchSigner {
        self.sponsor
    }

    pub fn policy(&self) -> &VoucherPolicy {
        &self.policy
    }

    /// [`SessionOrchestrator::ensure_ready_with`] using the policy thresholds.
    pub async fn ensure_ready(&self, owner: &Pubkey, voucher_id: &VoucherId) -> Result<()> {
        self.ensure_ready_with(owner, voucher_id, self.policy.min_balance, self.policy.renew_blocks)
            .await
    }

    /// Make `voucher_id` unexpired and funded before a sponsored call.
    ///
    /// Renews by `renew_blocks` if expired, then tops up by the policy
    /// increment if the balance is under `min_balance`. The two steps run one
    /// after the other and a renewal is not rolled back if the top-up fails.
    /// Any failure is returned as `VoucherMaintenanceFailed`.
    pub async fn ensure_ready_with(
        &self,
        owner: &Pubkey,
        voucher_id: &VoucherId,
        min_balance: u128,
        renew_blocks: BlockNumber,
    ) -> Result<()> {
        self.maintain(owner, voucher_id, min_balance, renew_blocks)
            .await
            .map_err(VouchSdkError::maintenance)
    }

    async fn maintain(
        &self,
        owner: &Pubkey,
        voucher_id: &VoucherId,
        min_balance: u128,
        renew_blocks: BlockNumber,
    ) -> Result<()> {
        let vouchers = self.ctx.vouchers();

        if vouchers.is_expired(owner, voucher_id).await? {
            info!(%voucher_id, renew_blocks, "voucher expired, renewing");
            vouchers
                .renew(self.sponsor, owner, voucher_id, renew_blocks)
                .await?;
        }

        let balance = vouchers.balance(voucher_id).await?;
        if balance < min_balance {
            info!(%voucher_id, balance, min_balance, "voucher balance low, topping up");
            vouchers
                .top_up(self.sponsor, owner, voucher_id, self.policy.top_up_tokens)
                .await?;
        }

        debug!(%voucher_id, "voucher ready");
        Ok(())
    }

    /// Attach a usable voucher for `owner` on `program_id` to `session`.
    ///
    /// Keeps the session's voucher if it has one, else takes the first voucher
    /// the chain lists, else issues a fresh one with the policy amounts.
    /// Existing vouchers go through [`SessionOrchestrator::ensure_ready`].
    pub async fn acquire_voucher(
        &self,
        session: &mut Session,
        owner: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<VoucherId> {
        let existing = match session.voucher_id {
            Some(voucher_id) => Some(voucher_id),
            None => self
                .ctx
                .vouchers()
                .list_for_account_and_contract(owner, program_id)
                .await?
                .first()
                .copied(),
        };

        let voucher_id = match existing {
            Some(voucher_id) => {
                self.ensure_ready(owner, &voucher_id).await?;
                voucher_id
            },
            None => {
                self.ctx
                    .vouchers()
                    .issue(
                        self.sponsor,
                        owner,
                        &[*program_id],
                        self.policy.initial_tokens,
                        self.policy.initial_blocks,
                    )
                    .await?
            },
        };

        session.voucher_id = Some(voucher_id);
        Ok(voucher_id)
    }

    /// Send `command` signed by the session and paid by its voucher, after
    /// making sure the voucher is usable.
    ///
    /// A voucher that does not cover the command's contract is rejected
    /// before any maintenance or broadcast.
    pub async fn send_sponsored(
        &self,
        session: &Session,
        command: CommandBuilder<'_>,
    ) -> Result<CommandReceipt> {
        let signer = session.signer()?;
        let voucher_id = session.voucher()?;
        let owner = signer.address();

        let program_id = command.program_id();
        let details = self.ctx.vouchers().details(&owner, &voucher_id).await?;
        if !details.allows_program(&program_id) {
            return Err(VouchSdkError::Validation(format!(
                "voucher {voucher_id} does not cover contract {program_id}"
            )));
        }

        self.ensure_ready(&owner, &voucher_id).await?;

        command
            .with_account(signer)
            .with_voucher(voucher_id)
            .sign_and_send()
            .await
    }
}
