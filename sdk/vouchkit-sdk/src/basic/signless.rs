//! Signless sessions backed by the keyring service.
//!
//! A credential is stored on-chain, encrypted, under either the owner's wallet
//! address or the coded name of a walletless user. Restoring a session looks
//! the credential up, unlocks it and attaches a usable voucher; creating one
//! generates and locks a credential, issues its voucher and binds the record
//! with a call signed by the credential itself and paid by that voucher.

use crate::basic::contract::ContractClient;
use crate::basic::session::{Session, SessionOrchestrator};
use crate::basic::vault::{self, CredentialVault, SignlessCredential};
use crate::core::constants::{DEFAULT_CREDENTIAL_LABEL, MIN_PASSWORD_LEN};
use crate::core::progress::{tracked, Step};
use crate::core::signer::VouchSigner;
use crate::error::{Result, VouchSdkError};
use crate::types::VoucherId;
use crate::utils::coded_name;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{debug, info};
use vouchkit_interface::keyring::{
    KeyringCommandReply, KeyringData, KeyringQueryReply, ACCOUNT_DATA, ADDRESS_FROM_USER_ADDRESS,
    ADDRESS_FROM_USER_CODED_NAME, BIND_TO_USER_ADDRESS, BIND_TO_USER_CODED_NAME, KEYRING_SERVICE,
};

/// Key a credential record is stored under
#[derive(Debug, Clone, Copy)]
enum StorageKey<'k> {
    UserAddress(&'k Pubkey),
    CodedName(&'k str),
}

pub struct SignlessFlow<'a> {
    contract: ContractClient<'a>,
    orchestrator: SessionOrchestrator<'a>,
    vault: CredentialVault,
}

impl<'a> SignlessFlow<'a> {
    pub fn new(contract: ContractClient<'a>, orchestrator: SessionOrchestrator<'a>) -> Self {
        Self {
            contract,
            orchestrator,
            vault: CredentialVault::new(),
        }
    }

    pub fn with_vault(mut self, vault: CredentialVault) -> Self {
        self.vault = vault;
        self
    }

    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    //=========================================================================
    // Keyring Queries
    //=========================================================================

    pub async fn address_from_user_address(&self, user: &Pubkey) -> Result<Option<Pubkey>> {
        let reply: KeyringQueryReply = self
            .contract
            .query(KEYRING_SERVICE, ADDRESS_FROM_USER_ADDRESS)?
            .with_args(&user.to_bytes())?
            .call_decoded()
            .await?;
        Ok(reply.into_address().map(Pubkey::new_from_array))
    }

    /// `coded` is the already-hashed name, see [`coded_name`].
    pub async fn address_from_coded_name(&self, coded: &str) -> Result<Option<Pubkey>> {
        let reply: KeyringQueryReply = self
            .contract
            .query(KEYRING_SERVICE, ADDRESS_FROM_USER_CODED_NAME)?
            .with_args(&coded.to_string())?
            .call_decoded()
            .await?;
        Ok(reply.into_address().map(Pubkey::new_from_array))
    }

    pub async fn account_data(&self, keyring_address: &Pubkey) -> Result<Option<KeyringData>> {
        let reply: KeyringQueryReply = self
            .contract
            .query(KEYRING_SERVICE, ACCOUNT_DATA)?
            .with_args(&keyring_address.to_bytes())?
            .call_decoded()
            .await?;
        Ok(reply.into_data())
    }

    //=========================================================================
    // Session Flows
    //=========================================================================

    /// Signless session for a connected wallet.
    ///
    /// Restores the credential bound to the wallet if there is one, otherwise
    /// creates and binds a new credential labelled `label`.
    pub async fn open_wallet_session(
        &self,
        wallet: Arc<dyn VouchSigner>,
        password: &str,
        label: Option<&str>,
    ) -> Result<Session> {
        validate_password(password)?;
        let user = wallet.address();

        let (credential, voucher_id) = match self.address_from_user_address(&user).await? {
            Some(address) => {
                debug!(%user, %address, "restoring wallet credential");
                let label = label.unwrap_or(DEFAULT_CREDENTIAL_LABEL);
                self.restore(&address, label, password).await?
            },
            None => {
                self.create_and_bind(StorageKey::UserAddress(&user), label, password)
                    .await?
            },
        };

        let mut session = Session::with_wallet(wallet).with_credential(credential);
        session.voucher_id = Some(voucher_id);
        Ok(session)
    }

    /// Restore the walletless session stored under `name`.
    /// Returns `None` if nothing is stored under the name.
    pub async fn restore_coded_name_session(&self, name: &str, password: &str) -> Result<Option<Session>> {
        validate_password(password)?;
        let coded = coded_name(name);

        let Some(address) = self.address_from_coded_name(&coded).await? else {
            debug!(%coded, "no credential stored for coded name");
            return Ok(None);
        };

        let (credential, voucher_id) = self.restore(&address, name, password).await?;
        Ok(Some(Session {
            voucher_id: Some(voucher_id),
            credential: Some(credential),
            wallet: None,
            coded_name: Some(coded),
        }))
    }

    /// Create a walletless session and store its credential under `name`.
    ///
    /// A name that is already registered is rejected before any voucher is
    /// issued.
    pub async fn create_coded_name_session(&self, name: &str, password: &str) -> Result<Session> {
        validate_password(password)?;
        let coded = coded_name(name);

        if let Some(address) = self.address_from_coded_name(&coded).await? {
            debug!(%coded, %address, "coded name taken");
            return Err(VouchSdkError::Validation(
                "coded name already registered".to_string(),
            ));
        }

        let (credential, voucher_id) = self
            .create_and_bind(StorageKey::CodedName(&coded), Some(name), password)
            .await?;
        Ok(Session {
            voucher_id: Some(voucher_id),
            credential: Some(credential),
            wallet: None,
            coded_name: Some(coded),
        })
    }

    async fn restore(
        &self,
        address: &Pubkey,
        label: &str,
        password: &str,
    ) -> Result<(Arc<SignlessCredential>, VoucherId)> {
        let record = self.account_data(address).await?.ok_or_else(|| {
            VouchSdkError::InvalidCredential(format!("no keyring data stored for {address}"))
        })?;

        let locked = vault::from_contract_format(&record, label);
        let credential = self.vault.unlock(&locked, password)?;
        if credential.address() != *address {
            return Err(VouchSdkError::InvalidCredential(format!(
                "keyring entry {address} holds the credential of {}",
                credential.address()
            )));
        }

        let mut session = Session::new();
        let voucher_id = self
            .orchestrator
            .acquire_voucher(&mut session, address, &self.contract.program_id())
            .await?;

        info!(%address, %voucher_id, "signless credential restored");
        Ok((Arc::new(credential), voucher_id))
    }

    async fn create_and_bind(
        &self,
        key: StorageKey<'_>,
        label: Option<&str>,
        password: &str,
    ) -> Result<(Arc<SignlessCredential>, VoucherId)> {
        let credential = Arc::new(self.vault.generate(label));
        let address = credential.address();
        let record = vault::to_contract_format(&self.vault.lock(&credential, password)?);

        let policy = self.orchestrator.policy();
        let voucher_id = self
            .orchestrator
            .ctx()
            .vouchers()
            .issue(
                self.orchestrator.sponsor(),
                &address,
                &[self.contract.program_id()],
                policy.initial_tokens,
                policy.initial_blocks,
            )
            .await?;

        tracked(self.orchestrator.ctx().observer(), Step::CredentialBind, async {
            let command = match key {
                StorageKey::UserAddress(user) => self
                    .contract
                    .command(KEYRING_SERVICE, BIND_TO_USER_ADDRESS)?
                    .with_args(&(user.to_bytes(), record.clone()))?,
                StorageKey::CodedName(coded) => self
                    .contract
                    .command(KEYRING_SERVICE, BIND_TO_USER_CODED_NAME)?
                    .with_args(&(coded.to_string(), record.clone()))?,
            };

            let receipt = command
                .with_account(credential.clone())
                .with_voucher(voucher_id)
                .sign_and_send()
                .await?;

            match receipt.decode_reply::<KeyringCommandReply>()? {
                KeyringCommandReply::KeyringAccountSet => Ok(()),
                KeyringCommandReply::Error(err) => Err(VouchSdkError::SubmissionFailure(format!(
                    "keyring rejected the binding: {err:?}"
                ))),
            }
        })
        .await?;

        info!(%address, %voucher_id, ?key, "signless credential created and bound");
        Ok((credential, voucher_id))
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(VouchSdkError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
