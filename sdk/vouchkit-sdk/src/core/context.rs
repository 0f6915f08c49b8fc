use crate::advanced::submitter::Submitter;
use crate::basic::contract::ContractClient;
use crate::basic::session::SessionOrchestrator;
use crate::basic::signless::SignlessFlow;
use crate::basic::voucher::VoucherManager;
use crate::config::{SdkConfig, VoucherPolicy};
use crate::core::connection::{ChainConnection, Connector};
use crate::core::progress::{ProgressObserver, TracingObserver};
use crate::core::signer::VouchSigner;
use crate::error::{Result, VouchSdkError};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use vouchkit_interface::ContractInterface;

/// A contract whose interface was parsed at bind time
#[derive(Debug, Clone)]
pub struct ContractBinding {
    pub name: String,
    pub program_id: Pubkey,
    pub interface: ContractInterface,
}

/// Shared handle for everything that talks to one chain: the connection,
/// the bound contracts and the policy used for sponsored sessions.
///
/// Every operation takes the context explicitly; nothing is global.
pub struct ChainContext {
    connection: Arc<dyn ChainConnection>,
    config: SdkConfig,
    contracts: HashMap<String, ContractBinding>,
    observer: Arc<dyn ProgressObserver>,
}

impl ChainContext {
    /// Wrap an already-open connection. Contracts listed in `config` are not
    /// bound; use [`ChainContext::connect`] or [`ChainContext::bind_contract`].
    pub fn new(connection: Arc<dyn ChainConnection>, config: SdkConfig) -> Self {
        Self {
            connection,
            config,
            contracts: HashMap::new(),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Open a connection to `config.endpoint` and bind every configured
    /// contract.
    ///
    /// # Arguments
    /// * `config` - Validated before anything is opened
    /// * `connector` - Transport used to reach the endpoint
    pub async fn connect(config: SdkConfig, connector: &dyn Connector) -> Result<Self> {
        config.validate()?;

        let connection = connector
            .connect(&config.endpoint)
            .await
            .map_err(VouchSdkError::connection)?;

        let contracts = config.contracts.clone();
        let mut ctx = Self::new(connection, config);
        for contract in &contracts {
            let idl = contract.load_idl()?;
            ctx.bind_contract(&contract.name, contract.program_id()?, &idl)?;
        }

        info!(
            endpoint = %ctx.config.endpoint,
            contracts = ctx.contracts.len(),
            "chain context ready"
        );
        Ok(ctx)
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Parse `idl` and bind it under `name`, replacing any earlier binding.
    pub fn bind_contract(&mut self, name: &str, program_id: Pubkey, idl: &str) -> Result<&ContractBinding> {
        let interface = ContractInterface::parse(idl)?;
        debug!(name, %program_id, services = ?interface.service_names(), "contract bound");

        let binding = ContractBinding {
            name: name.to_string(),
            program_id,
            interface,
        };
        self.contracts.insert(name.to_string(), binding);
        self.binding(name)
    }

    pub fn connection(&self) -> &dyn ChainConnection {
        self.connection.as_ref()
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn policy(&self) -> &VoucherPolicy {
        &self.config.voucher
    }

    pub fn observer(&self) -> &dyn ProgressObserver {
        self.observer.as_ref()
    }

    pub fn ensure_connected(&self) -> Result<()> {
        if self.connection.is_ready() {
            Ok(())
        } else {
            Err(VouchSdkError::ConnectionNotReady)
        }
    }

    pub fn binding(&self, name: &str) -> Result<&ContractBinding> {
        self.contracts
            .get(name)
            .ok_or_else(|| VouchSdkError::ContractNotBound(name.to_string()))
    }

    pub fn submitter(&self) -> Submitter<'_> {
        Submitter::new(
            self.connection.as_ref(),
            self.config.submission.finalization_timeout(),
        )
        .with_observer(self.observer.as_ref())
    }

    pub fn vouchers(&self) -> VoucherManager<'_> {
        VoucherManager::new(self)
    }

    pub fn contract(&self, name: &str) -> Result<ContractClient<'_>> {
        Ok(ContractClient::new(self, self.binding(name)?))
    }

    /// Session orchestration paid for by `sponsor`, using the configured
    /// voucher policy.
    pub fn orchestrator<'a>(&'a self, sponsor: &'a dyn VouchSigner) -> SessionOrchestrator<'a> {
        SessionOrchestrator::new(self, sponsor)
    }

    /// Signless session flows against the keyring service of `contract`.
    pub fn signless<'a>(&'a self, sponsor: &'a dyn VouchSigner, contract: &str) -> Result<SignlessFlow<'a>> {
        Ok(SignlessFlow::new(self.contract(contract)?, self.orchestrator(sponsor)))
    }
}
