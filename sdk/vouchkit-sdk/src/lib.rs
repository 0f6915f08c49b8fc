pub mod advanced;
pub mod basic;
pub mod config;
pub mod core;
pub mod error;
pub mod types;
pub mod utils;

pub use crate::basic::contract::{CommandBuilder, CommandReceipt, ContractClient, QueryBuilder};
pub use crate::basic::session::{Session, SessionOrchestrator};
pub use crate::basic::signless::SignlessFlow;
pub use crate::basic::vault::{
    from_contract_format, to_contract_format, CredentialVault, LockedCredential, SignlessCredential,
};
pub use crate::basic::voucher::VoucherManager;
pub use crate::config::{SdkConfig, VoucherPolicy};
pub use crate::core::connection::{ChainConnection, Connector};
pub use crate::core::context::ChainContext;
pub use crate::core::progress::{ProgressObserver, Step, StepOutcome};
pub use crate::core::signer::VouchSigner;
pub use crate::error::{Result, VouchSdkError};
pub use crate::types::{BlockNumber, VoucherDetails, VoucherId};
pub use crate::utils::{coded_name, from_raw_tokens, to_raw_tokens};

pub mod interface {
    pub use vouchkit_interface::keyring;
    pub use vouchkit_interface::{
        decode_route, encode_route, ContractInterface, InterfaceError, MethodKind, MethodSchema,
    };
}
