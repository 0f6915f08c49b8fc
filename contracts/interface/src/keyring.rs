//! Wire types of the keyring service, the contract service that stores
//! encrypted signless credentials keyed by wallet address or coded name.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

pub const KEYRING_SERVICE: &str = "KeyringService";

pub const BIND_TO_USER_ADDRESS: &str = "BindKeyringDataToUserAddress";
pub const BIND_TO_USER_CODED_NAME: &str = "BindKeyringDataToUserCodedName";
pub const ADDRESS_FROM_USER_ADDRESS: &str = "KeyringAddressFromUserAddress";
pub const ADDRESS_FROM_USER_CODED_NAME: &str = "KeyringAddressFromUserCodedName";
pub const ACCOUNT_DATA: &str = "KeyringAccountData";

/// 32-byte on-chain account identifier
pub type ActorId = [u8; 32];

/// Interface description of the keyring service
pub const KEYRING_IDL: &str = r#"
type KeyringData = struct {
  address: str,
  encoded: str,
};

type KeyringQueryEvent = enum {
  SignlessAccountAddress: opt actor_id,
  SignlessAccountData: opt KeyringData,
};

type KeyringEvent = enum {
  KeyringAccountSet,
  Error: KeyringError,
};

service KeyringService {
  BindKeyringDataToUserAddress : (user_address: actor_id, signless_data: KeyringData) -> KeyringEvent;
  BindKeyringDataToUserCodedName : (user_coded_name: str, signless_data: KeyringData) -> KeyringEvent;
  query KeyringAccountData : (keyring_address: actor_id) -> KeyringQueryEvent;
  query KeyringAddressFromUserAddress : (user_address: actor_id) -> KeyringQueryEvent;
  query KeyringAddressFromUserCodedName : (user_coded_name: str) -> KeyringQueryEvent;
};
"#;

/// Credential record as persisted in contract storage.
///
/// This is the vault ciphertext with its `encoding` and `meta` blocks
/// removed; the label never reaches the chain.
#[derive(
    BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq,
)]
pub struct KeyringData {
    /// Public address of the credential
    pub address: String,
    /// Base64 of the encrypted key material
    pub encoded: String,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum KeyringQueryReply {
    SignlessAccountAddress(Option<ActorId>),
    SignlessAccountData(Option<KeyringData>),
}

impl KeyringQueryReply {
    pub fn into_address(self) -> Option<ActorId> {
        match self {
            KeyringQueryReply::SignlessAccountAddress(address) => address,
            KeyringQueryReply::SignlessAccountData(_) => None,
        }
    }

    pub fn into_data(self) -> Option<KeyringData> {
        match self {
            KeyringQueryReply::SignlessAccountData(data) => data,
            KeyringQueryReply::SignlessAccountAddress(_) => None,
        }
    }
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyringError {
    UserAddressAlreadyExists,
    UserCodedNameAlreadyExists,
    KeyringAddressAlreadyExists,
    UserDoesNotHaveKeyringAccount,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum KeyringCommandReply {
    KeyringAccountSet,
    Error(KeyringError),
}
