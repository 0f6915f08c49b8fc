//! Password-locked signless credentials (Argon2id + XChaCha20-Poly1305).
//!
//! A locked credential is a JSON-friendly record:
//!
//! ```text
//! { address, encoded, encoding: { content, type, version }, meta: { name } }
//! ```
//!
//! Contract storage keeps only `{ address, encoded }`. The `encoding` block is
//! re-attached from a known [`EncodingScheme`] before unlocking, and the
//! `encoded` payload repeats its scheme version so a mismatch is reported
//! instead of producing garbage.
//!
//! `encoded` is base64 of:
//! ```text
//! [0]       scheme version
//! [1..13]   argon2 m_cost, t_cost, p_cost (u32 LE each)
//! [13..45]  salt
//! [45..69]  nonce
//! [69..]    ciphertext + tag of the 64-byte keypair
//! ```

use crate::core::constants::DEFAULT_CREDENTIAL_LABEL;
use crate::core::signer::VouchSigner;
use crate::error::{Result, VouchSdkError};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use std::fmt;
use vouchkit_interface::keyring::KeyringData;
use zeroize::Zeroizing;

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 24;
const HEADER_LEN: usize = 1 + 12 + SALT_LEN + NONCE_LEN;
const TAG_LEN: usize = 16;
const KEYPAIR_LEN: usize = 64;

// Upper bounds on the KDF cost read back from a stored record, about four
// times the argon2 defaults
pub const MAX_KDF_M_COST: u32 = 4 * Params::DEFAULT_M_COST;
pub const MAX_KDF_T_COST: u32 = 4 * Params::DEFAULT_T_COST;
pub const MAX_KDF_P_COST: u32 = 4 * Params::DEFAULT_P_COST;

//=============================================================================
// Credential
//=============================================================================

/// A keypair usable without an interactive wallet.
pub struct SignlessCredential {
    keypair: Keypair,
    label: String,
}

impl SignlessCredential {
    pub fn new(keypair: Keypair, label: impl Into<String>) -> Self {
        Self {
            keypair,
            label: label.into(),
        }
    }

    pub fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

impl fmt::Debug for SignlessCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignlessCredential")
            .field("address", &self.address())
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl VouchSigner for SignlessCredential {
    fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_payload(&self, payload: &[u8]) -> std::result::Result<Signature, String> {
        Ok(self.keypair.sign_message(payload))
    }
}

//=============================================================================
// Record Shapes
//=============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EncodingParams {
    pub content: Vec<String>,
    #[serde(rename = "type")]
    pub kind: Vec<String>,
    pub version: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialMeta {
    pub name: String,
}

/// Canonical vault ciphertext
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LockedCredential {
    pub address: String,
    pub encoded: String,
    pub encoding: EncodingParams,
    pub meta: CredentialMeta,
}

impl LockedCredential {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| VouchSdkError::InvalidCredential(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| VouchSdkError::InvalidCredential(e.to_string()))
    }
}

/// Known encryption schemes. Records stored on-chain do not carry their
/// encoding block, so every scheme ever used must stay decodable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingScheme {
    /// Raw ed25519 keypair, Argon2id key derivation, XChaCha20-Poly1305
    V1,
}

impl EncodingScheme {
    pub const CURRENT: EncodingScheme = EncodingScheme::V1;

    pub fn version_tag(&self) -> u8 {
        match self {
            EncodingScheme::V1 => 1,
        }
    }

    pub fn params(&self) -> EncodingParams {
        match self {
            EncodingScheme::V1 => EncodingParams {
                content: vec!["raw".to_string(), "ed25519".to_string()],
                kind: vec!["argon2id".to_string(), "xchacha20-poly1305".to_string()],
                version: "1".to_string(),
            },
        }
    }

    pub fn from_params(params: &EncodingParams) -> Result<Self> {
        [EncodingScheme::V1]
            .into_iter()
            .find(|scheme| &scheme.params() == params)
            .ok_or_else(|| {
                VouchSdkError::InvalidCredential(format!(
                    "unsupported encoding {:?}/{:?} version {}",
                    params.content, params.kind, params.version
                ))
            })
    }
}

/// Strip the encoding and meta blocks for contract storage.
pub fn to_contract_format(locked: &LockedCredential) -> KeyringData {
    KeyringData {
        address: locked.address.clone(),
        encoded: locked.encoded.clone(),
    }
}

/// Rebuild a lockable record from contract storage using the current scheme.
pub fn from_contract_format(record: &KeyringData, label: &str) -> LockedCredential {
    from_contract_format_with(record, label, EncodingScheme::CURRENT)
}

pub fn from_contract_format_with(
    record: &KeyringData,
    label: &str,
    scheme: EncodingScheme,
) -> LockedCredential {
    LockedCredential {
        address: record.address.clone(),
        encoded: record.encoded.clone(),
        encoding: scheme.params(),
        meta: CredentialMeta {
            name: label.to_string(),
        },
    }
}

//=============================================================================
// Vault
//=============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            m_cost: Params::DEFAULT_M_COST,
            t_cost: Params::DEFAULT_T_COST,
            p_cost: Params::DEFAULT_P_COST,
        }
    }
}

impl Argon2Params {
    /// Records may come from untrusted storage; derivation cost is capped.
    fn check_bounds(&self) -> Result<()> {
        if self.m_cost > MAX_KDF_M_COST || self.t_cost > MAX_KDF_T_COST || self.p_cost > MAX_KDF_P_COST {
            return Err(VouchSdkError::InvalidCredential(format!(
                "KDF cost m={} t={} p={} exceeds the limit m={MAX_KDF_M_COST} t={MAX_KDF_T_COST} p={MAX_KDF_P_COST}",
                self.m_cost, self.t_cost, self.p_cost
            )));
        }
        Ok(())
    }
}

/// Creates, locks and unlocks signless credentials.
///
/// The KDF cost only applies to locking; unlocking reads the cost stored in
/// the record.
#[derive(Debug, Clone, Default)]
pub struct CredentialVault {
    kdf: Argon2Params,
}

impl CredentialVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kdf_params(mut self, kdf: Argon2Params) -> Self {
        self.kdf = kdf;
        self
    }

    /// Fresh keypair; `label` defaults to `signlessPair`
    pub fn generate(&self, label: Option<&str>) -> SignlessCredential {
        SignlessCredential::new(Keypair::new(), label.unwrap_or(DEFAULT_CREDENTIAL_LABEL))
    }

    pub fn lock(&self, credential: &SignlessCredential, password: &str) -> Result<LockedCredential> {
        let scheme = EncodingScheme::CURRENT;
        self.kdf.check_bounds()?;

        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let mut header = Vec::with_capacity(HEADER_LEN);
        header.push(scheme.version_tag());
        header.extend_from_slice(&self.kdf.m_cost.to_le_bytes());
        header.extend_from_slice(&self.kdf.t_cost.to_le_bytes());
        header.extend_from_slice(&self.kdf.p_cost.to_le_bytes());
        header.extend_from_slice(&salt);
        header.extend_from_slice(&nonce);

        let key = derive_key(password, &salt, &self.kdf)?;
        let plaintext = Zeroizing::new(credential.keypair.to_bytes());
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
        let ciphertext = cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &plaintext[..],
                    aad: &header,
                },
            )
            .map_err(|e| VouchSdkError::InvalidCredential(format!("encryption failed: {e}")))?;

        let mut encoded = header;
        encoded.extend_from_slice(&ciphertext);

        Ok(LockedCredential {
            address: credential.address().to_string(),
            encoded: STANDARD.encode(encoded),
            encoding: scheme.params(),
            meta: CredentialMeta {
                name: credential.label.clone(),
            },
        })
    }

    pub fn unlock(&self, locked: &LockedCredential, password: &str) -> Result<SignlessCredential> {
        let scheme = EncodingScheme::from_params(&locked.encoding)?;
        let bytes = STANDARD
            .decode(&locked.encoded)
            .map_err(|e| VouchSdkError::InvalidCredential(format!("encoded is not base64: {e}")))?;

        if bytes.len() < HEADER_LEN + TAG_LEN {
            return Err(VouchSdkError::InvalidCredential(format!(
                "encoded payload too short ({} bytes)",
                bytes.len()
            )));
        }
        if bytes[0] != scheme.version_tag() {
            return Err(VouchSdkError::InvalidCredential(format!(
                "payload version {} does not match encoding version {}",
                bytes[0], locked.encoding.version
            )));
        }

        let (header, ciphertext) = bytes.split_at(HEADER_LEN);
        let kdf = Argon2Params {
            m_cost: read_u32(&header[1..5]),
            t_cost: read_u32(&header[5..9]),
            p_cost: read_u32(&header[9..13]),
        };
        kdf.check_bounds()?;
        let salt = &header[13..13 + SALT_LEN];
        let nonce = &header[13 + SALT_LEN..HEADER_LEN];

        let key = derive_key(password, salt, &kdf)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(
                    XNonce::from_slice(nonce),
                    Payload {
                        msg: ciphertext,
                        aad: header,
                    },
                )
                .map_err(|_| VouchSdkError::InvalidPassword)?,
        );

        if plaintext.len() != KEYPAIR_LEN {
            return Err(VouchSdkError::InvalidCredential(format!(
                "decrypted key material has {} bytes",
                plaintext.len()
            )));
        }
        let keypair = Keypair::try_from(&plaintext[..])
            .map_err(|e| VouchSdkError::InvalidCredential(format!("invalid keypair: {e}")))?;

        if keypair.pubkey().to_string() != locked.address {
            return Err(VouchSdkError::InvalidCredential(format!(
                "record address {} does not match its key material",
                locked.address
            )));
        }

        Ok(SignlessCredential::new(keypair, locked.meta.name.clone()))
    }
}

fn derive_key(password: &str, salt: &[u8], kdf: &Argon2Params) -> Result<Zeroizing<[u8; 32]>> {
    let params = Params::new(kdf.m_cost, kdf.t_cost, kdf.p_cost, Some(32))
        .map_err(|e| VouchSdkError::InvalidCredential(format!("invalid Argon2 parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key[..])
        .map_err(|e| VouchSdkError::InvalidCredential(format!("key derivation failed: {e}")))?;
    Ok(key)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}
