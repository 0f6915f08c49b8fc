use crate::core::constants::TOKEN_SCALE;
use sha2::{Digest, Sha256};

//=============================================================================
// Token Units
//=============================================================================

/// Whole tokens to the chain's smallest unit
pub fn to_raw_tokens(tokens: u64) -> u128 {
    tokens as u128 * TOKEN_SCALE
}

/// Smallest unit to whole tokens; the fractional part is discarded
pub fn from_raw_tokens(raw: u128) -> u128 {
    raw / TOKEN_SCALE
}

//=============================================================================
// Coded Names
//=============================================================================

/// Lookup key for a walletless credential: lowercase hex SHA-256 of the name.
/// The name itself never reaches the chain.
pub fn coded_name(name: &str) -> String {
    hex::encode(Sha256::digest(name.as_bytes()))
}
