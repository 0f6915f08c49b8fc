//! SDK configuration, loadable from TOML.
//!
//! ```toml
//! endpoint = "wss://testnet.example.io"
//!
//! [voucher]
//! initial_tokens = 2
//! renew_blocks = 1200
//!
//! [submission]
//! finalization_timeout_secs = 120
//!
//! [[contracts]]
//! name = "PingWalletLess"
//! program_id = "0x1c3f...e2"
//! idl_path = "idl/ping.idl"
//! ```

use crate::core::constants::*;
use crate::error::{Result, VouchSdkError};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdkConfig {
    pub endpoint: String,

    #[serde(default)]
    pub voucher: VoucherPolicy,

    #[serde(default)]
    pub submission: SubmissionConfig,

    #[serde(default)]
    pub contracts: Vec<ContractConfig>,
}

/// Amounts used when issuing and maintaining session vouchers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoucherPolicy {
    /// Whole tokens put in a newly issued voucher
    pub initial_tokens: u64,
    /// Validity of a newly issued voucher, in blocks
    pub initial_blocks: u32,
    /// Top up when the balance (whole tokens) falls below this
    pub min_balance: u128,
    /// Blocks added when an expired voucher is renewed
    pub renew_blocks: u32,
    /// Whole tokens added per top-up
    pub top_up_tokens: i64,
}

impl Default for VoucherPolicy {
    fn default() -> Self {
        Self {
            initial_tokens: DEFAULT_INITIAL_TOKENS,
            initial_blocks: DEFAULT_INITIAL_BLOCKS,
            min_balance: DEFAULT_MIN_BALANCE,
            renew_blocks: DEFAULT_RENEW_BLOCKS,
            top_up_tokens: DEFAULT_TOP_UP_TOKENS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// `0` waits for finalization indefinitely
    pub finalization_timeout_secs: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            finalization_timeout_secs: DEFAULT_FINALIZATION_TIMEOUT_SECS,
        }
    }
}

impl SubmissionConfig {
    pub fn finalization_timeout(&self) -> Option<Duration> {
        (self.finalization_timeout_secs > 0).then(|| Duration::from_secs(self.finalization_timeout_secs))
    }
}

/// A contract to bind at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    pub name: String,
    /// Base58 or `0x`-prefixed hex
    pub program_id: String,
    /// Interface text inline
    #[serde(default)]
    pub idl: Option<String>,
    /// Interface text from a file, relative paths resolved by the caller
    #[serde(default)]
    pub idl_path: Option<PathBuf>,
}

impl ContractConfig {
    pub fn program_id(&self) -> Result<Pubkey> {
        parse_program_id(&self.program_id)
    }

    pub fn load_idl(&self) -> Result<String> {
        match (&self.idl, &self.idl_path) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) => fs::read_to_string(path).map_err(|e| {
                VouchSdkError::Config(format!(
                    "failed to read interface for '{}' from {}: {}",
                    self.name,
                    path.display(),
                    e
                ))
            }),
            (None, None) => Err(VouchSdkError::Config(format!(
                "contract '{}' has neither idl nor idl_path",
                self.name
            ))),
        }
    }
}

impl SdkConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            voucher: VoucherPolicy::default(),
            submission: SubmissionConfig::default(),
            contracts: Vec::new(),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: SdkConfig = toml::from_str(contents)
            .map_err(|err| VouchSdkError::Config(format!("failed to parse TOML: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_toml(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            VouchSdkError::Config(format!("failed to read config {}: {}", path.display(), err))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(VouchSdkError::Config("endpoint must not be empty".to_string()));
        }

        let policy = &self.voucher;
        if policy.initial_tokens < MIN_ISSUE_TOKENS {
            return Err(VouchSdkError::Config(format!(
                "voucher.initial_tokens must be at least {MIN_ISSUE_TOKENS}"
            )));
        }
        if policy.initial_blocks < MIN_VOUCHER_BLOCKS {
            return Err(VouchSdkError::Config(format!(
                "voucher.initial_blocks must be at least {MIN_VOUCHER_BLOCKS}"
            )));
        }
        if policy.renew_blocks < MIN_VOUCHER_BLOCKS {
            return Err(VouchSdkError::Config(format!(
                "voucher.renew_blocks must be at least {MIN_VOUCHER_BLOCKS}"
            )));
        }
        if policy.top_up_tokens < 0 {
            return Err(VouchSdkError::Config(
                "voucher.top_up_tokens must not be negative".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for contract in &self.contracts {
            if !names.insert(contract.name.as_str()) {
                return Err(VouchSdkError::Config(format!(
                    "duplicate contract name '{}'",
                    contract.name
                )));
            }
            contract.program_id()?;
        }

        Ok(())
    }
}

/// Accepts base58 or `0x`-prefixed hex.
pub fn parse_program_id(text: &str) -> Result<Pubkey> {
    if let Some(digits) = text.strip_prefix("0x") {
        let bytes = hex::decode(digits)
            .map_err(|e| VouchSdkError::Config(format!("invalid program id '{text}': {e}")))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            VouchSdkError::Config(format!("invalid program id '{text}': expected 32 bytes"))
        })?;
        return Ok(Pubkey::new_from_array(bytes));
    }
    Pubkey::from_str(text)
        .map_err(|e| VouchSdkError::Config(format!("invalid program id '{text}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let config = SdkConfig::from_toml_str(r#"endpoint = "ws://127.0.0.1:9944""#).unwrap();
        assert_eq!(config.voucher, VoucherPolicy::default());
        assert_eq!(config.voucher.renew_blocks, 1_200);
        assert_eq!(
            config.submission.finalization_timeout(),
            Some(Duration::from_secs(120))
        );
        assert!(config.contracts.is_empty());
    }

    #[test]
    fn test_partial_policy_and_contracts() {
        let hex_id = format!("0x{}", "11".repeat(32));
        let config = SdkConfig::from_toml_str(&format!(
            r#"
endpoint = "ws://127.0.0.1:9944"

[voucher]
min_balance = 5

[submission]
finalization_timeout_secs = 0

[[contracts]]
name = "PingWalletLess"
program_id = "{hex_id}"
idl = "service Ping {{ Ping : () -> str; }};"
"#
        ))
        .unwrap();

        assert_eq!(config.voucher.min_balance, 5);
        assert_eq!(config.voucher.initial_tokens, DEFAULT_INITIAL_TOKENS);
        assert_eq!(config.submission.finalization_timeout(), None);
        assert_eq!(
            config.contracts[0].program_id().unwrap(),
            Pubkey::new_from_array([0x11; 32])
        );
        assert!(config.contracts[0].load_idl().unwrap().contains("service Ping"));
    }

    #[test]
    fn test_policy_floors_enforced() {
        let err = SdkConfig::from_toml_str(
            "endpoint = \"ws://x\"\n[voucher]\ninitial_blocks = 19\n",
        )
        .unwrap_err();
        assert!(matches!(err, VouchSdkError::Config(msg) if msg.contains("initial_blocks")));

        let err = SdkConfig::from_toml_str("endpoint = \"ws://x\"\n[voucher]\ninitial_tokens = 1\n")
            .unwrap_err();
        assert!(matches!(err, VouchSdkError::Config(msg) if msg.contains("initial_tokens")));
    }

    #[test]
    fn test_duplicate_contract_rejected() {
        let id = Pubkey::new_unique();
        let toml = format!(
            "endpoint = \"ws://x\"\n\
             [[contracts]]\nname = \"A\"\nprogram_id = \"{id}\"\nidl = \"\"\n\
             [[contracts]]\nname = \"A\"\nprogram_id = \"{id}\"\nidl = \"\"\n"
        );
        assert!(matches!(
            SdkConfig::from_toml_str(&toml),
            Err(VouchSdkError::Config(msg)) if msg.contains("duplicate")
        ));
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        assert!(SdkConfig::from_toml_str("endpoint = \"  \"").is_err());
    }
}
