use solana_sdk::pubkey::Pubkey;

/// Smallest-unit tokens per whole token
pub const TOKEN_SCALE: u128 = 1_000_000_000_000;

/// Issuing a voucher with fewer tokens leaves it unusable right away
pub const MIN_ISSUE_TOKENS: u64 = 2;

/// Shortest issuance or renewal accepted, in blocks
pub const MIN_VOUCHER_BLOCKS: u32 = 20;

// Session defaults (1_200 blocks is about one hour)
pub const DEFAULT_INITIAL_TOKENS: u64 = 2;
pub const DEFAULT_INITIAL_BLOCKS: u32 = 1_200;
pub const DEFAULT_MIN_BALANCE: u128 = 2;
pub const DEFAULT_RENEW_BLOCKS: u32 = 1_200;
pub const DEFAULT_TOP_UP_TOKENS: i64 = 1;

pub const DEFAULT_FINALIZATION_TIMEOUT_SECS: u64 = 120;

/// Label given to credentials created without a name
pub const DEFAULT_CREDENTIAL_LABEL: &str = "signlessPair";

/// Shortest password accepted when locking a signless credential
pub const MIN_PASSWORD_LEN: usize = 10;

/// Origin used for queries that are not scoped to an account
pub const ZERO_ADDRESS: Pubkey = Pubkey::new_from_array([0u8; 32]);
