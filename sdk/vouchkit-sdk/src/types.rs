use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;

/// Block height as reported by the chain
pub type BlockNumber = u32;

/// Opaque chain-assigned voucher handle.
///
/// A voucher is also an account on-chain; its balance is looked up through
/// [`VoucherId::account`].
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoucherId(pub [u8; 32]);

impl VoucherId {
    pub fn account(&self) -> Pubkey {
        Pubkey::new_from_array(self.0)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl fmt::Display for VoucherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for VoucherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VoucherId({self})")
    }
}

impl FromStr for VoucherId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| format!("invalid voucher id '{s}': {e}"))?;
        let id: [u8; 32] = bytes
            .try_into()
            .map_err(|_| format!("invalid voucher id '{s}': expected 32 bytes"))?;
        Ok(VoucherId(id))
    }
}

/// Voucher state as stored on-chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoucherDetails {
    /// Account allowed to spend the voucher
    pub owner: Pubkey,

    /// Sponsor that issued the voucher
    pub issuer: Pubkey,

    /// Contracts the voucher may pay for; `None` means any contract
    pub programs: Option<Vec<Pubkey>>,

    /// Last block at which the voucher is still valid
    pub expiry: BlockNumber,
}

impl VoucherDetails {
    /// A voucher expiring exactly at `height` is still valid.
    pub fn is_expired_at(&self, height: BlockNumber) -> bool {
        height > self.expiry
    }

    pub fn allows_program(&self, program_id: &Pubkey) -> bool {
        match &self.programs {
            Some(programs) => programs.contains(program_id),
            None => true,
        }
    }
}
