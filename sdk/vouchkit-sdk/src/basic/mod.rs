pub mod contract;
pub mod session;
pub mod signless;
pub mod vault;
pub mod voucher;
