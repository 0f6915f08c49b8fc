pub mod connection;
pub mod constants;
pub mod context;
pub mod progress;
pub mod signer;
