use crate::types::VoucherId;
use thiserror::Error;
use vouchkit_interface::InterfaceError;

/// SDK-specific error types for voucher and signless operations
#[derive(Debug, Error)]
pub enum VouchSdkError {
    /// The chain connection has not finished initializing
    #[error("Connection is not ready")]
    ConnectionNotReady,

    /// Connection or RPC error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Service or method lookup failed, or the interface text is malformed
    #[error(transparent)]
    Interface(#[from] InterfaceError),

    /// No contract is bound under this name
    #[error("Contract not bound: '{0}'")]
    ContractNotBound(String),

    /// A parameter floor or precondition was violated; nothing was sent
    #[error("Validation error: {0}")]
    Validation(String),

    /// Renewal or top-up failed before a sponsored call
    #[error("Voucher maintenance failed: {0}")]
    VoucherMaintenanceFailed(#[source] Box<VouchSdkError>),

    /// Voucher does not exist for this account
    #[error("Voucher {0} not found")]
    VoucherNotFound(VoucherId),

    /// Credential could not be decrypted with the supplied password
    #[error("Invalid password")]
    InvalidPassword,

    /// Credential record is malformed or uses an unknown encoding
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Signing, broadcast or dispatch failed
    #[error("Submission failure: {0}")]
    SubmissionFailure(String),

    /// The status stream ended or timed out before a terminal status
    #[error("Finalization not observed: {0}")]
    FinalizationNotObserved(String),

    /// A reply is missing, routed to another method, or does not decode
    #[error("Invalid reply: {0}")]
    InvalidReply(String),

    /// Session lacks the voucher, credential or wallet the call needs
    #[error("Incomplete session: {0}")]
    SessionIncomplete(String),

    /// Borsh serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] std::io::Error),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

impl VouchSdkError {
    pub(crate) fn connection(err: impl std::fmt::Display) -> Self {
        VouchSdkError::Connection(err.to_string())
    }

    pub(crate) fn maintenance(err: VouchSdkError) -> Self {
        VouchSdkError::VoucherMaintenanceFailed(Box::new(err))
    }
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, VouchSdkError>;
