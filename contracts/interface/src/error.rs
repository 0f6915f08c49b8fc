use crate::registry::MethodKind;
use thiserror::Error;

/// Errors raised while parsing an interface description or resolving a method.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterfaceError {
    /// The interface text could not be parsed
    #[error("Invalid interface description at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// No service with this name is bound
    #[error("Service does not exist: '{service}'. Services: [{}]", .available.join(", "))]
    ServiceNotFound {
        service: String,
        available: Vec<String>,
    },

    /// The service exists but has no method of the requested kind with this name
    #[error("{kind} does not exist in {service}: '{method}'. Available: [{}]", .available.join(", "))]
    MethodNotFound {
        service: String,
        method: String,
        kind: MethodKind,
        available: Vec<String>,
    },
}

pub type Result<T> = std::result::Result<T, InterfaceError>;
