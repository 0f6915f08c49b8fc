//! Contract interface registry and the wire types of the keyring service.
//!
//! A contract exposes named services, each with a set of queries (read-only)
//! and commands (state-mutating). The registry is parsed once per contract
//! binding and every dispatch is a lookup into it.

pub mod error;
pub mod idl;
pub mod keyring;
pub mod registry;

pub use error::{InterfaceError, Result};
pub use registry::{decode_route, encode_route, ContractInterface, MethodKind, MethodSchema, ParamSchema, ServiceSchema};
