use crate::error::{InterfaceError, Result};
use crate::idl;
use borsh::BorshDeserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Queries and commands live in separate namespaces inside a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Query,
    Command,
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodKind::Query => f.write_str("Query"),
            MethodKind::Command => f.write_str("Command"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSchema {
    pub name: String,
    pub ty: String,
}

/// A single resolved entry point of a contract service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSchema {
    pub service: String,
    pub name: String,
    pub kind: MethodKind,
    pub params: Vec<ParamSchema>,
    pub output: String,
}

impl MethodSchema {
    /// Route prefix that selects this method on-chain
    pub fn route(&self) -> Vec<u8> {
        encode_route(&self.service, &self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSchema {
    pub name: String,
    queries: BTreeMap<String, MethodSchema>,
    commands: BTreeMap<String, MethodSchema>,
}

impl ServiceSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Register a method. Returns `false` if the name is already taken in
    /// the method's namespace.
    pub fn insert(&mut self, method: MethodSchema) -> bool {
        let table = match method.kind {
            MethodKind::Query => &mut self.queries,
            MethodKind::Command => &mut self.commands,
        };
        if table.contains_key(&method.name) {
            return false;
        }
        table.insert(method.name.clone(), method);
        true
    }

    pub fn query(&self, name: &str) -> Option<&MethodSchema> {
        self.queries.get(name)
    }

    pub fn command(&self, name: &str) -> Option<&MethodSchema> {
        self.commands.get(name)
    }

    pub fn query_names(&self) -> Vec<String> {
        self.queries.keys().cloned().collect()
    }

    pub fn command_names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    fn names(&self, kind: MethodKind) -> Vec<String> {
        match kind {
            MethodKind::Query => self.query_names(),
            MethodKind::Command => self.command_names(),
        }
    }
}

/// Parsed interface of one contract: a table of services keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractInterface {
    services: BTreeMap<String, ServiceSchema>,
}

impl ContractInterface {
    /// Parse an interface description.
    pub fn parse(text: &str) -> Result<Self> {
        idl::parse(text)
    }

    pub fn from_services(services: impl IntoIterator<Item = ServiceSchema>) -> Self {
        Self {
            services: services
                .into_iter()
                .map(|service| (service.name.clone(), service))
                .collect(),
        }
    }

    pub(crate) fn insert_service(&mut self, service: ServiceSchema) -> bool {
        if self.services.contains_key(&service.name) {
            return false;
        }
        self.services.insert(service.name.clone(), service);
        true
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    pub fn service(&self, name: &str) -> Result<&ServiceSchema> {
        self.services
            .get(name)
            .ok_or_else(|| InterfaceError::ServiceNotFound {
                service: name.to_string(),
                available: self.service_names(),
            })
    }

    pub fn resolve_query(&self, service: &str, method: &str) -> Result<&MethodSchema> {
        self.resolve(service, method, MethodKind::Query)
    }

    pub fn resolve_command(&self, service: &str, method: &str) -> Result<&MethodSchema> {
        self.resolve(service, method, MethodKind::Command)
    }

    fn resolve(&self, service: &str, method: &str, kind: MethodKind) -> Result<&MethodSchema> {
        let schema = self.service(service)?;
        let found = match kind {
            MethodKind::Query => schema.query(method),
            MethodKind::Command => schema.command(method),
        };
        found.ok_or_else(|| InterfaceError::MethodNotFound {
            service: service.to_string(),
            method: method.to_string(),
            kind,
            available: schema.names(kind),
        })
    }
}

/// Encode the `(service, method)` route prefix.
///
/// Layout matches borsh `String` encoding for both parts:
/// ```text
/// [u32 LE len][service utf8][u32 LE len][method utf8]
/// ```
pub fn encode_route(service: &str, method: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + service.len() + method.len());
    for part in [service, method] {
        out.extend_from_slice(&(part.len() as u32).to_le_bytes());
        out.extend_from_slice(part.as_bytes());
    }
    out
}

/// Split a payload into its route and the remaining argument bytes.
/// Returns `None` if the payload does not start with a valid route.
pub fn decode_route(payload: &[u8]) -> Option<(String, String, &[u8])> {
    let mut cursor = payload;
    let service = String::deserialize(&mut cursor).ok()?;
    let method = String::deserialize(&mut cursor).ok()?;
    Some((service, method, cursor))
}
