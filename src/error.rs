use thiserror::Error;

use crate::dns::{DomainName, ResponseStatus};

/// Errors reported by a query provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("query timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

/// Unified error type for zone walking.
///
/// The first group are the fatal validation failures; each names the step
/// that rejected the zone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalkError {
    #[error("no SOA RR found at {zone}; zone name may be incorrect or not an apex")]
    MissingSoa { zone: DomainName },

    #[error("invalid SOA RR received for {zone}: owner is {owner} (spoofed or misdirected response)")]
    SoaOwnerMismatch { zone: DomainName, owner: DomainName },

    #[error("invalid DNSKEY RR received for {zone}: owner is {owner}")]
    DnskeyOwnerMismatch { zone: DomainName, owner: DomainName },

    #[error("unexpected response status: {0}")]
    UnexpectedStatus(ResponseStatus),

    #[error("query for {name} failed: {source}")]
    Query {
        name: DomainName,
        #[source]
        source: ProviderError,
    },

    #[error("Invalid domain name: {0}")]
    InvalidName(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid NSEC3 hash: {0}")]
    InvalidHash(String),

    #[error("Invalid NSEC3 salt: {0}")]
    InvalidSalt(String),

    #[error("Unsupported NSEC3 hash algorithm: {0}")]
    UnsupportedHashAlgorithm(u8),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl WalkError {
    /// Validation step that produced a fatal error, if any
    pub fn failed_step(&self) -> Option<&'static str> {
        match self {
            WalkError::MissingSoa { .. } | WalkError::SoaOwnerMismatch { .. } => Some("soa"),
            WalkError::DnskeyOwnerMismatch { .. } => Some("dnskey"),
            WalkError::UnexpectedStatus(_) => Some("detect"),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WalkError {
    fn from(err: std::io::Error) -> Self {
        WalkError::Output(err.to_string())
    }
}

impl From<serde_json::Error> for WalkError {
    fn from(err: serde_json::Error) -> Self {
        WalkError::Output(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WalkError>;
