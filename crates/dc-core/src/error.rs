//! Error types

use crate::types::TabId;

/// Failure reported by a browser collaborator (tabs, partitions, cookies,
/// storage, companion extension).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} failed: {message}")]
pub struct HostError {
    pub operation: &'static str,
    pub message: String,
}

impl HostError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Error type for compiling the domain set.
#[derive(Debug, thiserror::Error)]
pub enum MatcherError {
    #[error("Empty domain at position {0}")]
    EmptyDomain(usize),
    #[error("Invalid domain pattern '{domain}': {source}")]
    Pattern {
        domain: String,
        #[source]
        source: regex::Error,
    },
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Ledger TTL must be positive")]
    ZeroLedgerTtl,
}

/// Error type for the containment engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to set up container '{name}': {source}")]
    ContainerSetup {
        name: String,
        #[source]
        source: HostError,
    },
    #[error(transparent)]
    Matcher(#[from] MatcherError),
    #[error("Failed to look up tab {tab_id}: {source}")]
    TabLookup {
        tab_id: TabId,
        #[source]
        source: HostError,
    },
    #[error("Failed to list open tabs: {0}")]
    TabQuery(#[source] HostError),
    #[error("Failed to move tab {tab_id}: {source}")]
    Transition {
        tab_id: TabId,
        #[source]
        source: HostError,
    },
}
