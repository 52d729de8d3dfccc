//! Discord Container Core Library
//!
//! This crate provides the containment engine for the Discord Container
//! extension: every top-level navigation is checked against a domain set and,
//! when it belongs in a different cookie partition than the tab it started
//! in, reopened there while the original navigation is cancelled.
//!
//! # Architecture
//!
//! The pure decision layer (`url`, `matcher`, `resolver`) has no runtime
//! requirements and is what the wasm bindings use. With the `runtime`
//! feature (default) the crate adds the stateful engine: the suppression
//! ledger that collapses redirect chains into one transition, the tab
//! transition itself, the startup sweeps and the interception entry point.
//! Browser APIs are reached only through the traits in `host`.
//!
//! # Modules
//!
//! - `url`: Allocation-free scheme and host extraction
//! - `matcher`: Domain set compilation and host classification
//! - `resolver`: Target partition decision
//! - `config`: Container and domain configuration
//! - `ledger`: Per-tab duplicate suppression with expiring entries
//! - `orchestrator`: Open-new/close-old tab transition
//! - `sweep`: Startup reconciliation of already-open tabs
//! - `cookies`: Startup cookie sweep
//! - `engine`: Shared state and interception entry point
//! - `host`: Browser collaborator contracts
//! - `memory`: In-memory browser for simulation and tests
//! - `types`: Shared type definitions

pub mod config;
pub mod error;
pub mod matcher;
pub mod resolver;
pub mod types;
pub mod url;

#[cfg(feature = "runtime")]
pub mod cookies;
#[cfg(feature = "runtime")]
pub mod engine;
#[cfg(feature = "runtime")]
pub mod host;
#[cfg(feature = "runtime")]
pub mod ledger;
#[cfg(feature = "runtime")]
pub mod memory;
#[cfg(feature = "runtime")]
pub mod orchestrator;
#[cfg(feature = "runtime")]
pub mod sweep;

// Re-export commonly used types
pub use config::ContainerConfig;
pub use error::{ConfigError, EngineError, HostError, MatcherError};
pub use matcher::DomainMatcher;
pub use resolver::PartitionResolver;
pub use types::{NavigationRequest, PartitionId, Tab, TabStatus, Verdict};

#[cfg(feature = "runtime")]
pub use engine::{BackgroundTasks, ContainmentEngine};
#[cfg(feature = "runtime")]
pub use host::Browser;
#[cfg(feature = "runtime")]
pub use ledger::{LedgerVerdict, SuppressionLedger};
