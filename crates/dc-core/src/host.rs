//! Browser collaborator contracts
//!
//! The engine never talks to browser APIs directly. Hosts (the wasm shell,
//! the CLI simulator, tests) implement these traits and hand them over as a
//! [`Browser`] bundle.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::HostError;
use crate::types::{Cookie, NewTab, Partition, PartitionId, Settings, Tab, TabId, TabUpdate};

/// Tab and window lifecycle.
#[async_trait]
pub trait TabHost: Send + Sync {
    async fn create(&self, tab: NewTab) -> Result<Tab, HostError>;

    async fn remove(&self, tab_id: TabId) -> Result<(), HostError>;

    async fn get(&self, tab_id: TabId) -> Result<Tab, HostError>;

    /// All open tabs.
    async fn query(&self) -> Result<Vec<Tab>, HostError>;

    /// Start receiving tab update notifications. Dropping the returned
    /// subscription unsubscribes.
    fn subscribe_updates(&self) -> Result<UpdateSubscription, HostError>;
}

/// Contextual identities.
#[async_trait]
pub trait PartitionStore: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<Partition>, HostError>;

    async fn create(&self, name: &str, color: &str, icon: &str) -> Result<Partition, HostError>;

    /// Every container the user has (the default jar is not included).
    async fn list(&self) -> Result<Vec<Partition>, HostError>;
}

/// The companion extension that can pin URLs to containers.
#[async_trait]
pub trait Companion: Send + Sync {
    async fn is_enabled(&self) -> Result<bool, HostError>;

    async fn query_assignment(&self, url: &str) -> Result<bool, HostError>;
}

#[async_trait]
pub trait CookieJar: Send + Sync {
    async fn get_all(&self, domain: &str, partition: &PartitionId) -> Result<Vec<Cookie>, HostError>;

    async fn remove(&self, name: &str, url: &str, partition: &PartitionId) -> Result<(), HostError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<Settings, HostError>;
}

/// Handles to every collaborator the engine uses.
#[derive(Clone)]
pub struct Browser {
    pub tabs: Arc<dyn TabHost>,
    pub partitions: Arc<dyn PartitionStore>,
    pub companion: Arc<dyn Companion>,
    pub cookies: Arc<dyn CookieJar>,
    pub settings: Arc<dyn SettingsStore>,
}

impl Browser {
    /// Bundle a single host object that implements every contract.
    pub fn from_host<H>(host: Arc<H>) -> Self
    where
        H: TabHost + PartitionStore + Companion + CookieJar + SettingsStore + 'static,
    {
        Self {
            tabs: host.clone(),
            partitions: host.clone(),
            companion: host.clone(),
            cookies: host.clone(),
            settings: host,
        }
    }
}

// =============================================================================
// Update Subscription
// =============================================================================

/// Live tab-update subscription. Held while there is something to wait for,
/// then released explicitly.
#[derive(Debug)]
pub struct UpdateSubscription {
    rx: mpsc::UnboundedReceiver<TabUpdate>,
}

impl UpdateSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<TabUpdate>) -> Self {
        Self { rx }
    }

    /// Next update, or `None` once the host stops delivering.
    pub async fn next(&mut self) -> Option<TabUpdate> {
        self.rx.recv().await
    }

    /// Unsubscribe.
    pub fn release(mut self) {
        self.rx.close();
    }
}
