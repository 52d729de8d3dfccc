//! In-memory browser
//!
//! Implements every collaborator contract against plain data structures.
//! Used by the CLI scenario runner and by the engine tests; failure switches
//! let callers exercise the error paths.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::HostError;
use crate::host::{Companion, CookieJar, PartitionStore, SettingsStore, TabHost, UpdateSubscription};
use crate::types::{
    Cookie, NewTab, Partition, PartitionId, Settings, Tab, TabChange, TabId, TabStatus, TabUpdate,
};
use crate::url::extract_host;

/// Tab mutations performed through [`TabHost`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabOp {
    Created(TabId),
    Removed(TabId),
}

#[derive(Debug, Default)]
struct MemoryState {
    tabs: BTreeMap<TabId, Tab>,
    next_tab_id: TabId,
    ops: Vec<TabOp>,
    partitions: Vec<Partition>,
    cookies: Vec<Cookie>,
    assigned_hosts: HashSet<String>,
    companion_enabled: bool,
    settings: Settings,
    subscribers: Vec<mpsc::UnboundedSender<TabUpdate>>,
    fail_tab_creation: bool,
    fail_partitions: bool,
    fail_companion: bool,
    fail_settings: bool,
    failing_cookies: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct MemoryBrowser {
    state: Mutex<MemoryState>,
}

impl MemoryBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Tabs
    // =========================================================================

    /// Open a tab at the end of window 1. The first tab opened is active.
    pub fn open_tab(&self, url: &str, partition: PartitionId, status: TabStatus) -> Tab {
        let mut state = self.state();
        let id = state.allocate_tab_id();
        let tab = Tab {
            id,
            partition,
            url: url.to_string(),
            status,
            window_id: 1,
            index: state.tabs.len() as u32,
            active: state.tabs.is_empty(),
            incognito: false,
        };
        state.tabs.insert(id, tab.clone());
        tab
    }

    /// Insert a fully specified tab, keeping its id.
    pub fn insert_tab(&self, tab: Tab) {
        let mut state = self.state();
        state.next_tab_id = state.next_tab_id.max(tab.id + 1);
        state.tabs.insert(tab.id, tab);
    }

    pub fn tab(&self, tab_id: TabId) -> Option<Tab> {
        self.state().tabs.get(&tab_id).cloned()
    }

    pub fn tabs(&self) -> Vec<Tab> {
        self.state().tabs.values().cloned().collect()
    }

    pub fn ops(&self) -> Vec<TabOp> {
        self.state().ops.clone()
    }

    /// Apply a change to a tab and notify subscribers, the way the browser
    /// fires `tabs.onUpdated`.
    pub fn update_tab(&self, tab_id: TabId, change: TabChange) -> Option<TabUpdate> {
        let mut state = self.state();
        let tab = state.tabs.get_mut(&tab_id)?;
        if let Some(url) = &change.url {
            tab.url = url.clone();
        }
        if let Some(status) = change.status {
            tab.status = status;
        }

        let update = TabUpdate {
            tab_id,
            change,
            tab: tab.clone(),
        };
        state.subscribers.retain(|tx| tx.send(update.clone()).is_ok());
        Some(update)
    }

    /// Subscriptions that have not been released.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    pub fn fail_tab_creation(&self, fail: bool) {
        self.state().fail_tab_creation = fail;
    }

    // =========================================================================
    // Partitions, companion, cookies, settings
    // =========================================================================

    pub fn add_partition(&self, name: &str) -> Partition {
        let mut state = self.state();
        state.push_partition(name, "", "")
    }

    pub fn partitions(&self) -> Vec<Partition> {
        self.state().partitions.clone()
    }

    pub fn fail_partitions(&self, fail: bool) {
        self.state().fail_partitions = fail;
    }

    pub fn set_companion_enabled(&self, enabled: bool) {
        self.state().companion_enabled = enabled;
    }

    pub fn fail_companion(&self, fail: bool) {
        self.state().fail_companion = fail;
    }

    /// Pin a host to some container in the companion extension.
    pub fn assign_host(&self, host: &str) {
        self.state().assigned_hosts.insert(host.to_ascii_lowercase());
    }

    pub fn add_cookie(&self, name: &str, domain: &str, partition: PartitionId) {
        self.state().cookies.push(Cookie {
            name: name.to_string(),
            domain: domain.to_string(),
            partition,
        });
    }

    pub fn cookies(&self) -> Vec<Cookie> {
        self.state().cookies.clone()
    }

    /// Make removal of cookies with this name fail.
    pub fn fail_cookie_removal(&self, name: &str) {
        self.state().failing_cookies.insert(name.to_string());
    }

    pub fn set_settings(&self, settings: Settings) {
        self.state().settings = settings;
    }

    pub fn fail_settings(&self, fail: bool) {
        self.state().fail_settings = fail;
    }
}

impl MemoryState {
    fn allocate_tab_id(&mut self) -> TabId {
        let id = self.next_tab_id.max(1);
        self.next_tab_id = id + 1;
        id
    }

    fn push_partition(&mut self, name: &str, color: &str, icon: &str) -> Partition {
        let partition = Partition {
            id: PartitionId::new(format!("firefox-container-{}", self.partitions.len() + 1)),
            name: name.to_string(),
            color: color.to_string(),
            icon: icon.to_string(),
        };
        self.partitions.push(partition.clone());
        partition
    }
}

fn domain_matches(cookie_domain: &str, domain: &str) -> bool {
    let cookie_domain = cookie_domain.trim_start_matches('.');
    cookie_domain.eq_ignore_ascii_case(domain)
        || cookie_domain
            .to_ascii_lowercase()
            .ends_with(&format!(".{}", domain.to_ascii_lowercase()))
}

#[async_trait]
impl TabHost for MemoryBrowser {
    async fn create(&self, new_tab: NewTab) -> Result<Tab, HostError> {
        // Browser calls suspend; give other in-flight events a turn
        tokio::task::yield_now().await;

        let mut state = self.state();
        if state.fail_tab_creation {
            return Err(HostError::new("tabs.create", "tab creation disabled"));
        }

        let id = state.allocate_tab_id();
        let tab = Tab {
            id,
            partition: new_tab.partition,
            url: new_tab.url,
            status: TabStatus::Loading,
            window_id: new_tab.window_id,
            index: new_tab.index,
            active: new_tab.active,
            incognito: false,
        };
        state.tabs.insert(id, tab.clone());
        state.ops.push(TabOp::Created(id));
        Ok(tab)
    }

    async fn remove(&self, tab_id: TabId) -> Result<(), HostError> {
        let mut state = self.state();
        if state.tabs.remove(&tab_id).is_none() {
            return Err(HostError::new("tabs.remove", format!("no tab with id {}", tab_id)));
        }
        state.ops.push(TabOp::Removed(tab_id));
        Ok(())
    }

    async fn get(&self, tab_id: TabId) -> Result<Tab, HostError> {
        self.tab(tab_id)
            .ok_or_else(|| HostError::new("tabs.get", format!("no tab with id {}", tab_id)))
    }

    async fn query(&self) -> Result<Vec<Tab>, HostError> {
        Ok(self.tabs())
    }

    fn subscribe_updates(&self) -> Result<UpdateSubscription, HostError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().subscribers.push(tx);
        Ok(UpdateSubscription::new(rx))
    }
}

#[async_trait]
impl PartitionStore for MemoryBrowser {
    async fn find_by_name(&self, name: &str) -> Result<Option<Partition>, HostError> {
        let state = self.state();
        if state.fail_partitions {
            return Err(HostError::new("contextualIdentities.query", "identities unavailable"));
        }
        Ok(state.partitions.iter().find(|p| p.name == name).cloned())
    }

    async fn create(&self, name: &str, color: &str, icon: &str) -> Result<Partition, HostError> {
        let mut state = self.state();
        if state.fail_partitions {
            return Err(HostError::new("contextualIdentities.create", "identities unavailable"));
        }
        Ok(state.push_partition(name, color, icon))
    }

    async fn list(&self) -> Result<Vec<Partition>, HostError> {
        let state = self.state();
        if state.fail_partitions {
            return Err(HostError::new("contextualIdentities.query", "identities unavailable"));
        }
        Ok(state.partitions.clone())
    }
}

#[async_trait]
impl Companion for MemoryBrowser {
    async fn is_enabled(&self) -> Result<bool, HostError> {
        let state = self.state();
        if state.fail_companion {
            return Err(HostError::new("management.get", "add-on not found"));
        }
        Ok(state.companion_enabled)
    }

    async fn query_assignment(&self, url: &str) -> Result<bool, HostError> {
        let state = self.state();
        if state.fail_companion {
            return Err(HostError::new("runtime.sendMessage", "receiving end does not exist"));
        }
        Ok(extract_host(url)
            .map(|host| state.assigned_hosts.contains(&host.to_ascii_lowercase()))
            .unwrap_or(false))
    }
}

#[async_trait]
impl CookieJar for MemoryBrowser {
    async fn get_all(&self, domain: &str, partition: &PartitionId) -> Result<Vec<Cookie>, HostError> {
        Ok(self
            .state()
            .cookies
            .iter()
            .filter(|c| c.partition == *partition && domain_matches(&c.domain, domain))
            .cloned()
            .collect())
    }

    async fn remove(&self, name: &str, url: &str, partition: &PartitionId) -> Result<(), HostError> {
        let mut state = self.state();
        if state.failing_cookies.contains(name) {
            return Err(HostError::new("cookies.remove", format!("cannot remove '{}'", name)));
        }
        let host = extract_host(url)
            .ok_or_else(|| HostError::new("cookies.remove", format!("bad url '{}'", url)))?
            .to_string();
        state
            .cookies
            .retain(|c| !(c.name == name && c.partition == *partition && domain_matches(&c.domain, &host)));
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemoryBrowser {
    async fn load(&self) -> Result<Settings, HostError> {
        let state = self.state();
        if state.fail_settings {
            return Err(HostError::new("storage.sync.get", "storage unavailable"));
        }
        Ok(state.settings.clone())
    }
}
