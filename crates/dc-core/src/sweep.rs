//! Startup Reconciliation Sweep
//!
//! Tabs that were already open when the extension started never went
//! through the interception hook. The sweep runs the same per-tab decision
//! over them once. Tabs still loading their blank placeholder have no URL
//! to decide on yet; they are parked in the pending-load set and decided
//! when the browser reports their first real URL.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::engine::ContainmentEngine;
use crate::error::EngineError;
use crate::host::UpdateSubscription;
use crate::orchestrator::transition;
use crate::types::{Tab, TabId, TabStatus, TabUpdate};

// =============================================================================
// Pending-Load Set
// =============================================================================

/// Tabs whose first URL the sweep is still waiting for.
#[derive(Debug, Default)]
pub struct PendingLoads {
    tabs: Mutex<HashSet<TabId>>,
    emptied: Notify,
}

impl PendingLoads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tab_id: TabId) -> bool {
        self.lock().insert(tab_id)
    }

    /// Remove a tab; true if it was pending. Wakes the watcher when the
    /// set becomes empty.
    pub fn take(&self, tab_id: TabId) -> bool {
        let mut tabs = self.lock();
        let removed = tabs.remove(&tab_id);
        if removed && tabs.is_empty() {
            self.emptied.notify_one();
        }
        removed
    }

    pub fn contains(&self, tab_id: TabId) -> bool {
        self.lock().contains(&tab_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    async fn emptied(&self) {
        self.emptied.notified().await
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<TabId>> {
        self.tabs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Sweep
// =============================================================================

/// Outcome of the startup sweep over already-open tabs.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Tabs moved into another partition right away
    pub reopened: usize,
    /// Tabs parked until their first URL is known
    pub deferred: usize,
    /// Private tabs, idle placeholders, assigned or already placed tabs
    pub skipped: usize,
    /// Task waiting on the deferred tabs; `None` if nothing was deferred
    pub watcher: Option<JoinHandle<()>>,
}

impl ContainmentEngine {
    /// Apply the containment decision to every tab that is already open.
    pub async fn reconcile_open_tabs(self: &Arc<Self>) -> Result<ReconcileReport, EngineError> {
        let tabs = self.browser.tabs.query().await.map_err(EngineError::TabQuery)?;

        let mut report = ReconcileReport::default();
        let mut ready = Vec::new();

        for tab in tabs {
            if tab.incognito {
                report.skipped += 1;
            } else if tab.url == self.config.blank_url {
                if tab.status == TabStatus::Loading {
                    self.pending.insert(tab.id);
                    report.deferred += 1;
                } else {
                    report.skipped += 1;
                }
            } else {
                ready.push(tab);
            }
        }

        // Subscribe before any await so no first navigation slips past
        if report.deferred > 0 {
            match self.browser.tabs.subscribe_updates() {
                Ok(subscription) => {
                    let engine = Arc::clone(self);
                    report.watcher = Some(tokio::spawn(async move {
                        engine.watch_pending(subscription).await;
                    }));
                }
                Err(e) => log::warn!("cannot watch {} loading tabs: {}", report.deferred, e),
            }
        }

        for tab in ready {
            match self.reopen_if_misplaced(&tab).await {
                Ok(true) => report.reopened += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.skipped += 1;
                    log::warn!("startup sweep: {}", e);
                }
            }
        }

        log::info!(
            "startup sweep: {} reopened, {} deferred, {} skipped",
            report.reopened,
            report.deferred,
            report.skipped
        );
        Ok(report)
    }

    /// Per-tab decision shared by the sweep and the deferred path.
    /// Doesn't touch the suppression ledger.
    pub(crate) async fn reopen_if_misplaced(&self, tab: &Tab) -> Result<bool, EngineError> {
        if self.is_assigned(&tab.url).await {
            return Ok(false);
        }

        let Some(partition) = self.resolver.resolve(&tab.url, &tab.partition) else {
            return Ok(false);
        };

        transition(self.browser.tabs.as_ref(), &tab.url, tab, &partition)
            .await
            .map_err(|source| EngineError::Transition { tab_id: tab.id, source })?;
        Ok(true)
    }

    async fn watch_pending(&self, mut subscription: UpdateSubscription) {
        while !self.pending.is_empty() {
            tokio::select! {
                update = subscription.next() => match update {
                    Some(update) => self.on_pending_update(update).await,
                    None => break,
                },
                _ = self.pending.emptied() => {}
            }
        }

        subscription.release();
        log::debug!("pending loads settled, tab update subscription released");
    }

    async fn on_pending_update(&self, update: TabUpdate) {
        if let Some(url) = update.change.url {
            if self.pending.take(update.tab_id) {
                let mut tab = update.tab;
                tab.url = url;
                if let Err(e) = self.reopen_if_misplaced(&tab).await {
                    log::warn!("deferred reopen of tab {}: {}", tab.id, e);
                }
                return;
            }
        }

        if update.tab.status == TabStatus::Complete && self.pending.take(update.tab_id) {
            log::debug!("tab {} finished loading without leaving the placeholder", update.tab_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContainerConfig;
    use crate::host::Browser;
    use crate::memory::{MemoryBrowser, TabOp};
    use crate::types::{NavigationRequest, PartitionId, TabChange};

    async fn engine_for(browser: &Arc<MemoryBrowser>) -> Arc<ContainmentEngine> {
        ContainmentEngine::initialize(ContainerConfig::default(), Browser::from_host(browser.clone()))
            .await
            .unwrap()
    }

    fn navigate(url: &str) -> TabChange {
        TabChange {
            url: Some(url.to_string()),
            status: None,
        }
    }

    fn complete() -> TabChange {
        TabChange {
            url: None,
            status: Some(TabStatus::Complete),
        }
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_pending_take_is_idempotent() {
        let pending = PendingLoads::new();
        assert!(pending.insert(4));
        assert!(!pending.insert(4));
        assert!(pending.take(4));
        assert!(!pending.take(4));
        assert!(pending.is_empty());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_sweep_reopens_misplaced_tabs() {
        let browser = Arc::new(MemoryBrowser::new());
        let engine = engine_for(&browser).await;
        let target = engine.target_partition().clone();

        let outside = browser.open_tab("https://discord.com/app", PartitionId::default(), TabStatus::Complete);
        let inside = browser.open_tab("https://example.org/", target.clone(), TabStatus::Complete);
        browser.open_tab("https://example.net/", PartitionId::default(), TabStatus::Complete);
        browser.open_tab("about:blank", PartitionId::default(), TabStatus::Complete);
        let mut private = browser.open_tab("https://discord.com/", PartitionId::default(), TabStatus::Complete);
        private.incognito = true;
        browser.insert_tab(private);

        let report = engine.reconcile_open_tabs().await.unwrap();

        assert_eq!(report.reopened, 2);
        assert_eq!(report.deferred, 0);
        assert_eq!(report.skipped, 3);
        assert!(report.watcher.is_none());
        assert!(browser.tab(outside.id).is_none());
        assert!(browser.tab(inside.id).is_none());
        assert_eq!(browser.subscriber_count(), 0);

        let moved: Vec<_> = browser.tabs().into_iter().filter(|t| t.status == TabStatus::Loading).collect();
        assert!(moved.iter().any(|t| t.url == "https://discord.com/app" && t.partition == target));
        assert!(moved.iter().any(|t| t.url == "https://example.org/" && t.partition.is_default()));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_sweep_skips_assigned_tabs() {
        let browser = Arc::new(MemoryBrowser::new());
        browser.set_companion_enabled(true);
        browser.assign_host("discord.com");
        let engine = engine_for(&browser).await;
        browser.open_tab("https://discord.com/app", PartitionId::default(), TabStatus::Complete);

        let report = engine.reconcile_open_tabs().await.unwrap();
        assert_eq!(report.reopened, 0);
        assert!(browser.ops().is_empty());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_deferred_tab_reopened_once_url_known() {
        let browser = Arc::new(MemoryBrowser::new());
        let engine = engine_for(&browser).await;
        let blank = browser.open_tab("about:blank", PartitionId::default(), TabStatus::Loading);

        let report = engine.reconcile_open_tabs().await.unwrap();
        assert_eq!(report.deferred, 1);
        assert!(engine.pending_loads().contains(blank.id));
        assert_eq!(browser.subscriber_count(), 1);

        browser.update_tab(blank.id, navigate("https://discord.com/channels/@me"));
        // A later update for the same tab must not reopen it again
        browser.update_tab(blank.id, complete());

        report.watcher.unwrap().await.unwrap();

        assert!(engine.pending_loads().is_empty());
        assert_eq!(browser.subscriber_count(), 0);
        let created = browser.ops().iter().filter(|op| matches!(op, TabOp::Created(_))).count();
        assert_eq!(created, 1);
        let tabs = browser.tabs();
        assert_eq!(tabs.len(), 1);
        assert_eq!(&tabs[0].partition, engine.target_partition());
        assert_eq!(tabs[0].url, "https://discord.com/channels/@me");
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_deferred_tab_completing_on_placeholder_is_dropped() {
        let browser = Arc::new(MemoryBrowser::new());
        let engine = engine_for(&browser).await;
        let blank = browser.open_tab("about:blank", PartitionId::default(), TabStatus::Loading);
        let other = browser.open_tab("about:blank", PartitionId::default(), TabStatus::Loading);

        let report = engine.reconcile_open_tabs().await.unwrap();
        assert_eq!(report.deferred, 2);

        browser.update_tab(blank.id, complete());
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert!(!engine.pending_loads().contains(blank.id));
        assert_eq!(browser.subscriber_count(), 1);

        browser.update_tab(other.id, complete());
        report.watcher.unwrap().await.unwrap();

        assert!(browser.ops().is_empty());
        assert_eq!(browser.subscriber_count(), 0);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_interception_supersedes_pending_tab() {
        let browser = Arc::new(MemoryBrowser::new());
        let engine = engine_for(&browser).await;
        let blank = browser.open_tab("about:blank", PartitionId::default(), TabStatus::Loading);

        let report = engine.reconcile_open_tabs().await.unwrap();
        assert_eq!(report.deferred, 1);

        let verdict = engine
            .on_before_request(&NavigationRequest::new(blank.id, "r1", "https://discord.com/"))
            .await
            .unwrap();
        assert!(verdict.is_cancel());

        // The watcher notices the set emptied and lets go without another reopen
        report.watcher.unwrap().await.unwrap();
        assert_eq!(browser.subscriber_count(), 0);
        let created = browser.ops().iter().filter(|op| matches!(op, TabOp::Created(_))).count();
        assert_eq!(created, 1);
    }
}
