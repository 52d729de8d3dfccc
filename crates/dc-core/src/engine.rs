//! Containment Engine
//!
//! Owns the state shared by every entry point: the resolver, the target
//! partition id, the suppression ledger, the pending-load set and the
//! companion flag. Built once by [`ContainmentEngine::initialize`] and shared
//! by `Arc` with the interception hooks and background tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;

use crate::config::ContainerConfig;
use crate::cookies::CookieSweepStats;
use crate::error::{EngineError, HostError};
use crate::host::{Browser, PartitionStore};
use crate::ledger::{LedgerVerdict, SuppressionLedger};
use crate::matcher::DomainMatcher;
use crate::orchestrator::transition;
use crate::resolver::PartitionResolver;
use crate::sweep::{PendingLoads, ReconcileReport};
use crate::types::{CompanionEvent, NavigationRequest, PartitionId, Settings, TabId, Verdict, NO_TAB};

pub struct ContainmentEngine {
    pub(crate) config: ContainerConfig,
    pub(crate) browser: Browser,
    pub(crate) resolver: PartitionResolver,
    ledger: SuppressionLedger,
    pub(crate) pending: PendingLoads,
    companion_enabled: AtomicBool,
    settings: Mutex<Settings>,
}

/// Handles of the startup background tasks.
pub struct BackgroundTasks {
    pub cookie_sweep: JoinHandle<CookieSweepStats>,
    pub reconcile: JoinHandle<Result<ReconcileReport, EngineError>>,
}

impl ContainmentEngine {
    /// Establish the target partition and build the engine.
    ///
    /// Fails only if the domain set doesn't compile or the container can't
    /// be found or created; in that case nothing should be registered with
    /// the browser. Companion detection and settings failures are logged and
    /// tolerated.
    pub async fn initialize(config: ContainerConfig, browser: Browser) -> Result<Arc<Self>, EngineError> {
        let matcher = DomainMatcher::new(&config.domains)?;

        let companion_enabled = match browser.companion.is_enabled().await {
            Ok(enabled) => enabled,
            Err(e) => {
                log::debug!("companion {} unavailable: {}", config.companion_id, e);
                false
            }
        };

        let target = match setup_container(browser.partitions.as_ref(), &config).await {
            Ok(target) => target,
            Err(source) => {
                log::error!("container setup failed, staying inert: {}", source);
                return Err(EngineError::ContainerSetup {
                    name: config.container_name.clone(),
                    source,
                });
            }
        };

        let settings = match browser.settings.load().await {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("could not load settings: {}", e);
                Settings::new()
            }
        };

        let resolver = PartitionResolver::new(matcher, target, config.default_partition.clone());
        log::info!(
            "containing {} domains into '{}' ({})",
            resolver.matcher().len(),
            config.container_name,
            resolver.target()
        );

        Ok(Arc::new(Self {
            ledger: SuppressionLedger::new(config.ledger_ttl()),
            pending: PendingLoads::new(),
            companion_enabled: AtomicBool::new(companion_enabled),
            settings: Mutex::new(settings),
            resolver,
            browser,
            config,
        }))
    }

    /// Spawn the cookie sweep and the reconciliation of already-open tabs.
    /// Failures are logged by the tasks; nothing waits on them.
    pub fn start_background_tasks(self: &Arc<Self>) -> BackgroundTasks {
        let engine = Arc::clone(self);
        let cookie_sweep = tokio::spawn(async move { engine.sweep_cookies().await });

        let engine = Arc::clone(self);
        let reconcile = tokio::spawn(async move {
            let result = engine.reconcile_open_tabs().await;
            if let Err(e) = &result {
                log::warn!("startup reconciliation failed: {}", e);
            }
            result
        });

        BackgroundTasks {
            cookie_sweep,
            reconcile,
        }
    }

    // =========================================================================
    // Interception
    // =========================================================================

    /// Blocking hook for every outgoing top-level navigation.
    pub async fn on_before_request(&self, request: &NavigationRequest) -> Result<Verdict, EngineError> {
        if request.tab_id == NO_TAB {
            return Ok(Verdict::Allow);
        }

        // Live traffic supersedes the startup sweep for this tab
        self.pending.take(request.tab_id);

        // Assignments can change at any time, so ask on every request
        if self.is_assigned(&request.url).await {
            return Ok(Verdict::Allow);
        }

        let tab = self
            .browser
            .tabs
            .get(request.tab_id)
            .await
            .map_err(|source| EngineError::TabLookup {
                tab_id: request.tab_id,
                source,
            })?;
        if tab.incognito {
            return Ok(Verdict::Allow);
        }

        let Some(partition) = self.resolver.resolve(&request.url, &tab.partition) else {
            return Ok(Verdict::Allow);
        };

        if self.ledger.record(tab.id, &request.request_id, &request.url) == LedgerVerdict::Suppress {
            return Ok(Verdict::Cancel);
        }

        transition(self.browser.tabs.as_ref(), &request.url, &tab, &partition)
            .await
            .map_err(|source| EngineError::Transition { tab_id: tab.id, source })?;

        Ok(Verdict::Cancel)
    }

    /// A top-level request finished.
    pub fn on_request_completed(&self, tab_id: TabId) {
        self.ledger.release(tab_id);
    }

    /// A top-level request failed.
    pub fn on_request_error(&self, tab_id: TabId) {
        self.ledger.release(tab_id);
    }

    // =========================================================================
    // Companion
    // =========================================================================

    /// Management event for some extension; only the companion's matter.
    pub fn on_companion_event(&self, extension_id: &str, event: CompanionEvent) {
        if extension_id != self.config.companion_id {
            return;
        }
        let enabled = event.enables();
        self.companion_enabled.store(enabled, Ordering::SeqCst);
        log::info!("companion {} {:?}, assignments {}", extension_id, event, if enabled { "on" } else { "off" });
    }

    pub fn companion_enabled(&self) -> bool {
        self.companion_enabled.load(Ordering::SeqCst)
    }

    /// Whether the companion pins this URL. Errors count as "not assigned".
    pub async fn is_assigned(&self, url: &str) -> bool {
        if !self.companion_enabled() {
            return false;
        }
        match self.browser.companion.query_assignment(url).await {
            Ok(assigned) => assigned,
            Err(e) => {
                log::debug!("assignment query for {} failed: {}", url, e);
                false
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn resolver(&self) -> &PartitionResolver {
        &self.resolver
    }

    pub fn target_partition(&self) -> &PartitionId {
        self.resolver.target()
    }

    pub fn ledger(&self) -> &SuppressionLedger {
        &self.ledger
    }

    pub fn pending_loads(&self) -> &PendingLoads {
        &self.pending
    }

    pub fn settings(&self) -> Settings {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Use the existing container with the configured name, or create it.
async fn setup_container(
    partitions: &dyn PartitionStore,
    config: &ContainerConfig,
) -> Result<PartitionId, HostError> {
    if let Some(existing) = partitions.find_by_name(&config.container_name).await? {
        return Ok(existing.id);
    }

    let created = partitions
        .create(&config.container_name, &config.container_color, &config.container_icon)
        .await?;
    log::info!("created container '{}' ({})", created.name, created.id);
    Ok(created.id)
}
