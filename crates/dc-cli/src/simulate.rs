//! Scenario replay
//!
//! Loads a JSON description of open tabs and a sequence of browser events,
//! runs them through the engine against the in-memory browser and prints the
//! verdicts and the resulting tab list.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use dc_core::cookies::CookieSweepStats;
use dc_core::memory::MemoryBrowser;
use dc_core::types::{CompanionEvent, NavigationRequest, PartitionId, Tab, TabChange, TabId, TabStatus};
use dc_core::{Browser, ContainerConfig, ContainmentEngine, Verdict};

/// Stand-in for the container's partition id in scenario tabs.
const CONTAINER_PLACEHOLDER: &str = "@container";

pub struct SimulateOptions {
    pub config: ContainerConfig,
    pub input: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Scenario {
    /// Containers that exist before startup
    containers: Vec<String>,
    companion_enabled: bool,
    /// Hosts the companion pins
    assigned: Vec<String>,
    cookies: Vec<ScenarioCookie>,
    tabs: Vec<Tab>,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioCookie {
    name: String,
    domain: String,
    #[serde(default)]
    store_id: Option<PartitionId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Step {
    Navigate(NavigationRequest),
    #[serde(rename_all = "camelCase")]
    Update {
        tab_id: TabId,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        status: Option<TabStatus>,
    },
    Completed(TabId),
    Error(TabId),
    Companion {
        id: String,
        event: CompanionEvent,
    },
    WaitMs(u64),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StepOutcome {
    step: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    verdict: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    container: PartitionId,
    reopened_at_startup: usize,
    deferred_at_startup: usize,
    cookies_removed: usize,
    cookie_failures: usize,
    still_pending: usize,
    outcomes: Vec<StepOutcome>,
    tabs: Vec<Tab>,
}

pub fn run_simulation(opts: SimulateOptions) -> Result<(), String> {
    let text = fs::read_to_string(&opts.input).map_err(|e| format!("Failed to read '{}': {}", opts.input, e))?;
    let scenario: Scenario =
        serde_json::from_str(&text).map_err(|e| format!("Invalid scenario '{}': {}", opts.input, e))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;
    let summary = runtime.block_on(simulate(opts.config, scenario))?;

    let json = serde_json::to_string_pretty(&summary).map_err(|e| format!("Failed to serialize summary: {}", e))?;
    println!("{}", json);
    Ok(())
}

async fn simulate(config: ContainerConfig, scenario: Scenario) -> Result<Summary, String> {
    let browser = Arc::new(MemoryBrowser::new());
    for name in &scenario.containers {
        browser.add_partition(name);
    }
    browser.set_companion_enabled(scenario.companion_enabled);
    for host in &scenario.assigned {
        browser.assign_host(host);
    }

    let engine = ContainmentEngine::initialize(config, Browser::from_host(browser.clone()))
        .await
        .map_err(|e| format!("Initialization failed: {}", e))?;
    let container = engine.target_partition().clone();

    let resolve_store = |store: Option<PartitionId>| match store {
        Some(id) if id.as_str() == CONTAINER_PLACEHOLDER => container.clone(),
        Some(id) => id,
        None => PartitionId::default(),
    };

    for mut tab in scenario.tabs {
        if tab.partition.as_str() == CONTAINER_PLACEHOLDER {
            tab.partition = container.clone();
        }
        browser.insert_tab(tab);
    }
    for cookie in scenario.cookies {
        browser.add_cookie(&cookie.name, &cookie.domain, resolve_store(cookie.store_id));
    }

    let tasks = engine.start_background_tasks();
    let cookie_stats: CookieSweepStats = tasks
        .cookie_sweep
        .await
        .map_err(|e| format!("Cookie sweep panicked: {}", e))?;
    let report = tasks
        .reconcile
        .await
        .map_err(|e| format!("Startup sweep panicked: {}", e))?
        .map_err(|e| format!("Startup sweep failed: {}", e))?;

    let mut outcomes = Vec::with_capacity(scenario.steps.len());
    for (idx, step) in scenario.steps.into_iter().enumerate() {
        let mut outcome = StepOutcome {
            step: idx,
            verdict: None,
            error: None,
        };

        match step {
            Step::Navigate(request) => match engine.on_before_request(&request).await {
                Ok(verdict) => outcome.verdict = Some(verdict),
                Err(e) => outcome.error = Some(e.to_string()),
            },
            Step::Update { tab_id, url, status } => {
                if browser.update_tab(tab_id, TabChange { url, status }).is_none() {
                    outcome.error = Some(format!("no tab with id {}", tab_id));
                }
            }
            Step::Completed(tab_id) => engine.on_request_completed(tab_id),
            Step::Error(tab_id) => engine.on_request_error(tab_id),
            Step::Companion { id, event } => engine.on_companion_event(&id, event),
            Step::WaitMs(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
        }

        settle().await;
        log::debug!("step {}: {:?}", idx, outcome);
        outcomes.push(outcome);
    }

    let still_pending = engine.pending_loads().len();
    if let Some(watcher) = report.watcher {
        if still_pending > 0 {
            watcher.abort();
        } else if let Err(e) = watcher.await {
            log::warn!("pending-load watcher ended abnormally: {}", e);
        }
    }

    Ok(Summary {
        container,
        reopened_at_startup: report.reopened,
        deferred_at_startup: report.deferred,
        cookies_removed: cookie_stats.cookies_removed,
        cookie_failures: cookie_stats.failures,
        still_pending,
        outcomes,
        tabs: browser.tabs(),
    })
}

/// Let background tasks (the pending-load watcher) observe the last step.
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(json: &str) -> Summary {
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(simulate(ContainerConfig::default(), scenario)).unwrap()
    }

    #[test]
    fn test_navigation_into_container() {
        let summary = run(
            r#"{
                "tabs": [{"id": 1, "url": "https://example.org/", "status": "complete"}],
                "steps": [
                    {"navigate": {"tabId": 1, "requestId": "r1", "url": "https://discordapp.com/"}},
                    {"navigate": {"tabId": 1, "requestId": "r1", "url": "https://discord.com/"}}
                ]
            }"#,
        );

        assert_eq!(summary.outcomes[0].verdict, Some(Verdict::Cancel));
        assert_eq!(summary.outcomes[1].error.as_deref().map(|e| e.contains("tab 1")), Some(true));
        assert_eq!(summary.tabs.len(), 1);
        assert_eq!(summary.tabs[0].partition, summary.container);
    }

    #[test]
    fn test_startup_and_deferred_tabs() {
        let summary = run(
            r#"{
                "cookies": [{"name": "s", "domain": ".discord.com"}],
                "tabs": [
                    {"id": 1, "url": "https://discord.com/app", "status": "complete"},
                    {"id": 2, "url": "https://example.org/", "cookieStoreId": "@container", "status": "complete"},
                    {"id": 3, "url": "about:blank", "status": "loading"}
                ],
                "steps": [
                    {"update": {"tabId": 3, "url": "https://discord.gg/xyz"}}
                ]
            }"#,
        );

        assert_eq!(summary.reopened_at_startup, 2);
        assert_eq!(summary.deferred_at_startup, 1);
        assert_eq!(summary.cookies_removed, 1);
        assert_eq!(summary.still_pending, 0);
        assert_eq!(summary.tabs.len(), 3);
        assert!(summary
            .tabs
            .iter()
            .any(|t| t.url == "https://discord.gg/xyz" && t.partition == summary.container));
    }

    #[test]
    fn test_unknown_step_rejected() {
        assert!(serde_json::from_str::<Scenario>(r#"{"steps": [{"teleport": 1}]}"#).is_err());
    }
}
