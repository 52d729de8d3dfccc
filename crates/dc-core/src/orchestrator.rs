//! Navigation Transition Orchestrator

use crate::error::HostError;
use crate::host::TabHost;
use crate::types::{NewTab, PartitionId, Tab};

/// Reopen `url` in `partition` right after `tab`, then close `tab`.
///
/// The replacement is created first so a single-tab window never becomes
/// empty. The original tab is only removed once the create succeeded.
pub async fn transition(
    tabs: &dyn TabHost,
    url: &str,
    tab: &Tab,
    partition: &PartitionId,
) -> Result<Tab, HostError> {
    let replacement = tabs
        .create(NewTab {
            url: url.to_string(),
            partition: partition.clone(),
            active: tab.active,
            index: tab.index + 1,
            window_id: tab.window_id,
        })
        .await?;

    tabs.remove(tab.id).await?;

    log::info!(
        "moved tab {} -> {} into '{}' ({})",
        tab.id,
        replacement.id,
        partition,
        url
    );

    Ok(replacement)
}
