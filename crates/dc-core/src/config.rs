//! Extension configuration
//!
//! Defaults reproduce the shipped Discord Container; a JSON document with
//! any subset of the fields overrides them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::PartitionId;

/// Hosts (and their subdomains) that belong in the container.
pub const DISCORD_DOMAINS: &[&str] = &[
    "discord.com",
    "discordapp.com",
    "discord.gg",
    "watchanimeattheoffice.com",
    "dis.gd",
    "bigbeans.solutions",
    "discord.app",
];

pub const DISCORD_CONTAINER_NAME: &str = "Discord";
pub const DISCORD_CONTAINER_COLOR: &str = "blue";
pub const DISCORD_CONTAINER_ICON: &str = "briefcase";

/// Extension id of Multi-Account Containers, the assignment companion.
pub const COMPANION_ADDON_ID: &str = "@testpilot-containers";

pub const BLANK_URL: &str = "about:blank";

/// Lifetime of a suppression ledger entry.
pub const LEDGER_TTL_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContainerConfig {
    pub container_name: String,
    pub container_color: String,
    pub container_icon: String,
    pub domains: Vec<String>,
    pub companion_id: String,
    pub default_partition: PartitionId,
    /// Placeholder URL of tabs that haven't started navigating yet
    pub blank_url: String,
    pub ledger_ttl_ms: u64,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            container_name: DISCORD_CONTAINER_NAME.to_string(),
            container_color: DISCORD_CONTAINER_COLOR.to_string(),
            container_icon: DISCORD_CONTAINER_ICON.to_string(),
            domains: DISCORD_DOMAINS.iter().map(|d| d.to_string()).collect(),
            companion_id: COMPANION_ADDON_ID.to_string(),
            default_partition: PartitionId::default(),
            blank_url: BLANK_URL.to_string(),
            ledger_ttl_ms: LEDGER_TTL_MS,
        }
    }
}

impl ContainerConfig {
    /// Parse a JSON config; missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        if config.ledger_ttl_ms == 0 {
            return Err(ConfigError::ZeroLedgerTtl);
        }
        Ok(config)
    }

    pub fn ledger_ttl(&self) -> Duration {
        Duration::from_millis(self.ledger_ttl_ms)
    }
}
