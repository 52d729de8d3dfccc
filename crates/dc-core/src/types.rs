//! Core type definitions for the containment engine
//!
//! These types mirror the shapes the browser hands to the extension
//! (tabs, navigation events, update notifications) and are shared by the
//! engine, the collaborator traits and the bindings.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// Browser tab id.
pub type TabId = i32;

/// Browser window id.
pub type WindowId = i32;

/// Tab id the browser reports for requests that don't belong to a tab.
pub const NO_TAB: TabId = -1;

/// Cookie store id of the browser's ordinary, non-isolated jar.
pub const DEFAULT_PARTITION: &str = "firefox-default";

/// Opaque cookie/identity partition id (a `cookieStoreId`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionId(String);

impl PartitionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_PARTITION
    }
}

impl Default for PartitionId {
    fn default() -> Self {
        Self(DEFAULT_PARTITION.to_string())
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartitionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// =============================================================================
// Scheme Masks
// =============================================================================

bitflags::bitflags! {
    /// URL scheme mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SchemeMask: u8 {
        const HTTP = 1 << 0;
        const HTTPS = 1 << 1;
        const WS = 1 << 2;
        const WSS = 1 << 3;
        const FTP = 1 << 4;
        const FILE = 1 << 5;
        const ABOUT = 1 << 6;
        const DATA = 1 << 7;
        /// Schemes the engine acts on
        const WEB = Self::HTTP.bits() | Self::HTTPS.bits();
    }
}

// =============================================================================
// Tabs
// =============================================================================

/// Loading status of a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    #[default]
    Loading,
    Complete,
}

/// Snapshot of a browser tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    /// Partition (cookie store) the tab runs under
    #[serde(default, rename = "cookieStoreId")]
    pub partition: PartitionId,
    pub url: String,
    #[serde(default)]
    pub status: TabStatus,
    #[serde(default)]
    pub window_id: WindowId,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub active: bool,
    /// Private browsing tab
    #[serde(default)]
    pub incognito: bool,
}

/// Parameters for opening a replacement tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTab {
    pub url: String,
    #[serde(rename = "cookieStoreId")]
    pub partition: PartitionId,
    pub active: bool,
    pub index: u32,
    pub window_id: WindowId,
}

/// Fields that changed in a tab update notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TabStatus>,
}

/// A tab update notification: id, what changed, and the tab after the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabUpdate {
    pub tab_id: TabId,
    pub change: TabChange,
    pub tab: Tab,
}

// =============================================================================
// Navigation
// =============================================================================

/// An outgoing top-level navigation as seen by the interception hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationRequest {
    pub tab_id: TabId,
    pub request_id: String,
    pub url: String,
}

impl NavigationRequest {
    pub fn new(tab_id: TabId, request_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            tab_id,
            request_id: request_id.into(),
            url: url.into(),
        }
    }
}

/// Decision returned to the interception hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Let the navigation proceed untouched
    Allow,
    /// Cancel the navigation (a replacement tab supersedes it)
    Cancel,
}

impl Verdict {
    pub fn is_cancel(self) -> bool {
        self == Self::Cancel
    }
}

// =============================================================================
// Partitions, cookies, companion
// =============================================================================

/// A contextual identity (container).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    #[serde(rename = "cookieStoreId")]
    pub id: PartitionId,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub icon: String,
}

/// A cookie, as far as the startup sweep cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub domain: String,
    #[serde(rename = "storeId")]
    pub partition: PartitionId,
}

/// Management events for the companion (assignment) extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanionEvent {
    Installed,
    Uninstalled,
    Enabled,
    Disabled,
}

impl CompanionEvent {
    /// Whether the companion is usable after this event.
    pub fn enables(self) -> bool {
        matches!(self, Self::Installed | Self::Enabled)
    }
}

/// User preferences as loaded from storage. No schema is enforced.
pub type Settings = serde_json::Map<String, serde_json::Value>;
