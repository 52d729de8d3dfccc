//! Duplicate-Suppression Ledger
//!
//! A redirect chain surfaces as one interception per hop, and the browser
//! sometimes races duplicate events for the same navigation. The ledger
//! remembers, per tab, which request ids and urls were already acted upon so
//! only the first event of a logical navigation opens a replacement tab.
//!
//! Entries expire a fixed time after creation. Completion/error signals
//! release them earlier; the timer covers signals the browser never sends.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::types::TabId;

/// What the caller should do with an interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerVerdict {
    /// First sighting: perform the transition
    Act,
    /// Echo of a transition already done or in flight: cancel only
    Suppress,
}

#[derive(Debug)]
struct LedgerEntry {
    request_ids: HashSet<String>,
    urls: HashSet<String>,
    generation: u64,
    expiry: JoinHandle<()>,
}

type Entries = Arc<Mutex<HashMap<TabId, LedgerEntry>>>;

#[derive(Debug)]
pub struct SuppressionLedger {
    entries: Entries,
    ttl: Duration,
    next_generation: AtomicU64,
}

impl SuppressionLedger {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            next_generation: AtomicU64::new(0),
        }
    }

    /// Record an interception for `tab_id` and decide whether to act on it.
    ///
    /// The read and the write happen under one lock with no await in
    /// between, so concurrent events for a tab are ordered here. Must be
    /// called from within a tokio runtime (the expiry timer is spawned).
    pub fn record(&self, tab_id: TabId, request_id: &str, url: &str) -> LedgerVerdict {
        let mut entries = lock(&self.entries);

        if let Some(entry) = entries.get_mut(&tab_id) {
            let seen = entry.request_ids.contains(request_id) || entry.urls.contains(url);
            entry.request_ids.insert(request_id.to_string());
            entry.urls.insert(url.to_string());

            return if seen {
                log::debug!("tab {}: suppressing echo of {} ({})", tab_id, request_id, url);
                LedgerVerdict::Suppress
            } else {
                LedgerVerdict::Act
            };
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let expiry = self.schedule_expiry(tab_id, generation);

        let mut request_ids = HashSet::new();
        request_ids.insert(request_id.to_string());
        let mut urls = HashSet::new();
        urls.insert(url.to_string());

        entries.insert(
            tab_id,
            LedgerEntry {
                request_ids,
                urls,
                generation,
                expiry,
            },
        );

        LedgerVerdict::Act
    }

    /// Drop the tab's entry now (request completed or failed).
    /// Returns whether there was one.
    pub fn release(&self, tab_id: TabId) -> bool {
        match lock(&self.entries).remove(&tab_id) {
            Some(entry) => {
                entry.expiry.abort();
                log::debug!("tab {}: ledger entry released", tab_id);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, tab_id: TabId) -> bool {
        lock(&self.entries).contains_key(&tab_id)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn schedule_expiry(&self, tab_id: TabId, generation: u64) -> JoinHandle<()> {
        let entries = Arc::clone(&self.entries);
        let ttl = self.ttl;

        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;

            let mut entries = lock(&entries);
            // A released-then-recreated entry belongs to a newer timer
            if entries.get(&tab_id).is_some_and(|e| e.generation == generation) {
                entries.remove(&tab_id);
                log::debug!("tab {}: ledger entry expired", tab_id);
            }
        })
    }
}

impl Drop for SuppressionLedger {
    fn drop(&mut self) {
        for entry in lock(&self.entries).values() {
            entry.expiry.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_millis(2000);

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_first_sighting_acts() {
        let ledger = SuppressionLedger::new(TTL);
        assert_eq!(ledger.record(3, "r1", "https://discordapp.com/"), LedgerVerdict::Act);
        assert!(ledger.contains(3));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_redirect_echo_suppressed() {
        let ledger = SuppressionLedger::new(TTL);
        assert_eq!(ledger.record(3, "r1", "https://discordapp.com/"), LedgerVerdict::Act);
        // Same request id, next hop of the redirect chain
        assert_eq!(ledger.record(3, "r1", "https://discord.com/"), LedgerVerdict::Suppress);
        // Different id, same url
        assert_eq!(ledger.record(3, "r2", "https://discord.com/"), LedgerVerdict::Suppress);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_distinct_navigation_acts_and_is_tracked() {
        let ledger = SuppressionLedger::new(TTL);
        assert_eq!(ledger.record(3, "r1", "https://discord.com/a"), LedgerVerdict::Act);
        assert_eq!(ledger.record(3, "r2", "https://discord.com/b"), LedgerVerdict::Act);
        // The second navigation was recorded too
        assert_eq!(ledger.record(3, "r2", "https://discord.com/c"), LedgerVerdict::Suppress);
        assert_eq!(ledger.record(3, "r9", "https://discord.com/b"), LedgerVerdict::Suppress);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_tabs_are_independent() {
        let ledger = SuppressionLedger::new(TTL);
        assert_eq!(ledger.record(1, "r1", "https://discord.com/"), LedgerVerdict::Act);
        assert_eq!(ledger.record(2, "r1", "https://discord.com/"), LedgerVerdict::Act);
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_at_most_one_act_per_chain() {
        let ledger = SuppressionLedger::new(TTL);
        let chain = [
            ("r1", "https://discordapp.com/"),
            ("r1", "https://discord.com/"),
            ("r2", "https://discord.com/"),
            ("r2", "https://discord.com/app"),
            ("r1", "https://discord.com/login"),
        ];
        let acts = chain
            .iter()
            .filter(|(id, url)| ledger.record(5, id, url) == LedgerVerdict::Act)
            .count();
        assert_eq!(acts, 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_entry_expires() {
        let ledger = SuppressionLedger::new(TTL);
        ledger.record(3, "r1", "https://discord.com/");

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(ledger.contains(3));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(!ledger.contains(3));
        assert_eq!(ledger.record(3, "r1", "https://discord.com/"), LedgerVerdict::Act);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_expiry_counts_from_creation() {
        let ledger = SuppressionLedger::new(TTL);
        ledger.record(3, "r1", "https://discord.com/");
        tokio::time::sleep(Duration::from_millis(1500)).await;
        ledger.record(3, "r2", "https://discord.com/app");
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!ledger.contains(3));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_release_is_idempotent() {
        let ledger = SuppressionLedger::new(TTL);
        assert!(!ledger.release(3));
        ledger.record(3, "r1", "https://discord.com/");
        assert!(ledger.release(3));
        assert!(!ledger.release(3));
        assert!(ledger.is_empty());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_stale_timer_spares_new_entry() {
        let ledger = SuppressionLedger::new(TTL);
        ledger.record(3, "r1", "https://discord.com/");
        tokio::time::sleep(Duration::from_millis(1000)).await;

        ledger.release(3);
        ledger.record(3, "r2", "https://discord.com/app");

        // First entry's deadline passes; the new one must survive it
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(ledger.contains(3));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!ledger.contains(3));
    }
}
