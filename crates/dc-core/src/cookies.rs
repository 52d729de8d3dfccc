//! Startup cookie sweep
//!
//! Removes cookies of the contained domains from every partition except the
//! container, so sessions that existed before installation don't leak into
//! ordinary browsing. Best-effort: a failure is logged and the sweep moves on.

use crate::engine::ContainmentEngine;
use crate::types::PartitionId;
use crate::url::cookie_url;

/// Counters reported by [`ContainmentEngine::sweep_cookies`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieSweepStats {
    /// Domains left alone because the companion assigns them
    pub domains_skipped: usize,
    pub cookies_removed: usize,
    pub failures: usize,
}

impl ContainmentEngine {
    pub async fn sweep_cookies(&self) -> CookieSweepStats {
        let mut stats = CookieSweepStats::default();
        let target = self.target_partition();

        let mut partitions: Vec<PartitionId> = match self.browser.partitions.list().await {
            Ok(list) => list.into_iter().map(|p| p.id).collect(),
            Err(e) => {
                log::warn!("cookie sweep: cannot list containers: {}", e);
                stats.failures += 1;
                Vec::new()
            }
        };
        partitions.push(self.config.default_partition.clone());

        for domain in self.resolver.matcher().domains() {
            if self.companion_assigns(domain).await {
                log::debug!("cookie sweep: {} is assigned, keeping its cookies", domain);
                stats.domains_skipped += 1;
                continue;
            }

            let url = cookie_url(domain);
            for partition in partitions.iter().filter(|p| *p != target) {
                let cookies = match self.browser.cookies.get_all(domain, partition).await {
                    Ok(cookies) => cookies,
                    Err(e) => {
                        log::warn!("cookie sweep: {} in {}: {}", domain, partition, e);
                        stats.failures += 1;
                        continue;
                    }
                };

                for cookie in cookies {
                    match self.browser.cookies.remove(&cookie.name, &url, partition).await {
                        Ok(()) => stats.cookies_removed += 1,
                        Err(e) => {
                            log::warn!("cookie sweep: {} for {}: {}", cookie.name, domain, e);
                            stats.failures += 1;
                        }
                    }
                }
            }
        }

        log::info!(
            "cookie sweep: removed {}, skipped {} assigned domains, {} failures",
            stats.cookies_removed,
            stats.domains_skipped,
            stats.failures
        );
        stats
    }

    /// Assigned with or without a `www.` prefix.
    async fn companion_assigns(&self, domain: &str) -> bool {
        if !self.companion_enabled() {
            return false;
        }
        self.is_assigned(&cookie_url(domain)).await
            || self.is_assigned(&cookie_url(&format!("www.{}", domain))).await
    }
}
