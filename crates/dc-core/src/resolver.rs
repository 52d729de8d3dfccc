//! Partition Resolver
//!
//! Decides which partition a URL should load in, given the partition the tab
//! currently runs under. Both the live interception path and the startup
//! sweep go through [`PartitionResolver::resolve`].

use crate::matcher::DomainMatcher;
use crate::types::PartitionId;
use crate::url::is_web_url;

#[derive(Debug, Clone)]
pub struct PartitionResolver {
    matcher: DomainMatcher,
    target: PartitionId,
    default: PartitionId,
}

impl PartitionResolver {
    pub fn new(matcher: DomainMatcher, target: PartitionId, default: PartitionId) -> Self {
        Self {
            matcher,
            target,
            default,
        }
    }

    /// Partition the navigation must move to, or `None` if the tab is
    /// already where it belongs (or the URL isn't http(s)).
    pub fn resolve(&self, url: &str, tab_partition: &PartitionId) -> Option<PartitionId> {
        if !is_web_url(url) {
            return None;
        }

        let in_set = self.matcher.classify(url);
        let in_target = *tab_partition == self.target;

        match (in_set, in_target) {
            (true, false) => Some(self.target.clone()),
            (false, true) => Some(self.default.clone()),
            _ => None,
        }
    }

    pub fn matcher(&self) -> &DomainMatcher {
        &self.matcher
    }

    pub fn target(&self) -> &PartitionId {
        &self.target
    }

    pub fn default_partition(&self) -> &PartitionId {
        &self.default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DISCORD_DOMAINS;

    const TARGET: &str = "firefox-container-7";

    fn resolver() -> PartitionResolver {
        PartitionResolver::new(
            DomainMatcher::new(DISCORD_DOMAINS).unwrap(),
            PartitionId::new(TARGET),
            PartitionId::default(),
        )
    }

    #[test]
    fn test_contain_into_target() {
        let r = resolver();
        assert_eq!(
            r.resolve("https://discord.com/app", &PartitionId::default()),
            Some(PartitionId::new(TARGET))
        );
        // Any foreign container counts as "not target"
        assert_eq!(
            r.resolve("https://discord.com/app", &PartitionId::new("firefox-container-2")),
            Some(PartitionId::new(TARGET))
        );
    }

    #[test]
    fn test_already_placed() {
        let r = resolver();
        assert_eq!(r.resolve("https://discord.com/channels/1", &PartitionId::new(TARGET)), None);
        assert_eq!(r.resolve("https://example.org", &PartitionId::default()), None);
        assert_eq!(r.resolve("https://example.org", &PartitionId::new("firefox-container-2")), None);
    }

    #[test]
    fn test_evict_to_default() {
        let r = resolver();
        assert_eq!(
            r.resolve("https://example.org", &PartitionId::new(TARGET)),
            Some(PartitionId::default())
        );
    }

    #[test]
    fn test_non_web_urls_never_act() {
        let r = resolver();
        assert_eq!(r.resolve("about:blank", &PartitionId::new(TARGET)), None);
        assert_eq!(r.resolve("moz-extension://x/discord.com", &PartitionId::default()), None);
        assert_eq!(r.resolve("//discord.com/app", &PartitionId::default()), None);
    }

    #[test]
    fn test_fixed_point() {
        let r = resolver();
        let partitions = [
            PartitionId::default(),
            PartitionId::new(TARGET),
            PartitionId::new("firefox-container-2"),
        ];
        let urls = ["https://discord.com/app", "https://example.org", "about:blank"];

        for url in urls {
            for start in &partitions {
                let first = r.resolve(url, start);
                assert_eq!(r.resolve(url, start), first);
                if let Some(moved) = first {
                    assert_eq!(r.resolve(url, &moved), None, "{url} from {start} oscillates");
                }
            }
        }
    }
}
