//! Domain Matcher
//!
//! Compiles the configured domain set into one anchored pattern per domain
//! and classifies URLs against it. Every top-level navigation goes through
//! here, so classification works on the borrowed host slice.

use regex::Regex;

use crate::error::MatcherError;
use crate::url::extract_host;

/// A single compiled domain: matches the domain itself and any subdomain.
#[derive(Debug, Clone)]
struct DomainPattern {
    domain: String,
    pattern: Regex,
}

/// Classifies hosts against the domain set.
#[derive(Debug, Clone)]
pub struct DomainMatcher {
    patterns: Vec<DomainPattern>,
}

impl DomainMatcher {
    /// Compile the domain set. Domains are lowercased and trimmed; an empty
    /// entry is rejected.
    pub fn new<I, S>(domains: I) -> Result<Self, MatcherError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns = Vec::new();

        for (idx, raw) in domains.into_iter().enumerate() {
            let domain = raw.as_ref().trim().trim_end_matches('.').to_ascii_lowercase();
            if domain.is_empty() {
                return Err(MatcherError::EmptyDomain(idx));
            }

            let source = format!(r"(?:^|\.){}$", regex::escape(&domain));
            let pattern = Regex::new(&source).map_err(|source| MatcherError::Pattern {
                domain: domain.clone(),
                source,
            })?;

            patterns.push(DomainPattern { domain, pattern });
        }

        log::debug!("compiled {} domain patterns", patterns.len());
        Ok(Self { patterns })
    }

    /// True iff the URL's host is, or is a subdomain of, a domain in the set.
    pub fn classify(&self, url: &str) -> bool {
        match extract_host(url) {
            Some(host) => self.classify_host(host),
            None => false,
        }
    }

    /// Host-level classification.
    pub fn classify_host(&self, host: &str) -> bool {
        if host.bytes().any(|b| b.is_ascii_uppercase()) {
            let lowered = host.to_ascii_lowercase();
            return self.patterns.iter().any(|p| p.pattern.is_match(&lowered));
        }
        self.patterns.iter().any(|p| p.pattern.is_match(host))
    }

    /// Domains in configuration order, normalized.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.domain.as_str())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
