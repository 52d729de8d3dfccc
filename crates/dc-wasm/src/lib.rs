//! WebAssembly bindings for Discord Container
//!
//! The extension's background script owns the browser event plumbing; it
//! calls into these bindings for the containment decision so the JS side
//! and the Rust engine classify URLs identically.

use std::sync::OnceLock;

use dc_core::{
    config::{ContainerConfig, DISCORD_DOMAINS},
    url::extract_host,
    DomainMatcher, PartitionId, PartitionResolver,
};
use wasm_bindgen::prelude::*;

static RESOLVER: OnceLock<PartitionResolver> = OnceLock::new();

/// Install the resolver. `domains` is an array of host names; `undefined`
/// or `null` selects the built-in Discord list.
#[wasm_bindgen]
pub fn init(domains: JsValue, target_partition: &str) -> Result<(), JsValue> {
    let _ = console_log::init_with_level(log::Level::Info);

    if RESOLVER.get().is_some() {
        return Err(JsValue::from_str("Already initialized. Reload the extension to reinitialize."));
    }

    let domains = if domains.is_undefined() || domains.is_null() {
        default_domains()
    } else {
        let array = js_sys::Array::from(&domains);
        let mut list = Vec::with_capacity(array.length() as usize);
        for value in array.iter() {
            let domain = value
                .as_string()
                .ok_or_else(|| JsValue::from_str("Domain must be a string"))?;
            list.push(domain);
        }
        list
    };

    let resolver = build_resolver(&domains, target_partition, ContainerConfig::default().default_partition)
        .map_err(|e| JsValue::from_str(&e))?;

    RESOLVER
        .set(resolver)
        .map_err(|_| JsValue::from_str("Failed to set resolver state"))?;

    log::info!("containing {} domains into {}", domains.len(), target_partition);
    Ok(())
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    RESOLVER.get().is_some()
}

/// Whether the URL's host is in the domain set.
#[wasm_bindgen]
pub fn is_contained_url(url: &str) -> bool {
    match RESOLVER.get() {
        Some(resolver) => resolver.matcher().classify(url),
        None => false,
    }
}

/// Partition (`cookieStoreId`) the navigation should be reopened in, or
/// `undefined` to let it through.
#[wasm_bindgen]
pub fn resolve_partition(url: &str, tab_partition: &str) -> Option<String> {
    let resolver = RESOLVER.get()?;
    resolver
        .resolve(url, &PartitionId::new(tab_partition))
        .map(|partition| partition.as_str().to_string())
}

#[wasm_bindgen]
pub fn get_domains() -> JsValue {
    let array = js_sys::Array::new();
    match RESOLVER.get() {
        Some(resolver) => {
            for domain in resolver.matcher().domains() {
                array.push(&JsValue::from_str(domain));
            }
        }
        None => {
            for domain in DISCORD_DOMAINS {
                array.push(&JsValue::from_str(domain));
            }
        }
    }
    array.into()
}

#[wasm_bindgen]
pub fn extract_host_js(url: &str) -> Option<String> {
    extract_host(url).map(|h| h.to_string())
}

fn default_domains() -> Vec<String> {
    DISCORD_DOMAINS.iter().map(|d| d.to_string()).collect()
}

fn build_resolver(domains: &[String], target: &str, default: PartitionId) -> Result<PartitionResolver, String> {
    if target.is_empty() {
        return Err("Target partition id is empty".to_string());
    }
    let matcher = DomainMatcher::new(domains).map_err(|e| format!("Invalid domain list: {}", e))?;
    Ok(PartitionResolver::new(matcher, PartitionId::new(target), default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_resolver_defaults() {
        let resolver = build_resolver(&default_domains(), "firefox-container-4", PartitionId::default()).unwrap();
        assert_eq!(
            resolver.resolve("https://discord.gg/abc", &PartitionId::default()),
            Some(PartitionId::new("firefox-container-4"))
        );
    }

    #[test]
    fn test_build_resolver_rejects_bad_input() {
        assert!(build_resolver(&default_domains(), "", PartitionId::default()).is_err());
        assert!(build_resolver(&["".to_string()], "c1", PartitionId::default()).is_err());
    }
}
