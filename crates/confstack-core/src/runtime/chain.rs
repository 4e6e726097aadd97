// crates/confstack-core/src/runtime/chain.rs
// ============================================================================
// Module: Provider Chain
// Description: Ordered provider sequence and the directory-by-directory walk.
// Purpose: Query providers in priority order and feed the distributed cache.
// Dependencies: crate::core, crate::interfaces, tracing
// ============================================================================

//! ## Overview
//! A [`ProviderChain`] is the ordered sequence of providers a lookup
//! consults. The walk is: providers flagged as preceding the cache (the
//! environment provider) first, without any directory; then the distributed
//! cacher; then, for each directory in the chain, every remaining provider.
//! A directory is exhausted across all providers before the next directory
//! is tried, so directory order outranks provider order.
//!
//! On a cacheable hit the cacher is populated with everything the providers
//! bulk-fetched for the consulted directories, not just the winning item,
//! so one cold lookup warms the whole partition.
//! Invariants:
//! - The fingerprint covers only providers eligible for caching, in order.
//! - First hit wins; later directories never override earlier ones.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::core::directory::Directory;
use crate::core::directory::DirectoryChain;
use crate::core::item::DirectoryItem;
use crate::interfaces::LookupContext;
use crate::interfaces::Provider;
use crate::interfaces::ProviderCacher;
use crate::interfaces::ProviderError;

// ============================================================================
// SECTION: Provider Chain
// ============================================================================

/// A prioritized list of providers to consult when resolving a value.
///
/// # Invariants
/// - Provider order is significant and preserved.
/// - The fingerprint skips leading cache-preceding providers: their results
///   are never cached, so they cannot affect what a cached row means.
#[derive(Clone)]
pub struct ProviderChain {
    /// Providers in priority order.
    providers: Vec<Arc<dyn Provider>>,
    /// Concatenated names of the cache-relevant providers.
    fingerprint: String,
    /// Whether any provider participates in distributed caching.
    have_cacheable: bool,
}

impl ProviderChain {
    /// Builds a chain from an ordered provider list.
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        let mut names = Vec::new();
        let mut past_leading = false;
        for provider in &providers {
            if !past_leading {
                if provider.precedes_cache() {
                    continue;
                }
                past_leading = true;
            }
            names.push(provider.name().to_owned());
        }
        Self {
            providers,
            fingerprint: names.join("|"),
            have_cacheable: past_leading,
        }
    }

    /// Returns the providers in priority order.
    #[must_use]
    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    /// Returns the cache-relevant provider-name fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Returns true when any provider participates in distributed caching.
    #[must_use]
    pub const fn have_cacheable_providers(&self) -> bool {
        self.have_cacheable
    }

    /// Resolves `name` through the chain, consulting the cacher at its slot
    /// and populating it on a cacheable hit.
    ///
    /// Returns the first item found, or `None` when no source has the name.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when a provider or the cache store fails in
    /// a non-recoverable way.
    pub fn lookup(
        &self,
        name: &str,
        directory_chain: &DirectoryChain,
        cacher: Option<&dyn ProviderCacher>,
        partition: Option<&Directory>,
    ) -> Result<Option<DirectoryItem>, ProviderError> {
        let ctx = LookupContext {
            directory_chain,
            provider_fingerprint: &self.fingerprint,
            partition,
        };

        // Cache-preceding providers (the environment) answer first, with no
        // directory scoping and no cache involvement.
        for provider in self.providers.iter().filter(|p| p.precedes_cache()) {
            if let Some(item) = provider.lookup(name, None, &ctx)? {
                debug!(name, provider = provider.name(), "resolved before cache");
                return Ok(Some(item));
            }
        }

        let mut use_cacher = cacher.is_some() && partition.is_some() && self.have_cacheable;
        if use_cacher
            && let Some(cacher) = cacher
            && let Some(item) = cacher.lookup(name, None, &ctx)?
        {
            debug!(name, source = item.source(), "resolved from distributed cache");
            return Ok(Some(item));
        }

        // Outer loop over directories: exhaust every provider for one
        // directory before moving to the next, so directory priority wins.
        let mut found: Option<DirectoryItem> = None;
        let mut warmed: BTreeMap<String, DirectoryItem> = BTreeMap::new();
        for directory in directory_chain.directories() {
            for provider in self.providers.iter().filter(|p| !p.precedes_cache()) {
                let scope = provider.needs_directory().then_some(directory);
                if let Some(item) = provider.lookup(name, scope, &ctx)? {
                    debug!(
                        name,
                        provider = provider.name(),
                        directory = directory.path(),
                        "resolved from provider"
                    );
                    found = Some(item);
                    break;
                }
            }

            if let Some(item) = &found
                && !item.is_cacheable()
            {
                // Nothing cacheable will be written; skip collecting.
                use_cacher = false;
            }

            // Earlier directories keep priority over later ones in the bulk
            // write, mirroring the lookup order.
            if use_cacher {
                for (key, item) in self.retrieved_items_merged(directory) {
                    warmed.entry(key).or_insert(item);
                }
            }

            if found.is_some() {
                break;
            }
        }

        if use_cacher
            && let (Some(item), Some(cacher)) = (&found, cacher)
            && item.is_cacheable()
        {
            warmed.insert(item.name().to_owned(), item.clone());
            let items: Vec<DirectoryItem> = warmed.into_values().collect();
            cacher.store_items(&items, &ctx)?;
        }

        Ok(found)
    }

    /// Merges the listings every provider has already bulk-fetched for
    /// `directory`, earlier providers taking priority.
    ///
    /// Stops at the first provider that has not fetched the directory yet:
    /// providers are shared across chains, and attributing a lower-priority
    /// provider's values past an unfetched higher-priority one could cache
    /// the wrong winner.
    fn retrieved_items_merged(&self, directory: &Directory) -> BTreeMap<String, DirectoryItem> {
        let mut merged = BTreeMap::new();
        for provider in &self.providers {
            let Some(listing) = provider.retrieved_items(directory) else {
                break;
            };
            for item in listing.items() {
                merged
                    .entry(item.name().to_owned())
                    .or_insert_with(|| item.clone());
            }
        }
        merged
    }
}
