// crates/confstack-providers/src/env.rs
// ============================================================================
// Module: Environment Provider
// Description: Configuration provider over process environment variables.
// Purpose: Serve values from a lower-cased environment snapshot, ahead of
//          every cache.
// Dependencies: confstack-core
// ============================================================================

//! ## Overview
//! The environment provider snapshots the process environment the first time
//! it is consulted in an epoch, lower-casing every name so lookups match the
//! rest of the system. Values sourced here are never written to the
//! distributed cache and are served before it: an environment variable is
//! specific to this process, so cached copies from other processes must not
//! shadow it.
//!
//! An explicit variable map can be supplied instead of the process
//! environment; such a snapshot is permanent and ignores the cache clock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::sync::Arc;

use confstack_core::Directory;
use confstack_core::DirectoryItem;
use confstack_core::DirectoryListing;
use confstack_core::EpochCell;
use confstack_core::LocalMemoryCache;
use confstack_core::LookupContext;
use confstack_core::Provider;
use confstack_core::ProviderError;
use tracing::debug;

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Pseudo-directory recorded on environment-sourced items.
const ENVIRONMENT_DIRECTORY: &str = "/_environment";

/// Configuration provider over the process environment.
///
/// # Invariants
/// - Items are never cacheable and carry the `/_environment` pseudo-path.
/// - A process-environment snapshot is refreshed when the shared clock
///   expires; an explicit map never is.
pub struct EnvProvider {
    /// Permanent snapshot supplied by the embedder, when present.
    explicit: Option<Arc<DirectoryListing>>,
    /// Lazy process-environment snapshot, coordinated by the shared clock.
    snapshot: EpochCell<Option<Arc<DirectoryListing>>>,
}

impl EnvProvider {
    /// Stable provider name.
    pub const NAME: &'static str = "env";

    /// Creates a provider that snapshots the process environment lazily.
    #[must_use]
    pub fn from_process(clock: Arc<LocalMemoryCache>) -> Self {
        Self {
            explicit: None,
            snapshot: EpochCell::new(clock),
        }
    }

    /// Creates a provider over an explicit, permanent variable map.
    #[must_use]
    pub fn from_vars(clock: Arc<LocalMemoryCache>, vars: BTreeMap<String, String>) -> Self {
        Self {
            explicit: Some(Arc::new(build_listing(vars.into_iter()))),
            snapshot: EpochCell::new(clock),
        }
    }

    /// Returns the current snapshot, building it when needed.
    fn listing(&self) -> Arc<DirectoryListing> {
        if let Some(explicit) = &self.explicit {
            return Arc::clone(explicit);
        }
        self.snapshot.write(|slot| {
            if let Some(listing) = slot {
                return Arc::clone(listing);
            }
            let listing = Arc::new(build_listing(env::vars()));
            debug!(count = listing.len(), "snapshotted process environment");
            *slot = Some(Arc::clone(&listing));
            listing
        })
    }
}

impl Provider for EnvProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn lookup(
        &self,
        name: &str,
        _directory: Option<&Directory>,
        _ctx: &LookupContext<'_>,
    ) -> Result<Option<DirectoryItem>, ProviderError> {
        Ok(self.listing().get(name).cloned())
    }

    fn retrieved_items(&self, directory: &Directory) -> Option<Arc<DirectoryListing>> {
        // Environment values must never reach the distributed cache, so the
        // bulk view is always empty, but not `None`: a `None` would stop the
        // chain's merged-listing walk early.
        Some(Arc::new(DirectoryListing::for_directory(directory.path())))
    }

    fn is_cacheable(&self) -> bool {
        false
    }

    fn needs_directory(&self) -> bool {
        false
    }

    fn precedes_cache(&self) -> bool {
        true
    }
}

/// Builds the lower-cased, non-cacheable snapshot listing.
fn build_listing(vars: impl Iterator<Item = (String, String)>) -> DirectoryListing {
    let items = vars.map(|(name, value)| {
        DirectoryItem::non_cacheable(ENVIRONMENT_DIRECTORY, &name, Some(value), EnvProvider::NAME)
    });
    DirectoryListing::from_items(ENVIRONMENT_DIRECTORY, items)
}
