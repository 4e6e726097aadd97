// crates/confstack-providers/src/param_store.rs
// ============================================================================
// Module: Parameter Store Provider
// Description: Bulk-fetching provider over a parameter-store client.
// Purpose: Fetch a whole directory in one call and serve later lookups from
//          memory until the shared clock expires.
// Dependencies: confstack-core
// ============================================================================

//! ## Overview
//! Parameter stores answer "every name under this path" in one query, so the
//! provider fetches a directory's full listing on first touch and keeps it
//! for the epoch. Access denials and backend unavailability are recovered
//! through the shared skip set: logged once, then the (provider, directory)
//! pair is treated as empty for the process lifetime.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use confstack_core::Directory;
use confstack_core::DirectoryItem;
use confstack_core::DirectoryListing;
use confstack_core::EpochCell;
use confstack_core::ErrorSkipSet;
use confstack_core::LocalMemoryCache;
use confstack_core::LookupContext;
use confstack_core::ParamStoreClient;
use confstack_core::Provider;
use confstack_core::ProviderError;
use confstack_core::recover_lookup_error;
use tracing::debug;

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Bulk-fetching provider over a [`ParamStoreClient`].
///
/// # Invariants
/// - A directory is fetched at most once per epoch, errors included: a
///   failed fetch caches an empty listing so the backend is not hammered.
pub struct ParamStoreProvider {
    /// Backing store client.
    client: Arc<dyn ParamStoreClient>,
    /// Shared circuit-breaker state.
    skip_set: Arc<ErrorSkipSet>,
    /// Per-directory listings for the current epoch.
    listings: EpochCell<BTreeMap<String, Arc<DirectoryListing>>>,
}

impl ParamStoreProvider {
    /// Stable provider name.
    pub const NAME: &'static str = "ssm";

    /// Creates a provider over the given client and shared runtime state.
    #[must_use]
    pub fn new(
        client: Arc<dyn ParamStoreClient>,
        clock: Arc<LocalMemoryCache>,
        skip_set: Arc<ErrorSkipSet>,
    ) -> Self {
        Self {
            client,
            skip_set,
            listings: EpochCell::new(clock),
        }
    }

    /// Returns the listing for `directory`, fetching it when this epoch has
    /// not seen it yet.
    fn listing_for(&self, directory: &Directory) -> Result<Arc<DirectoryListing>, ProviderError> {
        let path = directory.path();
        if let Some(listing) = self.listings.read(|map| map.get(path).cloned()) {
            return Ok(listing);
        }

        let mut items = Vec::new();
        if self.skip_set.should_skip(Self::NAME, path) {
            debug!(directory = path, "skipping previously failed directory");
        } else {
            match self.client.fetch_directory(path) {
                Ok(values) => {
                    items = values
                        .into_iter()
                        .map(|(name, value)| {
                            DirectoryItem::new(path, &name, Some(value), Self::NAME)
                        })
                        .collect();
                    debug!(directory = path, count = items.len(), "fetched directory");
                }
                Err(error) => recover_lookup_error(&self.skip_set, Self::NAME, path, error)?,
            }
        }

        let listing = Arc::new(DirectoryListing::from_items(path, items));
        // Concurrent fillers race benignly; the first stored listing wins.
        Ok(self.listings.write(|map| {
            Arc::clone(map.entry(path.to_owned()).or_insert(listing))
        }))
    }
}

impl Provider for ParamStoreProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn lookup(
        &self,
        name: &str,
        directory: Option<&Directory>,
        _ctx: &LookupContext<'_>,
    ) -> Result<Option<DirectoryItem>, ProviderError> {
        let Some(directory) = directory else {
            return Ok(None);
        };
        Ok(self.listing_for(directory)?.get(name).cloned())
    }

    fn retrieved_items(&self, directory: &Directory) -> Option<Arc<DirectoryListing>> {
        self.listings.read(|map| map.get(directory.path()).cloned())
    }
}
