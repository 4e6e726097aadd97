// crates/confstack-providers/src/table.rs
// ============================================================================
// Module: Config Table Provider
// Description: Bulk-fetching provider over a table-backed configuration store.
// Purpose: Serve directory-partitioned rows with one query per directory per
//          epoch.
// Dependencies: confstack-core
// ============================================================================

//! ## Overview
//! The table provider reads rows partitioned by directory path from a
//! [`ConfigTable`]. Like the parameter-store provider it fetches a whole
//! directory on first touch and keeps the listing for the epoch; error
//! recovery goes through the shared skip set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use confstack_core::ConfigTable;
use confstack_core::Directory;
use confstack_core::DirectoryItem;
use confstack_core::DirectoryListing;
use confstack_core::EpochCell;
use confstack_core::ErrorSkipSet;
use confstack_core::LocalMemoryCache;
use confstack_core::LookupContext;
use confstack_core::Provider;
use confstack_core::ProviderError;
use confstack_core::recover_lookup_error;
use tracing::debug;

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Bulk-fetching provider over a [`ConfigTable`].
///
/// # Invariants
/// - A directory is fetched at most once per epoch, errors included.
pub struct TableProvider {
    /// Backing table client.
    table: Arc<dyn ConfigTable>,
    /// Shared circuit-breaker state.
    skip_set: Arc<ErrorSkipSet>,
    /// Per-directory listings for the current epoch.
    listings: EpochCell<BTreeMap<String, Arc<DirectoryListing>>>,
}

impl TableProvider {
    /// Stable provider name.
    pub const NAME: &'static str = "table";

    /// Creates a provider over the given table and shared runtime state.
    #[must_use]
    pub fn new(
        table: Arc<dyn ConfigTable>,
        clock: Arc<LocalMemoryCache>,
        skip_set: Arc<ErrorSkipSet>,
    ) -> Self {
        Self {
            table,
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
            match self.table.rows_for_directory(path) {
                Ok(rows) => {
                    items = rows
                        .into_iter()
                        .map(|row| DirectoryItem::new(path, &row.name, Some(row.value), Self::NAME))
                        .collect();
                    debug!(directory = path, count = items.len(), "fetched directory rows");
                }
                Err(error) => recover_lookup_error(&self.skip_set, Self::NAME, path, error)?,
            }
        }

        let listing = Arc::new(DirectoryListing::from_items(path, items));
        Ok(self.listings.write(|map| {
            Arc::clone(map.entry(path.to_owned()).or_insert(listing))
        }))
    }
}

impl Provider for TableProvider {
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
