// crates/confstack-providers/src/secrets.rs
// ============================================================================
// Module: Secrets Provider
// Description: List-then-fetch provider over a secrets-service client.
// Purpose: Discover available secret names in one call, fetch values lazily.
// Dependencies: confstack-core
// ============================================================================

//! ## Overview
//! Secrets services do not support bulk value reads, so this provider lists
//! every visible secret path once per epoch and only fetches a value when a
//! listed name is actually asked for. The availability listing keeps the
//! per-lookup cost at zero network calls for names that do not exist, which
//! matters because the chain walk probes every (directory, provider) pair.
//!
//! Fetched values (and confirmed-absent fetches) are cached for the epoch.

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
use confstack_core::Provider;
use confstack_core::ProviderError;
use confstack_core::SecretsClient;
use confstack_core::recover_lookup_error;
use tracing::debug;
use tracing::warn;

// ============================================================================
// SECTION: State
// ============================================================================

/// Scope recorded in the skip set for listing failures.
const LIST_SCOPE: &str = "list-secrets";

/// Per-epoch state: the availability index plus fetched values.
#[derive(Default)]
struct SecretsState {
    /// Names visible per directory path, values unfetched; `None` until the
    /// listing call has run this epoch.
    available: Option<BTreeMap<String, DirectoryListing>>,
    /// Fetched values (and confirmed absences) per directory path.
    fetched: BTreeMap<String, Arc<DirectoryListing>>,
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// List-then-fetch provider over a [`SecretsClient`].
///
/// # Invariants
/// - The availability listing runs at most once per epoch, success or not.
/// - A value is fetched at most once per epoch per name.
pub struct SecretsProvider {
    /// Backing secrets client.
    client: Arc<dyn SecretsClient>,
    /// Shared circuit-breaker state.
    skip_set: Arc<ErrorSkipSet>,
    /// Availability index and fetched values for the current epoch.
    state: EpochCell<SecretsState>,
}

impl SecretsProvider {
    /// Stable provider name.
    pub const NAME: &'static str = "secrets";

    /// Creates a provider over the given client and shared runtime state.
    #[must_use]
    pub fn new(
        client: Arc<dyn SecretsClient>,
        clock: Arc<LocalMemoryCache>,
        skip_set: Arc<ErrorSkipSet>,
    ) -> Self {
        Self {
            client,
            skip_set,
            state: EpochCell::new(clock),
        }
    }

    /// Builds the availability index from the listing call.
    fn list_available(&self) -> Result<BTreeMap<String, DirectoryListing>, ProviderError> {
        if self.skip_set.should_skip(Self::NAME, LIST_SCOPE) {
            return Ok(BTreeMap::new());
        }
        let paths = match self.client.list_secret_paths() {
            Ok(paths) => paths,
            Err(error) => {
                recover_lookup_error(&self.skip_set, Self::NAME, LIST_SCOPE, error)?;
                return Ok(BTreeMap::new());
            }
        };

        let mut index: BTreeMap<String, DirectoryListing> = BTreeMap::new();
        for full_path in paths {
            let Some(split_at) = full_path.rfind('/') else {
                warn!(path = full_path, "secret path carries no directory; ignored");
                continue;
            };
            let (directory, name) = full_path.split_at(split_at);
            let name = &name[1..];
            if directory.is_empty() || name.is_empty() {
                warn!(path = full_path, "secret path missing a component; ignored");
                continue;
            }
            index
                .entry(directory.to_owned())
                .or_insert_with(|| DirectoryListing::for_directory(directory))
                .insert(DirectoryItem::new(directory, name, None, Self::NAME));
        }
        debug!(directories = index.len(), "listed available secrets");
        Ok(index)
    }
}

impl Provider for SecretsProvider {
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
        let path = directory.path();

        // The write closure serializes this provider's backend traffic; the
        // listing and each value are only ever fetched once per epoch.
        self.state.write(|state| {
            if let Some(listing) = state.fetched.get(path)
                && let Some(item) = listing.get(name)
            {
                return Ok(item.value().is_some().then(|| item.clone()));
            }

            if state.available.is_none() {
                state.available = Some(self.list_available()?);
            }
            let known = state
                .available
                .as_ref()
                .and_then(|index| index.get(path))
                .and_then(|listing| listing.get(name).cloned());
            let Some(known) = known else {
                return Ok(None);
            };

            let full_path = format!("{path}/{}", known.original_name());
            let value = match self.client.fetch_secret(&full_path) {
                Ok(value) => value,
                Err(error) => {
                    recover_lookup_error(&self.skip_set, Self::NAME, path, error)?;
                    None
                }
            };

            let item = DirectoryItem::new(path, name, value, Self::NAME);
            let listing = state
                .fetched
                .entry(path.to_owned())
                .or_insert_with(|| Arc::new(DirectoryListing::for_directory(path)));
            Arc::make_mut(listing).insert(item.clone());
            Ok(item.value().is_some().then_some(item))
        })
    }

    fn retrieved_items(&self, directory: &Directory) -> Option<Arc<DirectoryListing>> {
        self.state
            .read(|state| state.fetched.get(directory.path()).cloned())
    }
}
