// crates/confstack-providers/src/cacher.rs
// ============================================================================
// Module: Distributed Cacher
// Description: Provider-shaped distributed cache with jittered TTL expiry.
// Purpose: Shield backend providers from bursty concurrent access across
//          processes.
// Dependencies: confstack-core, rand, time
// ============================================================================

//! ## Overview
//! The distributed cacher sits early in the provider chain and serves values
//! other processes already resolved. Rows live under a partition key of
//! `/service/environment` and a sort key embedding the name plus both chain
//! fingerprints, so differently-composed resolvers never read each other's
//! rows.
//!
//! Entries carry a fixed total TTL from write time, but readers retire them
//! early and probabilistically: at read time the remaining-lifetime fraction
//! is compared against a uniform draw, so the chance of a logical miss grows
//! as the row nears expiry. Many workers hitting the same near-expiry key
//! therefore refresh at scattered moments instead of stampeding the backends
//! when the row finally dies. A jitter-missed row is dropped locally; the
//! resolver falls through to the providers and rewrites it with a fresh TTL.
//!
//! A partition's rows are bulk-fetched once per memory-cache epoch. Store
//! failures degrade the cacher to absent for the process with one warning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use confstack_core::CacheRecord;
use confstack_core::CacheStore;
use confstack_core::Directory;
use confstack_core::DirectoryItem;
use confstack_core::DirectoryListing;
use confstack_core::EpochCell;
use confstack_core::ErrorSkipSet;
use confstack_core::LocalMemoryCache;
use confstack_core::LookupContext;
use confstack_core::Provider;
use confstack_core::ProviderCacher;
use confstack_core::ProviderError;
use confstack_core::recover_lookup_error;
use rand::Rng;
use time::OffsetDateTime;
use tracing::debug;

// ============================================================================
// SECTION: State
// ============================================================================

/// Per-epoch cacher state.
#[derive(Default)]
struct CacherState {
    /// Raw rows per partition key, as fetched from the store; an absent key
    /// means the partition has not been fetched this epoch.
    partitions: BTreeMap<String, Arc<Vec<CacheRecord>>>,
    /// Sort keys retired by a jitter miss; suppressed until rewritten.
    retired: BTreeSet<String>,
}

// ============================================================================
// SECTION: Cacher
// ============================================================================

/// Provider-shaped distributed cache over a [`CacheStore`].
///
/// # Invariants
/// - A partition is fetched at most once per epoch.
/// - Only cacheable items with concrete values are ever written.
/// - Unchanged values are not rewritten.
pub struct DistributedCacher {
    /// Backing store.
    store: Arc<dyn CacheStore>,
    /// Shared circuit-breaker state.
    skip_set: Arc<ErrorSkipSet>,
    /// Total TTL applied to rows this process writes.
    ttl: StdDuration,
    /// Partition rows and retirements for the current epoch.
    state: EpochCell<CacherState>,
}

impl DistributedCacher {
    /// Stable provider name.
    pub const NAME: &'static str = "cacher";

    /// Creates a cacher over the given store and shared runtime state.
    #[must_use]
    pub fn new(
        store: Arc<dyn CacheStore>,
        clock: Arc<LocalMemoryCache>,
        skip_set: Arc<ErrorSkipSet>,
        ttl: StdDuration,
    ) -> Self {
        Self {
            store,
            skip_set,
            ttl,
            state: EpochCell::new(clock),
        }
    }

    /// Returns the rows for `partition`, fetching them when this epoch has
    /// not seen the partition yet.
    fn partition_rows(&self, partition: &str) -> Result<Arc<Vec<CacheRecord>>, ProviderError> {
        if let Some(rows) = self
            .state
            .read(|state| state.partitions.get(partition).cloned())
        {
            return Ok(rows);
        }

        let mut rows = Vec::new();
        if self.skip_set.should_skip(Self::NAME, partition) {
            debug!(partition, "cache partition previously failed; treated as absent");
        } else {
            match self.store.fetch_partition(partition) {
                Ok(fetched) => {
                    debug!(partition, count = fetched.len(), "fetched cache partition");
                    rows = fetched;
                }
                Err(error) => {
                    recover_lookup_error(&self.skip_set, Self::NAME, partition, error)?;
                }
            }
        }

        let rows = Arc::new(rows);
        Ok(self.state.write(|state| {
            Arc::clone(
                state
                    .partitions
                    .entry(partition.to_owned())
                    .or_insert(rows),
            )
        }))
    }

    /// Converts a live row into the item handed back to the chain.
    fn item_from_record(record: &CacheRecord) -> DirectoryItem {
        DirectoryItem::new(
            record.directory.clone(),
            &record.name,
            record.value.clone(),
            format!("{} - via cacher", record.source),
        )
    }
}

impl Provider for DistributedCacher {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn lookup(
        &self,
        name: &str,
        _directory: Option<&Directory>,
        ctx: &LookupContext<'_>,
    ) -> Result<Option<DirectoryItem>, ProviderError> {
        let Some(partition) = ctx.partition else {
            return Ok(None);
        };
        let partition = partition.path();
        let sort_key = CacheRecord::sort_key_for(
            &name.to_ascii_lowercase(),
            ctx.directory_chain.fingerprint(),
            ctx.provider_fingerprint,
        );

        if self.state.read(|state| state.retired.contains(&sort_key)) {
            return Ok(None);
        }
        let rows = self.partition_rows(partition)?;
        let Some(record) = rows.iter().find(|record| record.sort_key == sort_key) else {
            return Ok(None);
        };
        if record.value.is_none() {
            return Ok(None);
        }

        let now = OffsetDateTime::now_utc();
        let draw = rand::thread_rng().r#gen::<f64>();
        if record.is_live(now, draw) {
            return Ok(Some(Self::item_from_record(record)));
        }

        // Retire the row locally so this process keeps missing it until the
        // fall-through resolution rewrites it with a fresh TTL.
        debug!(name, partition, "cache row retired by jitter; refreshing");
        self.state.write(|state| {
            state.retired.insert(sort_key);
        });
        Ok(None)
    }

    fn retrieved_items(&self, directory: &Directory) -> Option<Arc<DirectoryListing>> {
        // The cacher's contents must not feed cache writes back into itself.
        Some(Arc::new(DirectoryListing::for_directory(directory.path())))
    }

    fn needs_directory(&self) -> bool {
        false
    }
}

impl ProviderCacher for DistributedCacher {
    fn store_items(
        &self,
        items: &[DirectoryItem],
        ctx: &LookupContext<'_>,
    ) -> Result<(), ProviderError> {
        let Some(partition) = ctx.partition else {
            return Ok(());
        };
        let partition = partition.path();
        if self.skip_set.should_skip(Self::NAME, partition) {
            return Ok(());
        }

        let existing = self.partition_rows(partition)?;
        let now = OffsetDateTime::now_utc();
        let mut records = Vec::new();
        for item in items {
            if !item.is_cacheable() || item.value().is_none() {
                continue;
            }
            let sort_key = CacheRecord::sort_key_for(
                item.name(),
                ctx.directory_chain.fingerprint(),
                ctx.provider_fingerprint,
            );
            let unchanged = existing.iter().any(|record| {
                record.sort_key == sort_key && record.value.as_deref() == item.value()
            });
            if unchanged {
                continue;
            }
            records.push(CacheRecord {
                partition_key: partition.to_owned(),
                sort_key,
                name: item.name().to_owned(),
                directory: item.directory().to_owned(),
                value: item.value().map(str::to_owned),
                source: item.source().to_owned(),
                created_at: now,
                ttl_seconds: self.ttl.as_secs(),
            });
        }
        if records.is_empty() {
            return Ok(());
        }

        debug!(partition, count = records.len(), "writing cache rows");
        if let Err(error) = self.store.put_records(&records) {
            return recover_lookup_error(&self.skip_set, Self::NAME, partition, error);
        }

        // Fold the written rows into the local view so repeated lookups in
        // this epoch hit without refetching the partition.
        self.state.write(|state| {
            let rows = state
                .partitions
                .entry(partition.to_owned())
                .or_insert_with(|| Arc::new(Vec::new()));
            let merged = Arc::make_mut(rows);
            for record in records {
                state.retired.remove(&record.sort_key);
                merged.retain(|existing| existing.sort_key != record.sort_key);
                merged.push(record);
            }
        });
        Ok(())
    }
}
