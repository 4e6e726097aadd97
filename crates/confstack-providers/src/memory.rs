// crates/confstack-providers/src/memory.rs
// ============================================================================
// Module: In-Memory Backends
// Description: Map-backed implementations of the backend client contracts.
// Purpose: Stand in for network stores in tests and local development.
// Dependencies: confstack-core, parking_lot, time
// ============================================================================

//! ## Overview
//! Each store here implements one of the core client contracts over a plain
//! map, with two extras the suites rely on: call counters (to assert that
//! the caches actually shield the backend) and per-path access denial (to
//! exercise the circuit breaker). [`MemoryCacheStore`] also honors physical
//! TTL on read, like a real table with row expiry would.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use confstack_core::CacheRecord;
use confstack_core::CacheStore;
use confstack_core::ConfigTable;
use confstack_core::ParamStoreClient;
use confstack_core::ProviderError;
use confstack_core::SecretsClient;
use confstack_core::TableRow;
use parking_lot::RwLock;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the access-denied error every store here raises for denied paths.
fn denied(provider: &str, path: &str) -> ProviderError {
    ProviderError::AccessDenied {
        provider: provider.to_owned(),
        directory: path.to_owned(),
        detail: "denied by test policy".to_owned(),
    }
}

// ============================================================================
// SECTION: Parameter Store
// ============================================================================

/// Map-backed [`ParamStoreClient`].
#[derive(Default)]
pub struct MemoryParamStore {
    /// Values keyed by directory path then name.
    values: RwLock<BTreeMap<String, BTreeMap<String, String>>>,
    /// Paths answering with access denied.
    denied_paths: RwLock<BTreeSet<String>>,
    /// Number of directory fetches served or denied.
    fetches: AtomicUsize,
}

impl MemoryParamStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value under a directory path.
    pub fn set(&self, path: &str, name: &str, value: &str) {
        self.values
            .write()
            .entry(path.to_owned())
            .or_default()
            .insert(name.to_owned(), value.to_owned());
    }

    /// Makes fetches for `path` fail with access denied.
    pub fn deny(&self, path: &str) {
        self.denied_paths.write().insert(path.to_owned());
    }

    /// Returns how many directory fetches were attempted.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ParamStoreClient for MemoryParamStore {
    fn fetch_directory(&self, path: &str) -> Result<BTreeMap<String, String>, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.denied_paths.read().contains(path) {
            return Err(denied("ssm", path));
        }
        Ok(self.values.read().get(path).cloned().unwrap_or_default())
    }
}

// ============================================================================
// SECTION: Config Table
// ============================================================================

/// Map-backed [`ConfigTable`].
#[derive(Default)]
pub struct MemoryConfigTable {
    /// Rows keyed by directory path then name.
    rows: RwLock<BTreeMap<String, BTreeMap<String, String>>>,
    /// Paths answering with access denied.
    denied_paths: RwLock<BTreeSet<String>>,
    /// Number of directory queries served or denied.
    queries: AtomicUsize,
}

impl MemoryConfigTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a row under a directory path.
    pub fn set(&self, path: &str, name: &str, value: &str) {
        self.rows
            .write()
            .entry(path.to_owned())
            .or_default()
            .insert(name.to_owned(), value.to_owned());
    }

    /// Makes queries for `path` fail with access denied.
    pub fn deny(&self, path: &str) {
        self.denied_paths.write().insert(path.to_owned());
    }

    /// Returns how many directory queries were attempted.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl ConfigTable for MemoryConfigTable {
    fn rows_for_directory(&self, path: &str) -> Result<Vec<TableRow>, ProviderError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.denied_paths.read().contains(path) {
            return Err(denied("table", path));
        }
        Ok(self
            .rows
            .read()
            .get(path)
            .map(|rows| {
                rows.iter()
                    .map(|(name, value)| TableRow {
                        name: name.clone(),
                        value: value.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

// ============================================================================
// SECTION: Secrets Service
// ============================================================================

/// Map-backed [`SecretsClient`].
#[derive(Default)]
pub struct MemorySecrets {
    /// Secret values keyed by full path.
    secrets: RwLock<BTreeMap<String, String>>,
    /// Whether the listing call fails with access denied.
    deny_listing: RwLock<bool>,
    /// Number of individual value fetches.
    value_fetches: AtomicUsize,
}

impl MemorySecrets {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a secret under its full path (`/dir/name`).
    pub fn set(&self, full_path: &str, value: &str) {
        self.secrets
            .write()
            .insert(full_path.to_owned(), value.to_owned());
    }

    /// Makes the listing call fail with access denied.
    pub fn deny_listing(&self) {
        *self.deny_listing.write() = true;
    }

    /// Returns how many individual values were fetched.
    #[must_use]
    pub fn value_fetch_count(&self) -> usize {
        self.value_fetches.load(Ordering::SeqCst)
    }
}

impl SecretsClient for MemorySecrets {
    fn list_secret_paths(&self) -> Result<Vec<String>, ProviderError> {
        if *self.deny_listing.read() {
            return Err(denied("secrets", "list-secrets"));
        }
        Ok(self.secrets.read().keys().cloned().collect())
    }

    fn fetch_secret(&self, path: &str) -> Result<Option<String>, ProviderError> {
        self.value_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.secrets.read().get(path).cloned())
    }
}

// ============================================================================
// SECTION: Cache Store
// ============================================================================

/// Map-backed [`CacheStore`] with physical TTL filtering on read.
#[derive(Default)]
pub struct MemoryCacheStore {
    /// Records keyed by (partition key, sort key).
    records: RwLock<BTreeMap<(String, String), CacheRecord>>,
    /// Whether every call fails as unavailable (missing table).
    unavailable: RwLock<bool>,
    /// Number of partition fetches.
    fetches: AtomicUsize,
    /// Number of put calls.
    puts: AtomicUsize,
}

impl MemoryCacheStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail as unavailable, like a missing table.
    pub fn make_unavailable(&self) {
        *self.unavailable.write() = true;
    }

    /// Returns a snapshot of every stored record.
    #[must_use]
    pub fn records(&self) -> Vec<CacheRecord> {
        self.records.read().values().cloned().collect()
    }

    /// Seeds a record directly, bypassing the put counter.
    pub fn seed(&self, record: CacheRecord) {
        self.records.write().insert(
            (record.partition_key.clone(), record.sort_key.clone()),
            record,
        );
    }

    /// Returns how many partition fetches were attempted.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Returns how many put calls were made.
    #[must_use]
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Raises the unavailability error when toggled on.
    fn check_available(&self) -> Result<(), ProviderError> {
        if *self.unavailable.read() {
            return Err(ProviderError::Unavailable {
                provider: "cacher".to_owned(),
                detail: "cache table does not exist".to_owned(),
            });
        }
        Ok(())
    }
}

impl CacheStore for MemoryCacheStore {
    fn fetch_partition(&self, partition_key: &str) -> Result<Vec<CacheRecord>, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let now = OffsetDateTime::now_utc();
        Ok(self
            .records
            .read()
            .values()
            .filter(|record| record.partition_key == partition_key)
            .filter(|record| record.expires_at() > now)
            .cloned()
            .collect())
    }

    fn put_records(&self, records: &[CacheRecord]) -> Result<(), ProviderError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let mut stored = self.records.write();
        for record in records {
            stored.insert(
                (record.partition_key.clone(), record.sort_key.clone()),
                record.clone(),
            );
        }
        Ok(())
    }
}
