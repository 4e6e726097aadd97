// crates/confstack-core/src/interfaces/mod.rs
// ============================================================================
// Module: Confstack Interfaces
// Description: Backend-agnostic contracts for providers, cachers, and stores.
// Purpose: Define the surfaces the resolution runtime consumes without
//          embedding backend-specific details.
// Dependencies: crate::core, serde, thiserror, time
// ============================================================================

//! ## Overview
//! Interfaces define how the resolver integrates with value sources without
//! tying the core to any concrete backend. A [`Provider`] answers point
//! lookups and exposes its bulk-fetched listings; a [`ProviderCacher`] is a
//! provider-shaped distributed cache that can additionally be populated. The
//! narrow client traits ([`ParamStoreClient`], [`SecretsClient`],
//! [`ConfigTable`], [`CacheStore`]) are the seams where real network
//! backends plug in; in-memory implementations stand in for them in tests.
//!
//! Not-found is a normal outcome (`Ok(None)`), never an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::Duration;
use time::OffsetDateTime;

use crate::core::directory::Directory;
use crate::core::directory::DirectoryChain;
use crate::core::directory::DirectoryError;
use crate::core::item::DirectoryItem;
use crate::core::item::DirectoryListing;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced by providers and their backing clients.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - `AccessDenied` and `Unavailable` are recoverable: the runtime logs once
///   and skips the failing pair for the process lifetime.
/// - `InvalidData` and `Backend` are fatal and propagate to the caller.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The backend denied access to a specific directory or partition.
    #[error("access denied by {provider} at {directory}: {detail}")]
    AccessDenied {
        /// Provider that hit the denial.
        provider: String,
        /// Directory or partition path that was denied.
        directory: String,
        /// Backend-supplied detail.
        detail: String,
    },
    /// The backend is unreachable or missing (credentials, absent table).
    #[error("backend unavailable for {provider}: {detail}")]
    Unavailable {
        /// Provider whose backend is unavailable.
        provider: String,
        /// Backend-supplied detail.
        detail: String,
    },
    /// The backend returned data the provider could not interpret.
    #[error("invalid data from {provider}: {detail}")]
    InvalidData {
        /// Provider that received the data.
        provider: String,
        /// Description of the malformation.
        detail: String,
    },
    /// Any other backend failure.
    #[error("backend error from {provider}: {detail}")]
    Backend {
        /// Provider that hit the failure.
        provider: String,
        /// Backend-supplied detail.
        detail: String,
    },
}

impl ProviderError {
    /// Returns true for errors the runtime recovers from by skipping the
    /// failing (provider, directory) pair.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::AccessDenied { .. } | Self::Unavailable { .. })
    }
}

/// Errors surfaced by the resolver to application code.
///
/// # Invariants
/// - Recoverable provider failures never reach this type; they degrade to
///   not-found with a one-time warning.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A provider or cache backend failed in a non-recoverable way.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// A directory path supplied to the resolver was invalid.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

// ============================================================================
// SECTION: Lookup Context
// ============================================================================

/// Ambient state describing the lookup a provider is serving.
///
/// # Invariants
/// - Fingerprints identify the exact chains in use; the distributed cache
///   keys entries by them so differently-composed resolvers never share rows.
/// - Values are snapshots; providers must not retain references past the call.
#[derive(Debug, Clone, Copy)]
pub struct LookupContext<'a> {
    /// Directory chain driving the current lookup.
    pub directory_chain: &'a DirectoryChain,
    /// Fingerprint of the provider chain (cacheable providers only).
    pub provider_fingerprint: &'a str,
    /// Cache partition (`/service/environment`), when caching is active.
    pub partition: Option<&'a Directory>,
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// A pluggable configuration value source.
///
/// Providers bulk-fetch whole directories where the backend allows it and
/// serve point lookups from that in-process state until the shared memory
/// cache clock expires.
pub trait Provider: Send + Sync {
    /// Short stable name, used in fingerprints, item provenance, and logs.
    fn name(&self) -> &str;

    /// Resolves a single name, or `Ok(None)` when this source has no value.
    ///
    /// `directory` is `None` for providers that do not consult one (the
    /// environment provider) and for the distributed cacher, which keys on
    /// the context partition instead.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] only for non-recoverable backend failures;
    /// recoverable ones are logged once and reported as `Ok(None)`.
    fn lookup(
        &self,
        name: &str,
        directory: Option<&Directory>,
        ctx: &LookupContext<'_>,
    ) -> Result<Option<DirectoryItem>, ProviderError>;

    /// Returns the listing already bulk-fetched for `directory` this epoch.
    ///
    /// `None` means the directory was never fetched; callers must treat
    /// that differently from an empty listing when assembling bulk cache
    /// writes, otherwise a lower-priority provider's values could be
    /// attributed past a higher-priority provider that has not run yet.
    fn retrieved_items(&self, directory: &Directory) -> Option<Arc<DirectoryListing>>;

    /// Whether values from this provider may enter the distributed cache.
    fn is_cacheable(&self) -> bool {
        true
    }

    /// Whether this provider needs a directory to answer lookups.
    fn needs_directory(&self) -> bool {
        true
    }

    /// Whether this provider must be consulted before the distributed cache.
    fn precedes_cache(&self) -> bool {
        false
    }
}

/// A provider-shaped distributed cache that can be populated after lookups.
pub trait ProviderCacher: Provider {
    /// Persists the given items under the context's partition and chain
    /// fingerprints, rewriting only entries whose value changed.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] only for non-recoverable store failures;
    /// recoverable ones degrade the cache to absent with a one-time warning.
    fn store_items(
        &self,
        items: &[DirectoryItem],
        ctx: &LookupContext<'_>,
    ) -> Result<(), ProviderError>;
}

// ============================================================================
// SECTION: Backend Client Contracts
// ============================================================================

/// Bulk parameter-store client: fetches every name under a directory path.
pub trait ParamStoreClient: Send + Sync {
    /// Returns all name/value pairs stored directly under `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the store cannot be queried.
    fn fetch_directory(&self, path: &str) -> Result<BTreeMap<String, String>, ProviderError>;
}

/// Secrets-service client: lists secret paths, fetches values one at a time.
pub trait SecretsClient: Send + Sync {
    /// Returns the full paths of every secret this caller can see.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the listing cannot be fetched.
    fn list_secret_paths(&self) -> Result<Vec<String>, ProviderError>;

    /// Returns the value stored at `path`, or `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the secret cannot be fetched.
    fn fetch_secret(&self, path: &str) -> Result<Option<String>, ProviderError>;
}

/// A row in a table-backed configuration store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    /// Configuration name (any case; consumers lower-case it).
    pub name: String,
    /// Stored value.
    pub value: String,
}

/// Table-backed configuration store: fetches every row for a directory.
pub trait ConfigTable: Send + Sync {
    /// Returns all rows whose partition is the given directory path.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the table cannot be queried.
    fn rows_for_directory(&self, path: &str) -> Result<Vec<TableRow>, ProviderError>;
}

// ============================================================================
// SECTION: Cache Store Contract
// ============================================================================

/// Separator between the components of a cache sort key.
const SORT_KEY_SEPARATOR: &str = "|+|";

/// A persisted distributed-cache entry.
///
/// # Invariants
/// - `sort_key` embeds the name plus both chain fingerprints, so entries
///   produced under different chain compositions never collide.
/// - `created_at` plus `ttl_seconds` fixes the physical expiration; logical
///   expiration happens earlier, probabilistically, at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Partition key: the `/service/environment` path of the writing app.
    pub partition_key: String,
    /// Sort key: name plus directory- and provider-chain fingerprints.
    pub sort_key: String,
    /// Lower-cased configuration name.
    pub name: String,
    /// Path of the directory the value was originally found in.
    pub directory: String,
    /// Cached value; `None` rows are tolerated on read but never written.
    pub value: Option<String>,
    /// Provenance carried over from the original item.
    pub source: String,
    /// Write time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Total time-to-live, in seconds, from `created_at`.
    pub ttl_seconds: u64,
}

impl CacheRecord {
    /// Builds the sort key for a name under the given chain fingerprints.
    #[must_use]
    pub fn sort_key_for(name: &str, directory_fingerprint: &str, provider_fingerprint: &str) -> String {
        format!("{name}{SORT_KEY_SEPARATOR}{directory_fingerprint}{SORT_KEY_SEPARATOR}{provider_fingerprint}")
    }

    /// Returns the instant the record physically expires.
    #[must_use]
    pub fn expires_at(&self) -> OffsetDateTime {
        self.created_at + Duration::seconds(i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX))
    }

    /// Returns the fraction of the total TTL still remaining at `now`,
    /// clamped to `[0, 1]`.
    #[must_use]
    pub fn fraction_remaining(&self, now: OffsetDateTime) -> f64 {
        if self.ttl_seconds == 0 {
            return 0.0;
        }
        let total = Duration::seconds(i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX));
        let remaining = self.expires_at() - now;
        (remaining.as_seconds_f64() / total.as_seconds_f64()).clamp(0.0, 1.0)
    }

    /// Jittered liveness check: with `draw` uniform in `[0, 1)`, the record
    /// counts as a hit iff `draw <= fraction_remaining`.
    ///
    /// A freshly written record is almost never treated as stale; one close
    /// to expiry almost always is, so concurrent readers spread their
    /// refreshes instead of stampeding the backends at the same instant.
    #[must_use]
    pub fn is_live(&self, now: OffsetDateTime, draw: f64) -> bool {
        draw <= self.fraction_remaining(now)
    }
}

/// Backing key/value store for the distributed cache.
pub trait CacheStore: Send + Sync {
    /// Returns every unexpired record under the given partition key.
    ///
    /// Physical TTL filtering is the store's responsibility; records past
    /// `created_at + ttl` must not be returned.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the store cannot be queried.
    fn fetch_partition(&self, partition_key: &str) -> Result<Vec<CacheRecord>, ProviderError>;

    /// Persists the given records, replacing rows with matching keys.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the store cannot be written.
    fn put_records(&self, records: &[CacheRecord]) -> Result<(), ProviderError>;
}
