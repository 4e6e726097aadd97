// crates/confstack-providers/src/tests.rs
// ============================================================================
// Module: Provider Unit Tests
// Description: Unit coverage for the built-in providers and the cacher.
// Purpose: Exercise provider caching, flags, and the cacher's jitter and
//          diffing against in-memory backends.
// Dependencies: confstack-providers
// ============================================================================

//! ## Overview
//! Unit tests pinning each provider's fetch-once-per-epoch behavior, the
//! environment provider's flags and snapshot, and the distributed cacher's
//! read path (including deterministic jitter outcomes for rows that are
//! fresh or practically expired). Full-resolver behavior lives in the
//! integration suites under `tests/`.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use confstack_core::CacheRecord;
use confstack_core::Directory;
use confstack_core::DirectoryChain;
use confstack_core::DirectoryItem;
use confstack_core::ErrorSkipSet;
use confstack_core::LocalMemoryCache;
use confstack_core::LookupContext;
use confstack_core::Provider;
use confstack_core::ProviderCacher;
use time::Duration;
use time::OffsetDateTime;

use crate::DistributedCacher;
use crate::EnvProvider;
use crate::MemoryCacheStore;
use crate::MemoryConfigTable;
use crate::MemoryParamStore;
use crate::MemorySecrets;
use crate::ParamStoreProvider;
use crate::SecretsProvider;
use crate::TableProvider;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// A long-window clock so epochs only change via explicit resets.
fn test_clock() -> Arc<LocalMemoryCache> {
    Arc::new(LocalMemoryCache::new(StdDuration::from_secs(3600)))
}

/// A lookup context over the given chain with an optional partition.
fn lookup_ctx<'a>(
    chain: &'a DirectoryChain,
    partition: Option<&'a Directory>,
) -> LookupContext<'a> {
    LookupContext {
        directory_chain: chain,
        provider_fingerprint: "table|ssm",
        partition,
    }
}

// ============================================================================
// SECTION: Environment Provider
// ============================================================================

/// Flag surface and explicit-variable snapshots, reset-proof.
#[test]
fn env_provider_flags_and_explicit_vars() {
    let clock = test_clock();
    let vars = BTreeMap::from([("DB_URL".to_owned(), "postgres://x".to_owned())]);
    let provider = EnvProvider::from_vars(Arc::clone(&clock), vars);

    assert!(!provider.is_cacheable());
    assert!(!provider.needs_directory());
    assert!(provider.precedes_cache());

    let chain = DirectoryChain::standard(None, None);
    let ctx = lookup_ctx(&chain, None);
    let item = provider.lookup("db_url", None, &ctx).unwrap().unwrap();
    assert_eq!(item.value(), Some("postgres://x"));
    assert!(!item.is_cacheable());
    assert_eq!(item.directory(), "/_environment");

    // Explicit snapshots survive clock resets.
    clock.reset();
    assert!(provider.lookup("DB_URL", None, &ctx).unwrap().is_some());
    assert!(provider.lookup("missing", None, &ctx).unwrap().is_none());
}

/// The environment never contributes to bulk cache writes.
#[test]
fn env_provider_bulk_view_is_always_empty() {
    let clock = test_clock();
    let provider = EnvProvider::from_vars(
        clock,
        BTreeMap::from([("A".to_owned(), "1".to_owned())]),
    );
    let directory = Directory::from_components(Some("billing"), Some("testing"));
    let listing = provider.retrieved_items(&directory).unwrap();
    assert!(listing.is_empty());
}

// ============================================================================
// SECTION: Parameter Store Provider
// ============================================================================

/// One bulk fetch serves every lookup until the clock resets.
#[test]
fn param_store_fetches_a_directory_once_per_epoch() {
    let clock = test_clock();
    let store = Arc::new(MemoryParamStore::new());
    store.set("/billing/testing", "DB_URL", "postgres://x");
    let provider = ParamStoreProvider::new(
        Arc::clone(&store) as Arc<dyn confstack_core::ParamStoreClient>,
        Arc::clone(&clock),
        Arc::new(ErrorSkipSet::new()),
    );

    let directory = Directory::from_components(Some("billing"), Some("testing"));
    let chain = DirectoryChain::new(vec![directory.clone()]);
    let ctx = lookup_ctx(&chain, None);

    let item = provider
        .lookup("db_url", Some(&directory), &ctx)
        .unwrap()
        .unwrap();
    assert_eq!(item.value(), Some("postgres://x"));
    assert_eq!(item.source(), "ssm");

    // Further lookups, hit or miss, reuse the bulk-fetched listing.
    assert!(provider
        .lookup("missing", Some(&directory), &ctx)
        .unwrap()
        .is_none());
    assert_eq!(store.fetch_count(), 1);

    // A clock reset forces a refetch.
    clock.reset();
    assert!(provider
        .lookup("db_url", Some(&directory), &ctx)
        .unwrap()
        .is_some());
    assert_eq!(store.fetch_count(), 2);
}

/// A denied directory degrades to empty and is never refetched.
#[test]
fn param_store_denial_caches_an_empty_listing() {
    let clock = test_clock();
    let store = Arc::new(MemoryParamStore::new());
    store.deny("/billing/testing");
    let skip_set = Arc::new(ErrorSkipSet::new());
    let provider = ParamStoreProvider::new(
        Arc::clone(&store) as Arc<dyn confstack_core::ParamStoreClient>,
        Arc::clone(&clock),
        Arc::clone(&skip_set),
    );

    let directory = Directory::from_components(Some("billing"), Some("testing"));
    let chain = DirectoryChain::new(vec![directory.clone()]);
    let ctx = lookup_ctx(&chain, None);

    assert!(provider
        .lookup("anything", Some(&directory), &ctx)
        .unwrap()
        .is_none());
    assert!(skip_set.should_skip("ssm", "/billing/testing"));

    // Even after a clock reset the skip set keeps the backend untouched.
    clock.reset();
    assert!(provider
        .lookup("anything", Some(&directory), &ctx)
        .unwrap()
        .is_none());
    assert_eq!(store.fetch_count(), 1);
}

// ============================================================================
// SECTION: Table Provider
// ============================================================================

/// One row query serves hits and misses alike.
#[test]
fn table_provider_serves_rows_from_one_query() {
    let clock = test_clock();
    let table = Arc::new(MemoryConfigTable::new());
    table.set("/global", "SOME_NAME", "Table-V-1");
    let provider = TableProvider::new(
        Arc::clone(&table) as Arc<dyn confstack_core::ConfigTable>,
        clock,
        Arc::new(ErrorSkipSet::new()),
    );

    let directory = Directory::from_components(None, None);
    let chain = DirectoryChain::new(vec![directory.clone()]);
    let ctx = lookup_ctx(&chain, None);

    let item = provider
        .lookup("some_name", Some(&directory), &ctx)
        .unwrap()
        .unwrap();
    assert_eq!(item.value(), Some("Table-V-1"));
    assert!(provider
        .lookup("other", Some(&directory), &ctx)
        .unwrap()
        .is_none());
    assert_eq!(table.query_count(), 1);
}

// ============================================================================
// SECTION: Secrets Provider
// ============================================================================

/// The listing runs once; values are fetched only when asked for.
#[test]
fn secrets_lists_once_and_fetches_lazily() {
    let clock = test_clock();
    let service = Arc::new(MemorySecrets::new());
    service.set("/billing/testing/api_key", "s3cret");
    service.set("/billing/testing/other_key", "other");
    let provider = SecretsProvider::new(
        Arc::clone(&service) as Arc<dyn confstack_core::SecretsClient>,
        clock,
        Arc::new(ErrorSkipSet::new()),
    );

    let directory = Directory::from_components(Some("billing"), Some("testing"));
    let chain = DirectoryChain::new(vec![directory.clone()]);
    let ctx = lookup_ctx(&chain, None);

    let item = provider
        .lookup("api_key", Some(&directory), &ctx)
        .unwrap()
        .unwrap();
    assert_eq!(item.value(), Some("s3cret"));
    // Only the asked-for value was fetched.
    assert_eq!(service.value_fetch_count(), 1);

    // Unlisted names cost no value fetch at all.
    assert!(provider
        .lookup("missing", Some(&directory), &ctx)
        .unwrap()
        .is_none());
    assert_eq!(service.value_fetch_count(), 1);

    // Repeated hits are served from the fetched cache.
    assert!(provider
        .lookup("API_KEY", Some(&directory), &ctx)
        .unwrap()
        .is_some());
    assert_eq!(service.value_fetch_count(), 1);
}

/// A denied listing leaves the provider empty with one mark.
#[test]
fn secrets_listing_denial_degrades_to_empty() {
    let clock = test_clock();
    let service = Arc::new(MemorySecrets::new());
    service.set("/billing/testing/api_key", "s3cret");
    service.deny_listing();
    let skip_set = Arc::new(ErrorSkipSet::new());
    let provider = SecretsProvider::new(
        Arc::clone(&service) as Arc<dyn confstack_core::SecretsClient>,
        clock,
        Arc::clone(&skip_set),
    );

    let directory = Directory::from_components(Some("billing"), Some("testing"));
    let chain = DirectoryChain::new(vec![directory.clone()]);
    let ctx = lookup_ctx(&chain, None);

    assert!(provider
        .lookup("api_key", Some(&directory), &ctx)
        .unwrap()
        .is_none());
    assert!(skip_set.should_skip("secrets", "list-secrets"));
}

// ============================================================================
// SECTION: Distributed Cacher
// ============================================================================

/// Seeds a record for `/billing/testing` with the given age and TTL.
fn seeded_record(age: Duration, ttl_seconds: u64) -> CacheRecord {
    CacheRecord {
        partition_key: "/billing/testing".to_owned(),
        sort_key: CacheRecord::sort_key_for("some_name", "/a|/b", "table|ssm"),
        name: "some_name".to_owned(),
        directory: "/a".to_owned(),
        value: Some("cached-value".to_owned()),
        source: "ssm".to_owned(),
        created_at: OffsetDateTime::now_utc() - age,
        ttl_seconds,
    }
}

/// A cacher over the given store with a 12 hour write TTL.
fn cacher_over(store: &Arc<MemoryCacheStore>) -> DistributedCacher {
    DistributedCacher::new(
        Arc::clone(store) as Arc<dyn confstack_core::CacheStore>,
        test_clock(),
        Arc::new(ErrorSkipSet::new()),
        StdDuration::from_secs(12 * 60 * 60),
    )
}

/// A fresh row answers with cacher provenance, one partition fetch.
#[test]
fn fresh_cache_row_is_a_hit() {
    let store = Arc::new(MemoryCacheStore::new());
    store.seed(seeded_record(Duration::ZERO, 12 * 60 * 60));
    let cacher = cacher_over(&store);

    let chain = DirectoryChain::new(vec![
        Directory::from_path("/a").unwrap(),
        Directory::from_path("/b").unwrap(),
    ]);
    let partition = Directory::from_components(Some("billing"), Some("testing"));
    let ctx = lookup_ctx(&chain, Some(&partition));

    let item = cacher.lookup("SOME_NAME", None, &ctx).unwrap().unwrap();
    assert_eq!(item.value(), Some("cached-value"));
    assert_eq!(item.source(), "ssm - via cacher");
    assert_eq!(item.directory(), "/a");

    // The partition was fetched exactly once for both lookups.
    assert!(cacher.lookup("some_name", None, &ctx).unwrap().is_some());
    assert_eq!(store.fetch_count(), 1);
}

/// A row at the end of its life jitters into a retirement.
#[test]
fn practically_expired_row_is_retired() {
    let store = Arc::new(MemoryCacheStore::new());
    // One millisecond of life left: the jitter draw loses with probability
    // ~1 - 2e-8, so the row is retired deterministically in practice.
    store.seed(seeded_record(
        Duration::seconds(12 * 60 * 60) - Duration::milliseconds(1),
        12 * 60 * 60,
    ));
    let cacher = cacher_over(&store);

    let chain = DirectoryChain::new(vec![
        Directory::from_path("/a").unwrap(),
        Directory::from_path("/b").unwrap(),
    ]);
    let partition = Directory::from_components(Some("billing"), Some("testing"));
    let ctx = lookup_ctx(&chain, Some(&partition));

    assert!(cacher.lookup("some_name", None, &ctx).unwrap().is_none());
    // Retired rows stay misses without refetching the partition.
    assert!(cacher.lookup("some_name", None, &ctx).unwrap().is_none());
    assert_eq!(store.fetch_count(), 1);
}

/// Rows written under other chain fingerprints never answer.
#[test]
fn mismatched_fingerprints_miss() {
    let store = Arc::new(MemoryCacheStore::new());
    store.seed(seeded_record(Duration::ZERO, 12 * 60 * 60));
    let cacher = cacher_over(&store);

    // Same name, different directory chain: the sort key differs.
    let chain = DirectoryChain::new(vec![Directory::from_path("/other").unwrap()]);
    let partition = Directory::from_components(Some("billing"), Some("testing"));
    let ctx = lookup_ctx(&chain, Some(&partition));

    assert!(cacher.lookup("some_name", None, &ctx).unwrap().is_none());
}

/// Only changed, cacheable, concrete values are written.
#[test]
fn store_items_writes_only_changed_cacheable_values() {
    let store = Arc::new(MemoryCacheStore::new());
    store.seed(seeded_record(Duration::ZERO, 12 * 60 * 60));
    let cacher = cacher_over(&store);

    let chain = DirectoryChain::new(vec![
        Directory::from_path("/a").unwrap(),
        Directory::from_path("/b").unwrap(),
    ]);
    let partition = Directory::from_components(Some("billing"), Some("testing"));
    let ctx = lookup_ctx(&chain, Some(&partition));

    let unchanged = DirectoryItem::new("/a", "some_name", Some("cached-value".to_owned()), "ssm");
    let changed = DirectoryItem::new("/a", "other_name", Some("new-value".to_owned()), "ssm");
    let not_cacheable =
        DirectoryItem::non_cacheable("/_environment", "env_name", Some("x".to_owned()), "env");
    let absent = DirectoryItem::new("/a", "absent", None, "ssm");

    cacher
        .store_items(&[unchanged, changed, not_cacheable, absent], &ctx)
        .unwrap();

    let records = store.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().any(|record| record.name == "other_name"
        && record.value.as_deref() == Some("new-value")));
    assert!(!records.iter().any(|record| record.name == "env_name"));
    assert!(!records.iter().any(|record| record.name == "absent"));
    assert_eq!(store.put_count(), 1);

    // Writing the exact same set again changes nothing.
    let unchanged_again =
        DirectoryItem::new("/a", "other_name", Some("new-value".to_owned()), "ssm");
    cacher.store_items(&[unchanged_again], &ctx).unwrap();
    assert_eq!(store.put_count(), 1);
}

/// A missing store turns the cacher off for the process.
#[test]
fn unavailable_store_degrades_to_absent() {
    let store = Arc::new(MemoryCacheStore::new());
    store.make_unavailable();
    let skip_set = Arc::new(ErrorSkipSet::new());
    let cacher = DistributedCacher::new(
        Arc::clone(&store) as Arc<dyn confstack_core::CacheStore>,
        test_clock(),
        Arc::clone(&skip_set),
        StdDuration::from_secs(60),
    );

    let chain = DirectoryChain::new(vec![Directory::from_path("/a").unwrap()]);
    let partition = Directory::from_components(Some("billing"), Some("testing"));
    let ctx = lookup_ctx(&chain, Some(&partition));

    assert!(cacher.lookup("some_name", None, &ctx).unwrap().is_none());
    assert!(skip_set.should_skip("cacher", "/billing/testing"));

    // Writes are silently dropped once the store is marked failed.
    let item = DirectoryItem::new("/a", "some_name", Some("v".to_owned()), "ssm");
    cacher.store_items(&[item], &ctx).unwrap();
    assert_eq!(store.put_count(), 0);
}
