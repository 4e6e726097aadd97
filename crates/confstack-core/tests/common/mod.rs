// crates/confstack-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared helpers for confstack-core integration tests.
// Purpose: Provide scripted providers and context builders for resolver tests.
// Dependencies: confstack-core, parking_lot
// ============================================================================

//! ## Overview
//! Provides a scripted, call-recording provider plus context builders shared
//! by the resolver integration suites. The recording provider answers from a
//! fixed map and logs every `provider:directory` consultation so ordering
//! properties can be asserted exactly.

#![allow(
    dead_code,
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output, panic-based assertions, and per-binary helper usage are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Arc;

use confstack_core::ConfigContext;
use confstack_core::Directory;
use confstack_core::DirectoryItem;
use confstack_core::DirectoryListing;
use confstack_core::ErrorSkipSet;
use confstack_core::LocalMemoryCache;
use confstack_core::LookupContext;
use confstack_core::Provider;
use confstack_core::ProviderError;
use confstack_core::Settings;
use parking_lot::Mutex;

// ============================================================================
// SECTION: Recording Provider
// ============================================================================

/// Scripted provider that records every consultation.
pub struct RecordingProvider {
    /// Provider name used in fingerprints and the call log.
    name: String,
    /// Scripted values keyed by (directory path, lower-cased name).
    values: Mutex<BTreeMap<(String, String), String>>,
    /// `provider:directory` entries, in consultation order.
    calls: Arc<Mutex<Vec<String>>>,
    /// Whether values may enter a distributed cache.
    cacheable: bool,
    /// Whether lookups require a directory.
    needs_directory: bool,
    /// Whether the provider answers before the distributed cache.
    precedes_cache: bool,
}

impl RecordingProvider {
    /// Creates a directory-scoped, cacheable provider (the common case).
    pub fn scripted(name: &str) -> Arc<Self> {
        Self::scripted_with_log(name, Arc::new(Mutex::new(Vec::new())))
    }

    /// Creates a scripted provider appending to a shared call log, so the
    /// global consultation order across providers can be asserted.
    pub fn scripted_with_log(name: &str, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            values: Mutex::new(BTreeMap::new()),
            calls: log,
            cacheable: true,
            needs_directory: true,
            precedes_cache: false,
        })
    }

    /// Creates an empty log for [`RecordingProvider::scripted_with_log`].
    pub fn new_log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    /// Creates a provider shaped like the environment provider: no
    /// directory, never cacheable, consulted before the cache.
    pub fn env_like(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            values: Mutex::new(BTreeMap::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
            cacheable: false,
            needs_directory: false,
            precedes_cache: true,
        })
    }

    /// Scripts a value at a directory path (use `""` for directory-less
    /// providers).
    pub fn set(&self, directory: &str, name: &str, value: &str) {
        self.values.lock().insert(
            (directory.to_owned(), name.to_ascii_lowercase()),
            value.to_owned(),
        );
    }

    /// Returns the consultation log as `provider:directory` entries.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Returns how many times the provider was consulted.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Provider for RecordingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(
        &self,
        name: &str,
        directory: Option<&Directory>,
        _ctx: &LookupContext<'_>,
    ) -> Result<Option<DirectoryItem>, ProviderError> {
        let path = directory.map_or("", Directory::path);
        self.calls.lock().push(format!("{}:{path}", self.name));
        let value = self
            .values
            .lock()
            .get(&(path.to_owned(), name.to_ascii_lowercase()))
            .cloned();
        Ok(value.map(|value| {
            if self.cacheable {
                DirectoryItem::new(path, name, Some(value), self.name.clone())
            } else {
                DirectoryItem::non_cacheable(path, name, Some(value), self.name.clone())
            }
        }))
    }

    fn retrieved_items(&self, directory: &Directory) -> Option<Arc<DirectoryListing>> {
        let values = self.values.lock();
        let items = values
            .iter()
            .filter(|((path, _), _)| path == directory.path())
            .map(|((path, name), value)| {
                DirectoryItem::new(path.clone(), name, Some(value.clone()), self.name.clone())
            });
        Some(Arc::new(DirectoryListing::from_items(
            directory.path(),
            items,
        )))
    }

    fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    fn needs_directory(&self) -> bool {
        self.needs_directory
    }

    fn precedes_cache(&self) -> bool {
        self.precedes_cache
    }
}

// ============================================================================
// SECTION: Context Builders
// ============================================================================

/// Builds a context over the given providers with no distributed cacher.
pub fn context_with(providers: Vec<Arc<dyn Provider>>, settings: Settings) -> ConfigContext {
    let memory_cache = Arc::new(LocalMemoryCache::new(settings.memory_ttl()));
    ConfigContext::new(
        settings,
        providers,
        None,
        memory_cache,
        Arc::new(ErrorSkipSet::new()),
    )
}

/// Builds a context with a declared service/environment identity.
pub fn context_for_service(
    providers: Vec<Arc<dyn Provider>>,
    service: &str,
    environment: &str,
) -> ConfigContext {
    context_with(
        providers,
        Settings::default()
            .with_service(service)
            .with_environment(environment),
    )
}
