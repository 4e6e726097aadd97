// crates/confstack-providers/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared composition harness for provider integration tests.
// Purpose: Wire real providers, in-memory backends, and a context the way an
//          application composition root would.
// Dependencies: confstack-core, confstack-providers
// ============================================================================

//! ## Overview
//! Builds the full stack (environment, table, parameter-store, and secrets
//! providers plus the distributed cacher) over in-memory backends, sharing
//! one clock and one skip set the way a real process does. Tests reach into
//! the harness for the backends to script values and assert call counts.

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

use confstack_core::CacheStore;
use confstack_core::ConfigContext;
use confstack_core::ConfigTable;
use confstack_core::ErrorSkipSet;
use confstack_core::LocalMemoryCache;
use confstack_core::ParamStoreClient;
use confstack_core::Provider;
use confstack_core::ProviderCacher;
use confstack_core::SecretsClient;
use confstack_core::Settings;
use confstack_providers::DistributedCacher;
use confstack_providers::EnvProvider;
use confstack_providers::MemoryCacheStore;
use confstack_providers::MemoryConfigTable;
use confstack_providers::MemoryParamStore;
use confstack_providers::MemorySecrets;
use confstack_providers::ParamStoreProvider;
use confstack_providers::SecretsProvider;
use confstack_providers::TableProvider;

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Fully composed stack over in-memory backends.
pub struct Harness {
    /// The composed resolution context.
    pub ctx: ConfigContext,
    /// Table backend, for scripting rows and asserting query counts.
    pub table: Arc<MemoryConfigTable>,
    /// Parameter-store backend, for scripting values and asserting fetches.
    pub param_store: Arc<MemoryParamStore>,
    /// Secrets backend.
    pub secrets: Arc<MemorySecrets>,
    /// Cache-store backend shared with the cacher.
    pub cache_store: Arc<MemoryCacheStore>,
    /// Shared memory-cache clock.
    pub clock: Arc<LocalMemoryCache>,
    /// Shared circuit-breaker state.
    pub skip_set: Arc<ErrorSkipSet>,
    /// The table provider, for building explicit chains.
    pub table_provider: Arc<TableProvider>,
    /// The parameter-store provider, for building explicit chains.
    pub param_provider: Arc<ParamStoreProvider>,
}

/// Options controlling how the harness is composed.
pub struct HarnessOptions {
    /// Process settings; carries identity and toggles.
    pub settings: Settings,
    /// Explicit environment variables for the env provider.
    pub env_vars: BTreeMap<String, String>,
    /// Whether a distributed cacher is composed in.
    pub with_cacher: bool,
    /// Cache store to share across "processes"; a fresh one when `None`.
    pub cache_store: Option<Arc<MemoryCacheStore>>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            settings: Settings::default()
                .with_service("billing")
                .with_environment("testing"),
            env_vars: BTreeMap::new(),
            with_cacher: true,
            cache_store: None,
        }
    }
}

/// Composes the full stack the way an application root would.
pub fn compose(options: HarnessOptions) -> Harness {
    let clock = Arc::new(LocalMemoryCache::new(options.settings.memory_ttl()));
    let skip_set = Arc::new(ErrorSkipSet::new());

    let table = Arc::new(MemoryConfigTable::new());
    let param_store = Arc::new(MemoryParamStore::new());
    let secrets = Arc::new(MemorySecrets::new());
    let cache_store = options
        .cache_store
        .unwrap_or_else(|| Arc::new(MemoryCacheStore::new()));

    let env_provider = Arc::new(EnvProvider::from_vars(
        Arc::clone(&clock),
        options.env_vars,
    ));
    let table_provider = Arc::new(TableProvider::new(
        Arc::clone(&table) as Arc<dyn ConfigTable>,
        Arc::clone(&clock),
        Arc::clone(&skip_set),
    ));
    let param_provider = Arc::new(ParamStoreProvider::new(
        Arc::clone(&param_store) as Arc<dyn ParamStoreClient>,
        Arc::clone(&clock),
        Arc::clone(&skip_set),
    ));
    let secrets_provider = Arc::new(SecretsProvider::new(
        Arc::clone(&secrets) as Arc<dyn SecretsClient>,
        Arc::clone(&clock),
        Arc::clone(&skip_set),
    ));

    let cacher = options.with_cacher.then(|| {
        Arc::new(DistributedCacher::new(
            Arc::clone(&cache_store) as Arc<dyn CacheStore>,
            Arc::clone(&clock),
            Arc::clone(&skip_set),
            options.settings.cache_ttl(),
        )) as Arc<dyn ProviderCacher>
    });

    let default_providers: Vec<Arc<dyn Provider>> = vec![
        env_provider,
        Arc::clone(&table_provider) as Arc<dyn Provider>,
        Arc::clone(&param_provider) as Arc<dyn Provider>,
        secrets_provider,
    ];

    let ctx = ConfigContext::new(
        options.settings,
        default_providers,
        cacher,
        Arc::clone(&clock),
        Arc::clone(&skip_set),
    );

    Harness {
        ctx,
        table,
        param_store,
        secrets,
        cache_store,
        clock,
        skip_set,
        table_provider,
        param_provider,
    }
}

/// Composes the default harness: billing/testing identity, cacher on.
pub fn default_harness() -> Harness {
    compose(HarnessOptions::default())
}
