// crates/confstack-core/src/runtime/context.rs
// ============================================================================
// Module: Resolution Context
// Description: Shared singletons plus the ambient resolver activation stack.
// Purpose: Compose the dependencies a resolver tree shares, without globals.
// Dependencies: crate::runtime, parking_lot
// ============================================================================

//! ## Overview
//! A [`ConfigContext`] owns everything resolver nodes share: the default
//! provider chain, the optional distributed cacher, the memory-cache clock,
//! the circuit-breaker skip set, and process settings. It also owns the
//! ambient activation stack that parent delegation walks: activating a node
//! pushes it and returns a guard that pops on drop, so the previous "current"
//! node is restored on every exit path, including panics and early returns.
//!
//! The context is built once by whatever composes the application and passed
//! by reference into resolution calls; nothing here is process-global.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ptr;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::interfaces::Provider;
use crate::interfaces::ProviderCacher;
use crate::runtime::memory_cache::LocalMemoryCache;
use crate::runtime::resolver::Config;
use crate::runtime::settings::Settings;
use crate::runtime::skip_set::ErrorSkipSet;

// ============================================================================
// SECTION: Context
// ============================================================================

/// Shared dependencies and ambient state for a tree of resolver nodes.
///
/// # Invariants
/// - The root node sits at the bottom of the stack and is never popped.
/// - Heavy state (provider caches, skip set) lives here or in the shared
///   singletons, never on individual resolver nodes.
pub struct ConfigContext {
    /// Process-level knobs.
    settings: Settings,
    /// Providers used when no node in a parent chain configures any.
    default_providers: Vec<Arc<dyn Provider>>,
    /// Cacher used when no node in a parent chain configures one.
    default_cacher: Option<Arc<dyn ProviderCacher>>,
    /// Shared expiration clock for all in-process provider caches.
    memory_cache: Arc<LocalMemoryCache>,
    /// Process-wide circuit-breaker state.
    skip_set: Arc<ErrorSkipSet>,
    /// Root resolver node; base of the activation stack.
    root: Arc<Config>,
    /// Activation stack, root first, most recently activated last.
    stack: RwLock<Vec<Arc<Config>>>,
}

impl ConfigContext {
    /// Composes a context from explicitly constructed dependencies.
    ///
    /// `memory_cache` and `skip_set` are shared with the providers so that
    /// the whole tree expires and circuit-breaks together.
    #[must_use]
    pub fn new(
        settings: Settings,
        default_providers: Vec<Arc<dyn Provider>>,
        default_cacher: Option<Arc<dyn ProviderCacher>>,
        memory_cache: Arc<LocalMemoryCache>,
        skip_set: Arc<ErrorSkipSet>,
    ) -> Self {
        let root = Arc::new(Config::new());
        Self {
            settings,
            default_providers,
            default_cacher,
            memory_cache,
            skip_set,
            stack: RwLock::new(vec![Arc::clone(&root)]),
            root,
        }
    }

    /// Returns the currently active resolver node.
    #[must_use]
    pub fn current(&self) -> Arc<Config> {
        self.stack
            .read()
            .last()
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.root))
    }

    /// Returns the root resolver node.
    #[must_use]
    pub fn root(&self) -> &Arc<Config> {
        &self.root
    }

    /// Makes `node` the current resolver until the returned guard drops.
    #[must_use = "dropping the guard immediately deactivates the node"]
    pub fn activate(&self, node: Arc<Config>) -> ActivationGuard<'_> {
        self.stack.write().push(Arc::clone(&node));
        ActivationGuard {
            context: self,
            node,
        }
    }

    /// Returns the process settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the default provider chain.
    #[must_use]
    pub fn default_providers(&self) -> &[Arc<dyn Provider>] {
        &self.default_providers
    }

    /// Returns the default distributed cacher, when one was composed.
    #[must_use]
    pub const fn default_cacher(&self) -> Option<&Arc<dyn ProviderCacher>> {
        self.default_cacher.as_ref()
    }

    /// Returns the shared memory-cache clock.
    #[must_use]
    pub const fn memory_cache(&self) -> &Arc<LocalMemoryCache> {
        &self.memory_cache
    }

    /// Returns the process-wide circuit-breaker state.
    #[must_use]
    pub const fn skip_set(&self) -> &Arc<ErrorSkipSet> {
        &self.skip_set
    }

    /// Snapshots the activation stack, root first.
    pub(crate) fn stack_snapshot(&self) -> Vec<Arc<Config>> {
        self.stack.read().clone()
    }
}

// ============================================================================
// SECTION: Activation Guard
// ============================================================================

/// Scoped handle keeping a resolver node active.
///
/// # Invariants
/// - Dropping the guard removes exactly the activation it created, even when
///   guards are dropped out of order.
#[must_use = "the node is deactivated as soon as the guard drops"]
pub struct ActivationGuard<'a> {
    /// Context whose stack holds the activation.
    context: &'a ConfigContext,
    /// The node this guard activated.
    node: Arc<Config>,
}

impl ActivationGuard<'_> {
    /// Returns the node this guard keeps active.
    #[must_use]
    pub const fn node(&self) -> &Arc<Config> {
        &self.node
    }
}

impl Drop for ActivationGuard<'_> {
    fn drop(&mut self) {
        let mut stack = self.context.stack.write();
        // Remove the most recent activation of our node; guards normally
        // drop in LIFO order, making this a plain pop.
        if let Some(position) = stack
            .iter()
            .rposition(|entry| ptr::eq(Arc::as_ptr(entry), Arc::as_ptr(&self.node)))
        {
            stack.remove(position);
        }
    }
}
