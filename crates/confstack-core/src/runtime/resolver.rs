// crates/confstack-core/src/runtime/resolver.rs
// ============================================================================
// Module: Resolver
// Description: The per-scope configuration node: overrides, defaults, chains,
//              and parent delegation.
// Purpose: Public entry point for name-to-value lookups.
// Dependencies: crate::core, crate::interfaces, crate::runtime, parking_lot
// ============================================================================

//! ## Overview
//! A [`Config`] node composes a provider chain, a directory chain, an
//! optional distributed cacher, an override map, and a default map. Nodes
//! are cheap: everything left unset delegates to ambient ancestors in the
//! context's activation stack, and all heavy state lives in the shared
//! provider caches. Lookup order for [`Config::get`]:
//!
//! 1. overrides on this node, then each ancestor, per key;
//! 2. providers preceding the cache (environment variables), uncached;
//! 3. the distributed cacher, when one is resolved and the service is known;
//! 4. remaining providers, outer loop over directories;
//! 5. defaults on this node, then each ancestor, per key;
//! 6. the caller's fallback.
//!
//! The reserved names `SERVICE_NAME` and `APP_ENV` never reach providers:
//! they seed the directory chain itself, so they resolve through overrides,
//! the process settings snapshot, defaults, and hard fallbacks only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ptr;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::core::directory::Directory;
use crate::core::directory::DirectoryChain;
use crate::core::directory::GLOBAL_SERVICE;
use crate::core::item::DirectoryItem;
use crate::core::item::DirectoryListing;
use crate::core::setting::CacherSetting;
use crate::core::setting::Setting;
use crate::interfaces::ConfigError;
use crate::interfaces::Provider;
use crate::interfaces::ProviderCacher;
use crate::runtime::chain::ProviderChain;
use crate::runtime::context::ConfigContext;

// ============================================================================
// SECTION: Reserved Names
// ============================================================================

/// Reserved name resolving to the current service (lower-cased form).
pub const RESERVED_SERVICE_NAME: &str = "service_name";

/// Reserved name resolving to the current environment (lower-cased form).
pub const RESERVED_ENVIRONMENT_NAME: &str = "app_env";

/// Environment used when nothing declares one.
pub const DEFAULT_ENVIRONMENT: &str = "all";

/// Pseudo-directory recorded on override items.
const OVERRIDE_DIRECTORY: &str = "/_override";

/// Pseudo-directory recorded on user-set default items.
const DEFAULT_DIRECTORY: &str = "/_default/user-set";

/// Pseudo-directory recorded on hard-coded fallback items.
const HARD_DEFAULT_DIRECTORY: &str = "/_default/hard-coded";

/// Pseudo-directory recorded on values read from the settings snapshot.
const SETTINGS_DIRECTORY: &str = "/_settings";

// ============================================================================
// SECTION: Config Node
// ============================================================================

/// Shorthand for the cacher attribute stored on a node.
type NodeCacher = CacherSetting<Arc<dyn ProviderCacher>>;

/// A per-scope configuration resolver node.
///
/// # Invariants
/// - Holds no resolved-value cache; repeated lookups re-walk the shared
///   caches, which is what keeps many concurrent nodes cheap.
/// - Override/default maps are mutated only by the scope owning the node;
///   ancestors observe them read-only during delegation.
pub struct Config {
    /// Values set directly on this node; shadow everything else.
    overrides: RwLock<DirectoryListing>,
    /// Last-resort values consulted after providers.
    defaults: RwLock<DirectoryListing>,
    /// Provider list, or unset to inherit.
    providers: RwLock<Setting<Vec<Arc<dyn Provider>>>>,
    /// Directory list, or unset to inherit; entries may be templated.
    directories: RwLock<Setting<Vec<Directory>>>,
    /// Distributed-cache choice, or inherit.
    cacher: RwLock<NodeCacher>,
    /// Whether ambient ancestors are consulted at all.
    use_parent: bool,
}

impl Config {
    /// Creates a node with every attribute inherited from ancestors.
    #[must_use]
    pub fn new() -> Self {
        Self {
            overrides: RwLock::new(DirectoryListing::for_directory(OVERRIDE_DIRECTORY)),
            defaults: RwLock::new(DirectoryListing::for_directory(DEFAULT_DIRECTORY)),
            providers: RwLock::new(Setting::Unset),
            directories: RwLock::new(Setting::Unset),
            cacher: RwLock::new(CacherSetting::Inherit),
            use_parent: true,
        }
    }

    /// Starts building a node with explicit attributes.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Returns whether this node consults ambient ancestors.
    #[must_use]
    pub const fn uses_parent(&self) -> bool {
        self.use_parent
    }

    // ------------------------------------------------------------------
    // Overrides and defaults
    // ------------------------------------------------------------------

    /// Sets an override on this node only; shadows every other source for
    /// this node and nodes activated under it.
    pub fn set_override(&self, name: &str, value: impl Into<String>) {
        let item =
            DirectoryItem::non_cacheable(OVERRIDE_DIRECTORY, name, Some(value.into()), "override");
        self.overrides.write().insert(item);
    }

    /// Removes an override from this node only.
    pub fn remove_override(&self, name: &str) {
        self.overrides.write().remove(name);
    }

    /// Returns the override set directly on this node, ignoring ancestors.
    #[must_use]
    pub fn override_value(&self, name: &str) -> Option<String> {
        self.overrides
            .read()
            .get(name)
            .and_then(|item| item.value().map(str::to_owned))
    }

    /// Sets a default on this node only; consulted after every provider.
    pub fn set_default(&self, name: &str, value: impl Into<String>) {
        let item =
            DirectoryItem::non_cacheable(DEFAULT_DIRECTORY, name, Some(value.into()), "default");
        self.defaults.write().insert(item);
    }

    /// Removes a default from this node only.
    pub fn remove_default(&self, name: &str) {
        self.defaults.write().remove(name);
    }

    /// Returns the default set directly on this node, ignoring ancestors.
    #[must_use]
    pub fn default_value(&self, name: &str) -> Option<String> {
        self.defaults
            .read()
            .get(name)
            .and_then(|item| item.value().map(str::to_owned))
    }

    // ------------------------------------------------------------------
    // Chain attributes
    // ------------------------------------------------------------------

    /// Configures an explicit provider list on this node.
    pub fn set_providers(&self, providers: Vec<Arc<dyn Provider>>) {
        *self.providers.write() = Setting::Value(providers);
    }

    /// Configures an explicit directory list on this node.
    pub fn set_directories(&self, directories: Vec<Directory>) {
        *self.directories.write() = Setting::Value(directories);
    }

    /// Configures the distributed-cache choice on this node.
    pub fn set_cacher(&self, cacher: NodeCacher) {
        *self.cacher.write() = cacher;
    }

    // ------------------------------------------------------------------
    // Lookup surface
    // ------------------------------------------------------------------

    /// Resolves `name` (case-insensitive) to a value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a provider or cache backend fails in a
    /// non-recoverable way; recoverable failures degrade to `Ok(None)` after
    /// a one-time warning.
    pub fn get(&self, ctx: &ConfigContext, name: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.get_item(ctx, name)?.and_then(DirectoryItem::into_value))
    }

    /// Resolves `name`, falling back to `default` when nothing has a value.
    ///
    /// # Errors
    ///
    /// Same failure surface as [`Config::get`].
    pub fn get_or(
        &self,
        ctx: &ConfigContext,
        name: &str,
        default: impl Into<String>,
    ) -> Result<String, ConfigError> {
        Ok(self.get(ctx, name)?.unwrap_or_else(|| default.into()))
    }

    /// Resolves `name` after resetting the shared memory-cache clock, forcing
    /// every provider to refetch.
    ///
    /// # Errors
    ///
    /// Same failure surface as [`Config::get`].
    pub fn get_fresh(&self, ctx: &ConfigContext, name: &str) -> Result<Option<String>, ConfigError> {
        ctx.memory_cache().reset();
        self.get(ctx, name)
    }

    /// Resolves `name` to the full item, provenance included.
    ///
    /// # Errors
    ///
    /// Same failure surface as [`Config::get`].
    pub fn get_item(
        &self,
        ctx: &ConfigContext,
        name: &str,
    ) -> Result<Option<DirectoryItem>, ConfigError> {
        let key = name.to_ascii_lowercase();
        let parents = self.parent_chain(ctx);

        if key == RESERVED_SERVICE_NAME || key == RESERVED_ENVIRONMENT_NAME {
            return Ok(Some(self.reserved_item(ctx, &parents, &key)));
        }

        if let Some(item) = self.override_walk(&parents, &key) {
            return Ok(Some(item));
        }

        let service = self.reserved_value(ctx, &parents, RESERVED_SERVICE_NAME);
        let environment = self.reserved_value(ctx, &parents, RESERVED_ENVIRONMENT_NAME);

        let provider_chain = self.resolved_provider_chain(ctx, &parents);
        let directory_chain = self.resolved_directory_chain(ctx, &parents, &service, &environment);
        // An app without its own service shares `/global`; cached rows there
        // would mix every tenant, so caching requires a concrete service.
        let cacher = if service == GLOBAL_SERVICE {
            None
        } else {
            self.resolve_cacher(ctx, &parents)
        };
        let partition = Directory::from_components(Some(&service), Some(&environment));

        let mut item = provider_chain.lookup(
            &key,
            &directory_chain,
            cacher.as_deref(),
            Some(&partition),
        )?;

        if item.as_ref().is_none_or(|found| found.value().is_none())
            && let Some(fallback) = self.default_walk(&parents, &key)
        {
            item = Some(fallback);
        }

        match &item {
            Some(found) => debug!(name, source = found.source(), "config value resolved"),
            None => debug!(
                name,
                directories = directory_chain.fingerprint(),
                providers = provider_chain.fingerprint(),
                "config value not found"
            ),
        }
        Ok(item)
    }

    // ------------------------------------------------------------------
    // Resolved attribute accessors
    // ------------------------------------------------------------------

    /// Returns the service name this node currently resolves to.
    #[must_use]
    pub fn resolved_service(&self, ctx: &ConfigContext) -> String {
        let parents = self.parent_chain(ctx);
        self.reserved_value(ctx, &parents, RESERVED_SERVICE_NAME)
    }

    /// Returns the environment name this node currently resolves to.
    #[must_use]
    pub fn resolved_environment(&self, ctx: &ConfigContext) -> String {
        let parents = self.parent_chain(ctx);
        self.reserved_value(ctx, &parents, RESERVED_ENVIRONMENT_NAME)
    }

    /// Returns the provider chain this node currently resolves to.
    #[must_use]
    pub fn provider_chain(&self, ctx: &ConfigContext) -> ProviderChain {
        let parents = self.parent_chain(ctx);
        self.resolved_provider_chain(ctx, &parents)
    }

    /// Returns the directory chain this node currently resolves to.
    #[must_use]
    pub fn directory_chain(&self, ctx: &ConfigContext) -> DirectoryChain {
        let parents = self.parent_chain(ctx);
        let service = self.reserved_value(ctx, &parents, RESERVED_SERVICE_NAME);
        let environment = self.reserved_value(ctx, &parents, RESERVED_ENVIRONMENT_NAME);
        self.resolved_directory_chain(ctx, &parents, &service, &environment)
    }

    /// Returns the distributed cacher this node currently resolves to.
    #[must_use]
    pub fn resolved_cacher(&self, ctx: &ConfigContext) -> Option<Arc<dyn ProviderCacher>> {
        let parents = self.parent_chain(ctx);
        self.resolve_cacher(ctx, &parents)
    }

    /// Cacher resolution against an already-computed parent chain.
    fn resolve_cacher(
        &self,
        ctx: &ConfigContext,
        parents: &[Arc<Self>],
    ) -> Option<Arc<dyn ProviderCacher>> {
        if ctx.settings().env_only() {
            return None;
        }
        let own = self.cacher.read().clone();
        match own {
            CacherSetting::Disabled => return None,
            CacherSetting::Enabled(cacher) => return Some(cacher),
            CacherSetting::Inherit => {}
        }
        for parent in parents {
            let inherited = parent.cacher.read().clone();
            match inherited {
                CacherSetting::Disabled => return None,
                CacherSetting::Enabled(cacher) => return Some(cacher),
                CacherSetting::Inherit => {}
            }
        }
        if ctx.settings().disable_cacher() {
            return None;
        }
        ctx.default_cacher().cloned()
    }

    // ------------------------------------------------------------------
    // Parent delegation
    // ------------------------------------------------------------------

    /// Computes this node's parent chain from the ambient activation stack.
    ///
    /// The stack is walked from the most recent activation downward, skipping
    /// this node. A walked node with `use_parent == false` is included but
    /// ends the walk. A node that opted out of parents entirely gets an empty
    /// chain unless it is itself part of the stack, in which case only the
    /// entries activated after it apply.
    fn parent_chain(&self, ctx: &ConfigContext) -> Vec<Arc<Self>> {
        let stack = ctx.stack_snapshot();
        let mut chain = Vec::new();
        let mut found_self = false;
        let mut truncated = false;

        for node in stack.iter().rev() {
            if ptr::eq(Arc::as_ptr(node), self) {
                found_self = true;
                if !self.use_parent {
                    break;
                }
                continue;
            }
            if truncated {
                continue;
            }
            chain.push(Arc::clone(node));
            if !node.use_parent {
                if self.use_parent {
                    break;
                }
                truncated = true;
            }
        }

        if !self.use_parent && !found_self {
            return Vec::new();
        }
        chain
    }

    /// First override for `key` on self, then each ancestor.
    fn override_walk(&self, parents: &[Arc<Self>], key: &str) -> Option<DirectoryItem> {
        if let Some(item) = self.overrides.read().get(key) {
            return Some(item.clone());
        }
        parents
            .iter()
            .find_map(|parent| parent.overrides.read().get(key).cloned())
    }

    /// First default for `key` on self, then each ancestor.
    fn default_walk(&self, parents: &[Arc<Self>], key: &str) -> Option<DirectoryItem> {
        if let Some(item) = self.defaults.read().get(key) {
            return Some(item.clone());
        }
        parents
            .iter()
            .find_map(|parent| parent.defaults.read().get(key).cloned())
    }

    /// Resolves a reserved name through its narrow path: overrides, the
    /// settings snapshot, defaults, then the hard fallback.
    fn reserved_item(
        &self,
        ctx: &ConfigContext,
        parents: &[Arc<Self>],
        key: &str,
    ) -> DirectoryItem {
        if let Some(item) = self.override_walk(parents, key) {
            return item;
        }
        let settings = ctx.settings();
        let declared = if key == RESERVED_SERVICE_NAME {
            settings.service()
        } else {
            settings.environment()
        };
        if let Some(value) = declared.filter(|value| !value.is_empty()) {
            return DirectoryItem::non_cacheable(
                SETTINGS_DIRECTORY,
                key,
                Some(value.to_owned()),
                "settings",
            );
        }
        if let Some(item) = self.default_walk(parents, key) {
            return item;
        }
        let hard_default = if key == RESERVED_SERVICE_NAME {
            GLOBAL_SERVICE
        } else {
            DEFAULT_ENVIRONMENT
        };
        DirectoryItem::non_cacheable(
            HARD_DEFAULT_DIRECTORY,
            key,
            Some(hard_default.to_owned()),
            "hard-coded-default",
        )
    }

    /// Convenience over [`Config::reserved_item`] returning the value.
    fn reserved_value(&self, ctx: &ConfigContext, parents: &[Arc<Self>], key: &str) -> String {
        self.reserved_item(ctx, parents, key)
            .into_value()
            .unwrap_or_default()
    }

    /// Resolves the provider list: self, then ancestors, then the context
    /// default; the env-only toggle restricts it to directory-less providers.
    fn resolved_provider_chain(&self, ctx: &ConfigContext, parents: &[Arc<Self>]) -> ProviderChain {
        let mut providers = self
            .providers
            .read()
            .concrete()
            .cloned()
            .or_else(|| {
                parents
                    .iter()
                    .find_map(|parent| parent.providers.read().concrete().cloned())
            })
            .unwrap_or_else(|| ctx.default_providers().to_vec());

        if ctx.settings().env_only() {
            providers.retain(|provider| !provider.needs_directory());
        }
        ProviderChain::new(providers)
    }

    /// Resolves the directory list the same way, substituting any template
    /// placeholders with the resolved service/environment.
    fn resolved_directory_chain(
        &self,
        ctx: &ConfigContext,
        parents: &[Arc<Self>],
        service: &str,
        environment: &str,
    ) -> DirectoryChain {
        let configured = self.directories.read().concrete().cloned().or_else(|| {
            parents
                .iter()
                .find_map(|parent| parent.directories.read().concrete().cloned())
        });

        if let Some(directories) = configured {
            let resolved = directories
                .iter()
                .map(|directory| directory.resolve(service, environment))
                .collect();
            return DirectoryChain::new(resolved);
        }

        if let Some(templates) = ctx.settings().directory_templates() {
            let resolved = templates
                .iter()
                .map(|directory| directory.resolve(service, environment))
                .collect();
            return DirectoryChain::new(resolved);
        }

        DirectoryChain::standard(Some(service), Some(environment))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for [`Config`] nodes with explicit attributes.
///
/// # Invariants
/// - Every attribute left untouched stays inherited.
#[derive(Default)]
pub struct ConfigBuilder {
    /// Provider list to configure, when set.
    providers: Setting<Vec<Arc<dyn Provider>>>,
    /// Directory list to configure, when set.
    directories: Setting<Vec<Directory>>,
    /// Cacher choice to configure.
    cacher: NodeCacher,
    /// Whether the node consults ambient ancestors.
    isolated: bool,
    /// Overrides applied at build time.
    overrides: Vec<(String, String)>,
    /// Defaults applied at build time.
    defaults: Vec<(String, String)>,
}

impl ConfigBuilder {
    /// Creates a builder with every attribute inherited.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures an explicit provider list.
    #[must_use]
    pub fn providers(mut self, providers: Vec<Arc<dyn Provider>>) -> Self {
        self.providers = Setting::Value(providers);
        self
    }

    /// Configures an explicit directory list.
    #[must_use]
    pub fn directories(mut self, directories: Vec<Directory>) -> Self {
        self.directories = Setting::Value(directories);
        self
    }

    /// Configures a specific distributed cacher.
    #[must_use]
    pub fn cacher(mut self, cacher: Arc<dyn ProviderCacher>) -> Self {
        self.cacher = CacherSetting::Enabled(cacher);
        self
    }

    /// Disables the distributed cacher for this node.
    #[must_use]
    pub fn no_cacher(mut self) -> Self {
        self.cacher = CacherSetting::Disabled;
        self
    }

    /// Cuts the node off from ambient ancestors.
    #[must_use]
    pub fn isolated(mut self) -> Self {
        self.isolated = true;
        self
    }

    /// Adds an override applied at build time.
    #[must_use]
    pub fn with_override(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((name.into(), value.into()));
        self
    }

    /// Adds a default applied at build time.
    #[must_use]
    pub fn with_default(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.push((name.into(), value.into()));
        self
    }

    /// Pins the service name via an override of the reserved name.
    #[must_use]
    pub fn service(self, service: impl Into<String>) -> Self {
        self.with_override(RESERVED_SERVICE_NAME, service)
    }

    /// Pins the environment name via an override of the reserved name.
    #[must_use]
    pub fn environment(self, environment: impl Into<String>) -> Self {
        self.with_override(RESERVED_ENVIRONMENT_NAME, environment)
    }

    /// Builds the node.
    #[must_use]
    pub fn build(self) -> Config {
        let node = Config {
            overrides: RwLock::new(DirectoryListing::for_directory(OVERRIDE_DIRECTORY)),
            defaults: RwLock::new(DirectoryListing::for_directory(DEFAULT_DIRECTORY)),
            providers: RwLock::new(self.providers),
            directories: RwLock::new(self.directories),
            cacher: RwLock::new(self.cacher),
            use_parent: !self.isolated,
        };
        for (name, value) in self.overrides {
            node.set_override(&name, value);
        }
        for (name, value) in self.defaults {
            node.set_default(&name, value);
        }
        node
    }
}
