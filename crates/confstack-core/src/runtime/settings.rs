// crates/confstack-core/src/runtime/settings.rs
// ============================================================================
// Module: Process Settings
// Description: Snapshot of environment-driven knobs for the resolution runtime.
// Purpose: Centralize service/environment identity and cache tuning inputs.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Settings capture the process-level inputs the resolver needs before it can
//! search anything: the service and environment names (which seed the
//! directory chain and the cache partition, and therefore must never be
//! resolved through providers), cache expiration windows, and the developer
//! toggles for disabling the distributed cache or restricting resolution to
//! environment variables only.
//!
//! `Settings::from_env` snapshots the process environment once; embedders
//! and tests build values explicitly instead of mutating the environment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::time::Duration;

use crate::core::directory::Directory;

// ============================================================================
// SECTION: Variable Names
// ============================================================================

/// Environment variable carrying the service name.
pub const SERVICE_VAR: &str = "SERVICE_NAME";

/// Environment variable carrying the environment name.
pub const ENVIRONMENT_VAR: &str = "APP_ENV";

/// Environment variable overriding the memory-cache window, in minutes.
pub const MEMORY_TTL_VAR: &str = "CONFSTACK_MEMORY_TTL_MINUTES";

/// Environment variable overriding the distributed-cache TTL, in hours.
pub const CACHE_TTL_VAR: &str = "CONFSTACK_CACHE_TTL_HOURS";

/// Environment variable disabling the default distributed cacher.
pub const DISABLE_CACHER_VAR: &str = "CONFSTACK_DISABLE_CACHER";

/// Environment variable restricting resolution to environment variables.
pub const ENV_ONLY_VAR: &str = "CONFSTACK_ENV_ONLY";

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Default distributed-cache TTL.
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Default memory-cache window.
const DEFAULT_MEMORY_TTL: Duration = Duration::from_secs(15 * 60);

/// Process-level knobs for the resolution runtime.
///
/// # Invariants
/// - Values are a snapshot; changing the process environment after
///   construction has no effect.
/// - Custom directory templates, when set, fully replace the standard chain.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Service name, when the process declared one.
    service: Option<String>,
    /// Environment name, when the process declared one.
    environment: Option<String>,
    /// Memory-cache expiration window.
    memory_ttl: Duration,
    /// Distributed-cache total TTL.
    cache_ttl: Duration,
    /// Whether the default distributed cacher is suppressed.
    disable_cacher: bool,
    /// Whether resolution is restricted to directory-less providers.
    env_only: bool,
    /// Custom default directory templates, replacing the standard chain.
    directory_templates: Option<Vec<Directory>>,
}

impl Settings {
    /// Snapshots the relevant process environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let memory_minutes = non_empty_var(MEMORY_TTL_VAR)
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|minutes| *minutes > 0);
        let cache_hours = non_empty_var(CACHE_TTL_VAR)
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|hours| *hours > 0);
        Self {
            service: non_empty_var(SERVICE_VAR),
            environment: non_empty_var(ENVIRONMENT_VAR),
            memory_ttl: memory_minutes
                .map_or(DEFAULT_MEMORY_TTL, |minutes| Duration::from_secs(minutes * 60)),
            cache_ttl: cache_hours
                .map_or(DEFAULT_CACHE_TTL, |hours| Duration::from_secs(hours * 60 * 60)),
            disable_cacher: non_empty_var(DISABLE_CACHER_VAR).is_some_and(|value| truthy(&value)),
            env_only: non_empty_var(ENV_ONLY_VAR).is_some_and(|value| truthy(&value)),
            directory_templates: None,
        }
    }

    /// Sets the service name explicitly.
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Sets the environment name explicitly.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Overrides the memory-cache expiration window.
    #[must_use]
    pub fn with_memory_ttl(mut self, window: Duration) -> Self {
        self.memory_ttl = window;
        self
    }

    /// Overrides the distributed-cache total TTL.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Suppresses the default distributed cacher.
    #[must_use]
    pub fn with_cacher_disabled(mut self) -> Self {
        self.disable_cacher = true;
        self
    }

    /// Restricts resolution to directory-less providers.
    #[must_use]
    pub fn with_env_only(mut self) -> Self {
        self.env_only = true;
        self
    }

    /// Replaces the standard directory chain with custom templates.
    ///
    /// Templates may carry `{service}`/`{environment}` placeholders which are
    /// substituted when a resolver builds its chain.
    #[must_use]
    pub fn with_directory_templates(mut self, templates: Vec<Directory>) -> Self {
        self.directory_templates = Some(templates);
        self
    }

    /// Returns the declared service name, when present.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// Returns the declared environment name, when present.
    #[must_use]
    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    /// Returns the memory-cache expiration window.
    #[must_use]
    pub const fn memory_ttl(&self) -> Duration {
        self.memory_ttl
    }

    /// Returns the distributed-cache total TTL.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Returns whether the default distributed cacher is suppressed.
    #[must_use]
    pub const fn disable_cacher(&self) -> bool {
        self.disable_cacher
    }

    /// Returns whether resolution is restricted to directory-less providers.
    #[must_use]
    pub const fn env_only(&self) -> bool {
        self.env_only
    }

    /// Returns the custom directory templates, when configured.
    #[must_use]
    pub fn directory_templates(&self) -> Option<&[Directory]> {
        self.directory_templates.as_deref()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service: None,
            environment: None,
            memory_ttl: DEFAULT_MEMORY_TTL,
            cache_ttl: DEFAULT_CACHE_TTL,
            disable_cacher: false,
            env_only: false,
            directory_templates: None,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an environment variable, treating empty values as unset.
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

/// Parses the accepted boolean spellings: `1`, `t`, `true`, `y`, `yes`
/// (any case).
#[must_use]
pub fn truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "t" | "true" | "y" | "yes"
    )
}
