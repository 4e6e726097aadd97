// crates/confstack-core/src/lib.rs
// ============================================================================
// Module: Confstack Core
// Description: Data model, interfaces, and resolution runtime for layered
//              configuration lookup.
// Purpose: Resolve named configuration values through provider and directory
//          chains with coordinated in-process and distributed caching.
// Dependencies: parking_lot, serde, thiserror, time, tracing
// ============================================================================

//! ## Overview
//! This crate resolves named configuration values by consulting, in a
//! defined priority order, a chain of value sources ("providers") across a
//! chain of namespace paths ("directories"). Two caches shield the backing
//! sources: a process-wide memory cache with a single shared expiration
//! clock, and a distributed cache with probabilistic early expiration that
//! spreads refresh load across concurrent readers.
//! Invariants:
//! - Overrides beat every provider; defaults lose to every provider.
//! - Directory order outranks provider order during chain resolution.
//! - Recoverable backend failures degrade to not-found with one warning;
//!   everything else propagates to the caller.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::directory::Directory;
pub use crate::core::directory::DirectoryChain;
pub use crate::core::directory::DirectoryError;
pub use crate::core::directory::GLOBAL_SERVICE;
pub use crate::core::item::DirectoryItem;
pub use crate::core::item::DirectoryListing;
pub use crate::core::setting::CacherSetting;
pub use crate::core::setting::Setting;
pub use crate::interfaces::CacheRecord;
pub use crate::interfaces::CacheStore;
pub use crate::interfaces::ConfigError;
pub use crate::interfaces::ConfigTable;
pub use crate::interfaces::LookupContext;
pub use crate::interfaces::ParamStoreClient;
pub use crate::interfaces::Provider;
pub use crate::interfaces::ProviderCacher;
pub use crate::interfaces::ProviderError;
pub use crate::interfaces::SecretsClient;
pub use crate::interfaces::TableRow;
pub use crate::runtime::chain::ProviderChain;
pub use crate::runtime::context::ActivationGuard;
pub use crate::runtime::context::ConfigContext;
pub use crate::runtime::memory_cache::EpochCell;
pub use crate::runtime::memory_cache::LocalMemoryCache;
pub use crate::runtime::resolver::Config;
pub use crate::runtime::resolver::ConfigBuilder;
pub use crate::runtime::resolver::DEFAULT_ENVIRONMENT;
pub use crate::runtime::resolver::RESERVED_ENVIRONMENT_NAME;
pub use crate::runtime::resolver::RESERVED_SERVICE_NAME;
pub use crate::runtime::settings::Settings;
pub use crate::runtime::skip_set::ErrorSkipSet;
pub use crate::runtime::skip_set::recover_lookup_error;
