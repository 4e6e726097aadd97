// crates/confstack-core/src/runtime/skip_set.rs
// ============================================================================
// Module: Circuit-Breaker Skip Set
// Description: Process-wide record of (provider, directory) pairs that failed.
// Purpose: Suppress repeated attempts against pairs that hit permission gaps.
// Dependencies: crate::interfaces, parking_lot, tracing
// ============================================================================

//! ## Overview
//! A missing permission on one directory or a missing cache table must not be
//! re-discovered on every lookup. The first recoverable failure for a
//! (provider, directory) pair is logged once; the pair then stays in the
//! skip set for the process lifetime and resolution continues with the
//! remaining providers and directories. There is no time-based recovery.
//!
//! Backend-unavailable failures (bad credentials, absent table) are keyed
//! with a wildcard directory: the whole provider is skipped, matching how a
//! credentials problem affects every path equally.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use parking_lot::Mutex;
use tracing::warn;

use crate::interfaces::ProviderError;

// ============================================================================
// SECTION: Skip Set
// ============================================================================

/// Directory key marking a provider-wide skip.
const ANY_DIRECTORY: &str = "*";

/// Process-wide set of (provider, directory) pairs to stop querying.
///
/// # Invariants
/// - Pairs are only ever added; there is no recovery within a process.
/// - A `(provider, "*")` entry suppresses the provider for every directory.
#[derive(Debug, Default)]
pub struct ErrorSkipSet {
    /// Failed (provider name, directory path) pairs.
    pairs: Mutex<BTreeSet<(String, String)>>,
}

impl ErrorSkipSet {
    /// Creates an empty skip set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the pair (or the whole provider) is marked failed.
    #[must_use]
    pub fn should_skip(&self, provider: &str, directory: &str) -> bool {
        let pairs = self.pairs.lock();
        pairs.contains(&(provider.to_owned(), directory.to_owned()))
            || pairs.contains(&(provider.to_owned(), ANY_DIRECTORY.to_owned()))
    }

    /// Marks the pair as failed; returns true when it was newly inserted.
    pub fn mark(&self, provider: &str, directory: &str) -> bool {
        self.pairs
            .lock()
            .insert((provider.to_owned(), directory.to_owned()))
    }
}

// ============================================================================
// SECTION: Recovery Helper
// ============================================================================

/// Classifies a provider failure, recovering the skippable class.
///
/// Recoverable errors (access denied, backend unavailable) mark the pair in
/// the skip set and emit a single warning the first time; the caller then
/// treats the lookup as not-found. Everything else is handed back for
/// propagation.
///
/// # Errors
///
/// Returns the original [`ProviderError`] when it is not recoverable.
pub fn recover_lookup_error(
    skip_set: &ErrorSkipSet,
    provider: &str,
    directory: &str,
    error: ProviderError,
) -> Result<(), ProviderError> {
    if !error.is_recoverable() {
        return Err(error);
    }
    // Unavailability is provider-wide; a denial is scoped to one directory.
    let directory = match &error {
        ProviderError::Unavailable { .. } => ANY_DIRECTORY,
        _ => directory,
    };
    if skip_set.mark(provider, directory) {
        warn!(
            provider,
            directory,
            error = %error,
            "ignoring recoverable provider error; pair skipped for process lifetime"
        );
    }
    Ok(())
}
