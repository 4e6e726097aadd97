// crates/confstack-core/src/core/setting.rs
// ============================================================================
// Module: Unset-aware Settings
// Description: Tagged option distinguishing "not configured" from any value.
// Purpose: Drive parent delegation without overloading Option or empty strings.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Resolver nodes leave most attributes unset and inherit them from ambient
//! ancestors. [`Setting`] makes the unset state explicit so a configured
//! empty chain is distinguishable from "ask the parent". [`CacherSetting`]
//! adds a third state for the distributed cache, which can be explicitly
//! disabled on a node.

// ============================================================================
// SECTION: Setting
// ============================================================================

/// A node attribute that is either inherited or concretely configured.
///
/// # Invariants
/// - `Unset` always delegates to the parent chain; a `Value` never does,
///   even when the contained value is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Setting<T> {
    /// Not configured on this node; resolve via the parent chain.
    #[default]
    Unset,
    /// Concretely configured on this node.
    Value(T),
}

impl<T> Setting<T> {
    /// Returns the concrete value, when one is configured.
    #[must_use]
    pub const fn concrete(&self) -> Option<&T> {
        match self {
            Self::Unset => None,
            Self::Value(value) => Some(value),
        }
    }

    /// Returns true when no value is configured on this node.
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

// ============================================================================
// SECTION: Cacher Setting
// ============================================================================

/// Distributed-cache configuration on a resolver node.
///
/// # Invariants
/// - `Inherit` delegates to the parent chain, then to the context default.
/// - `Disabled` is concrete: delegation stops and no cacher is used.
#[derive(Clone)]
pub enum CacherSetting<C> {
    /// Not configured on this node; resolve via the parent chain.
    Inherit,
    /// Concretely configured: no distributed cache for this node.
    Disabled,
    /// Concretely configured with a specific cacher.
    Enabled(C),
}

impl<C> CacherSetting<C> {
    /// Returns true when this node neither enables nor disables the cacher.
    #[must_use]
    pub const fn is_inherit(&self) -> bool {
        matches!(self, Self::Inherit)
    }
}

// Hand-written so the default does not demand `C: Default`; the cacher type
// is a trait object handle with no meaningful default of its own.
impl<C> Default for CacherSetting<C> {
    fn default() -> Self {
        Self::Inherit
    }
}
