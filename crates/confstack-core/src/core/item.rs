// crates/confstack-core/src/core/item.rs
// ============================================================================
// Module: Directory Items
// Description: Name/value pairs scoped to a directory, plus listings of them.
// Purpose: Carry resolved configuration values with provenance through the chain.
// Dependencies: none
// ============================================================================

//! ## Overview
//! A [`DirectoryItem`] associates a configuration name with a value for one
//! directory, tagged with the provider that produced it. A
//! [`DirectoryListing`] is the case-insensitive name-to-item map a provider
//! builds when it bulk-fetches a directory.
//! Invariants:
//! - Item names are stored lower-case; the original spelling is preserved
//!   separately.
//! - `value == None` means the name is confirmed absent at that directory.
//! - Items from the environment provider are never cacheable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::btree_map;

// ============================================================================
// SECTION: Directory Item
// ============================================================================

/// A single configuration value scoped to a directory.
///
/// # Invariants
/// - `name` is lower-case; `original_name` keeps the caller's spelling.
/// - `cacheable == false` keeps the item out of the distributed cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryItem {
    /// Lower-cased lookup name.
    name: String,
    /// Name exactly as supplied at construction.
    original_name: String,
    /// Path of the directory the value was found in.
    directory: String,
    /// The value, or `None` for a confirmed-absent name.
    value: Option<String>,
    /// Provider (or pseudo-source) that produced the item.
    source: String,
    /// Whether the distributed cache may persist this item.
    cacheable: bool,
}

impl DirectoryItem {
    /// Creates a cacheable item.
    #[must_use]
    pub fn new(
        directory: impl Into<String>,
        name: &str,
        value: Option<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            original_name: name.to_owned(),
            directory: directory.into(),
            value,
            source: source.into(),
            cacheable: true,
        }
    }

    /// Creates an item the distributed cache must never persist.
    #[must_use]
    pub fn non_cacheable(
        directory: impl Into<String>,
        name: &str,
        value: Option<String>,
        source: impl Into<String>,
    ) -> Self {
        let mut item = Self::new(directory, name, value, source);
        item.cacheable = false;
        item
    }

    /// Returns the lower-cased lookup name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name as originally supplied.
    #[must_use]
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Returns the path of the directory the value belongs to.
    #[must_use]
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Returns the value, or `None` for a confirmed-absent name.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Consumes the item, returning its value.
    #[must_use]
    pub fn into_value(self) -> Option<String> {
        self.value
    }

    /// Returns the provider (or pseudo-source) that produced the item.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns whether the distributed cache may persist this item.
    #[must_use]
    pub const fn is_cacheable(&self) -> bool {
        self.cacheable
    }
}

// ============================================================================
// SECTION: Directory Listing
// ============================================================================

/// Case-insensitive map of item names to items for one directory.
///
/// # Invariants
/// - Keys are the items' lower-cased names.
/// - The `directory` tag is informational metadata only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    /// Path of the directory this listing was built for, when known.
    directory: Option<String>,
    /// Items keyed by lower-cased name.
    items: BTreeMap<String, DirectoryItem>,
}

impl DirectoryListing {
    /// Creates an empty listing tagged with a directory path.
    #[must_use]
    pub fn for_directory(directory: impl Into<String>) -> Self {
        Self {
            directory: Some(directory.into()),
            items: BTreeMap::new(),
        }
    }

    /// Creates a listing tagged with a directory path from an item iterator.
    #[must_use]
    pub fn from_items(
        directory: impl Into<String>,
        items: impl IntoIterator<Item = DirectoryItem>,
    ) -> Self {
        let mut listing = Self::for_directory(directory);
        for item in items {
            listing.insert(item);
        }
        listing
    }

    /// Returns the directory path this listing was built for, when known.
    #[must_use]
    pub fn directory(&self) -> Option<&str> {
        self.directory.as_deref()
    }

    /// Inserts an item, replacing any existing item with the same name.
    pub fn insert(&mut self, item: DirectoryItem) {
        self.items.insert(item.name().to_owned(), item);
    }

    /// Removes the item with the given name, if present (case-insensitive).
    pub fn remove(&mut self, name: &str) {
        self.items.remove(&name.to_ascii_lowercase());
    }

    /// Looks up an item case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DirectoryItem> {
        self.items.get(&name.to_ascii_lowercase())
    }

    /// Returns the number of items in the listing.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when the listing holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over the items in name order.
    pub fn items(&self) -> impl Iterator<Item = &DirectoryItem> {
        self.items.values()
    }

    /// Returns the subset of `candidates` that are new or carry a different
    /// value than what this listing already holds.
    ///
    /// Only values are compared; provenance differences alone do not make an
    /// item "different". Used to avoid rewriting unchanged cache rows.
    #[must_use]
    pub fn items_with_different_value<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a DirectoryItem>,
    ) -> Vec<&'a DirectoryItem> {
        candidates
            .into_iter()
            .filter(|candidate| {
                self.items
                    .get(candidate.name())
                    .is_none_or(|existing| existing.value() != candidate.value())
            })
            .collect()
    }
}

impl IntoIterator for DirectoryListing {
    type Item = (String, DirectoryItem);
    type IntoIter = btree_map::IntoIter<String, DirectoryItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
