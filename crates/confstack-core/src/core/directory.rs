// crates/confstack-core/src/core/directory.rs
// ============================================================================
// Module: Directory Model
// Description: Namespace paths used to scope provider lookups.
// Purpose: Provide immutable directory identities and ordered search chains.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! A [`Directory`] is a path-like namespace identifier (`/service/environment`
//! or an arbitrary literal path) used to scope configuration lookups. A
//! [`DirectoryChain`] is the ordered sequence of directories a resolver
//! searches, highest priority first.
//! Invariants:
//! - Directory identity is the resolved path string, compared case-sensitively.
//! - Directories are immutable once constructed.
//! - Chain fingerprints are stable for a given ordered sequence of paths.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Service used when no service component is available.
pub const GLOBAL_SERVICE: &str = "global";

/// Placeholder substituted with the resolved service name.
const SERVICE_PLACEHOLDER: &str = "{service}";

/// Placeholder substituted with the resolved environment name.
const ENVIRONMENT_PLACEHOLDER: &str = "{environment}";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while constructing a directory from a path string.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The path was empty or did not start with `/`.
    #[error("invalid directory path: {0:?}")]
    InvalidPath(String),
    /// The path used a placeholder other than `{service}`/`{environment}`.
    #[error("unknown placeholder {placeholder:?} in directory path {path:?}")]
    UnknownPlaceholder {
        /// The offending placeholder, braces included.
        placeholder: String,
        /// The full path that contained it.
        path: String,
    },
}

// ============================================================================
// SECTION: Directory
// ============================================================================

/// An immutable namespace path used to scope provider lookups.
///
/// # Invariants
/// - `path` always starts with `/` and never ends with one.
/// - Equality and hashing use only the path string (case-sensitive).
/// - `templated` is true iff the path still contains a placeholder.
#[derive(Debug, Clone)]
pub struct Directory {
    /// Full path string; the fundamental identity of the directory.
    path: String,
    /// Service component parsed from the path, when present.
    service: Option<String>,
    /// Environment component parsed from the path, when present.
    environment: Option<String>,
    /// True when the path still carries `{service}`/`{environment}` slots.
    templated: bool,
}

impl Directory {
    /// Builds a directory from service and environment components.
    ///
    /// A missing or empty service falls back to [`GLOBAL_SERVICE`]; a missing
    /// or empty environment is simply omitted from the path.
    #[must_use]
    pub fn from_components(service: Option<&str>, environment: Option<&str>) -> Self {
        let service = match service {
            Some(s) if !s.is_empty() => s,
            _ => GLOBAL_SERVICE,
        };
        let path = match environment {
            Some(env) if !env.is_empty() => format!("/{service}/{env}"),
            _ => format!("/{service}"),
        };
        let environment = environment.filter(|env| !env.is_empty()).map(str::to_owned);
        Self {
            path,
            service: Some(service.to_owned()),
            environment,
            templated: false,
        }
    }

    /// Builds a directory from a literal path such as `/billing/testing`.
    ///
    /// Paths may carry `{service}`/`{environment}` placeholders; they are
    /// substituted later via [`Directory::resolve`].
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] when the path is empty, does not start with
    /// `/`, ends with `/`, or uses an unknown placeholder.
    pub fn from_path(path: &str) -> Result<Self, DirectoryError> {
        if path.len() < 2 || !path.starts_with('/') || path.ends_with('/') {
            return Err(DirectoryError::InvalidPath(path.to_owned()));
        }
        let templated = validate_placeholders(path)?;

        let mut elements = path[1..].splitn(2, '/');
        let service = elements.next().filter(|s| !s.is_empty()).map(str::to_owned);
        let environment = elements.next().filter(|s| !s.is_empty()).map(str::to_owned);
        Ok(Self {
            path: path.to_owned(),
            service,
            environment,
            templated,
        })
    }

    /// Substitutes placeholder slots with concrete service/environment names.
    ///
    /// Returns a clone of `self` unchanged when the path has no placeholders.
    #[must_use]
    pub fn resolve(&self, service: &str, environment: &str) -> Self {
        if !self.templated {
            return self.clone();
        }
        let path = self
            .path
            .replace(SERVICE_PLACEHOLDER, service)
            .replace(ENVIRONMENT_PLACEHOLDER, environment);
        // The substituted path is literal by construction, so re-parsing only
        // recomputes the service/environment split.
        let mut elements = path[1..].splitn(2, '/');
        let service = elements.next().filter(|s| !s.is_empty()).map(str::to_owned);
        let environment = elements.next().filter(|s| !s.is_empty()).map(str::to_owned);
        Self {
            path,
            service,
            environment,
            templated: false,
        }
    }

    /// Returns the full path string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the service component, when the path has one.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// Returns the environment component, when the path has one.
    #[must_use]
    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    /// Returns true when the path still carries placeholder slots.
    #[must_use]
    pub const fn is_templated(&self) -> bool {
        self.templated
    }
}

impl PartialEq for Directory {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Directory {}

impl Hash for Directory {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Display for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Checks every `{...}` slot in the path, returning whether any are present.
fn validate_placeholders(path: &str) -> Result<bool, DirectoryError> {
    let mut templated = false;
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            return Err(DirectoryError::InvalidPath(path.to_owned()));
        };
        let placeholder = &rest[start..=start + len];
        if placeholder != SERVICE_PLACEHOLDER && placeholder != ENVIRONMENT_PLACEHOLDER {
            return Err(DirectoryError::UnknownPlaceholder {
                placeholder: placeholder.to_owned(),
                path: path.to_owned(),
            });
        }
        templated = true;
        rest = &rest[start + len + 1..];
    }
    Ok(templated)
}

// ============================================================================
// SECTION: Directory Chain
// ============================================================================

/// An ordered sequence of directories to search, highest priority first.
///
/// # Invariants
/// - The fingerprint is the directory paths joined with `|`, in order.
/// - Caller-supplied sequences are used as given, repeats included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryChain {
    /// Directories in priority order.
    directories: Vec<Directory>,
    /// Concatenated directory paths, used as a cache sub-key component.
    fingerprint: String,
}

impl DirectoryChain {
    /// Builds a chain from an explicit ordered sequence.
    #[must_use]
    pub fn new(directories: Vec<Directory>) -> Self {
        let fingerprint = directories
            .iter()
            .map(Directory::path)
            .collect::<Vec<_>>()
            .join("|");
        Self {
            directories,
            fingerprint,
        }
    }

    /// Builds the standard chain for a service/environment pair.
    ///
    /// With service `S` and environment `E` both present the chain is
    /// `[/S/E, /S, /global/E, /global]`; entries referencing a missing
    /// component are omitted, and the `/S` pair is omitted when the service
    /// is absent or [`GLOBAL_SERVICE`].
    #[must_use]
    pub fn standard(service: Option<&str>, environment: Option<&str>) -> Self {
        let environment = environment.filter(|env| !env.is_empty());
        let mut directories = Vec::with_capacity(4);
        if let Some(service) = service.filter(|s| !s.is_empty() && *s != GLOBAL_SERVICE) {
            if environment.is_some() {
                directories.push(Directory::from_components(Some(service), environment));
            }
            directories.push(Directory::from_components(Some(service), None));
        }
        if environment.is_some() {
            directories.push(Directory::from_components(None, environment));
        }
        directories.push(Directory::from_components(None, None));
        Self::new(directories)
    }

    /// Returns the directories in priority order.
    #[must_use]
    pub fn directories(&self) -> &[Directory] {
        &self.directories
    }

    /// Returns the concatenated-path fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Returns true when the chain holds no directories.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }
}
